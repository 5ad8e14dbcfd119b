//! `kb update`: patch ticket fields without touching status.
//!
//! List flags replace the whole list when given; `--clear-*` empties one.
//! `--proposed-change` and `--pr-link` append to the ticket's artifacts
//! instead. Plan steps and assumptions replace their half of the plan.

use crate::cmd::show::render_ticket;
use crate::cmd::{Context, parse_plan_step};
use clap::Args;
use kanban_core::lifecycle::{TicketPatch, update_ticket};
use kanban_core::model::{AgentRole, Owner, Plan, PlanStep, Priority, Ticket, TicketId};
use kanban_core::store::TicketStore;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: TicketId,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// New owner role; the current agent is kept unless --owner-agent is set.
    #[arg(long)]
    pub owner_role: Option<AgentRole>,

    #[arg(long)]
    pub owner_agent: Option<String>,

    /// Replace assignees (repeatable).
    #[arg(long = "assignee")]
    pub assignees: Vec<String>,

    /// Remove every assignee.
    #[arg(long, conflicts_with = "assignees")]
    pub clear_assignees: bool,

    /// Replace file ownership prefixes (repeatable).
    #[arg(long = "owns")]
    pub file_ownership: Vec<String>,

    /// Remove every file ownership prefix.
    #[arg(long, conflicts_with = "file_ownership")]
    pub clear_owns: bool,

    /// Replace acceptance criteria (repeatable).
    #[arg(long = "criterion")]
    pub acceptance_criteria: Vec<String>,

    /// Replace verification commands (repeatable).
    #[arg(long = "verify")]
    pub verify_commands: Vec<String>,

    #[arg(long)]
    pub smoke_test: Option<String>,

    #[arg(long)]
    pub command_branch: Option<String>,

    #[arg(long)]
    pub ticket_branch: Option<String>,

    #[arg(long)]
    pub base_branch: Option<String>,

    /// Replace plan steps, each "DESCRIPTION::VERIFICATION" (repeatable).
    #[arg(long = "plan-step", value_parser = parse_plan_step)]
    pub plan_steps: Vec<PlanStep>,

    /// Replace plan assumptions (repeatable).
    #[arg(long = "assumption")]
    pub assumptions: Vec<String>,

    /// Append a proposed change (repeatable).
    #[arg(long = "proposed-change")]
    pub proposed_changes: Vec<String>,

    /// Append a pull request link (repeatable).
    #[arg(long = "pr-link")]
    pub pr_links: Vec<String>,

    /// Log note; defaults to the list of changed fields.
    #[arg(long)]
    pub note: Option<String>,
}

/// `None` leaves the list alone; `clear` yields an empty replacement.
fn replacement(list: Vec<String>, clear: bool) -> Option<Vec<String>> {
    if clear {
        Some(Vec::new())
    } else if list.is_empty() {
        None
    } else {
        Some(list)
    }
}

impl UpdateArgs {
    /// Build the patch; owner and plan flags merge into `current`.
    fn into_patch(self, current: &Ticket) -> TicketPatch {
        let owner = if self.owner_role.is_some() || self.owner_agent.is_some() {
            Some(Owner {
                role: self.owner_role.unwrap_or(current.owner.role),
                agent: self
                    .owner_agent
                    .unwrap_or_else(|| current.owner.agent.clone()),
            })
        } else {
            None
        };
        let plan = if self.plan_steps.is_empty() && self.assumptions.is_empty() {
            None
        } else {
            let existing = current.plan.clone().unwrap_or_default();
            Some(Plan {
                steps: if self.plan_steps.is_empty() {
                    existing.steps
                } else {
                    self.plan_steps
                },
                assumptions: if self.assumptions.is_empty() {
                    existing.assumptions
                } else {
                    self.assumptions
                },
            })
        };
        TicketPatch {
            title: self.title,
            description: self.description,
            priority: self.priority,
            owner,
            assignees: replacement(self.assignees, self.clear_assignees),
            file_ownership: replacement(self.file_ownership, self.clear_owns),
            acceptance_criteria: replacement(self.acceptance_criteria, false),
            verify_commands: replacement(self.verify_commands, false),
            smoke_test: self.smoke_test,
            plan,
            command_branch: self.command_branch,
            ticket_branch: self.ticket_branch,
            base_branch: self.base_branch,
            proposed_changes: self.proposed_changes,
            pr_links: self.pr_links,
        }
    }
}

pub fn run_update(args: UpdateArgs, ctx: &Context) -> anyhow::Result<()> {
    let by = ctx.require_agent()?;
    let store = ctx.store()?;
    let current = store.get(&args.id)?;
    let id = args.id.clone();
    let note = args.note.clone();
    let patch = args.into_patch(&current);
    let ticket = update_ticket(&store, &id, patch, &by, note.as_deref())?;
    render_ticket(ctx.output, &ticket)
}
