//! `kb create`: create a ticket in BACKLOG or READY.

use crate::cmd::show::render_ticket;
use crate::cmd::{Context, parse_plan_step};
use clap::Args;
use kanban_core::lifecycle::create_ticket;
use kanban_core::model::{
    AgentRole, GitLink, Owner, Plan, PlanStep, Priority, Status, TicketId, TicketType,
};
use kanban_core::store::TicketDraft;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Short title, starting with a verb.
    #[arg(short, long)]
    pub title: String,

    /// Ticket type: feature, bug, chore, docs, test.
    #[arg(long = "type", default_value = "feature")]
    pub kind: TicketType,

    /// Priority: P0 (most urgent) to P3.
    #[arg(short, long, default_value = "P2")]
    pub priority: Priority,

    /// Explicit id; the next free one is allocated otherwise.
    #[arg(long)]
    pub id: Option<TicketId>,

    /// Initial status: BACKLOG or READY.
    #[arg(long, default_value = "BACKLOG")]
    pub status: Status,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Assignee (repeatable).
    #[arg(long = "assignee")]
    pub assignees: Vec<String>,

    /// Path prefix this ticket may change (repeatable).
    #[arg(long = "owns")]
    pub file_ownership: Vec<String>,

    /// Acceptance criterion (repeatable).
    #[arg(long = "criterion")]
    pub acceptance_criteria: Vec<String>,

    /// Verification command for quality gates (repeatable).
    #[arg(long = "verify")]
    pub verify_commands: Vec<String>,

    #[arg(long)]
    pub smoke_test: Option<String>,

    /// Owner role: LEADER, WORKER, QUALITY.
    #[arg(long, default_value = "LEADER")]
    pub owner_role: AgentRole,

    /// Owner agent name.
    #[arg(long, default_value = "leader")]
    pub owner_agent: String,

    /// Command branch this ticket belongs to.
    #[arg(long)]
    pub command_branch: Option<String>,

    /// Ticket branch, when it already exists.
    #[arg(long)]
    pub ticket_branch: Option<String>,

    #[arg(long)]
    pub base_branch: Option<String>,

    /// Plan step as "DESCRIPTION::VERIFICATION" (repeatable, in order).
    #[arg(long = "plan-step", value_parser = parse_plan_step)]
    pub plan_steps: Vec<PlanStep>,

    /// Plan assumption (repeatable).
    #[arg(long = "assumption")]
    pub assumptions: Vec<String>,
}

impl CreateArgs {
    fn into_draft(self) -> TicketDraft {
        let mut draft = TicketDraft::new(self.title, self.kind, self.priority).with_status(self.status);
        draft.owner = Owner {
            role: self.owner_role,
            agent: self.owner_agent,
        };
        draft.description = self.description.unwrap_or_default();
        draft.assignees = self.assignees;
        draft.file_ownership = self.file_ownership;
        draft.acceptance_criteria = self.acceptance_criteria;
        draft.quality_gates.verify_commands = self.verify_commands;
        draft.quality_gates.smoke_test = self.smoke_test;
        if !self.plan_steps.is_empty() || !self.assumptions.is_empty() {
            draft.plan = Some(Plan {
                steps: self.plan_steps,
                assumptions: self.assumptions,
            });
        }
        if self.command_branch.is_some() || self.ticket_branch.is_some() || self.base_branch.is_some()
        {
            let mut git = GitLink {
                command_branch: self.command_branch,
                ticket_branch: self.ticket_branch,
                ..GitLink::default()
            };
            if let Some(base) = self.base_branch {
                git.base_branch = base;
            }
            draft.git = Some(git);
        }
        draft
    }
}

pub fn run_create(args: CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store()?;
    let id = args.id.clone();
    let ticket = create_ticket(&store, id, args.into_draft())?;
    render_ticket(ctx.output, &ticket)
}
