//! `kb show`: display one ticket with its audit log.

use crate::cmd::Context;
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use clap::Args;
use kanban_core::model::{Ticket, TicketId};
use kanban_core::store::TicketStore;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ticket ID, e.g. T-0001.
    pub id: TicketId,
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// Full human view of a ticket, shared by every command that returns one.
pub fn write_ticket_pretty(ticket: &Ticket, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{}  {}", ticket.id, ticket.title))?;
    pretty_kv(w, "Status", ticket.status.as_str())?;
    pretty_kv(w, "Type", ticket.kind.as_str())?;
    pretty_kv(w, "Priority", ticket.priority.as_str())?;
    pretty_kv(
        w,
        "Owner",
        format!("{} ({})", ticket.owner.agent, ticket.owner.role),
    )?;
    pretty_kv(w, "Assignees", join_or_dash(&ticket.assignees))?;
    pretty_kv(w, "Owns", join_or_dash(&ticket.file_ownership))?;
    if let Some(git) = &ticket.git {
        pretty_kv(w, "Command", git.command_branch.as_deref().unwrap_or("-"))?;
        pretty_kv(w, "Branch", git.ticket_branch.as_deref().unwrap_or("-"))?;
        pretty_kv(w, "Base", &git.base_branch)?;
    }
    if !ticket.artifacts.commits.is_empty() {
        pretty_kv(w, "Commits", ticket.artifacts.commits.join(", "))?;
    }

    if !ticket.description.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", ticket.description)?;
    }
    if !ticket.acceptance_criteria.is_empty() {
        writeln!(w)?;
        writeln!(w, "Acceptance criteria:")?;
        for criterion in &ticket.acceptance_criteria {
            writeln!(w, "  - {criterion}")?;
        }
    }
    if let Some(plan) = &ticket.plan {
        writeln!(w)?;
        writeln!(w, "Plan:")?;
        for (idx, step) in plan.steps.iter().enumerate() {
            writeln!(w, "  {}. {} (verify: {})", idx + 1, step.description, step.verification)?;
        }
    }

    writeln!(w)?;
    writeln!(w, "Log:")?;
    for entry in &ticket.log {
        let change = match (entry.from, entry.to) {
            (Some(from), Some(to)) => format!(" {from} -> {to}"),
            _ => String::new(),
        };
        writeln!(
            w,
            "  {}  {:<24} {}{}{}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.as_str(),
            entry.actor,
            change,
            entry.note.as_deref().map(|n| format!("  {n}")).unwrap_or_default()
        )?;
    }
    pretty_rule(w)
}

/// Ticket as the YAML document it is stored as.
pub fn write_ticket_yaml(ticket: &Ticket, w: &mut dyn Write) -> io::Result<()> {
    let yaml = serde_yaml::to_string(ticket).map_err(io::Error::other)?;
    write!(w, "{yaml}")
}

/// Render a ticket in the requested mode.
pub fn render_ticket(output: OutputMode, ticket: &Ticket) -> anyhow::Result<()> {
    render_mode(output, ticket, write_ticket_yaml, write_ticket_pretty)
}

pub fn run_show(args: &ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let ticket = ctx.store()?.get(&args.id)?;
    render_ticket(ctx.output, &ticket)
}
