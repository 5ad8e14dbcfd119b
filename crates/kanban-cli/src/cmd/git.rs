//! `kb git ...`: branch-per-ticket workflow commands.

use crate::cmd::Context;
use crate::output::{pretty_kv, render};
use clap::Subcommand;
use kanban_core::model::TicketId;
use kanban_core::store::FileStore;
use kanban_core::workflow::{
    BranchReport, CommandMergeReport, CommitReport, ConflictReport, TicketMergeReport, Workflow,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum GitCommand {
    /// Create and check out the command branch feat/SLUG.
    InitCommand {
        slug: String,
        /// Branch or revision to start from; defaults to HEAD.
        #[arg(long)]
        base: Option<String>,
    },
    /// Create a ticket branch in its own worktree off a command branch.
    Branch {
        id: TicketId,
        #[arg(long)]
        command_branch: String,
    },
    /// Commit all pending changes as "ID: SUMMARY".
    Commit {
        id: TicketId,
        #[arg(short = 'm', long = "summary")]
        summary: String,
        /// Directory to commit in; defaults to the ticket's worktree.
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// Estimate merge risk of a ticket branch into its command branch.
    Conflicts {
        #[arg(long)]
        ticket_branch: String,
        #[arg(long)]
        command_branch: String,
    },
    /// Squash-merge a reviewed ticket branch (quality only).
    MergeTicket {
        id: TicketId,
        /// Target command branch; defaults to the one recorded on the ticket.
        #[arg(long)]
        command_branch: Option<String>,
    },
    /// Merge a finished command branch into trunk (leader only).
    MergeCommand {
        branch: String,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    Checkout {
        branch: String,
    },
}

#[derive(Serialize)]
struct BranchName<'a> {
    branch: &'a str,
}

fn write_branch(report: &BranchReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "Ticket", report.ticket.id.as_str())?;
    pretty_kv(w, "Branch", &report.branch)?;
    pretty_kv(w, "Worktree", report.worktree.display().to_string())
}

fn write_commit(report: &CommitReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{} {}", report.sha, report.message)?;
    for warning in &report.warnings {
        writeln!(w, "warning: {warning}")?;
    }
    Ok(())
}

fn write_conflicts(report: &ConflictReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "Risk", report.summary.risk.to_string())?;
    pretty_kv(w, "Merge base", &report.merge_base)?;
    for reason in &report.summary.reasons {
        writeln!(w, "  - {reason}")?;
    }
    if !report.summary.overlapping_files.is_empty() {
        writeln!(w, "Overlapping files:")?;
        for file in &report.summary.overlapping_files {
            writeln!(w, "  {file}")?;
        }
    }
    if !report.diff_stat.is_empty() {
        writeln!(w, "{}", report.diff_stat)?;
    }
    Ok(())
}

fn write_ticket_merge(report: &TicketMergeReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}: squash merged {} into {}",
        report.ticket.id, report.source, report.target
    )
}

fn write_command_merge(report: &CommandMergeReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", report.message)?;
    if !report.tickets.is_empty() {
        let ids: Vec<&str> = report.tickets.iter().map(TicketId::as_str).collect();
        pretty_kv(w, "Tickets", ids.join(", "))?;
    }
    Ok(())
}

fn write_branch_name(value: &BranchName<'_>, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", value.branch)
}

pub fn run_git(command: GitCommand, ctx: &Context) -> anyhow::Result<()> {
    let store: FileStore = ctx.store()?;
    let workflow = Workflow::for_workspace(&ctx.workspace, &store);
    match command {
        GitCommand::InitCommand { slug, base } => {
            let branch = workflow.init_command(&slug, base.as_deref())?;
            render(ctx.output, &BranchName { branch: &branch }, write_branch_name)
        }
        GitCommand::Branch { id, command_branch } => {
            let report = workflow.create_ticket_branch(&id, &command_branch)?;
            render(ctx.output, &report, write_branch)
        }
        GitCommand::Commit { id, summary, cwd } => {
            let report = workflow.commit_ticket(&id, &summary, cwd.as_deref())?;
            render(ctx.output, &report, write_commit)
        }
        GitCommand::Conflicts {
            ticket_branch,
            command_branch,
        } => {
            let report = workflow.check_conflicts(&ticket_branch, &command_branch)?;
            render(ctx.output, &report, write_conflicts)
        }
        GitCommand::MergeTicket { id, command_branch } => {
            let by = ctx.require_agent()?;
            let report = workflow.merge_ticket(&id, command_branch.as_deref(), &by)?;
            render(ctx.output, &report, write_ticket_merge)
        }
        GitCommand::MergeCommand {
            branch,
            target,
            message,
        } => {
            let by = ctx.require_agent()?;
            let report =
                workflow.merge_command(&branch, target.as_deref(), message.as_deref(), &by)?;
            render(ctx.output, &report, write_command_merge)
        }
        GitCommand::Checkout { branch } => {
            workflow.checkout(&branch)?;
            render(ctx.output, &BranchName { branch: &branch }, write_branch_name)
        }
    }
}
