//! `kb list`: tickets matching a filter, sorted by id.

use crate::cmd::Context;
use crate::output::{Renderable, render_list};
use clap::Args;
use kanban_core::model::{Priority, Status, Ticket};
use kanban_core::store::{ListFilter, TicketStore};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only tickets in this status.
    #[arg(long)]
    pub status: Option<Status>,

    /// Only tickets assigned to this agent.
    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,
}

impl ListArgs {
    fn filter(&self) -> ListFilter {
        ListFilter {
            status: self.status,
            assignee: self.assignee.clone(),
            priority: self.priority,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketRow {
    pub id: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub assignees: Vec<String>,
}

impl From<&Ticket> for TicketRow {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id.to_string(),
            status: ticket.status,
            priority: ticket.priority,
            kind: ticket.kind.as_str().to_string(),
            title: ticket.title.clone(),
            assignees: ticket.assignees.clone(),
        }
    }
}

impl Renderable for TicketRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let who = if self.assignees.is_empty() {
            String::new()
        } else {
            format!("  @{}", self.assignees.join(" @"))
        };
        writeln!(
            w,
            "{}  [{:<11}] {}  {}{}",
            self.id,
            self.status.as_str(),
            self.priority.as_str(),
            self.title,
            who
        )
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            self.id,
            self.status.as_str(),
            self.priority.as_str(),
            self.kind,
            self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATUS", "PRIORITY", "TYPE", "TITLE"]
    }
}

pub fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let tickets = ctx.store()?.list(&args.filter())?;
    let rows: Vec<TicketRow> = tickets.iter().map(TicketRow::from).collect();
    render_list(&rows, ctx.output)
}
