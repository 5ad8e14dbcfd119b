//! `kb transition`: move a ticket along a lifecycle edge.

use crate::cmd::Context;
use crate::cmd::show::render_ticket;
use clap::Args;
use kanban_core::lifecycle::transition;
use kanban_core::model::{Status, TicketId};

#[derive(Args, Debug)]
pub struct TransitionArgs {
    pub id: TicketId,

    /// Target status, e.g. READY or IN_PROGRESS.
    pub status: Status,

    /// Log note; defaults to "FROM → TO".
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run_transition(args: &TransitionArgs, ctx: &Context) -> anyhow::Result<()> {
    let by = ctx.require_agent()?;
    let store = ctx.store()?;
    let ticket = transition(&store, &args.id, args.status, &by, args.note.as_deref())?;
    render_ticket(ctx.output, &ticket)
}
