use crate::cmd::Context;
use crate::output::render;
use kanban_core::store::TicketStore;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct NextId {
    id: String,
}

/// `kb next-id`: print the id the next `create` would allocate.
pub fn run_next_id(ctx: &Context) -> anyhow::Result<()> {
    let id = ctx.store()?.next_id()?;
    render(ctx.output, &NextId { id: id.to_string() }, |v, w| {
        writeln!(w, "{}", v.id)
    })
}
