//! kanban-core library.
//!
//! Ticket records, their status lifecycle, and the branch-per-ticket git
//! workflow that moves in lockstep with them.
//!
//! # Conventions
//!
//! - **Errors**: core operations return [`Result`] with a [`KanbanError`];
//!   configuration loading uses `anyhow::Result` with context.
//! - **Logging**: Use `tracing` macros (`info!` for state changes, `debug!` for
//!   git invocations and skipped records, `warn!` for advisory findings).

pub mod config;
pub mod conflict;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod policy;
pub mod store;
pub mod vcs;
pub mod workflow;

pub use error::{ErrorCode, KanbanError, Result};
