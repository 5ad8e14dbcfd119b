//! Version-control gateway over the `git` command line.
//!
//! All repository mutations in the workflow go through [`Git`]. Calls are
//! synchronous, bounded by a timeout, and never retried.

pub mod branch;
mod command;
mod gateway;
pub mod sensitive;

pub use branch::{ticket_branch_name, validate_command_branch};
pub use gateway::{CommitOutcome, Git};
pub use sensitive::is_sensitive_path;
