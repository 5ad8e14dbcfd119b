//! Branch naming rules.

use crate::error::{KanbanError, Result};
use crate::model::ticket::TicketId;

pub const COMMAND_PREFIX: &str = "feat/";
pub const TICKET_SEPARATOR: &str = "--";

/// Turn a slug into its command branch name, `feat/{slug}`.
///
/// # Errors
///
/// `InvalidSlug` unless the slug matches `^[a-z0-9][a-z0-9-]*$`.
pub fn validate_command_branch(slug: &str) -> Result<String> {
    let mut chars = slug.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(format!("{COMMAND_PREFIX}{slug}"))
    } else {
        Err(KanbanError::InvalidSlug {
            slug: slug.to_string(),
        })
    }
}

/// `{command_branch}--{id}`.
#[must_use]
pub fn ticket_branch_name(command_branch: &str, id: &TicketId) -> String {
    format!("{command_branch}{TICKET_SEPARATOR}{id}")
}
