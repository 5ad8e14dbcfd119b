//! Role guard for privileged workflow operations.
//!
//! Caller identity is self-declared, so this is advisory rather than a
//! security boundary.

use crate::error::{KanbanError, Result};
use crate::model::ticket::AgentRole;

/// Trim and lowercase a declared caller identity.
#[must_use]
pub fn normalize_actor(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Require that `caller` names `role`.
///
/// # Errors
///
/// `Unauthorized` when the normalized caller is anything else.
pub fn require_role(operation: &str, role: AgentRole, caller: &str) -> Result<()> {
    if normalize_actor(caller) == role.canonical_name() {
        Ok(())
    } else {
        Err(KanbanError::Unauthorized {
            operation: operation.to_string(),
            expected: role.canonical_name().to_string(),
            caller: caller.to_string(),
        })
    }
}
