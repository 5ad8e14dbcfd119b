pub mod completions;
pub mod create;
pub mod git;
pub mod list;
pub mod next_id;
pub mod show;
pub mod transition;
pub mod update;
pub mod validate;

use crate::agent;
use crate::output::OutputMode;
use kanban_core::config::Workspace;
use kanban_core::model::PlanStep;
use kanban_core::store::FileStore;

/// Everything a command handler needs, resolved once in `main`.
pub struct Context {
    pub workspace: Workspace,
    pub output: OutputMode,
    pub agent_flag: Option<String>,
    pub configured_agent: Option<String>,
}

impl Context {
    pub fn store(&self) -> anyhow::Result<FileStore> {
        Ok(self.workspace.open_store()?)
    }

    /// Caller identity for commands that record who acted.
    pub fn require_agent(&self) -> anyhow::Result<String> {
        Ok(agent::require_agent(
            self.agent_flag.as_deref(),
            self.configured_agent.as_deref(),
        )?)
    }
}

/// Parse a `--plan-step` value of the form `DESCRIPTION::VERIFICATION`.
pub fn parse_plan_step(raw: &str) -> Result<PlanStep, String> {
    let (description, verification) = raw
        .split_once("::")
        .ok_or_else(|| format!("expected DESCRIPTION::VERIFICATION, got '{raw}'"))?;
    let (description, verification) = (description.trim(), verification.trim());
    if description.is_empty() || verification.is_empty() {
        return Err("plan step needs both a description and a verification".to_string());
    }
    Ok(PlanStep {
        description: description.to_string(),
        verification: verification.to_string(),
    })
}
