//! Caller identity resolution for CLI commands.
//!
//! The resolution chain: `--agent` flag > `KANBAN_AGENT` env > `AGENT` env >
//! user config `agent` > `USER` env (TTY only). Commands that record who acted
//! (transition, update, merges) require an identity; the rest work without one.

use std::env;

/// No caller identity could be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResolutionError {
    pub message: String,
}

impl std::fmt::Display for AgentResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AgentResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_agent_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(agent) = cli_flag.filter(|a| !a.trim().is_empty()) {
        return Some(agent.to_string());
    }

    if let Some(val) = env.get("KANBAN_AGENT") {
        return Some(val);
    }

    if let Some(val) = env.get("AGENT") {
        return Some(val);
    }

    if let Some(agent) = configured.filter(|a| !a.trim().is_empty()) {
        return Some(agent.to_string());
    }

    if env.is_tty() {
        if let Some(val) = env.get("USER") {
            return Some(val);
        }
    }

    None
}

/// Resolve the caller identity, `None` when every source is empty.
pub fn resolve_agent(cli_flag: Option<&str>, configured: Option<&str>) -> Option<String> {
    resolve_agent_with(cli_flag, configured, &RealEnv)
}

/// Resolve the caller identity or fail for commands that must record one.
pub fn require_agent(
    cli_flag: Option<&str>,
    configured: Option<&str>,
) -> Result<String, AgentResolutionError> {
    resolve_agent(cli_flag, configured).ok_or_else(|| AgentResolutionError {
        message: "Agent identity required for this command. \
                  Set --agent, KANBAN_AGENT, or AGENT environment variable."
            .to_string(),
    })
}
