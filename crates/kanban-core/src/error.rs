use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::model::schema::FieldIssue;
use crate::model::ticket::{InvalidTransition, Status, TicketId};

/// Convenience alias used by every fallible core operation.
pub type Result<T, E = KanbanError> = std::result::Result<T, E>;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MissingAgent,
    TicketNotFound,
    AlreadyExists,
    InvalidTransition,
    InvalidSlug,
    Unauthorized,
    PreconditionFailed,
    ValidationFailed,
    GitCommandFailed,
    StoreIo,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MissingAgent => "E1002",
            Self::TicketNotFound => "E2001",
            Self::AlreadyExists => "E2002",
            Self::InvalidTransition => "E2003",
            Self::InvalidSlug => "E2004",
            Self::Unauthorized => "E2005",
            Self::PreconditionFailed => "E2006",
            Self::ValidationFailed => "E3001",
            Self::GitCommandFailed => "E5001",
            Self::StoreIo => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Error kind name, stable across releases.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::ConfigParseError => "config_parse_error",
            Self::MissingAgent => "missing_agent",
            Self::TicketNotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidTransition => "invalid_transition",
            Self::InvalidSlug => "invalid_slug",
            Self::Unauthorized => "unauthorized",
            Self::PreconditionFailed => "precondition_failed",
            Self::ValidationFailed => "validation_error",
            Self::GitCommandFailed => "git_command_failed",
            Self::StoreIo => "store_io",
            Self::InternalUnexpected => "internal",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MissingAgent => "Caller identity required",
            Self::TicketNotFound => "Ticket not found",
            Self::AlreadyExists => "Ticket or branch already exists",
            Self::InvalidTransition => "Invalid status transition",
            Self::InvalidSlug => "Invalid command branch slug",
            Self::Unauthorized => "Caller not allowed to run this operation",
            Self::PreconditionFailed => "Operation precondition not met",
            Self::ValidationFailed => "Ticket record failed schema validation",
            Self::GitCommandFailed => "git command failed",
            Self::StoreIo => "Ticket store I/O failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .kanban/config.toml and retry."),
            Self::MissingAgent => Some("Set --agent, KANBAN_AGENT, or AGENT."),
            Self::TicketNotFound => Some("Run `kb list` to see existing ticket ids."),
            Self::AlreadyExists => Some("Pick a new ticket id or branch name."),
            Self::InvalidTransition => Some(
                "Follow the lifecycle: BACKLOG -> READY -> IN_PROGRESS -> REVIEW -> DONE.",
            ),
            Self::InvalidSlug => Some("Use lowercase letters, digits and hyphens, e.g. add-auth."),
            Self::Unauthorized => Some("Re-run with --agent set to the role that owns this step."),
            Self::PreconditionFailed => None,
            Self::ValidationFailed => Some("Run `kb validate` to list every field-level issue."),
            Self::GitCommandFailed => Some("Inspect the git error above and fix the repository state."),
            Self::StoreIo => Some("Check that the tickets directory exists and is writable."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A ticket that blocks a command-branch merge because it is not DONE yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTicket {
    pub id: TicketId,
    pub status: Status,
}

/// Every failure the core can surface to a caller.
#[derive(Debug, thiserror::Error)]
pub enum KanbanError {
    #[error("ticket {id} not found at {}", .path.display())]
    NotFound { id: TicketId, path: PathBuf },

    #[error("{what} already exists")]
    AlreadyExists { what: String },

    #[error("validation failed: {}", join_issues(.issues))]
    Validation { issues: Vec<FieldIssue> },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("invalid slug \"{slug}\": use lowercase alphanumerics and hyphens")]
    InvalidSlug { slug: String },

    #[error("{operation} can only be called by {expected}; received by=\"{caller}\"")]
    Unauthorized {
        operation: String,
        expected: String,
        caller: String,
    },

    #[error("git {command} failed: {detail}")]
    GitCommandFailed { command: String, detail: String },

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("not all tickets on {command_branch} are DONE: {}", join_pending(.pending))]
    UnfinishedTickets {
        command_branch: String,
        pending: Vec<PendingTicket>,
    },

    #[error("ticket store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl KanbanError {
    /// Build a validation error carrying a single field issue.
    pub fn invalid_field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            issues: vec![FieldIssue::new(path, message)],
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::TicketNotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::InvalidTransition(_) => ErrorCode::InvalidTransition,
            Self::InvalidSlug { .. } => ErrorCode::InvalidSlug,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::GitCommandFailed { .. } => ErrorCode::GitCommandFailed,
            Self::PreconditionFailed(_) | Self::UnfinishedTickets { .. } => {
                ErrorCode::PreconditionFailed
            }
            Self::Io { .. } => ErrorCode::StoreIo,
        }
    }

    /// Remediation hint for operators and agents.
    #[must_use]
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidTransition(err) => Some(format!(
                "Allowed from {}: {}",
                err.from,
                err.allowed_list()
            )),
            Self::UnfinishedTickets { .. } => {
                Some("Move every linked ticket to DONE before merging the command branch.".into())
            }
            other => other.code().hint().map(ToString::to_string),
        }
    }
}

fn join_pending(pending: &[PendingTicket]) -> String {
    pending
        .iter()
        .map(|p| format!("{} [{}]", p.id, p.status))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
