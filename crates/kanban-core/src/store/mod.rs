//! Ticket persistence.
//!
//! [`TicketStore`] is the seam every higher layer goes through; [`FileStore`]
//! keeps one YAML document per ticket under a directory. There is no locking:
//! two writers doing read-modify-write on the same ticket, or racing on
//! [`TicketStore::next_id`], can lose an update.

mod file;

pub use file::FileStore;

use serde::Serialize;

use crate::error::Result;
use crate::model::ticket::{
    AgentRole, GitLink, Owner, Plan, Priority, QualityGates, Status, Ticket, TicketId, TicketType,
};

/// Persistent keyed collection of tickets.
pub trait TicketStore {
    /// Load one ticket.
    ///
    /// # Errors
    ///
    /// `NotFound` when no record exists, `Validation` when the record is corrupt.
    fn get(&self, id: &TicketId) -> Result<Ticket>;

    /// Every loadable ticket matching `filter`, ascending by id.
    ///
    /// Records that fail to parse or validate are skipped.
    ///
    /// # Errors
    ///
    /// Only on failure to enumerate the store itself.
    fn list(&self, filter: &ListFilter) -> Result<Vec<Ticket>>;

    /// Persist a brand-new ticket with a single `CREATED` log entry.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if `id` is taken, `Validation` if the draft is invalid.
    fn create(&self, id: TicketId, draft: TicketDraft) -> Result<Ticket>;

    /// Validate and overwrite the stored record.
    ///
    /// # Errors
    ///
    /// `Validation` if the record violates the schema; nothing is written then.
    fn save(&self, ticket: &Ticket) -> Result<()>;

    /// Schema check of every persisted record, ordered by file name.
    ///
    /// # Errors
    ///
    /// Only on failure to enumerate the store itself.
    fn validate_all(&self) -> Result<Vec<FileValidation>>;

    /// Successor of the highest allocated id, or `T-0001` for an empty store.
    ///
    /// # Errors
    ///
    /// `PreconditionFailed` once `T-9999` has been used.
    fn next_id(&self) -> Result<TicketId>;
}

/// Conjunctive filter for [`TicketStore::list`]. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub assignee: Option<String>,
    pub priority: Option<Priority>,
}

impl ListFilter {
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.is_none_or(|s| ticket.status == s)
            && self.priority.is_none_or(|p| ticket.priority == p)
            && self
                .assignee
                .as_deref()
                .is_none_or(|a| ticket.assignees.iter().any(|x| x == a))
    }
}

/// Caller-supplied fields of a ticket that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub title: String,
    pub kind: TicketType,
    pub priority: Priority,
    pub status: Status,
    pub owner: Owner,
    pub assignees: Vec<String>,
    pub description: String,
    pub file_ownership: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub quality_gates: QualityGates,
    pub plan: Option<Plan>,
    pub git: Option<GitLink>,
}

impl TicketDraft {
    /// Draft in `BACKLOG`, owned by the leader, with every list empty.
    pub fn new(title: impl Into<String>, kind: TicketType, priority: Priority) -> Self {
        Self {
            title: title.into(),
            kind,
            priority,
            status: Status::Backlog,
            owner: Owner::default(),
            assignees: Vec::new(),
            description: String::new(),
            file_ownership: Vec::new(),
            acceptance_criteria: Vec::new(),
            quality_gates: QualityGates::default(),
            plan: None,
            git: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_owner(mut self, role: AgentRole, agent: impl Into<String>) -> Self {
        self.owner = Owner {
            role,
            agent: agent.into(),
        };
        self
    }

    /// Materialize the record without any log entry.
    pub(crate) fn into_ticket(self, id: TicketId) -> Ticket {
        Ticket {
            id,
            title: self.title,
            kind: self.kind,
            priority: self.priority,
            status: self.status,
            owner: self.owner,
            assignees: self.assignees,
            description: self.description,
            file_ownership: self.file_ownership,
            acceptance_criteria: self.acceptance_criteria,
            artifacts: crate::model::ticket::Artifacts::default(),
            quality_gates: self.quality_gates,
            plan: self.plan,
            git: self.git,
            log: Vec::new(),
        }
    }
}

/// Outcome of checking one persisted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileValidation {
    pub file: String,
    pub valid: bool,
    pub errors: Vec<String>,
}
