use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The five kinds of ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Feature,
    Bug,
    Chore,
    Docs,
    Test,
}

impl TicketType {
    pub const ALL: [Self; 5] = [Self::Feature, Self::Bug, Self::Chore, Self::Docs, Self::Test];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Chore => "chore",
            Self::Docs => "docs",
            Self::Test => "test",
        }
    }
}

/// Scheduling priority, P0 being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::P0, Self::P1, Self::P2, Self::P3];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

/// The six lifecycle statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Backlog,
    Ready,
    InProgress,
    Review,
    Done,
    Blocked,
}

impl Status {
    pub const ALL: [Self; 6] = [
        Self::Backlog,
        Self::Ready,
        Self::InProgress,
        Self::Review,
        Self::Done,
        Self::Blocked,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
            Self::Blocked => "BLOCKED",
        }
    }

    /// Statuses reachable from `self` in one step.
    ///
    /// - `BACKLOG -> READY | BLOCKED`
    /// - `READY -> IN_PROGRESS | BLOCKED`
    /// - `IN_PROGRESS -> REVIEW | BLOCKED`
    /// - `REVIEW -> DONE | IN_PROGRESS | BLOCKED`
    /// - `BLOCKED -> BACKLOG | READY | IN_PROGRESS | REVIEW`
    /// - `DONE -> IN_PROGRESS` (reopen)
    #[must_use]
    pub const fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Backlog => &[Self::Ready, Self::Blocked],
            Self::Ready => &[Self::InProgress, Self::Blocked],
            Self::InProgress => &[Self::Review, Self::Blocked],
            Self::Review => &[Self::Done, Self::InProgress, Self::Blocked],
            Self::Blocked => &[Self::Backlog, Self::Ready, Self::InProgress, Self::Review],
            Self::Done => &[Self::InProgress],
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        if self.allowed_targets().contains(&target) {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
            })
        }
    }

    /// Statuses a ticket may be created in.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::Backlog | Self::Ready)
    }

    /// Whether a ticket branch in this status may be merged into its command branch.
    #[must_use]
    pub const fn is_mergeable(self) -> bool {
        matches!(self, Self::Review | Self::Done)
    }
}

/// Agent roles in the delivery team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentRole {
    Leader,
    Worker,
    Quality,
}

impl AgentRole {
    pub const ALL: [Self; 3] = [Self::Leader, Self::Worker, Self::Quality];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "LEADER",
            Self::Worker => "WORKER",
            Self::Quality => "QUALITY",
        }
    }

    /// Lowercase caller identity that stands for this role.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Worker => "worker",
            Self::Quality => "quality",
        }
    }
}

/// Audit log action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Created,
    StatusChange,
    Updated,
    BranchCreated,
    Committed,
    OwnershipViolationWarn,
    Merged,
}

impl LogAction {
    pub const ALL: [Self; 7] = [
        Self::Created,
        Self::StatusChange,
        Self::Updated,
        Self::BranchCreated,
        Self::Committed,
        Self::OwnershipViolationWarn,
        Self::Merged,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::StatusChange => "STATUS_CHANGE",
            Self::Updated => "UPDATED",
            Self::BranchCreated => "BRANCH_CREATED",
            Self::Committed => "COMMITTED",
            Self::OwnershipViolationWarn => "OWNERSHIP_VIOLATION_WARN",
            Self::Merged => "MERGED",
        }
    }
}

/// Ticket identifier of the form `T-####`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

impl TicketId {
    pub const PREFIX: &'static str = "T-";
    pub const MAX: u32 = 9999;

    /// Parse an identifier, requiring the exact `T-` + four digits shape.
    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        if is_ticket_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ParseEnumError {
                expected: "ticket id (T-####)",
                got: raw.to_string(),
            })
        }
    }

    /// Build the identifier for sequence number `n`, if it fits four digits.
    #[must_use]
    pub fn from_number(n: u32) -> Option<Self> {
        (1..=Self::MAX)
            .contains(&n)
            .then(|| Self(format!("{}{n:04}", Self::PREFIX)))
    }

    /// Numeric suffix of the identifier.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.0[Self::PREFIX.len()..].parse().unwrap_or_default()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether `raw` matches `^T-\d{4}$`.
#[must_use]
pub fn is_ticket_id(raw: &str) -> bool {
    raw.strip_prefix(TicketId::PREFIX)
        .is_some_and(|digits| digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()))
}

impl TryFrom<String> for TicketId {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TicketId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.trim())
    }
}

/// Accountable party for a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub role: AgentRole,
    pub agent: String,
}

impl Default for Owner {
    fn default() -> Self {
        Self {
            role: AgentRole::Leader,
            agent: AgentRole::Leader.canonical_name().to_string(),
        }
    }
}

/// Accumulated evidence of work on a ticket. Lists only grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default)]
    pub proposed_changes: Vec<String>,
    #[serde(default)]
    pub pr_links: Vec<String>,
    #[serde(default)]
    pub commits: Vec<String>,
}

/// Verification commands to run before a ticket is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGates {
    #[serde(default)]
    pub verify_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoke_test: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    pub verification: String,
}

/// Ordered implementation steps plus stated assumptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// Linkage of a ticket into the branch hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_branch: Option<String>,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
}

impl Default for GitLink {
    fn default() -> Self {
        Self {
            command_branch: None,
            ticket_branch: None,
            base_branch: default_base_branch(),
        }
    }
}

pub const DEFAULT_BASE_BRANCH: &str = "main";

fn default_base_branch() -> String {
    DEFAULT_BASE_BRANCH.to_string()
}

/// One audit entry. Entries are appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "at")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "by")]
    pub actor: String,
    pub action: LogAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LogEntry {
    /// Entry stamped with the current time.
    pub fn now(actor: impl Into<String>, action: LogAction) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
            from: None,
            to: None,
            note: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub const fn with_change(mut self, from: Status, to: Status) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// A unit of work tracked through the status lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TicketType,
    pub priority: Priority,
    pub status: Status,
    pub owner: Owner,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_ownership: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub artifacts: Artifacts,
    #[serde(default)]
    pub quality_gates: QualityGates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitLink>,
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl Ticket {
    /// Append an audit entry.
    pub fn record(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    #[must_use]
    pub fn last_log(&self) -> Option<&LogEntry> {
        self.log.last()
    }

    /// Command branch this ticket is linked to, if any.
    #[must_use]
    pub fn command_branch(&self) -> Option<&str> {
        self.git.as_ref()?.command_branch.as_deref()
    }

    /// Ticket branch recorded for this ticket, if any.
    #[must_use]
    pub fn ticket_branch(&self) -> Option<&str> {
        self.git.as_ref()?.ticket_branch.as_deref()
    }

    /// Whether `path` lies inside one of the declared ownership prefixes.
    #[must_use]
    pub fn owns_path(&self, path: &str) -> bool {
        self.file_ownership.iter().any(|owned| {
            path == owned
                || path
                    .strip_prefix(owned.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Error returned when a status transition is not an edge of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {from} → {to}. Allowed: {}", .from.allowed_list())]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
}

impl Status {
    /// Comma-separated list of allowed targets, for messages.
    #[must_use]
    pub fn allowed_list(self) -> String {
        self.allowed_targets()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl InvalidTransition {
    #[must_use]
    pub fn allowed_list(&self) -> String {
        self.from.allowed_list()
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_named<T: Copy>(
    all: &[T],
    name: impl Fn(T) -> &'static str,
    raw: &str,
    expected: &'static str,
) -> Result<T, ParseEnumError> {
    let normalized = raw.trim().replace('-', "_");
    all.iter()
        .copied()
        .find(|value| name(*value).eq_ignore_ascii_case(&normalized))
        .ok_or_else(|| ParseEnumError {
            expected,
            got: raw.to_string(),
        })
}

impl FromStr for TicketType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(&Self::ALL, Self::as_str, s, "type")
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(&Self::ALL, Self::as_str, s, "priority")
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(&Self::ALL, Self::as_str, s, "status")
    }
}

impl FromStr for AgentRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named(&Self::ALL, Self::as_str, s, "role")
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentRole, InvalidTransition, Priority, Status, Ticket, TicketId, TicketType};
    use std::str::FromStr;

    #[test]
    fn enum_json_names_match_record_format() {
        assert_eq!(serde_json::to_string(&TicketType::Docs).unwrap(), "\"docs\"");
        assert_eq!(serde_json::to_string(&Priority::P1).unwrap(), "\"P1\"");
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&AgentRole::Quality).unwrap(),
            "\"QUALITY\""
        );
        assert_eq!(
            serde_json::from_str::<Status>("\"BLOCKED\"").unwrap(),
            Status::Blocked
        );
    }

    #[test]
    fn display_matches_serde_names() {
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        for kind in TicketType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(Status::from_str("in_progress").unwrap(), Status::InProgress);
        assert_eq!(Status::from_str("in-progress").unwrap(), Status::InProgress);
        assert_eq!(Priority::from_str("p0").unwrap(), Priority::P0);
        assert_eq!(AgentRole::from_str(" quality ").unwrap(), AgentRole::Quality);
        assert!(Status::from_str("active").is_err());
        assert!(TicketType::from_str("epic").is_err());
    }

    #[test]
    fn review_to_done_is_allowed_backlog_to_done_is_not() {
        assert!(Status::Review.can_transition_to(Status::Done).is_ok());
        assert_eq!(
            Status::Backlog.can_transition_to(Status::Done),
            Err(InvalidTransition {
                from: Status::Backlog,
                to: Status::Done,
            })
        );
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in Status::ALL {
            assert!(status.can_transition_to(status).is_err(), "{status}");
        }
    }

    #[test]
    fn every_status_has_an_exit() {
        for status in Status::ALL {
            assert!(!status.allowed_targets().is_empty(), "{status}");
        }
    }

    #[test]
    fn invalid_transition_message_lists_allowed_targets() {
        let err = Status::Review.can_transition_to(Status::Backlog).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition: REVIEW → BACKLOG. Allowed: DONE, IN_PROGRESS, BLOCKED"
        );
    }

    #[test]
    fn ticket_id_shape() {
        assert!(TicketId::parse("T-0001").is_ok());
        assert!(TicketId::parse("T-001").is_err());
        assert!(TicketId::parse("T-00001").is_err());
        assert!(TicketId::parse("t-0001").is_err());
        assert!(TicketId::parse("T-00a1").is_err());
        assert_eq!(TicketId::from_number(42).unwrap().as_str(), "T-0042");
        assert_eq!(TicketId::parse("T-0420").unwrap().number(), 420);
        assert!(TicketId::from_number(0).is_none());
        assert!(TicketId::from_number(10_000).is_none());
    }

    #[test]
    fn ownership_is_exact_or_directory_prefix() {
        let ticket = Ticket {
            file_ownership: vec!["src/auth".into(), "README.md".into()],
            ..crate::model::schema::tests::minimal_ticket("T-0001")
        };
        assert!(ticket.owns_path("src/auth"));
        assert!(ticket.owns_path("src/auth/login.rs"));
        assert!(ticket.owns_path("README.md"));
        assert!(!ticket.owns_path("src/authz/mod.rs"));
        assert!(!ticket.owns_path("src/main.rs"));
    }
}
