//! Ticket lifecycle operations: creation, status transitions, field updates.
//!
//! Each operation loads the current record, applies one change, appends a log
//! entry, and persists through the [`TicketStore`].

use tracing::info;

use crate::error::{KanbanError, Result};
use crate::model::ticket::{LogAction, LogEntry, Owner, Plan, Priority, Status, Ticket, TicketId};
use crate::store::{TicketDraft, TicketStore};

/// Create a ticket, allocating the next free id when none is given.
///
/// # Errors
///
/// Propagates `AlreadyExists`, `Validation`, and id exhaustion from the store.
pub fn create_ticket<S: TicketStore + ?Sized>(
    store: &S,
    id: Option<TicketId>,
    draft: TicketDraft,
) -> Result<Ticket> {
    let id = match id {
        Some(id) => id,
        None => store.next_id()?,
    };
    store.create(id, draft)
}

/// Move a ticket to `to` along a lifecycle edge.
///
/// # Errors
///
/// `NotFound`, `InvalidTransition` (naming the allowed targets), or a store
/// failure. The record is untouched on error.
pub fn transition<S: TicketStore + ?Sized>(
    store: &S,
    id: &TicketId,
    to: Status,
    by: &str,
    note: Option<&str>,
) -> Result<Ticket> {
    let mut ticket = store.get(id)?;
    let from = ticket.status;
    from.can_transition_to(to)?;

    ticket.status = to;
    let note = note.map_or_else(|| format!("{from} → {to}"), ToString::to_string);
    ticket.record(
        LogEntry::now(by, LogAction::StatusChange)
            .with_change(from, to)
            .with_note(note),
    );
    store.save(&ticket)?;
    info!(id = %id, %from, %to, by, "status changed");
    Ok(ticket)
}

/// Field changes applied by [`update_ticket`]. `None`/empty means "leave as is".
///
/// Artifact lists are appended to, never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub owner: Option<Owner>,
    pub assignees: Option<Vec<String>>,
    pub file_ownership: Option<Vec<String>>,
    pub acceptance_criteria: Option<Vec<String>>,
    pub verify_commands: Option<Vec<String>>,
    pub smoke_test: Option<String>,
    pub plan: Option<Plan>,
    pub command_branch: Option<String>,
    pub ticket_branch: Option<String>,
    pub base_branch: Option<String>,
    pub proposed_changes: Vec<String>,
    pub pr_links: Vec<String>,
}

fn set<T>(slot: &mut T, value: Option<T>, name: &'static str, changed: &mut Vec<&'static str>) {
    if let Some(value) = value {
        *slot = value;
        changed.push(name);
    }
}

fn append_new(list: &mut Vec<String>, values: Vec<String>) -> bool {
    let before = list.len();
    for value in values {
        if !list.contains(&value) {
            list.push(value);
        }
    }
    list.len() != before
}

impl TicketPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to `ticket`, returning the dotted names of the fields touched.
    fn apply(self, ticket: &mut Ticket) -> Vec<&'static str> {
        let mut changed = Vec::new();
        set(&mut ticket.title, self.title, "title", &mut changed);
        set(&mut ticket.description, self.description, "description", &mut changed);
        set(&mut ticket.priority, self.priority, "priority", &mut changed);
        set(&mut ticket.owner, self.owner, "owner", &mut changed);
        set(&mut ticket.assignees, self.assignees, "assignees", &mut changed);
        set(&mut ticket.file_ownership, self.file_ownership, "file_ownership", &mut changed);
        set(
            &mut ticket.acceptance_criteria,
            self.acceptance_criteria,
            "acceptance_criteria",
            &mut changed,
        );
        set(
            &mut ticket.quality_gates.verify_commands,
            self.verify_commands,
            "quality_gates.verify_commands",
            &mut changed,
        );
        if let Some(smoke) = self.smoke_test {
            ticket.quality_gates.smoke_test = Some(smoke);
            changed.push("quality_gates.smoke_test");
        }
        if let Some(plan) = self.plan {
            ticket.plan = Some(plan);
            changed.push("plan");
        }

        if self.command_branch.is_some() || self.ticket_branch.is_some() || self.base_branch.is_some() {
            let git = ticket.git.get_or_insert_with(Default::default);
            if let Some(branch) = self.command_branch {
                git.command_branch = Some(branch);
                changed.push("git.command_branch");
            }
            if let Some(branch) = self.ticket_branch {
                git.ticket_branch = Some(branch);
                changed.push("git.ticket_branch");
            }
            set(&mut git.base_branch, self.base_branch, "git.base_branch", &mut changed);
        }

        if append_new(&mut ticket.artifacts.proposed_changes, self.proposed_changes) {
            changed.push("artifacts.proposed_changes");
        }
        if append_new(&mut ticket.artifacts.pr_links, self.pr_links) {
            changed.push("artifacts.pr_links");
        }
        changed
    }
}

/// Apply a field patch and log one `UPDATED` entry.
///
/// Status and id are never affected; use [`transition`] for status.
///
/// # Errors
///
/// `Validation` for an empty patch or a result that breaks the schema,
/// `NotFound` for an unknown id.
pub fn update_ticket<S: TicketStore + ?Sized>(
    store: &S,
    id: &TicketId,
    patch: TicketPatch,
    by: &str,
    note: Option<&str>,
) -> Result<Ticket> {
    if patch.is_empty() {
        return Err(KanbanError::invalid_field("", "update needs at least one field"));
    }
    let mut ticket = store.get(id)?;
    let changed = patch.apply(&mut ticket);

    let note = note.map_or_else(
        || format!("Fields updated: {}", changed.join(", ")),
        ToString::to_string,
    );
    ticket.record(LogEntry::now(by, LogAction::Updated).with_note(note));
    store.save(&ticket)?;
    info!(id = %id, fields = ?changed, by, "ticket updated");
    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::{TicketPatch, create_ticket, transition, update_ticket};
    use crate::error::KanbanError;
    use crate::model::ticket::{LogAction, Priority, Status, TicketId, TicketType};
    use crate::store::{FileStore, TicketDraft, TicketStore};
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore, TicketId) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let ticket = create_ticket(
            &store,
            None,
            TicketDraft::new("Add login", TicketType::Feature, Priority::P1),
        )
        .unwrap();
        (dir, store, ticket.id)
    }

    #[test]
    fn create_allocates_sequential_ids() {
        let (_dir, store, first) = setup();
        assert_eq!(first.as_str(), "T-0001");
        let second = create_ticket(
            &store,
            None,
            TicketDraft::new("Logout", TicketType::Feature, Priority::P2),
        )
        .unwrap();
        assert_eq!(second.id.as_str(), "T-0002");
    }

    #[test]
    fn transition_logs_from_and_to_with_default_note() {
        let (_dir, store, id) = setup();
        let ticket = transition(&store, &id, Status::Ready, "leader", None).unwrap();
        assert_eq!(ticket.status, Status::Ready);

        let entry = ticket.last_log().unwrap();
        assert_eq!(entry.action, LogAction::StatusChange);
        assert_eq!(entry.from, Some(Status::Backlog));
        assert_eq!(entry.to, Some(Status::Ready));
        assert_eq!(entry.note.as_deref(), Some("BACKLOG → READY"));
        assert_eq!(store.get(&id).unwrap(), ticket);
    }

    #[test]
    fn rejected_transition_leaves_record_untouched() {
        let (_dir, store, id) = setup();
        let before = store.get(&id).unwrap();
        let err = transition(&store, &id, Status::Done, "leader", None).unwrap_err();
        assert!(matches!(err, KanbanError::InvalidTransition(_)));
        assert!(err.to_string().contains("Allowed: READY, BLOCKED"));
        assert_eq!(store.get(&id).unwrap(), before);
    }

    #[test]
    fn update_appends_one_entry_and_keeps_status() {
        let (_dir, store, id) = setup();
        let patch = TicketPatch {
            title: Some("Add login form".into()),
            file_ownership: Some(vec!["src/auth".into()]),
            proposed_changes: vec!["new form component".into()],
            ..TicketPatch::default()
        };
        let ticket = update_ticket(&store, &id, patch, "leader", None).unwrap();
        assert_eq!(ticket.status, Status::Backlog);
        assert_eq!(ticket.log.len(), 2);
        assert_eq!(
            ticket.last_log().unwrap().note.as_deref(),
            Some("Fields updated: title, file_ownership, artifacts.proposed_changes")
        );
    }

    #[test]
    fn artifacts_only_grow() {
        let (_dir, store, id) = setup();
        let patch = || TicketPatch {
            pr_links: vec!["https://example.test/pr/1".into()],
            ..TicketPatch::default()
        };
        update_ticket(&store, &id, patch(), "leader", None).unwrap();
        let ticket = update_ticket(&store, &id, patch(), "leader", Some("again")).unwrap();
        assert_eq!(ticket.artifacts.pr_links.len(), 1);
        assert_eq!(ticket.last_log().unwrap().note.as_deref(), Some("again"));
    }

    #[test]
    fn empty_patch_is_rejected() {
        let (_dir, store, id) = setup();
        let err = update_ticket(&store, &id, TicketPatch::default(), "leader", None).unwrap_err();
        assert!(matches!(err, KanbanError::Validation { .. }));
        assert_eq!(store.get(&id).unwrap().log.len(), 1);
    }
}
