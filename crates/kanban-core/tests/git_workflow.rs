//! Branch-per-ticket workflow against real temporary git repositories.

use kanban_core::KanbanError;
use kanban_core::conflict::ConflictRisk;
use kanban_core::lifecycle::{TicketPatch, create_ticket, transition, update_ticket};
use kanban_core::model::{LogAction, Priority, Status, TicketId, TicketType};
use kanban_core::store::{FileStore, TicketDraft, TicketStore};
use kanban_core::vcs::Git;
use kanban_core::workflow::{Warning, Workflow};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

struct Project {
    _repo: TempDir,
    _tickets: TempDir,
    root: std::path::PathBuf,
    store: FileStore,
}

impl Project {
    fn new() -> Self {
        let repo = TempDir::new().unwrap();
        let root = repo.path().to_path_buf();
        git(&root, &["init", "-q"]);
        git(&root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&root, &["config", "user.name", "Kanban Test"]);
        git(&root, &["config", "user.email", "kanban@example.test"]);
        git(&root, &["config", "commit.gpgsign", "false"]);
        fs::write(root.join("README.md"), "# demo\n").unwrap();
        fs::write(root.join(".gitignore"), ".kanban/\n").unwrap();
        git(&root, &["add", "-A"]);
        git(&root, &["commit", "-q", "-m", "initial"]);

        let tickets = TempDir::new().unwrap();
        let store = FileStore::open(tickets.path()).unwrap();
        Self {
            _repo: repo,
            _tickets: tickets,
            root,
            store,
        }
    }

    fn workflow(&self) -> Workflow<'_, FileStore> {
        let git = Git::new(&self.root).with_timeout(Duration::from_secs(20));
        Workflow::new(&self.store, git, self.root.join(".kanban/worktrees"), "main")
    }

    fn ticket(&self, title: &str, ownership: &[&str]) -> TicketId {
        let mut draft = TicketDraft::new(title, TicketType::Feature, Priority::P1);
        draft.file_ownership = ownership.iter().map(|s| (*s).to_string()).collect();
        create_ticket(&self.store, None, draft).unwrap().id
    }

    fn advance(&self, id: &TicketId, path: &[Status]) {
        for status in path {
            transition(&self.store, id, *status, "worker", None).unwrap();
        }
    }
}

#[test]
fn full_ticket_lifecycle_reaches_trunk() {
    let project = Project::new();
    let flow = project.workflow();

    let command = flow.init_command("add-auth", None).unwrap();
    assert_eq!(command, "feat/add-auth");
    assert_eq!(git(&project.root, &["rev-parse", "--abbrev-ref", "HEAD"]), command);

    let id = project.ticket("Add login form", &["src/auth"]);
    let branch = flow.create_ticket_branch(&id, &command).unwrap();
    assert_eq!(branch.branch, "feat/add-auth--T-0001");
    assert!(branch.worktree.join("README.md").exists());
    assert_eq!(branch.ticket.ticket_branch(), Some("feat/add-auth--T-0001"));
    assert_eq!(branch.ticket.last_log().unwrap().action, LogAction::BranchCreated);

    fs::create_dir_all(branch.worktree.join("src/auth")).unwrap();
    fs::write(branch.worktree.join("src/auth/login.rs"), "pub fn login() {}\n").unwrap();
    fs::write(branch.worktree.join(".env"), "TOKEN=hunter2\n").unwrap();

    let commit = flow.commit_ticket(&id, "add login form", None).unwrap();
    assert_eq!(commit.message, "T-0001: add login form");
    assert!(commit
        .warnings
        .contains(&Warning::SensitiveFileUnstaged { file: ".env".into() }));
    assert_eq!(commit.ticket.artifacts.commits, vec![commit.sha.clone()]);
    let tracked = git(&branch.worktree, &["ls-files"]);
    assert!(tracked.contains("src/auth/login.rs"));
    assert!(!tracked.contains(".env"));
    assert_eq!(
        git(&branch.worktree, &["log", "-1", "--format=%s"]),
        "T-0001: add login form"
    );

    let report = flow.check_conflicts(&branch.branch, &command).unwrap();
    assert_eq!(report.summary.risk, ConflictRisk::Low);
    assert_eq!(report.summary.ticket_files, vec!["src/auth/login.rs"]);
    assert!(report.diff_stat.contains("src/auth/login.rs"));

    project.advance(&id, &[Status::Ready, Status::InProgress, Status::Review]);

    let err = flow.merge_ticket(&id, None, "worker").unwrap_err();
    assert!(matches!(err, KanbanError::Unauthorized { .. }));

    let merged = flow.merge_ticket(&id, None, "Quality").unwrap();
    assert_eq!(merged.target, command);
    assert_eq!(merged.ticket.last_log().unwrap().action, LogAction::Merged);
    assert_eq!(
        git(&project.root, &["log", "-1", "--format=%s", &command]),
        "T-0001: Add login form (squash)"
    );

    let err = flow.merge_command(&command, None, None, "leader").unwrap_err();
    match err {
        KanbanError::UnfinishedTickets { pending, .. } => {
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].status, Status::Review);
        }
        other => panic!("unexpected error: {other}"),
    }

    project.advance(&id, &[Status::Done]);
    let done = flow.merge_command(&command, None, None, "leader").unwrap();
    assert_eq!(done.target, "main");
    assert_eq!(done.tickets, vec![id]);
    assert_eq!(git(&project.root, &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
    assert_eq!(
        git(&project.root, &["log", "-1", "--format=%s"]),
        "Merge feat/add-auth into main"
    );
    assert!(project.root.join("src/auth/login.rs").exists());
}

#[test]
fn ticket_branch_requires_existing_command_branch_and_is_not_recreated() {
    let project = Project::new();
    let flow = project.workflow();
    let id = project.ticket("Add search", &[]);

    let err = flow.create_ticket_branch(&id, "feat/missing").unwrap_err();
    assert!(matches!(err, KanbanError::PreconditionFailed(_)));

    let command = flow.init_command("search", Some("main")).unwrap();
    flow.create_ticket_branch(&id, &command).unwrap();
    let err = flow.create_ticket_branch(&id, &command).unwrap_err();
    assert!(matches!(err, KanbanError::AlreadyExists { .. }));

    let err = flow.init_command("search", None).unwrap_err();
    assert!(matches!(err, KanbanError::AlreadyExists { .. }));
    let err = flow.init_command("Bad Slug", None).unwrap_err();
    assert!(matches!(err, KanbanError::InvalidSlug { .. }));
}

#[test]
fn ownership_drift_is_warned_and_logged() {
    let project = Project::new();
    let flow = project.workflow();
    let command = flow.init_command("docs", None).unwrap();
    let id = project.ticket("Document API", &["docs"]);
    let branch = flow.create_ticket_branch(&id, &command).unwrap();

    fs::create_dir_all(branch.worktree.join("docs")).unwrap();
    fs::write(branch.worktree.join("docs/api.md"), "# API\n").unwrap();
    flow.commit_ticket(&id, "api docs", Some(&branch.worktree)).unwrap();

    fs::write(branch.worktree.join("Cargo.toml"), "[package]\n").unwrap();
    fs::write(branch.worktree.join("docs/more.md"), "more\n").unwrap();
    let second = flow.commit_ticket(&id, "more docs", Some(&branch.worktree)).unwrap();
    assert!(second.warnings.is_empty());

    fs::write(branch.worktree.join("docs/final.md"), "final\n").unwrap();
    let third = flow.commit_ticket(&id, "final docs", None).unwrap();
    assert_eq!(
        third.warnings,
        vec![Warning::OwnershipViolation {
            files: vec!["Cargo.toml".into()]
        }]
    );
    let log = &third.ticket.log;
    assert_eq!(log[log.len() - 2].action, LogAction::Committed);
    assert_eq!(log[log.len() - 1].action, LogAction::OwnershipViolationWarn);
    assert_eq!(
        log[log.len() - 1].note.as_deref(),
        Some("Changed files outside file_ownership: Cargo.toml")
    );
    assert_eq!(third.ticket.artifacts.commits.len(), 3);
}

#[test]
fn overlapping_edits_are_high_risk() {
    let project = Project::new();
    let flow = project.workflow();
    let command = flow.init_command("readme", None).unwrap();
    let id = project.ticket("Polish readme", &[]);
    let branch = flow.create_ticket_branch(&id, &command).unwrap();

    fs::write(branch.worktree.join("README.md"), "# demo\n\nticket\n").unwrap();
    flow.commit_ticket(&id, "readme", None).unwrap();

    fs::write(project.root.join("README.md"), "# demo\n\ncommand\n").unwrap();
    git(&project.root, &["commit", "-q", "-am", "command edit"]);

    let report = flow.check_conflicts(&branch.branch, &command).unwrap();
    assert_eq!(report.summary.risk, ConflictRisk::High);
    assert_eq!(report.summary.overlapping_files, vec!["README.md"]);
    assert_eq!(report.summary.reasons, vec!["Overlapping changed files detected (1)"]);
}

#[test]
fn merge_ticket_needs_review_and_a_branch() {
    let project = Project::new();
    let flow = project.workflow();
    let id = project.ticket("Unbranched", &[]);

    let err = flow.merge_ticket(&id, Some("main"), "quality").unwrap_err();
    assert!(matches!(err, KanbanError::PreconditionFailed(_)));

    project.advance(&id, &[Status::Ready, Status::InProgress, Status::Review]);
    let err = flow.merge_ticket(&id, Some("main"), "quality").unwrap_err();
    assert!(err.to_string().contains("no ticket branch"));

    update_ticket(
        &project.store,
        &id,
        TicketPatch {
            ticket_branch: Some("feat/ghost--T-0001".into()),
            ..TicketPatch::default()
        },
        "leader",
        None,
    )
    .unwrap();
    let err = flow.merge_ticket(&id, Some("main"), "quality").unwrap_err();
    assert!(matches!(err, KanbanError::GitCommandFailed { .. }));
    let ticket = project.store.get(&id).unwrap();
    assert_ne!(ticket.last_log().unwrap().action, LogAction::Merged);
}

#[test]
fn merge_command_is_leader_only() {
    let project = Project::new();
    let flow = project.workflow();
    let command = flow.init_command("guarded", None).unwrap();
    let err = flow.merge_command(&command, None, None, "quality").unwrap_err();
    assert!(matches!(err, KanbanError::Unauthorized { .. }));

    let report = flow
        .merge_command(&command, Some("main"), Some("Ship it"), " LEADER ")
        .unwrap();
    assert!(report.tickets.is_empty());
    assert_eq!(report.message, "Ship it");
}
