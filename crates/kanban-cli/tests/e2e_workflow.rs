//! End-to-end `kb` runs against a temporary git repository.
//!
//! Each test drives the binary as a subprocess with `KANBAN_ROOT` pinned to
//! its own repo and an empty user config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
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

struct Repo {
    dir: TempDir,
    config_home: TempDir,
}

impl Repo {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        git(root, &["init", "-q"]);
        git(root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(root, &["config", "user.name", "Kanban Test"]);
        git(root, &["config", "user.email", "kanban@example.test"]);
        git(root, &["config", "commit.gpgsign", "false"]);
        fs::write(root.join("README.md"), "# demo\n").unwrap();
        fs::write(root.join(".gitignore"), ".kanban/\ntickets/\n").unwrap();
        git(root, &["add", "-A"]);
        git(root, &["commit", "-q", "-m", "initial"]);
        Self {
            dir,
            config_home: TempDir::new().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn kb(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("kb"));
        cmd.current_dir(self.root())
            .env("KANBAN_ROOT", self.root())
            .env("KANBAN_LOG", "off")
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env_remove("KANBAN_AGENT")
            .env_remove("AGENT")
            .env_remove("USER")
            .env_remove("FORMAT");
        cmd
    }

    /// Run with `--json`, assert success, parse stdout.
    fn json(&self, args: &[&str]) -> Value {
        let output = self.kb().arg("--json").args(args).output().unwrap();
        assert!(
            output.status.success(),
            "kb {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Run with `--json`, assert failure, parse the stderr error object.
    fn json_error(&self, args: &[&str]) -> Value {
        let output = self.kb().arg("--json").args(args).output().unwrap();
        assert!(!output.status.success(), "kb {args:?} unexpectedly succeeded");
        let parsed: Value = serde_json::from_slice(&output.stderr).unwrap();
        parsed["error"].clone()
    }

    fn worktree(&self, id: &str) -> PathBuf {
        self.root().join(".kanban/worktrees").join(id)
    }
}

#[test]
fn ticket_goes_from_backlog_to_trunk() {
    let repo = Repo::new();

    let branch = repo.json(&["git", "init-command", "login"]);
    assert_eq!(branch["branch"], "feat/login");

    let created = repo.json(&[
        "create", "--title", "Add login form", "--type", "feature", "-p", "P1", "--owns", "src/",
    ]);
    assert_eq!(created["id"], "T-0001");
    assert_eq!(created["status"], "BACKLOG");
    assert_eq!(created["log"][0]["action"], "CREATED");

    for status in ["READY", "IN_PROGRESS"] {
        let moved = repo.json(&["--agent", "worker-1", "transition", "T-0001", status]);
        assert_eq!(moved["status"], status);
    }

    let branched = repo.json(&["git", "branch", "T-0001", "--command-branch", "feat/login"]);
    assert_eq!(branched["branch"], "feat/login--T-0001");
    assert_eq!(branched["ticket"]["git"]["ticket_branch"], "feat/login--T-0001");

    let worktree = repo.worktree("T-0001");
    fs::create_dir_all(worktree.join("src")).unwrap();
    fs::write(worktree.join("src/login.rs"), "pub fn login() {}\n").unwrap();
    let commit = repo.json(&["git", "commit", "T-0001", "-m", "add login form"]);
    assert_eq!(commit["message"], "T-0001: add login form");
    assert_eq!(commit["warnings"].as_array().map(Vec::len), Some(0));

    repo.json(&["--agent", "worker-1", "transition", "T-0001", "REVIEW"]);
    let merged = repo.json(&["--agent", "quality", "git", "merge-ticket", "T-0001"]);
    assert_eq!(merged["target"], "feat/login");

    repo.json(&["--agent", "quality", "transition", "T-0001", "DONE"]);
    let done = repo.json(&["--agent", "leader", "git", "merge-command", "feat/login"]);
    assert_eq!(done["target"], "main");
    assert_eq!(done["tickets"][0], "T-0001");

    assert_eq!(git(repo.root(), &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
    assert_eq!(
        git(repo.root(), &["show", "main:src/login.rs"]),
        "pub fn login() {}"
    );

    let shown = repo.json(&["show", "T-0001"]);
    let actions: Vec<&str> = shown["log"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"BRANCH_CREATED"));
    assert!(actions.contains(&"COMMITTED"));
    assert!(actions.contains(&"MERGED"));
}

#[test]
fn invalid_transition_reports_code_and_allowed_targets() {
    let repo = Repo::new();
    repo.json(&["create", "--title", "Write docs", "--type", "docs"]);

    let error = repo.json_error(&["--agent", "w", "transition", "T-0001", "DONE"]);
    assert_eq!(error["error_code"], "E2003");
    assert_eq!(error["kind"], "invalid_transition");
    assert!(error["suggestion"].as_str().unwrap().contains("READY"));

    let shown = repo.json(&["show", "T-0001"]);
    assert_eq!(shown["status"], "BACKLOG");
    assert_eq!(shown["log"].as_array().map(Vec::len), Some(1));
}

#[test]
fn transition_without_identity_is_refused() {
    let repo = Repo::new();
    repo.json(&["create", "--title", "Fix crash", "--type", "bug"]);

    let error = repo.json_error(&["transition", "T-0001", "READY"]);
    assert_eq!(error["error_code"], "E1002");
}

#[test]
fn merge_ticket_by_worker_is_unauthorized() {
    let repo = Repo::new();
    repo.json(&["create", "--title", "Fix crash", "--type", "bug"]);

    let error = repo.json_error(&["--agent", "worker-1", "git", "merge-ticket", "T-0001"]);
    assert_eq!(error["error_code"], "E2005");
    assert!(error["message"].as_str().unwrap().contains("quality"));
}

#[test]
fn list_filters_and_text_output() {
    let repo = Repo::new();
    repo.json(&["create", "--title", "First", "--assignee", "ana"]);
    repo.json(&["create", "--title", "Second", "--status", "READY", "-p", "P0"]);

    let ready = repo.json(&["list", "--status", "READY"]);
    assert_eq!(ready.as_array().map(Vec::len), Some(1));
    assert_eq!(ready[0]["id"], "T-0002");

    let mine = repo.json(&["list", "--assignee", "ana"]);
    assert_eq!(mine[0]["title"], "First");

    repo.kb()
        .args(["--format", "text", "list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ID  STATUS  PRIORITY  TYPE  TITLE\n"))
        .stdout(predicate::str::contains("T-0002  READY  P0  feature  Second"));

    let next = repo.json(&["next-id"]);
    assert_eq!(next["id"], "T-0003");
}

#[test]
fn plan_and_branch_flags_round_trip_through_update() {
    let repo = Repo::new();
    let created = repo.json(&[
        "create", "--title", "Add login", "--assignee", "ana", "--owns", "src/",
        "--plan-step", "Add form::cargo test", "--assumption", "auth exists",
        "--ticket-branch", "feat/login--T-0001",
    ]);
    assert_eq!(created["plan"]["steps"][0]["description"], "Add form");
    assert_eq!(created["plan"]["steps"][0]["verification"], "cargo test");
    assert_eq!(created["plan"]["assumptions"][0], "auth exists");
    assert_eq!(created["git"]["ticket_branch"], "feat/login--T-0001");

    let updated = repo.json(&[
        "--agent", "w", "update", "T-0001", "--plan-step", "Wire route::curl /login",
        "--ticket-branch", "feat/login--T-0001b", "--clear-assignees", "--clear-owns",
    ]);
    assert_eq!(updated["plan"]["steps"].as_array().map(Vec::len), Some(1));
    assert_eq!(updated["plan"]["steps"][0]["description"], "Wire route");
    assert_eq!(updated["plan"]["assumptions"][0], "auth exists");
    assert_eq!(updated["git"]["ticket_branch"], "feat/login--T-0001b");
    assert_eq!(updated["assignees"].as_array().map(Vec::len), Some(0));
    assert_eq!(updated["file_ownership"].as_array().map(Vec::len), Some(0));
}

#[test]
fn validate_fails_on_a_broken_file() {
    let repo = Repo::new();
    repo.json(&["create", "--title", "Good one"]);
    fs::write(repo.root().join("tickets/T-0002.yml"), "id: T-0002\nstatus: [\n").unwrap();

    let output = repo.kb().args(["--json", "validate"]).output().unwrap();
    assert!(!output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], 1);
    assert_eq!(report["invalid"], 1);
    assert_eq!(report["files"][1]["file"], "T-0002.yml");
}
