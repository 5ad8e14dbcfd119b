use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::command::run_with_timeout;
use super::sensitive::is_sensitive_path;
use crate::error::{KanbanError, Result};

/// Handle on the `git` binary, bound to one working directory.
///
/// Every call blocks until git exits or the timeout kills it. Paths in git
/// output are printed verbatim (`core.quotePath=false`) so they can be passed
/// back to git unchanged.
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
    timeout: Duration,
}

/// Result of [`Git::commit_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// Abbreviated hash of the new commit.
    pub sha: String,
    /// Sensitive paths that were unstaged before committing.
    pub unstaged_sensitive: Vec<String>,
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl Git {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same settings, different working directory (e.g. a worktree).
    #[must_use]
    pub fn in_dir(&self, cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            timeout: self.timeout,
        }
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Run `git {args}` and return its trimmed stdout.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed` on spawn failure, non-zero exit, or timeout.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let label = args.first().copied().unwrap_or_default().to_string();
        debug!(cwd = %self.cwd.display(), ?args, "git");

        let finished = run_with_timeout(
            Command::new("git")
                .args(["-c", "core.quotePath=false"])
                .args(args)
                .current_dir(&self.cwd),
            self.timeout,
        )
        .map_err(|err| KanbanError::GitCommandFailed {
            command: label.clone(),
            detail: format!("could not spawn git: {err}"),
        })?;

        if finished.timed_out {
            return Err(KanbanError::GitCommandFailed {
                command: label,
                detail: format!("timed out after {}s", self.timeout.as_secs_f32()),
            });
        }
        if !finished.status.success() {
            let stderr = finished.stderr.trim();
            let detail = if stderr.is_empty() {
                finished.stdout.trim().to_string()
            } else {
                stderr.to_string()
            };
            return Err(KanbanError::GitCommandFailed {
                command: args.join(" "),
                detail,
            });
        }
        Ok(finished.stdout.trim().to_string())
    }

    /// # Errors
    ///
    /// `GitCommandFailed` outside a repository or on a detached failure.
    pub fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Whether `name` resolves to a revision. Any failure counts as absent.
    #[must_use]
    pub fn branch_exists(&self, name: &str) -> bool {
        self.run(&["rev-parse", "--verify", "--quiet", name]).is_ok()
    }

    /// Paths that differ between two revisions.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed` if either revision is unknown.
    pub fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>> {
        self.run(&["diff", "--name-only", base, head])
            .map(|out| lines(&out))
    }

    /// # Errors
    ///
    /// `GitCommandFailed` if either revision is unknown.
    pub fn diff_stat(&self, base: &str, head: &str) -> Result<String> {
        self.run(&["diff", "--stat", base, head])
    }

    /// # Errors
    ///
    /// `GitCommandFailed` if the revisions share no history.
    pub fn merge_base(&self, left: &str, right: &str) -> Result<String> {
        self.run(&["merge-base", left, right])
    }

    /// Create `name` from `base` (or `HEAD`) and check it out.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the branch is present, `GitCommandFailed` otherwise.
    pub fn create_branch(&self, name: &str, base: Option<&str>) -> Result<()> {
        self.ensure_absent(name)?;
        let mut args = vec!["checkout", "-b", name];
        args.extend(base);
        self.run(&args).map(drop)
    }

    /// Add a worktree at `path` on a new branch `branch` starting at `base`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the branch is present, `GitCommandFailed` otherwise.
    pub fn create_worktree(&self, path: &Path, branch: &str, base: &str) -> Result<()> {
        self.ensure_absent(branch)?;
        let path = path.to_string_lossy();
        self.run(&["worktree", "add", "-b", branch, path.as_ref(), base])
            .map(drop)
    }

    fn ensure_absent(&self, branch: &str) -> Result<()> {
        if self.branch_exists(branch) {
            Err(KanbanError::AlreadyExists {
                what: format!("branch \"{branch}\""),
            })
        } else {
            Ok(())
        }
    }

    /// Stage everything, drop sensitive paths from the index, and commit.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed`, including when nothing is left to commit.
    pub fn commit_all(&self, message: &str) -> Result<CommitOutcome> {
        self.run(&["add", "-A"])?;

        let staged = lines(&self.run(&["diff", "--cached", "--name-only"])?);
        let mut unstaged_sensitive = Vec::new();
        for file in staged.into_iter().filter(|f| is_sensitive_path(f)) {
            self.run(&["reset", "HEAD", "--", &file])?;
            warn!(file = %file, "unstaged sensitive file");
            unstaged_sensitive.push(file);
        }

        self.run(&["commit", "-m", message])?;
        let sha = self.run(&["rev-parse", "--short", "HEAD"])?;
        Ok(CommitOutcome {
            sha,
            unstaged_sensitive,
        })
    }

    /// Squash `source` into the current branch as a single commit.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed` on conflicts or an empty squash.
    pub fn squash_merge(&self, source: &str, message: &str) -> Result<()> {
        self.run(&["merge", "--squash", source])?;
        self.run(&["commit", "-m", message]).map(drop)
    }

    /// Merge `source` with an explicit merge commit.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed` on conflicts.
    pub fn merge_no_ff(&self, source: &str, message: &str) -> Result<()> {
        self.run(&["merge", "--no-ff", source, "-m", message])
            .map(drop)
    }

    /// # Errors
    ///
    /// `GitCommandFailed` if the branch is unknown or the tree is dirty.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch]).map(drop)
    }

    /// Repository root containing the working directory.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed` outside a repository.
    pub fn toplevel(&self) -> Result<PathBuf> {
        self.run(&["rev-parse", "--show-toplevel"]).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::{Git, lines};
    use crate::error::KanbanError;
    use std::time::Duration;

    #[test]
    fn lines_skips_blanks() {
        assert_eq!(lines("a.rs\n\n b.rs \n"), vec!["a.rs", "b.rs"]);
        assert!(lines("").is_empty());
    }

    #[test]
    fn failures_outside_a_repo_are_git_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let git = Git::new(dir.path()).with_timeout(Duration::from_secs(5));
        let err = git.current_branch().unwrap_err();
        assert!(matches!(err, KanbanError::GitCommandFailed { .. }));
        assert!(!git.branch_exists("main"));
    }

    fn init_repo(dir: &std::path::Path) -> Git {
        let git = Git::new(dir).with_timeout(Duration::from_secs(10));
        git.run(&["init", "-q"]).unwrap();
        git.run(&["config", "user.name", "Kanban Test"]).unwrap();
        git.run(&["config", "user.email", "kanban@example.test"]).unwrap();
        git.run(&["config", "commit.gpgsign", "false"]).unwrap();
        git
    }

    #[test]
    fn commit_all_handles_non_ascii_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let git = init_repo(dir.path());
        std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        git.commit_all("initial").unwrap();
        std::fs::write(dir.path().join("café.txt"), "menu\n").unwrap();
        std::fs::write(dir.path().join("clé.pem"), "key\n").unwrap();

        let outcome = git.commit_all("add files").unwrap();
        assert_eq!(outcome.unstaged_sensitive, vec!["clé.pem"]);

        let committed = lines(&git.run(&["ls-tree", "--name-only", "HEAD"]).unwrap());
        assert_eq!(committed, vec!["README.md", "café.txt"]);
    }
}
