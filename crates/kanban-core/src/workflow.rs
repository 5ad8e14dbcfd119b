//! Branch-per-ticket orchestration.
//!
//! [`Workflow`] ties the ticket store to the git gateway: it creates command
//! and ticket branches, commits on behalf of a ticket, and performs the two
//! guarded merges (ticket into command branch, command branch into trunk).
//! Every state change on a ticket is persisted with an audit log entry.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Workspace;
use crate::conflict::{ConflictSummary, summarize_conflict_risk};
use crate::error::{KanbanError, PendingTicket, Result};
use crate::model::ticket::{AgentRole, LogAction, LogEntry, Status, Ticket, TicketId};
use crate::policy::require_role;
use crate::store::{ListFilter, TicketStore};
use crate::vcs::{Git, ticket_branch_name, validate_command_branch};

/// Actor recorded for entries the workflow writes on its own behalf.
pub const SYSTEM_ACTOR: &str = "system";

/// Revision used for the ownership diff when a ticket has no command branch.
const FALLBACK_DIFF_BASE: &str = "HEAD~1";

/// Non-fatal anomaly attached to a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    SensitiveFileUnstaged { file: String },
    OwnershipViolation { files: Vec<String> },
    OwnershipCheckSkipped { detail: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensitiveFileUnstaged { file } => write!(f, "Unstaged sensitive file: {file}"),
            Self::OwnershipViolation { files } => {
                write!(f, "Changed files outside file_ownership: {}", files.join(", "))
            }
            Self::OwnershipCheckSkipped { detail } => {
                write!(f, "Ownership check skipped: {detail}")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub ticket: Ticket,
    pub branch: String,
    pub worktree: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub ticket: Ticket,
    pub sha: String,
    pub message: String,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub ticket_branch: String,
    pub command_branch: String,
    pub merge_base: String,
    #[serde(flatten)]
    pub summary: ConflictSummary,
    pub diff_stat: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketMergeReport {
    pub ticket: Ticket,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandMergeReport {
    pub command_branch: String,
    pub target: String,
    pub message: String,
    pub tickets: Vec<TicketId>,
}

/// Git-aware operations over one project.
pub struct Workflow<'a, S: TicketStore + ?Sized> {
    store: &'a S,
    git: Git,
    worktrees_dir: PathBuf,
    trunk: String,
}

impl<'a, S: TicketStore + ?Sized> Workflow<'a, S> {
    pub fn new(store: &'a S, git: Git, worktrees_dir: impl Into<PathBuf>, trunk: impl Into<String>) -> Self {
        Self {
            store,
            git,
            worktrees_dir: worktrees_dir.into(),
            trunk: trunk.into(),
        }
    }

    /// Workflow using the workspace's root, timeout, worktree dir and trunk.
    pub fn for_workspace(workspace: &Workspace, store: &'a S) -> Self {
        Self::new(
            store,
            workspace.git(),
            workspace.worktrees_dir(),
            workspace.config.git.trunk.clone(),
        )
    }

    #[must_use]
    pub fn worktree_path(&self, id: &TicketId) -> PathBuf {
        self.worktrees_dir.join(id.as_str())
    }

    /// Create and check out `feat/{slug}` from `base` (or the current HEAD).
    ///
    /// # Errors
    ///
    /// `InvalidSlug`, `AlreadyExists`, or `GitCommandFailed`.
    pub fn init_command(&self, slug: &str, base: Option<&str>) -> Result<String> {
        let branch = validate_command_branch(slug)?;
        self.git.create_branch(&branch, base)?;
        info!(branch = %branch, base = base.unwrap_or("HEAD"), "command branch created");
        Ok(branch)
    }

    /// Create the ticket branch `{command}--{id}` in its own worktree and
    /// link it on the ticket.
    ///
    /// # Errors
    ///
    /// `PreconditionFailed` if the command branch is missing, `NotFound` for an
    /// unknown ticket, `AlreadyExists` if the branch exists.
    pub fn create_ticket_branch(&self, id: &TicketId, command_branch: &str) -> Result<BranchReport> {
        if !self.git.branch_exists(command_branch) {
            return Err(KanbanError::PreconditionFailed(format!(
                "command branch \"{command_branch}\" does not exist; run init-command first"
            )));
        }
        let mut ticket = self.store.get(id)?;

        let branch = ticket_branch_name(command_branch, id);
        let worktree = self.worktree_path(id);
        self.git.create_worktree(&worktree, &branch, command_branch)?;

        let git = ticket.git.get_or_insert_with(Default::default);
        git.command_branch = Some(command_branch.to_string());
        git.ticket_branch = Some(branch.clone());
        ticket.record(
            LogEntry::now(SYSTEM_ACTOR, LogAction::BranchCreated).with_note(format!(
                "Branch: {branch}, Worktree: {}",
                worktree.display()
            )),
        );
        self.store.save(&ticket)?;
        info!(id = %id, branch = %branch, worktree = %worktree.display(), "ticket branch created");

        Ok(BranchReport {
            ticket,
            branch,
            worktree,
        })
    }

    /// Commit all pending changes as `{id}: {summary}`.
    ///
    /// Runs in `cwd` when given, else in the ticket's worktree if it exists,
    /// else at the project root.
    ///
    /// # Errors
    ///
    /// `NotFound`, `GitCommandFailed` (including nothing to commit), or a
    /// store failure.
    pub fn commit_ticket(&self, id: &TicketId, summary: &str, cwd: Option<&Path>) -> Result<CommitReport> {
        let mut ticket = self.store.get(id)?;
        let message = format!("{id}: {summary}");
        let git = self.git_for_commit(id, cwd);
        let mut warnings = Vec::new();

        let mut violations = Vec::new();
        if !ticket.file_ownership.is_empty() {
            let base = ticket.command_branch().unwrap_or(FALLBACK_DIFF_BASE).to_string();
            match git.changed_files(&base, "HEAD") {
                Ok(changed) => {
                    violations = changed.into_iter().filter(|f| !ticket.owns_path(f)).collect();
                }
                Err(err) => {
                    warnings.push(Warning::OwnershipCheckSkipped {
                        detail: err.to_string(),
                    });
                }
            }
        }

        let outcome = git.commit_all(&message)?;
        warnings.extend(
            outcome
                .unstaged_sensitive
                .iter()
                .map(|file| Warning::SensitiveFileUnstaged { file: file.clone() }),
        );

        ticket.artifacts.commits.push(outcome.sha.clone());
        ticket.record(
            LogEntry::now(SYSTEM_ACTOR, LogAction::Committed)
                .with_note(format!("{}: {message}", outcome.sha)),
        );
        if !violations.is_empty() {
            let warning = Warning::OwnershipViolation { files: violations };
            warn!(id = %id, "{warning}");
            ticket.record(
                LogEntry::now(SYSTEM_ACTOR, LogAction::OwnershipViolationWarn)
                    .with_note(warning.to_string()),
            );
            warnings.push(warning);
        }
        self.store.save(&ticket)?;
        info!(id = %id, sha = %outcome.sha, "ticket committed");

        Ok(CommitReport {
            ticket,
            sha: outcome.sha,
            message,
            warnings,
        })
    }

    fn git_for_commit(&self, id: &TicketId, cwd: Option<&Path>) -> Git {
        match cwd {
            Some(dir) => self.git.in_dir(dir),
            None => {
                let worktree = self.worktree_path(id);
                if worktree.is_dir() {
                    self.git.in_dir(worktree)
                } else {
                    self.git.clone()
                }
            }
        }
    }

    /// Estimate merge risk of `ticket_branch` into `command_branch`.
    ///
    /// # Errors
    ///
    /// `GitCommandFailed` if either branch is unknown.
    pub fn check_conflicts(&self, ticket_branch: &str, command_branch: &str) -> Result<ConflictReport> {
        let merge_base = self.git.merge_base(command_branch, ticket_branch)?;
        let ticket_files = self.git.changed_files(&merge_base, ticket_branch)?;
        let command_files = self.git.changed_files(&merge_base, command_branch)?;
        let summary = summarize_conflict_risk(&ticket_files, &command_files);
        let diff_stat = self.git.diff_stat(command_branch, ticket_branch)?;
        info!(ticket_branch, command_branch, risk = %summary.risk, "conflict check");

        Ok(ConflictReport {
            ticket_branch: ticket_branch.to_string(),
            command_branch: command_branch.to_string(),
            merge_base,
            summary,
            diff_stat,
        })
    }

    /// Squash-merge a reviewed ticket branch into its command branch.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `by` is quality, `PreconditionFailed` when the
    /// ticket is not in REVIEW/DONE or has no branch, `GitCommandFailed` on
    /// merge failure.
    pub fn merge_ticket(&self, id: &TicketId, command_branch: Option<&str>, by: &str) -> Result<TicketMergeReport> {
        require_role("merge_ticket", AgentRole::Quality, by)?;

        let mut ticket = self.store.get(id)?;
        if !ticket.status.is_mergeable() {
            return Err(KanbanError::PreconditionFailed(format!(
                "{id} is {}; only REVIEW or DONE tickets can be merged",
                ticket.status
            )));
        }
        let source = ticket
            .ticket_branch()
            .ok_or_else(|| {
                KanbanError::PreconditionFailed(format!("{id} has no ticket branch recorded"))
            })?
            .to_string();
        let target = command_branch
            .or_else(|| ticket.command_branch())
            .ok_or_else(|| {
                KanbanError::PreconditionFailed(format!(
                    "{id} has no command branch; pass one explicitly"
                ))
            })?
            .to_string();

        self.checkout_if_needed(&target)?;
        self.git
            .squash_merge(&source, &format!("{id}: {} (squash)", ticket.title))?;

        ticket.record(
            LogEntry::now(by, LogAction::Merged)
                .with_note(format!("Squash merged {source} into {target}")),
        );
        self.store.save(&ticket)?;
        info!(id = %id, source = %source, target = %target, "ticket merged");

        Ok(TicketMergeReport {
            ticket,
            source,
            target,
        })
    }

    /// Merge a finished command branch into `target` (trunk by default).
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `by` is leader, `UnfinishedTickets` listing every
    /// linked ticket that is not DONE, `GitCommandFailed` on merge failure.
    pub fn merge_command(
        &self,
        command_branch: &str,
        target: Option<&str>,
        message: Option<&str>,
        by: &str,
    ) -> Result<CommandMergeReport> {
        require_role("merge_command", AgentRole::Leader, by)?;

        let linked: Vec<Ticket> = self
            .store
            .list(&ListFilter::default())?
            .into_iter()
            .filter(|t| t.command_branch() == Some(command_branch))
            .collect();
        let pending: Vec<PendingTicket> = linked
            .iter()
            .filter(|t| t.status != Status::Done)
            .map(|t| PendingTicket {
                id: t.id.clone(),
                status: t.status,
            })
            .collect();
        if !pending.is_empty() {
            return Err(KanbanError::UnfinishedTickets {
                command_branch: command_branch.to_string(),
                pending,
            });
        }

        let target = target.unwrap_or(&self.trunk).to_string();
        let message = message.map_or_else(
            || format!("Merge {command_branch} into {target}"),
            ToString::to_string,
        );
        self.checkout_if_needed(&target)?;
        self.git.merge_no_ff(command_branch, &message)?;

        let tickets: Vec<TicketId> = linked.into_iter().map(|t| t.id).collect();
        info!(command_branch, target = %target, tickets = tickets.len(), by, "command branch merged");

        Ok(CommandMergeReport {
            command_branch: command_branch.to_string(),
            target,
            message,
            tickets,
        })
    }

    /// # Errors
    ///
    /// `GitCommandFailed` if the branch is unknown or the tree is dirty.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.git.checkout(branch)?;
        info!(branch, "checked out");
        Ok(())
    }

    fn checkout_if_needed(&self, branch: &str) -> Result<()> {
        if self.git.current_branch()? == branch {
            Ok(())
        } else {
            self.git.checkout(branch)
        }
    }
}
