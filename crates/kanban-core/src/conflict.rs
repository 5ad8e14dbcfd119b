//! Merge conflict risk heuristic over two changed-file sets.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Either side reaching this many files is a medium risk on its own.
pub const LARGE_CHANGE_THRESHOLD: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictRisk {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConflictRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictSummary {
    pub risk: ConflictRisk,
    pub reasons: Vec<String>,
    /// Sorted, deduplicated.
    pub overlapping_files: Vec<String>,
    pub ticket_files: Vec<String>,
    pub command_files: Vec<String>,
}

fn normalize(files: &[String]) -> BTreeSet<&str> {
    files.iter().map(String::as_str).collect()
}

/// Classify how risky merging the ticket side into the command side is.
#[must_use]
pub fn summarize_conflict_risk(ticket_files: &[String], command_files: &[String]) -> ConflictSummary {
    let ticket = normalize(ticket_files);
    let command = normalize(command_files);
    let overlapping: Vec<String> = ticket
        .intersection(&command)
        .map(|f| (*f).to_string())
        .collect();

    let (risk, reasons) = if !overlapping.is_empty() {
        (
            ConflictRisk::High,
            vec![format!(
                "Overlapping changed files detected ({})",
                overlapping.len()
            )],
        )
    } else if ticket.len() >= LARGE_CHANGE_THRESHOLD || command.len() >= LARGE_CHANGE_THRESHOLD {
        (
            ConflictRisk::Medium,
            vec!["Large change set size increases merge complexity".to_string()],
        )
    } else if ticket.is_empty() {
        (
            ConflictRisk::Low,
            vec!["Ticket branch has no file changes against merge base".to_string()],
        )
    } else {
        (ConflictRisk::Low, Vec::new())
    };

    ConflictSummary {
        risk,
        reasons,
        overlapping_files: overlapping,
        ticket_files: ticket.into_iter().map(str::to_string).collect(),
        command_files: command.into_iter().map(str::to_string).collect(),
    }
}
