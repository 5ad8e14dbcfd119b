//! Schema validation for persisted ticket documents.
//!
//! Ticket files are parsed into a loose YAML value first and checked field by
//! field, so a broken record reports *every* problem with a dotted path
//! (`owner.role`, `log.2.to`) instead of failing on the first one. Only a value
//! that passes is converted into a typed [`Ticket`], with defaults filled in for
//! the optional substructures.

use serde_yaml::{Mapping, Value};
use std::fmt;

use super::ticket::{AgentRole, LogAction, Priority, Status, Ticket, TicketType, is_ticket_id};

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldIssue {
    /// Dotted field path; empty for the document root.
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

const TICKET_KEYS: &[&str] = &[
    "id",
    "title",
    "type",
    "priority",
    "status",
    "owner",
    "assignees",
    "description",
    "file_ownership",
    "acceptance_criteria",
    "artifacts",
    "quality_gates",
    "plan",
    "git",
    "log",
];

/// Validate a parsed document and build the typed record.
///
/// # Errors
///
/// Returns every field-level issue found when the document does not match the
/// ticket schema.
pub fn parse_ticket(value: &Value) -> Result<Ticket, Vec<FieldIssue>> {
    let mut checker = Checker::default();
    checker.ticket(value);
    if !checker.issues.is_empty() {
        return Err(checker.issues);
    }

    serde_yaml::from_value(value.clone())
        .map_err(|err| vec![FieldIssue::new("", format!("could not build ticket: {err}"))])
}

/// Re-check a typed record against the schema, as done before every write.
///
/// # Errors
///
/// Returns the issues found, e.g. an empty title.
pub fn validate_ticket(ticket: &Ticket) -> Result<(), Vec<FieldIssue>> {
    let value = serde_yaml::to_value(ticket)
        .map_err(|err| vec![FieldIssue::new("", format!("could not serialize ticket: {err}"))])?;
    parse_ticket(&value).map(|_| ())
}

#[derive(Default)]
struct Checker {
    issues: Vec<FieldIssue>,
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged value",
    }
}

impl Checker {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue::new(path, message));
    }

    fn ticket(&mut self, value: &Value) {
        let Some(map) = self.object(value, "") else {
            return;
        };
        self.unknown_keys(map, "", TICKET_KEYS);

        if let Some(id) = self.required_str(map, "", "id") {
            if !is_ticket_id(id) {
                self.push("id", "Format: T-XXXX");
            }
        }
        if let Some(title) = self.required_str(map, "", "title") {
            if title.is_empty() {
                self.push("title", "must contain at least 1 character");
            }
        }
        self.required_enum(map, "", "type", &TicketType::ALL.map(TicketType::as_str));
        self.required_enum(map, "", "priority", &Priority::ALL.map(Priority::as_str));
        self.required_enum(map, "", "status", &Status::ALL.map(Status::as_str));

        match map.get("owner") {
            None => self.push("owner", "Required"),
            Some(owner) => {
                if let Some(owner) = self.object(owner, "owner") {
                    self.unknown_keys(owner, "owner", &["role", "agent"]);
                    self.required_enum(owner, "owner", "role", &AgentRole::ALL.map(AgentRole::as_str));
                    self.required_str(owner, "owner", "agent");
                }
            }
        }

        self.optional_str_list(map, "", "assignees");
        self.optional_str(map, "", "description", false);
        self.optional_str_list(map, "", "file_ownership");
        self.optional_str_list(map, "", "acceptance_criteria");

        if let Some(artifacts) = self.optional_object(map, "", "artifacts") {
            let keys = ["proposed_changes", "pr_links", "commits"];
            self.unknown_keys(artifacts, "artifacts", &keys);
            for key in keys {
                self.optional_str_list(artifacts, "artifacts", key);
            }
        }

        if let Some(gates) = self.optional_object(map, "", "quality_gates") {
            self.unknown_keys(gates, "quality_gates", &["verify_commands", "smoke_test"]);
            self.optional_str_list(gates, "quality_gates", "verify_commands");
            self.optional_str(gates, "quality_gates", "smoke_test", true);
        }

        if let Some(plan) = self.nullable_object(map, "", "plan") {
            self.plan(plan);
        }

        if let Some(git) = self.nullable_object(map, "", "git") {
            self.unknown_keys(git, "git", &["command_branch", "ticket_branch", "base_branch"]);
            self.optional_str(git, "git", "command_branch", true);
            self.optional_str(git, "git", "ticket_branch", true);
            self.optional_str(git, "git", "base_branch", false);
        }

        if let Some(entries) = self.optional_list(map, "", "log") {
            for (idx, entry) in entries.iter().enumerate() {
                self.log_entry(entry, &join("log", &idx.to_string()));
            }
        }
    }

    fn plan(&mut self, plan: &Mapping) {
        self.unknown_keys(plan, "plan", &["steps", "assumptions"]);
        if let Some(steps) = self.optional_list(plan, "plan", "steps") {
            for (idx, step) in steps.iter().enumerate() {
                let path = format!("plan.steps.{idx}");
                if let Some(step) = self.object(step, &path) {
                    self.unknown_keys(step, &path, &["description", "verification"]);
                    self.required_str(step, &path, "description");
                    self.required_str(step, &path, "verification");
                }
            }
        }
        self.optional_str_list(plan, "plan", "assumptions");
    }

    fn log_entry(&mut self, entry: &Value, path: &str) {
        let Some(map) = self.object(entry, path) else {
            return;
        };
        self.unknown_keys(map, path, &["at", "by", "action", "from", "to", "note"]);
        if let Some(at) = self.required_str(map, path, "at") {
            if chrono::DateTime::parse_from_rfc3339(at).is_err() {
                self.push(join(path, "at"), "Invalid ISO 8601 timestamp");
            }
        }
        self.required_str(map, path, "by");
        self.required_enum(map, path, "action", &LogAction::ALL.map(LogAction::as_str));
        let statuses = Status::ALL.map(Status::as_str);
        for key in ["from", "to"] {
            if map.get(key).is_some_and(|v| !v.is_null()) {
                self.required_enum(map, path, key, &statuses);
            }
        }
        self.optional_str(map, path, "note", true);
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Mapping> {
        if let Value::Mapping(map) = value {
            Some(map)
        } else {
            self.push(path, format!("Expected object, received {}", type_name(value)));
            None
        }
    }

    fn unknown_keys(&mut self, map: &Mapping, path: &str, known: &[&str]) {
        for key in map.keys() {
            match key.as_str() {
                Some(name) if known.contains(&name) => {}
                Some(name) => self.push(join(path, name), "Unrecognized key"),
                None => self.push(path, format!("Non-string key of type {}", type_name(key))),
            }
        }
    }

    fn required_str<'v>(&mut self, map: &'v Mapping, path: &str, key: &str) -> Option<&'v str> {
        match map.get(key) {
            None => {
                self.push(join(path, key), "Required");
                None
            }
            Some(Value::String(text)) => Some(text.as_str()),
            Some(other) => {
                self.push(
                    join(path, key),
                    format!("Expected string, received {}", type_name(other)),
                );
                None
            }
        }
    }

    fn required_enum(&mut self, map: &Mapping, path: &str, key: &str, options: &[&str]) {
        if let Some(text) = self.required_str(map, path, key) {
            if !options.contains(&text) {
                self.push(
                    join(path, key),
                    format!(
                        "Invalid enum value. Expected {}, received '{text}'",
                        options
                            .iter()
                            .map(|o| format!("'{o}'"))
                            .collect::<Vec<_>>()
                            .join(" | ")
                    ),
                );
            }
        }
    }

    fn optional_str(&mut self, map: &Mapping, path: &str, key: &str, nullable: bool) {
        match map.get(key) {
            None | Some(Value::String(_)) => {}
            Some(Value::Null) if nullable => {}
            Some(other) => self.push(
                join(path, key),
                format!("Expected string, received {}", type_name(other)),
            ),
        }
    }

    fn optional_list<'v>(
        &mut self,
        map: &'v Mapping,
        path: &str,
        key: &str,
    ) -> Option<&'v Vec<Value>> {
        match map.get(key) {
            None => None,
            Some(Value::Sequence(items)) => Some(items),
            Some(other) => {
                self.push(
                    join(path, key),
                    format!("Expected array, received {}", type_name(other)),
                );
                None
            }
        }
    }

    fn optional_str_list(&mut self, map: &Mapping, path: &str, key: &str) {
        let Some(items) = self.optional_list(map, path, key) else {
            return;
        };
        let base = join(path, key);
        for (idx, item) in items.iter().enumerate() {
            if !item.is_string() {
                self.push(
                    format!("{base}.{idx}"),
                    format!("Expected string, received {}", type_name(item)),
                );
            }
        }
    }

    fn optional_object<'v>(
        &mut self,
        map: &'v Mapping,
        path: &str,
        key: &str,
    ) -> Option<&'v Mapping> {
        let value = map.get(key)?;
        self.object(value, &join(path, key))
    }

    fn nullable_object<'v>(
        &mut self,
        map: &'v Mapping,
        path: &str,
        key: &str,
    ) -> Option<&'v Mapping> {
        match map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.object(value, &join(path, key)),
        }
    }
}
