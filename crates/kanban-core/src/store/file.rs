use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{FileValidation, ListFilter, TicketDraft, TicketStore};
use crate::error::{KanbanError, Result};
use crate::model::schema::{FieldIssue, parse_ticket, validate_ticket};
use crate::model::ticket::{LogAction, LogEntry, Ticket, TicketId, is_ticket_id};

const EXTENSION: &str = "yml";

/// Directory of `{id}.yml` documents.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

/// Why a single file could not be turned into a ticket.
enum LoadFailure {
    Io(io::Error),
    Yaml(serde_yaml::Error),
    Schema(Vec<FieldIssue>),
}

impl LoadFailure {
    fn messages(self) -> Vec<String> {
        match self {
            Self::Io(err) => vec![format!("read error: {err}")],
            Self::Yaml(err) => vec![format!("YAML parse error: {err}")],
            Self::Schema(issues) => issues.iter().map(ToString::to_string).collect(),
        }
    }

    fn into_error(self, path: &Path) -> KanbanError {
        match self {
            Self::Io(source) => KanbanError::io(path, source),
            Self::Yaml(err) => KanbanError::invalid_field("", format!("YAML parse error: {err}")),
            Self::Schema(issues) => KanbanError::Validation { issues },
        }
    }
}

impl FileStore {
    /// Open the store, creating the directory when missing.
    ///
    /// # Errors
    ///
    /// `Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| KanbanError::io(&dir, err))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, id: &TicketId) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    fn load(path: &Path) -> std::result::Result<Ticket, LoadFailure> {
        let raw = fs::read_to_string(path).map_err(LoadFailure::Io)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(LoadFailure::Yaml)?;
        parse_ticket(&value).map_err(LoadFailure::Schema)
    }

    fn write(&self, ticket: &Ticket) -> Result<()> {
        validate_ticket(ticket).map_err(|issues| KanbanError::Validation { issues })?;

        let body = serde_yaml::to_string(ticket)
            .map_err(|err| KanbanError::invalid_field("", format!("could not encode: {err}")))?;
        let path = self.path_for(&ticket.id);
        let tmp = path.with_extension("yml.tmp");
        fs::write(&tmp, body.as_bytes()).map_err(|err| KanbanError::io(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| KanbanError::io(&path, err))?;
        debug!(id = %ticket.id, path = %path.display(), "ticket written");
        Ok(())
    }

    /// Every `*.yml` file in the store, ordered by file name.
    fn files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|err| KanbanError::io(&self.dir, err))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| KanbanError::io(&self.dir, err))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl TicketStore for FileStore {
    fn get(&self, id: &TicketId) -> Result<Ticket> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(KanbanError::NotFound {
                id: id.clone(),
                path,
            });
        }
        Self::load(&path).map_err(|failure| failure.into_error(&path))
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<Ticket>> {
        let mut tickets = Vec::new();
        for path in self.files()? {
            match Self::load(&path) {
                Ok(ticket) if filter.matches(&ticket) => tickets.push(ticket),
                Ok(_) => {}
                Err(failure) => {
                    debug!(
                        file = %file_name(&path),
                        errors = ?failure.messages(),
                        "skipping unreadable ticket"
                    );
                }
            }
        }
        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tickets)
    }

    fn create(&self, id: TicketId, draft: TicketDraft) -> Result<Ticket> {
        if self.path_for(&id).exists() {
            return Err(KanbanError::AlreadyExists {
                what: format!("ticket {id}"),
            });
        }
        if !draft.status.is_initial() {
            return Err(KanbanError::invalid_field(
                "status",
                format!("new tickets start in BACKLOG or READY, not {}", draft.status),
            ));
        }

        let mut ticket = draft.into_ticket(id);
        let creator = ticket.owner.agent.clone();
        ticket.record(LogEntry::now(creator, LogAction::Created).with_note("Ticket created"));
        self.write(&ticket)?;
        info!(id = %ticket.id, status = %ticket.status, "ticket created");
        Ok(ticket)
    }

    fn save(&self, ticket: &Ticket) -> Result<()> {
        self.write(ticket)
    }

    fn validate_all(&self) -> Result<Vec<FileValidation>> {
        Ok(self
            .files()?
            .into_iter()
            .map(|path| {
                let file = file_name(&path);
                match Self::load(&path) {
                    Ok(_) => FileValidation {
                        file,
                        valid: true,
                        errors: Vec::new(),
                    },
                    Err(failure) => FileValidation {
                        file,
                        valid: false,
                        errors: failure.messages(),
                    },
                }
            })
            .collect())
    }

    fn next_id(&self) -> Result<TicketId> {
        let highest = self
            .files()?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_owned))
            .filter(|stem| is_ticket_id(stem))
            .filter_map(|stem| TicketId::parse(&stem).ok())
            .map(|id| id.number())
            .max()
            .unwrap_or(0);

        TicketId::from_number(highest + 1).ok_or_else(|| {
            KanbanError::PreconditionFailed(format!(
                "ticket id space exhausted: {}{} already allocated",
                TicketId::PREFIX,
                TicketId::MAX
            ))
        })
    }
}
