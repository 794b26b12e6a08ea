//! File-backed conversation transcripts, one JSON document per conversation.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::ConversationError;
use crate::models::{Conversation, ConversationSummary, Message, Role};
use crate::utils::{truncate_with_ellipsis, write_atomic};

const ID_PREFIX: &str = "conv_";
const ID_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TITLE_MAX_CHARS: usize = 50;
const DEFAULT_TITLE: &str = "New conversation";

pub struct ConversationStore {
    dir: PathBuf,
    /// Ids handed out by this store that may not exist on disk yet.
    issued: Mutex<HashSet<String>>,
}

impl ConversationStore {
    pub fn open(dir: &Path) -> Result<Self, ConversationError> {
        fs::create_dir_all(dir)?;
        debug!("conversation store at {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            issued: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh id of the form `conv_YYYYMMDD_HHMMSS`, with a `_NNNN` suffix
    /// when another conversation already took that second.
    pub fn new_id(&self) -> String {
        self.unique_id(&format!("{}{}", ID_PREFIX, Local::now().format(ID_TIME_FORMAT)))
    }

    fn unique_id(&self, base: &str) -> String {
        let mut issued = self.issued.lock().unwrap_or_else(|p| p.into_inner());

        let mut candidate = base.to_string();
        let mut suffix = 1;
        while issued.contains(&candidate) || self.path_for(&candidate).exists() {
            candidate = format!("{}_{:04}", base, suffix);
            suffix += 1;
        }

        issued.insert(candidate.clone());
        candidate
    }

    /// Write the full transcript, replacing any previous version.
    ///
    /// `created_at` comes from the id and is kept across saves; `updated_at`
    /// is now, nudged forward if the clock has not moved past the last save.
    pub fn save(
        &self,
        id: &str,
        messages: &[Message],
        title: Option<&str>,
    ) -> Result<Conversation, ConversationError> {
        let path = self.checked_path(id).ok_or_else(|| {
            ConversationError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid conversation id '{}'", id),
            ))
        })?;

        let previous = match self.load(id) {
            Ok(previous) => previous,
            Err(e) => {
                warn!("overwriting unreadable conversation {}: {}", id, e);
                None
            }
        };

        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => title.to_string(),
            None => infer_title(messages),
        };

        let created_at = previous
            .as_ref()
            .map(|c| c.created_at.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| created_at_from_id(id));

        let mut updated = Local::now().naive_local();
        let last_update = previous
            .as_ref()
            .and_then(|c| NaiveDateTime::parse_from_str(&c.updated_at, TIMESTAMP_FORMAT).ok());
        if let Some(last) = last_update {
            if updated.and_utc().timestamp() <= last.and_utc().timestamp() {
                updated = last + Duration::seconds(1);
            }
        }

        let conversation = Conversation {
            id: id.to_string(),
            title,
            created_at,
            updated_at: updated.format(TIMESTAMP_FORMAT).to_string(),
            message_count: messages.len(),
            messages: messages.to_vec(),
        };

        let json = serde_json::to_string_pretty(&conversation)?;
        write_atomic(&path, json.as_bytes())?;

        info!("saved conversation {} ({} messages)", id, messages.len());
        Ok(conversation)
    }

    /// `None` when the conversation does not exist.
    pub fn load(&self, id: &str) -> Result<Option<Conversation>, ConversationError> {
        let Some(path) = self.checked_path(id) else {
            return Ok(None);
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let conversation: Conversation = serde_json::from_str(&content)?;
        debug!("loaded conversation {} ({} messages)", id, conversation.message_count);
        Ok(Some(conversation))
    }

    /// Summaries sorted by `updated_at`, newest first, then by id. Unreadable
    /// files are skipped.
    pub fn list(&self) -> Result<Vec<ConversationSummary>, ConversationError> {
        let mut summaries = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_conversation = path.extension().is_some_and(|e| e == "json")
                && path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(ID_PREFIX));
            if !is_conversation {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(ConversationError::from)
                .and_then(|c| Ok(serde_json::from_str::<ConversationSummary>(&c)?));
            match parsed {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("skipping unreadable conversation {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(summaries)
    }

    /// `false` when there was nothing to delete.
    pub fn delete(&self, id: &str) -> Result<bool, ConversationError> {
        let Some(path) = self.checked_path(id) else {
            return Ok(false);
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("deleted conversation {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Ids are plain file stems; anything that could escape the directory is
    /// treated as unknown.
    fn checked_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\'])
            && !id.contains('\0');
        valid.then(|| self.path_for(id))
    }
}

fn infer_title(messages: &[Message]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| truncate_with_ellipsis(m.content.trim(), TITLE_MAX_CHARS))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// `conv_20250114_093000[_NNNN]` becomes `2025-01-14 09:30:00`. Ids not made by
/// [`ConversationStore::new_id`] fall back to the current time.
fn created_at_from_id(id: &str) -> String {
    id.strip_prefix(ID_PREFIX)
        .and_then(|rest| rest.get(..15))
        .and_then(|stamp| NaiveDateTime::parse_from_str(stamp, ID_TIME_FORMAT).ok())
        .unwrap_or_else(|| Local::now().naive_local())
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
