//! Per-user working state carried between CLI invocations.

use crate::errors::ServiceError;
use crate::models::OrderId;
use crate::services::basket::SelectionBasket;
use crate::services::lifecycle::PendingSubmission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Hierarchy,
    Search,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub basket: SelectionBasket,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default)]
    pub search_term: String,
    /// Order the basket will be quoted against.
    #[serde(default)]
    pub active_order: Option<OrderId>,
    #[serde(default)]
    pub pending_submission: Option<PendingSubmission>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    /// A non-blank term switches to flat search; blank returns to the tree.
    /// The basket is untouched either way.
    pub fn set_search(&mut self, term: &str) {
        self.search_term = term.trim().to_string();
        self.view_mode = if self.search_term.is_empty() {
            ViewMode::Hierarchy
        } else {
            ViewMode::Search
        };
    }

    /// Drops the selection and any half-finished submission.
    pub fn cancel_basket(&mut self) {
        self.basket.clear();
        self.pending_submission = None;
    }
}

/// JSON file holding the [`SessionContext`].
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty session.
    pub fn load(&self) -> Result<SessionContext, ServiceError> {
        if !self.path.exists() {
            return Ok(SessionContext::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&data).map_err(|e| {
            ServiceError::SerializationError(format!(
                "failed to parse session file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!(path = %self.path.display(), "session loaded");
        Ok(session)
    }

    pub fn save(&self, session: &mut SessionContext) -> Result<(), ServiceError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        session.saved_at = Some(Utc::now());
        let data = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, data)?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ServiceError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
