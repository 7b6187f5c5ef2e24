//! App state - the tree, the open tabs and the persistence adapter, owned by the App actor

use std::collections::HashMap;

use crate::error::WorkspaceError;
use crate::messages::{ExecutionHandle, Notification};
use crate::storage::Storage;
use crate::tabs::{TabHandle, TabRegistry};
use crate::tree::Tree;

/// Main application state - pure data, no network I/O
pub struct AppState {
    pub tree: Tree,
    pub tabs: TabRegistry,
    pub storage: Storage,
    /// Set after a failed save until a later save succeeds
    pub save_pending: bool,
    /// Executions started from a tab and not yet finished
    pub executions: HashMap<TabHandle, ExecutionHandle>,
}

impl AppState {
    /// Empty state over `storage`, without touching the disk
    pub fn new(storage: Storage) -> Self {
        AppState {
            tree: Tree::new(),
            tabs: TabRegistry::new(),
            storage,
            save_pending: false,
            executions: HashMap::new(),
        }
    }

    /// Loads the collections file. An unreadable document is moved aside and
    /// the workspace starts empty; other I/O errors are returned.
    pub fn open(storage: Storage) -> crate::error::Result<Self> {
        let mut state = AppState::new(storage);
        match state.storage.load() {
            Ok(tree) => state.tree = tree,
            Err(WorkspaceError::ImportFormat(reason)) => {
                tracing::warn!(
                    path = %state.storage.path().display(),
                    %reason,
                    "Collections file is malformed, starting empty"
                );
                state.storage.quarantine()?;
            }
            Err(e) => return Err(e),
        }
        Ok(state)
    }

    /// Writes the tree and reports the result. The in-memory tree is kept
    /// either way.
    pub fn flush(&mut self) -> Notification {
        match self.storage.save(&self.tree) {
            Ok(report) => {
                self.save_pending = false;
                Notification::Saved {
                    requests_written: report.requests_written,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Save failed");
                self.save_pending = true;
                Notification::SaveFailed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Retries a save that failed earlier, if any
    pub fn flush_pending(&mut self) -> Option<Notification> {
        if !self.save_pending {
            return None;
        }
        tracing::info!("Retrying pending save");
        Some(self.flush())
    }
}
