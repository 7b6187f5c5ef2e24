//! Workspace error types

use std::path::PathBuf;

use thiserror::Error;

use crate::models::NodeKind;
use crate::placement::DropTarget;
use crate::tabs::TabHandle;

/// Errors raised by workspace operations.
///
/// Structural errors are raised before the tree is touched. `Persistence`
/// is raised after the fact and never rolls back the in-memory mutation.
/// Network failures and cancellation are not errors; they travel as
/// [`crate::messages::ExecutionOutcome`] values.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A sibling with that name already exists.
    #[error("'{name}' already exists in {parent}")]
    DuplicateName { name: String, parent: String },

    /// The name is empty or contains a reserved character.
    #[error("invalid name '{0}': names must be non-empty and must not contain '/' or '*'")]
    InvalidName(String),

    /// The drop validator rejected the re-parenting.
    #[error("cannot place a {source_kind} into {target}: {detail}")]
    InvalidPlacement {
        source_kind: NodeKind,
        target: DropTarget,
        detail: &'static str,
    },

    /// No node at the given path.
    #[error("no node at '{0}'")]
    NotFound(String),

    /// The node exists but is a collection.
    #[error("'{0}' is not a request")]
    NotARequest(String),

    /// No open tab with the given handle.
    #[error("no open tab {0}")]
    UnknownTab(TabHandle),

    /// The persisted or imported document is malformed.
    #[error("import format error: {0}")]
    ImportFormat(String),

    /// Reading or writing the collections file failed.
    #[error("persistence error on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkspaceError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Structural errors leave the tree untouched and can simply be re-prompted.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WorkspaceError::DuplicateName { .. }
                | WorkspaceError::InvalidName(_)
                | WorkspaceError::InvalidPlacement { .. }
                | WorkspaceError::NotFound(_)
                | WorkspaceError::NotARequest(_)
                | WorkspaceError::UnknownTab(_)
        )
    }
}

/// Result type alias for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;
