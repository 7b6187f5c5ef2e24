//! Intents - messages from the presentation layer to the App layer

use std::path::PathBuf;

use crate::models::RequestDescriptor;
use crate::storage::ImportMode;
use crate::tabs::TabHandle;

/// A user action forwarded by the presentation layer.
///
/// Paths are `/`-joined node names; `None` parents mean the tree root.
#[derive(Debug, Clone)]
pub enum Intent {
    // Tree
    CreateCollection {
        parent: Option<String>,
        name: String,
    },
    CreateRequest {
        parent: Option<String>,
        name: String,
        descriptor: Option<RequestDescriptor>,
    },
    Rename {
        path: String,
        new_name: String,
    },
    Move {
        source: String,
        target_parent: Option<String>,
    },
    Delete {
        path: String,
    },

    // Tabs
    OpenTab {
        path: String,
    },
    NewDraft {
        name: Option<String>,
    },
    EditTab {
        tab: TabHandle,
        descriptor: RequestDescriptor,
    },
    /// Writes the tab's descriptor into its node (drafts become top-level requests)
    SaveTab {
        tab: TabHandle,
    },
    SaveDraftAs {
        tab: TabHandle,
        parent: Option<String>,
        name: String,
    },
    CloseTab {
        tab: TabHandle,
    },
    /// Close a dirty tab, discarding its edits
    ConfirmClose {
        tab: TabHandle,
    },

    // Execution
    Send {
        tab: TabHandle,
    },
    Stop {
        tab: TabHandle,
    },

    // Persistence
    Import {
        path: PathBuf,
        mode: ImportMode,
    },
    RetrySave,

    // System
    Quit,
}

impl Intent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Intent::CreateCollection { .. } => "create_collection",
            Intent::CreateRequest { .. } => "create_request",
            Intent::Rename { .. } => "rename",
            Intent::Move { .. } => "move",
            Intent::Delete { .. } => "delete",
            Intent::OpenTab { .. } => "open_tab",
            Intent::NewDraft { .. } => "new_draft",
            Intent::EditTab { .. } => "edit_tab",
            Intent::SaveTab { .. } => "save_tab",
            Intent::SaveDraftAs { .. } => "save_draft_as",
            Intent::CloseTab { .. } => "close_tab",
            Intent::ConfirmClose { .. } => "confirm_close",
            Intent::Send { .. } => "send",
            Intent::Stop { .. } => "stop",
            Intent::Import { .. } => "import",
            Intent::RetrySave => "retry_save",
            Intent::Quit => "quit",
        }
    }
}
