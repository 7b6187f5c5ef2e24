//! Notifications - state changes reported from the App layer to the presentation layer

use crate::messages::network::{ExecutionHandle, ExecutionOutcome};
use crate::tabs::TabHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A node appeared (`old_path == None`), moved/renamed, or was removed
    /// (`new_path == None`). Both `None` means the whole tree was reloaded.
    TreeChanged {
        old_path: Option<String>,
        new_path: Option<String>,
    },
    TabOpened {
        tab: TabHandle,
        title: String,
    },
    TabTitleChanged {
        tab: TabHandle,
        title: String,
    },
    TabClosed {
        tab: TabHandle,
    },
    /// The tab has unsaved edits; send `ConfirmClose` to discard them.
    CloseNeedsConfirmation {
        tab: TabHandle,
    },
    ExecutionStarted {
        tab: TabHandle,
        execution: ExecutionHandle,
    },
    ExecutionFinished {
        tab: TabHandle,
        execution: ExecutionHandle,
        outcome: ExecutionOutcome,
    },
    Saved {
        requests_written: usize,
    },
    /// The tree was mutated but could not be written; send `RetrySave`.
    SaveFailed {
        message: String,
    },
    /// The intent was refused; nothing changed.
    Rejected {
        intent: &'static str,
        message: String,
    },
}
