//! Application constants
//!
//! Centralized location for reserved characters and configuration defaults.

/// Joins node names into a path
pub const PATH_SEPARATOR: char = '/';

/// Appended to a tab title while the tab has unsaved edits
pub const DIRTY_MARKER: char = '*';

/// Default URL for new HTTP requests
pub const DEFAULT_HTTP_URL: &str = "https://httpbin.org/get";

/// Name given to "new request" drafts when the caller does not pick one
pub const DEFAULT_DRAFT_NAME: &str = "New Request";

/// Directory under the home directory holding all workspace files
pub const WORKSPACE_DIR_NAME: &str = ".apiary";

/// Default collections file name inside the workspace directory
pub const COLLECTIONS_FILE: &str = "collections.json";

/// Default log file name inside the workspace directory
pub const LOG_FILE: &str = "apiary.log";

/// Default settings file name inside the workspace directory
pub const SETTINGS_FILE: &str = "settings.yaml";

/// Default timeout for a single HTTP call
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Application name
pub const APP_NAME: &str = "Apiary";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
