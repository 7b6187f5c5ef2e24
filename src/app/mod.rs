//! App layer - central state management and intent processing
//!
//! The App actor receives intents and network events, mutates the
//! workspace, and emits notifications and execution commands.

pub mod actor;
pub mod commands;
pub mod state;

pub use actor::AppActor;
pub use state::AppState;
