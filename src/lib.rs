//! # Apiary
//!
//! The workspace engine of an API testing tool, without a UI.
//!
//! ## Features
//! - Collection tree with path-addressed create, rename, move and delete
//! - Editor tabs that follow their request through renames and moves
//! - Atomic JSON persistence with merge/replace import
//! - HTTP execution with a single-flight latch and cancellation
//!
//! ## Architecture
//! Actor-based with channels:
//! - Presentation layer - sends [`Intent`]s, receives [`Notification`]s
//! - App Layer - owns the tree, tabs and storage
//! - Network Layer (Tokio runtime) - executes requests on worker tasks

pub mod app;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messages;
pub mod models;
pub mod network;
pub mod placement;
pub mod settings;
pub mod storage;
pub mod tabs;
pub mod tree;

// Re-export commonly used types
pub use app::{AppActor, AppState};
pub use error::{Result, WorkspaceError};
pub use messages::{ExecutionHandle, ExecutionOutcome, Intent, NetworkEvent, Notification};
pub use models::{BodyType, FormField, HttpMethod, KeyValue, NodeKind, RawType, RequestBody, RequestDescriptor, Response};
pub use network::{ExecutionEngine, ExecutionState};
pub use placement::{can_drop, can_place, DropTarget};
pub use settings::{CancelStrategy, Settings};
pub use storage::{ImportMode, Storage};
pub use tabs::{TabHandle, TabRegistry};
pub use tree::{NodeId, Tree};
