//! Message types for inter-layer communication in the actor-based architecture.
//!
//! This module defines all messages that flow between the presentation
//! layer, the App actor and the Network actor.

pub mod intents;
pub mod network;
pub mod notifications;

pub use intents::Intent;
pub use network::{ExecutionHandle, ExecutionOutcome, NetworkCommand, NetworkEvent};
pub use notifications::Notification;
