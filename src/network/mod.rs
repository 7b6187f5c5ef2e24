//! Network layer - cancellable HTTP request execution
//!
//! The engine hands `Execute` commands to the Network actor, which runs each
//! request on a worker task and reports exactly one terminal event back.

pub mod actor;
pub mod client;
pub mod engine;
pub mod latch;

pub use actor::NetworkActor;
pub use client::PreparedRequest;
pub use engine::{ExecutionEngine, ExecutionState};
pub use latch::{Latch, LatchGuard};
