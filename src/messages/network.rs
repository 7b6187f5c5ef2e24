//! Network messages - communication between App and Network layers

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::models::Response;
use crate::network::client::PreparedRequest;
use crate::network::latch::LatchGuard;
use crate::tabs::TabHandle;

/// Identifies one accepted `send` and the tab it reports back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionHandle {
    pub id: u64,
    pub tab: TabHandle,
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec-{} ({})", self.id, self.tab)
    }
}

/// Commands sent from App layer to Network layer
#[derive(Debug)]
pub enum NetworkCommand {
    /// Run one request. The guard holds the single-flight latch and travels
    /// back inside the terminal event.
    Execute {
        execution: ExecutionHandle,
        request: PreparedRequest,
        cancel: CancellationToken,
        guard: LatchGuard,
    },

    /// Shutdown the network actor
    Shutdown,
}

/// The single terminal result of an execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed(Response),
    Failed { message: String, elapsed_ms: u64 },
    Cancelled,
}

impl ExecutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Completed(_) => "completed",
            ExecutionOutcome::Failed { .. } => "failed",
            ExecutionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Events sent from Network layer to App layer
#[derive(Debug)]
pub enum NetworkEvent {
    /// Exactly one per accepted execution. The guard keeps the engine busy
    /// until the control loop has observed the event.
    Finished {
        execution: ExecutionHandle,
        outcome: ExecutionOutcome,
        guard: LatchGuard,
    },
}

impl NetworkEvent {
    /// Get the execution the event belongs to
    pub fn execution(&self) -> ExecutionHandle {
        match self {
            NetworkEvent::Finished { execution, .. } => *execution,
        }
    }
}
