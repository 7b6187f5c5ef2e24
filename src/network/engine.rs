//! Execution engine - the control-side handle over the network actor
//!
//! Owns the single-flight latch and the cancellation token of the execution
//! in flight. `send` never blocks: a busy engine simply refuses.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::messages::{ExecutionHandle, ExecutionOutcome, NetworkCommand, NetworkEvent};
use crate::models::RequestDescriptor;
use crate::network::actor::NetworkActor;
use crate::network::client::PreparedRequest;
use crate::network::latch::Latch;
use crate::settings::CancelStrategy;
use crate::tabs::TabHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Sending,
}

pub struct ExecutionEngine {
    latch: Latch,
    cmd_tx: mpsc::UnboundedSender<NetworkCommand>,
    current: Option<(ExecutionHandle, CancellationToken)>,
    next_id: u64,
}

impl ExecutionEngine {
    /// Spawn the network actor on the current runtime and return its handle
    pub fn spawn(
        strategy: CancelStrategy,
        timeout: Duration,
        event_tx: mpsc::UnboundedSender<NetworkEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = NetworkActor::new(event_tx, strategy, timeout);
        tokio::spawn(actor.run(cmd_rx));

        ExecutionEngine {
            latch: Latch::new(),
            cmd_tx,
            current: None,
            next_id: 1,
        }
    }

    /// Start executing `descriptor` for `tab`. Returns `None` when another
    /// execution still holds the latch.
    pub fn send(&mut self, tab: TabHandle, descriptor: &RequestDescriptor) -> Option<ExecutionHandle> {
        let guard = match self.latch.try_acquire() {
            Some(guard) => guard,
            None => {
                tracing::debug!(%tab, "Send ignored, engine busy");
                return None;
            }
        };

        let execution = ExecutionHandle {
            id: self.next_id,
            tab,
        };
        self.next_id += 1;

        let cancel = CancellationToken::new();
        let command = NetworkCommand::Execute {
            execution,
            request: PreparedRequest::snapshot(descriptor),
            cancel: cancel.clone(),
            guard,
        };

        // A closed channel drops the command and with it the guard
        if self.cmd_tx.send(command).is_err() {
            tracing::error!(%execution, "Network actor is gone");
            return None;
        }

        self.current = Some((execution, cancel));
        Some(execution)
    }

    /// Request cancellation. Handles of finished executions are inert.
    pub fn stop(&mut self, execution: ExecutionHandle) -> bool {
        match &self.current {
            Some((current, cancel)) if *current == execution => {
                tracing::info!(%execution, "Stop requested");
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> ExecutionState {
        if self.latch.is_busy() {
            ExecutionState::Sending
        } else {
            ExecutionState::Idle
        }
    }

    /// The execution whose terminal event has not been observed yet
    pub fn current(&self) -> Option<ExecutionHandle> {
        self.current.as_ref().map(|(execution, _)| *execution)
    }

    /// Consume a terminal event coming back from the network actor. The
    /// latch is released here, so a new `send` can only start once the
    /// previous execution has been reported.
    pub fn observe(&mut self, event: NetworkEvent) -> (ExecutionHandle, ExecutionOutcome) {
        let NetworkEvent::Finished {
            execution,
            outcome,
            guard,
        } = event;
        if self.current() == Some(execution) {
            self.current = None;
        }
        drop(guard);
        (execution, outcome)
    }

    pub fn shutdown(&mut self) {
        if let Some((_, cancel)) = self.current.take() {
            cancel.cancel();
        }
        let _ = self.cmd_tx.send(NetworkCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;

    fn unreachable() -> RequestDescriptor {
        RequestDescriptor::new(HttpMethod::GET, "http://127.0.0.1:9/")
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_and_frees_latch() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut engine = ExecutionEngine::spawn(CancelStrategy::Preemptive, Duration::from_secs(5), event_tx);

        let execution = engine.send(TabHandle::from_raw(1), &unreachable()).unwrap();

        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.execution(), execution);
        let (finished, outcome) = engine.observe(event);
        assert_eq!(finished, execution);
        assert!(matches!(outcome, ExecutionOutcome::Failed { .. }));
        assert_eq!(engine.state(), ExecutionState::Idle);
        assert!(!engine.stop(execution));
    }

    #[tokio::test]
    async fn test_busy_until_terminal_event_is_observed() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut engine = ExecutionEngine::spawn(CancelStrategy::Preemptive, Duration::from_secs(5), event_tx);

        let first = engine.send(TabHandle::from_raw(1), &unreachable()).unwrap();

        // The event sits in the channel; the engine must stay busy
        let event = event_rx.recv().await.unwrap();
        assert_eq!(engine.state(), ExecutionState::Sending);
        assert_eq!(engine.current(), Some(first));
        assert!(engine.send(TabHandle::from_raw(2), &unreachable()).is_none());

        engine.observe(event);
        assert_eq!(engine.state(), ExecutionState::Idle);
        assert!(engine.send(TabHandle::from_raw(2), &unreachable()).is_some());
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_stale_handle_does_not_cancel_next_execution() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut engine = ExecutionEngine::spawn(CancelStrategy::Preemptive, Duration::from_secs(5), event_tx);

        let first = engine.send(TabHandle::from_raw(1), &unreachable()).unwrap();
        let event = event_rx.recv().await.unwrap();
        engine.observe(event);

        let second = engine.send(TabHandle::from_raw(1), &unreachable()).unwrap();
        assert_ne!(first, second);
        assert!(!engine.stop(first));
        assert_eq!(engine.current(), Some(second));
        engine.shutdown();
    }
}
