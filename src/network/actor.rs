//! Network actor - runs HTTP executions on worker tasks in the Tokio runtime

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::messages::{ExecutionHandle, ExecutionOutcome, NetworkCommand, NetworkEvent};
use crate::network::client::{create_client, execute_request};
use crate::settings::CancelStrategy;

/// Network actor that processes execution commands
pub struct NetworkActor {
    client: reqwest::Client,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    strategy: CancelStrategy,
    timeout: Duration,
    active_requests: JoinSet<ExecutionHandle>,
    cancel_handles: HashMap<ExecutionHandle, CancellationToken>,
}

impl NetworkActor {
    pub fn new(
        event_tx: mpsc::UnboundedSender<NetworkEvent>,
        strategy: CancelStrategy,
        timeout: Duration,
    ) -> Self {
        NetworkActor {
            client: create_client(timeout),
            event_tx,
            strategy,
            timeout,
            active_requests: JoinSet::new(),
            cancel_handles: HashMap::new(),
        }
    }

    /// Run the network actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<NetworkCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(NetworkCommand::Execute { execution, request, cancel, guard }) => {
                            self.cancel_handles.insert(execution, cancel.clone());

                            let event_tx = self.event_tx.clone();
                            let client = self.client.clone();
                            let strategy = self.strategy;
                            let timeout = self.timeout;

                            self.active_requests.spawn(async move {
                                tracing::info!(%execution, url = %request.url, method = %request.method, ?strategy, "Executing request");
                                let outcome = AssertUnwindSafe(execute_request(&client, request, &cancel, strategy, timeout))
                                    .catch_unwind()
                                    .await
                                    .unwrap_or_else(|_| ExecutionOutcome::Failed {
                                        message: String::from("Execution worker panicked"),
                                        elapsed_ms: 0,
                                    });

                                // Uploads are closed by now; the latch is freed once the event is observed
                                tracing::info!(%execution, outcome = outcome.label(), "Request finished");
                                let _ = event_tx.send(NetworkEvent::Finished { execution, outcome, guard });
                                execution
                            });
                        }

                        Some(NetworkCommand::Shutdown) => {
                            for (execution, cancel) in self.cancel_handles.drain() {
                                tracing::info!(%execution, "Cancelling request for shutdown");
                                cancel.cancel();
                            }
                            break;
                        }

                        None => break,
                    }
                }

                // Clean up completed tasks
                Some(result) = self.active_requests.join_next() => {
                    match result {
                        Ok(execution) => {
                            self.cancel_handles.remove(&execution);
                        }
                        Err(e) => tracing::error!(error = %e, "Execution task aborted"),
                    }
                }
            }
        }

        // Let cancelled workers deliver their terminal events
        while self.active_requests.join_next().await.is_some() {}
    }
}
