//! App actor - message loop processing intents and network events

use tokio::sync::mpsc;

use crate::app::state::AppState;
use crate::error::Result;
use crate::messages::{Intent, NetworkEvent, Notification};
use crate::network::ExecutionEngine;

/// App actor that owns the workspace and drives the execution engine
pub struct AppActor {
    state: AppState,
    engine: ExecutionEngine,
    notify_tx: mpsc::UnboundedSender<Notification>,
}

impl AppActor {
    pub fn new(
        state: AppState,
        engine: ExecutionEngine,
        notify_tx: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        AppActor {
            state,
            engine,
            notify_tx,
        }
    }

    /// Run the actor message loop until `Quit` or every sender is gone
    pub async fn run(
        mut self,
        mut intent_rx: mpsc::UnboundedReceiver<Intent>,
        mut net_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    ) {
        loop {
            tokio::select! {
                Some(event) = net_rx.recv() => {
                    let (execution, outcome) = self.engine.observe(event);
                    let note = self.state.finish(execution, outcome);
                    self.emit(vec![note]);
                }
                Some(intent) = intent_rx.recv() => {
                    if matches!(intent, Intent::Quit) {
                        tracing::info!("Quit requested");
                        if let Some(note) = self.state.flush_pending() {
                            self.emit(vec![note]);
                        }
                        break;
                    }
                    let name = intent.name();
                    tracing::info!(intent = name, "Handling intent");
                    match self.handle_intent(intent) {
                        Ok(notes) => self.emit(notes),
                        Err(e) => {
                            if e.is_recoverable() {
                                tracing::warn!(intent = name, error = %e, "Intent rejected");
                            } else {
                                tracing::error!(intent = name, error = %e, "Intent failed");
                            }
                            self.emit(vec![Notification::Rejected {
                                intent: name,
                                message: e.to_string(),
                            }]);
                        }
                    }
                }
                else => break,
            }
        }

        self.engine.shutdown();
    }

    fn emit(&self, notes: Vec<Notification>) {
        for note in notes {
            let _ = self.notify_tx.send(note);
        }
    }

    fn handle_intent(&mut self, intent: Intent) -> Result<Vec<Notification>> {
        let state = &mut self.state;
        match intent {
            Intent::CreateCollection { parent, name } => state.create_collection(parent.as_deref(), &name),
            Intent::CreateRequest {
                parent,
                name,
                descriptor,
            } => state.create_request(parent.as_deref(), &name, descriptor),
            Intent::Rename { path, new_name } => state.rename(&path, &new_name),
            Intent::Move {
                source,
                target_parent,
            } => state.move_node(&source, target_parent.as_deref()),
            Intent::Delete { path } => state.delete(&path),

            Intent::OpenTab { path } => state.open_tab(&path),
            Intent::NewDraft { name } => state.new_draft(name.as_deref()),
            Intent::EditTab { tab, descriptor } => state.edit_tab(tab, descriptor),
            Intent::SaveTab { tab } => state.save_tab(tab),
            Intent::SaveDraftAs { tab, parent, name } => state.save_draft_as(tab, parent.as_deref(), &name),
            Intent::CloseTab { tab } => state.close_tab(tab),
            Intent::ConfirmClose { tab } => state.confirm_close(tab),

            Intent::Send { tab } => {
                let descriptor = state.prepare_send(tab)?;
                // A busy engine drops the send without any event
                Ok(match self.engine.send(tab, &descriptor) {
                    Some(execution) => vec![state.record_started(execution)],
                    None => Vec::new(),
                })
            }
            Intent::Stop { tab } => {
                if let Some(execution) = state.running(tab)? {
                    self.engine.stop(execution);
                }
                Ok(Vec::new())
            }

            Intent::Import { path, mode } => state.import(&path, mode),
            Intent::RetrySave => Ok(state.retry_save()),

            Intent::Quit => Ok(Vec::new()),
        }
    }
}
