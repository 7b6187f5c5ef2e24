//! Command handlers - business logic for processing intents
//!
//! Every handler validates before it mutates and returns the notifications
//! the presentation layer needs. Tree mutations end with a save; a failed
//! save is reported but never rolls the mutation back.

use std::path::Path;

use crate::app::AppState;
use crate::error::{Result, WorkspaceError};
use crate::messages::{ExecutionHandle, ExecutionOutcome, Notification};
use crate::models::{NodeKind, RequestDescriptor};
use crate::storage::ImportMode;
use crate::tabs::{Binding, CloseOutcome, DetachOutcome, TabHandle, TitleChange};
use crate::tree::{NodeId, PathChange};

fn title_changed(change: TitleChange) -> Notification {
    Notification::TabTitleChanged {
        tab: change.handle,
        title: change.title,
    }
}

impl AppState {
    // ========================
    // Tree
    // ========================

    pub fn create_collection(&mut self, parent: Option<&str>, name: &str) -> Result<Vec<Notification>> {
        let id = self.tree.create_collection(parent, name)?;
        Ok(self.created(id))
    }

    pub fn create_request(
        &mut self,
        parent: Option<&str>,
        name: &str,
        descriptor: Option<RequestDescriptor>,
    ) -> Result<Vec<Notification>> {
        let id = self.tree.create_request(parent, name, descriptor)?;
        Ok(self.created(id))
    }

    fn created(&mut self, id: NodeId) -> Vec<Notification> {
        let path = self.tree.path_of(id);
        tracing::info!(path = path.as_deref().unwrap_or_default(), "Node created");
        vec![
            Notification::TreeChanged {
                old_path: None,
                new_path: path,
            },
            self.flush(),
        ]
    }

    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<Vec<Notification>> {
        let change = self.tree.rename(path, new_name)?;
        Ok(self.relocated(change))
    }

    pub fn move_node(&mut self, source: &str, target_parent: Option<&str>) -> Result<Vec<Notification>> {
        let change = self.tree.move_node(source, target_parent)?;
        Ok(self.relocated(change))
    }

    fn relocated(&mut self, change: PathChange) -> Vec<Notification> {
        if change.is_noop() {
            return Vec::new();
        }
        tracing::info!(from = %change.old_path, to = %change.new_path, "Node relocated");

        let mut notes = vec![Notification::TreeChanged {
            old_path: Some(change.old_path.clone()),
            new_path: Some(change.new_path.clone()),
        }];
        notes.extend(
            self.tabs
                .reconcile(&change.old_path, &change.new_path)
                .into_iter()
                .map(title_changed),
        );
        notes.push(self.flush());
        notes
    }

    pub fn delete(&mut self, path: &str) -> Result<Vec<Notification>> {
        let removed = self.tree.delete(path)?;
        tracing::info!(path, nodes = removed.len(), "Subtree deleted");

        let mut notes = vec![Notification::TreeChanged {
            old_path: Some(path.to_string()),
            new_path: None,
        }];
        for outcome in self.tabs.detach_removed(removed.iter().map(|n| n.id)) {
            match outcome {
                DetachOutcome::Closed(tab) => notes.push(Notification::TabClosed { tab }),
                DetachOutcome::NeedsConfirmation { handle, title } => {
                    notes.push(Notification::TabTitleChanged { tab: handle, title });
                    notes.push(Notification::CloseNeedsConfirmation { tab: handle });
                }
            }
        }
        notes.push(self.flush());
        Ok(notes)
    }

    // ========================
    // Tabs
    // ========================

    /// Opens (or re-focuses) the tab of the request at `path`
    pub fn open_tab(&mut self, path: &str) -> Result<Vec<Notification>> {
        let id = self
            .tree
            .resolve(path)
            .ok_or_else(|| WorkspaceError::NotFound(path.to_string()))?;
        if self.tree.kind_of(id) != Some(NodeKind::Request) {
            return Err(WorkspaceError::NotARequest(path.to_string()));
        }
        let descriptor = self.tree.descriptor(id).cloned().unwrap_or_default();
        let tab = self.tabs.open(id, path, descriptor);
        Ok(vec![self.tab_opened(tab)?])
    }

    pub fn new_draft(&mut self, name: Option<&str>) -> Result<Vec<Notification>> {
        let tab = self.tabs.open_draft(name, RequestDescriptor::default());
        Ok(vec![self.tab_opened(tab)?])
    }

    fn tab_opened(&self, tab: TabHandle) -> Result<Notification> {
        let title = self.title_of(tab)?;
        Ok(Notification::TabOpened { tab, title })
    }

    fn title_of(&self, tab: TabHandle) -> Result<String> {
        self.tabs
            .get(tab)
            .map(|t| t.title())
            .ok_or(WorkspaceError::UnknownTab(tab))
    }

    pub fn edit_tab(&mut self, tab: TabHandle, descriptor: RequestDescriptor) -> Result<Vec<Notification>> {
        Ok(self
            .tabs
            .edit(tab, descriptor)?
            .map(title_changed)
            .into_iter()
            .collect())
    }

    /// Writes the tab's descriptor into its node. A draft becomes a new
    /// top-level request named after the draft.
    pub fn save_tab(&mut self, tab: TabHandle) -> Result<Vec<Notification>> {
        let (binding, descriptor) = {
            let open = self.tabs.get(tab).ok_or(WorkspaceError::UnknownTab(tab))?;
            (open.binding().clone(), open.descriptor().clone())
        };
        match binding {
            Binding::Node { id, .. } => {
                let before = self.title_of(tab)?;
                self.tree.set_descriptor_by_id(id, descriptor)?;
                self.tabs.mark_saved(tab)?;
                let mut notes = self.retitled(tab, before)?;
                notes.push(self.flush());
                Ok(notes)
            }
            Binding::Draft { name } => self.save_draft_as(tab, None, &name),
        }
    }

    /// Saves the tab as a new request at `parent/name` and binds it there
    pub fn save_draft_as(&mut self, tab: TabHandle, parent: Option<&str>, name: &str) -> Result<Vec<Notification>> {
        let before = self.title_of(tab)?;
        let descriptor = self
            .tabs
            .get(tab)
            .map(|t| t.descriptor().clone())
            .ok_or(WorkspaceError::UnknownTab(tab))?;

        let id = self.tree.create_request(parent, name, Some(descriptor))?;
        let path = self.tree.path_of(id).unwrap_or_default();
        self.tabs.bind(tab, id, &path)?;
        self.tabs.mark_saved(tab)?;
        tracing::info!(%tab, %path, "Tab saved as new request");

        let mut notes = vec![Notification::TreeChanged {
            old_path: None,
            new_path: Some(path),
        }];
        notes.extend(self.retitled(tab, before)?);
        notes.push(self.flush());
        Ok(notes)
    }

    fn retitled(&self, tab: TabHandle, before: String) -> Result<Vec<Notification>> {
        let title = self.title_of(tab)?;
        Ok(if title != before {
            vec![Notification::TabTitleChanged { tab, title }]
        } else {
            Vec::new()
        })
    }

    pub fn close_tab(&mut self, tab: TabHandle) -> Result<Vec<Notification>> {
        Ok(match self.tabs.close(tab)? {
            CloseOutcome::Closed => vec![Notification::TabClosed { tab }],
            CloseOutcome::NeedsConfirmation => vec![Notification::CloseNeedsConfirmation { tab }],
        })
    }

    pub fn confirm_close(&mut self, tab: TabHandle) -> Result<Vec<Notification>> {
        self.tabs.close_confirmed(tab)?;
        Ok(vec![Notification::TabClosed { tab }])
    }

    // ========================
    // Execution
    // ========================

    /// The descriptor a send from `tab` should execute
    pub fn prepare_send(&self, tab: TabHandle) -> Result<RequestDescriptor> {
        self.tabs
            .get(tab)
            .map(|t| t.descriptor().clone())
            .ok_or(WorkspaceError::UnknownTab(tab))
    }

    pub fn record_started(&mut self, execution: ExecutionHandle) -> Notification {
        self.executions.insert(execution.tab, execution);
        Notification::ExecutionStarted {
            tab: execution.tab,
            execution,
        }
    }

    /// The execution running for `tab`, if any
    pub fn running(&self, tab: TabHandle) -> Result<Option<ExecutionHandle>> {
        match self.executions.get(&tab) {
            Some(execution) => Ok(Some(*execution)),
            None if self.tabs.get(tab).is_some() => Ok(None),
            None => Err(WorkspaceError::UnknownTab(tab)),
        }
    }

    pub fn finish(&mut self, execution: ExecutionHandle, outcome: ExecutionOutcome) -> Notification {
        if self.executions.get(&execution.tab) == Some(&execution) {
            self.executions.remove(&execution.tab);
        }
        Notification::ExecutionFinished {
            tab: execution.tab,
            execution,
            outcome,
        }
    }

    // ========================
    // Persistence
    // ========================

    /// Imports a collections document. After a replace, bound tabs follow
    /// their path into the new tree or are detached like a delete.
    pub fn import(&mut self, source: &Path, mode: ImportMode) -> Result<Vec<Notification>> {
        let bound: Vec<(TabHandle, NodeId, String)> = self
            .tabs
            .iter()
            .filter_map(|t| match t.binding() {
                Binding::Node { id, path } => Some((t.handle, *id, path.clone())),
                Binding::Draft { .. } => None,
            })
            .collect();

        self.storage.import_file(&mut self.tree, source, mode)?;

        let mut notes = vec![Notification::TreeChanged {
            old_path: None,
            new_path: None,
        }];
        if mode == ImportMode::Replace {
            let mut orphaned = Vec::new();
            for (tab, old_id, path) in bound {
                match self.tree.resolve(&path) {
                    Some(id) if self.tree.kind_of(id) == Some(NodeKind::Request) => {
                        self.tabs.bind(tab, id, &path)?;
                    }
                    _ => orphaned.push(old_id),
                }
            }
            for outcome in self.tabs.detach_removed(orphaned) {
                match outcome {
                    DetachOutcome::Closed(tab) => notes.push(Notification::TabClosed { tab }),
                    DetachOutcome::NeedsConfirmation { handle, title } => {
                        notes.push(Notification::TabTitleChanged { tab: handle, title });
                        notes.push(Notification::CloseNeedsConfirmation { tab: handle });
                    }
                }
            }
        }
        notes.push(self.flush());
        Ok(notes)
    }

    pub fn retry_save(&mut self) -> Vec<Notification> {
        vec![self.flush()]
    }
}
