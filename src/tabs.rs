//! Tab registry - open editors and their bindings to tree nodes
//!
//! A tab never owns a node. It holds the node's [`NodeId`] plus the path it
//! last displayed, and relabels itself when the tree reports a rename or move.

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{DEFAULT_DRAFT_NAME, DIRTY_MARKER, PATH_SEPARATOR};
use crate::error::{Result, WorkspaceError};
use crate::models::RequestDescriptor;
use crate::tree::{validate_name, NodeId};

/// Opaque handle of an open tab
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabHandle(u64);

impl TabHandle {
    pub fn from_raw(raw: u64) -> Self {
        TabHandle(raw)
    }
}

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a tab is editing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Node { id: NodeId, path: String },
    /// A "new request" not yet saved into the tree
    Draft { name: String },
}

/// An open editor
#[derive(Clone, Debug)]
pub struct Tab {
    pub handle: TabHandle,
    binding: Binding,
    dirty: bool,
    descriptor: RequestDescriptor,
}

impl Tab {
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn node(&self) -> Option<NodeId> {
        match &self.binding {
            Binding::Node { id, .. } => Some(*id),
            Binding::Draft { .. } => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match &self.binding {
            Binding::Node { path, .. } => Some(path),
            Binding::Draft { .. } => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// Bound path or draft name, with the dirty marker while unsaved
    pub fn title(&self) -> String {
        let mut title = match &self.binding {
            Binding::Node { path, .. } => path.clone(),
            Binding::Draft { name } => name.clone(),
        };
        if self.dirty {
            title.push(DIRTY_MARKER);
        }
        title
    }
}

/// A tab whose displayed title changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleChange {
    pub handle: TabHandle,
    pub title: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The tab is dirty; call [`TabRegistry::close_confirmed`] to discard edits.
    NeedsConfirmation,
}

/// Fate of a tab whose node was deleted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetachOutcome {
    Closed(TabHandle),
    /// Dirty tab turned into a draft so its edits survive until the user decides.
    NeedsConfirmation { handle: TabHandle, title: String },
}

/// Replaces `old` with `new` when `path` is `old` or lies below it.
///
/// Matches whole path segments only: `Authority/X` is not below `Auth`.
fn rebase(path: &str, old: &str, new: &str) -> Option<String> {
    if path == old {
        return Some(new.to_string());
    }
    let rest = path.strip_prefix(old)?;
    if rest.starts_with(PATH_SEPARATOR) {
        Some(format!("{}{}", new, rest))
    } else {
        None
    }
}

/// Tracks every open tab
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: BTreeMap<TabHandle, Tab>,
    next_handle: u64,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn get(&self, handle: TabHandle) -> Option<&Tab> {
        self.tabs.get(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.values()
    }

    /// Tab currently bound to `id`, if any
    pub fn handle_for(&self, id: NodeId) -> Option<TabHandle> {
        self.tabs
            .values()
            .find(|t| t.node() == Some(id))
            .map(|t| t.handle)
    }

    fn require(&self, handle: TabHandle) -> Result<&Tab> {
        self.tabs.get(&handle).ok_or(WorkspaceError::UnknownTab(handle))
    }

    fn require_mut(&mut self, handle: TabHandle) -> Result<&mut Tab> {
        self.tabs
            .get_mut(&handle)
            .ok_or(WorkspaceError::UnknownTab(handle))
    }

    fn allocate(&mut self, binding: Binding, descriptor: RequestDescriptor) -> TabHandle {
        self.next_handle += 1;
        let handle = TabHandle(self.next_handle);
        self.tabs.insert(
            handle,
            Tab {
                handle,
                binding,
                dirty: false,
                descriptor,
            },
        );
        handle
    }

    /// Opens a tab on a node, or returns the one already open on it.
    pub fn open(&mut self, id: NodeId, path: &str, descriptor: RequestDescriptor) -> TabHandle {
        if let Some(existing) = self.handle_for(id) {
            return existing;
        }
        self.allocate(
            Binding::Node {
                id,
                path: path.to_string(),
            },
            descriptor,
        )
    }

    /// Opens an unsaved tab. Names that could not become a node name fall
    /// back to the default draft name.
    pub fn open_draft(&mut self, name: Option<&str>, descriptor: RequestDescriptor) -> TabHandle {
        let name = name
            .and_then(|n| validate_name(n).ok())
            .unwrap_or_else(|| DEFAULT_DRAFT_NAME.to_string());
        self.allocate(Binding::Draft { name }, descriptor)
    }

    /// Runs `f` on a tab and reports its title if `f` changed it
    fn retitle<F>(&mut self, handle: TabHandle, f: F) -> Result<Option<TitleChange>>
    where
        F: FnOnce(&mut Tab),
    {
        let tab = self.require_mut(handle)?;
        let before = tab.title();
        f(tab);
        let after = tab.title();
        Ok((before != after).then_some(TitleChange {
            handle,
            title: after,
        }))
    }

    /// Stores an edited descriptor and marks the tab dirty
    pub fn edit(
        &mut self,
        handle: TabHandle,
        descriptor: RequestDescriptor,
    ) -> Result<Option<TitleChange>> {
        self.retitle(handle, |tab| {
            tab.descriptor = descriptor;
            tab.dirty = true;
        })
    }

    pub fn mark_dirty(&mut self, handle: TabHandle) -> Result<Option<TitleChange>> {
        self.retitle(handle, |tab| tab.dirty = true)
    }

    pub fn mark_saved(&mut self, handle: TabHandle) -> Result<Option<TitleChange>> {
        self.retitle(handle, |tab| tab.dirty = false)
    }

    /// Binds a draft to the node it was saved as
    pub fn bind(&mut self, handle: TabHandle, id: NodeId, path: &str) -> Result<Option<TitleChange>> {
        self.retitle(handle, |tab| {
            tab.binding = Binding::Node {
                id,
                path: path.to_string(),
            };
        })
    }

    /// Relabels every tab at or below `old_path` after a rename or move.
    pub fn reconcile(&mut self, old_path: &str, new_path: &str) -> Vec<TitleChange> {
        if old_path == new_path {
            return Vec::new();
        }
        let mut changes = Vec::new();
        for tab in self.tabs.values_mut() {
            if let Binding::Node { path, .. } = &mut tab.binding {
                if let Some(rebased) = rebase(path, old_path, new_path) {
                    *path = rebased;
                    changes.push(TitleChange {
                        handle: tab.handle,
                        title: tab.title(),
                    });
                }
            }
        }
        changes
    }

    /// Handles tabs whose nodes were removed from the tree.
    pub fn detach_removed<I>(&mut self, removed: I) -> Vec<DetachOutcome>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut outcomes = Vec::new();
        for id in removed {
            let Some(handle) = self.handle_for(id) else {
                continue;
            };
            let Some(tab) = self.tabs.get_mut(&handle) else {
                continue;
            };
            if tab.dirty {
                let name = tab
                    .path()
                    .and_then(|p| p.rsplit(PATH_SEPARATOR).next())
                    .unwrap_or(DEFAULT_DRAFT_NAME)
                    .to_string();
                tab.binding = Binding::Draft { name };
                outcomes.push(DetachOutcome::NeedsConfirmation {
                    handle,
                    title: tab.title(),
                });
            } else {
                self.tabs.remove(&handle);
                outcomes.push(DetachOutcome::Closed(handle));
            }
        }
        outcomes
    }

    pub fn close(&mut self, handle: TabHandle) -> Result<CloseOutcome> {
        if self.require(handle)?.dirty {
            return Ok(CloseOutcome::NeedsConfirmation);
        }
        self.tabs.remove(&handle);
        Ok(CloseOutcome::Closed)
    }

    pub fn close_confirmed(&mut self, handle: TabHandle) -> Result<()> {
        self.tabs
            .remove(&handle)
            .map(|_| ())
            .ok_or(WorkspaceError::UnknownTab(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use pretty_assertions::assert_eq;

    fn open_at(tree: &Tree, tabs: &mut TabRegistry, path: &str) -> TabHandle {
        let id = tree.resolve(path).unwrap();
        tabs.open(id, path, RequestDescriptor::default())
    }

    #[test]
    fn test_at_most_one_tab_per_node() {
        let mut tree = Tree::new();
        tree.create_collection(None, "Auth").unwrap();
        tree.create_request(Some("Auth"), "Login", None).unwrap();
        let mut tabs = TabRegistry::new();

        let first = open_at(&tree, &mut tabs, "Auth/Login");
        let second = open_at(&tree, &mut tabs, "Auth/Login");
        assert_eq!(first, second);
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn test_dirty_marker_follows_edits() {
        let mut tree = Tree::new();
        tree.create_request(None, "Ping", None).unwrap();
        let mut tabs = TabRegistry::new();
        let handle = open_at(&tree, &mut tabs, "Ping");

        let change = tabs.edit(handle, RequestDescriptor::default()).unwrap();
        assert_eq!(change.unwrap().title, "Ping*");
        // already dirty: title unchanged, nothing to report
        assert!(tabs.mark_dirty(handle).unwrap().is_none());
        assert_eq!(tabs.mark_saved(handle).unwrap().unwrap().title, "Ping");
    }

    #[test]
    fn test_draft_names_follow_node_naming_rules() {
        let mut tabs = TabRegistry::new();
        let starred = tabs.open_draft(Some("x*"), RequestDescriptor::default());
        let nested = tabs.open_draft(Some("a/b"), RequestDescriptor::default());
        let padded = tabs.open_draft(Some("  Ping "), RequestDescriptor::default());

        let starred = tabs.get(starred).unwrap();
        assert!(!starred.is_dirty());
        assert_eq!(starred.title(), DEFAULT_DRAFT_NAME);
        assert_eq!(tabs.get(nested).unwrap().title(), DEFAULT_DRAFT_NAME);
        assert_eq!(tabs.get(padded).unwrap().title(), "Ping");
    }

    #[test]
    fn test_reconcile_matches_whole_segments() {
        let mut tree = Tree::new();
        tree.create_collection(None, "Auth").unwrap();
        tree.create_collection(None, "Authority").unwrap();
        tree.create_request(Some("Auth"), "Login", None).unwrap();
        tree.create_request(Some("Authority"), "Check", None).unwrap();
        let mut tabs = TabRegistry::new();
        let login = open_at(&tree, &mut tabs, "Auth/Login");
        let check = open_at(&tree, &mut tabs, "Authority/Check");
        tabs.mark_dirty(login).unwrap();

        let changes = tabs.reconcile("Auth", "Identity");
        assert_eq!(
            changes,
            vec![TitleChange {
                handle: login,
                title: "Identity/Login*".to_string()
            }]
        );
        assert_eq!(tabs.get(check).unwrap().title(), "Authority/Check");
    }

    #[test]
    fn test_close_dirty_needs_confirmation() {
        let mut tabs = TabRegistry::new();
        let handle = tabs.open_draft(None, RequestDescriptor::default());
        assert_eq!(tabs.get(handle).unwrap().title(), DEFAULT_DRAFT_NAME);
        tabs.mark_dirty(handle).unwrap();

        assert_eq!(tabs.close(handle).unwrap(), CloseOutcome::NeedsConfirmation);
        assert_eq!(tabs.len(), 1);
        tabs.close_confirmed(handle).unwrap();
        assert!(tabs.is_empty());
        assert!(matches!(
            tabs.close(handle),
            Err(WorkspaceError::UnknownTab(_))
        ));
    }

    #[test]
    fn test_detach_removed_keeps_dirty_edits() {
        let mut tree = Tree::new();
        tree.create_collection(None, "Auth").unwrap();
        tree.create_request(Some("Auth"), "Login", None).unwrap();
        tree.create_request(Some("Auth"), "Logout", None).unwrap();
        let mut tabs = TabRegistry::new();
        let login = open_at(&tree, &mut tabs, "Auth/Login");
        let logout = open_at(&tree, &mut tabs, "Auth/Logout");
        tabs.mark_dirty(login).unwrap();

        let removed = tree.delete("Auth").unwrap();
        let outcomes = tabs.detach_removed(removed.iter().map(|r| r.id));
        assert_eq!(
            outcomes,
            vec![
                DetachOutcome::NeedsConfirmation {
                    handle: login,
                    title: "Login*".to_string()
                },
                DetachOutcome::Closed(logout),
            ]
        );
        assert!(tabs.get(login).unwrap().node().is_none());
    }

    #[test]
    fn test_bind_draft_after_save_as() {
        let mut tree = Tree::new();
        let mut tabs = TabRegistry::new();
        let handle = tabs.open_draft(Some("Scratch"), RequestDescriptor::default());
        let id = tree.create_request(None, "Scratch", None).unwrap();
        tabs.bind(handle, id, "Scratch").unwrap();
        assert_eq!(tabs.handle_for(id), Some(handle));
        assert_eq!(tabs.get(handle).unwrap().path(), Some("Scratch"));
    }
}
