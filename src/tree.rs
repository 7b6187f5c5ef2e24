//! Node store - the collection/request tree
//!
//! Nodes live in an arena keyed by a stable [`NodeId`]. A node's path is
//! never stored: it is recomputed from the parent chain, so renaming or
//! moving a collection changes every descendant's path at once while ids
//! stay put.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::constants::{DIRTY_MARKER, PATH_SEPARATOR};
use crate::error::{Result, WorkspaceError};
use crate::models::{NodeKind, RequestDescriptor};
use crate::placement::{can_drop, DropTarget};

/// Stable identity of a node, independent of its position in the tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Uuid);

impl NodeId {
    fn new() -> Self {
        NodeId(Uuid::now_v7())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A collection or request in the tree
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Only requests carry one, and only after their first save
    pub descriptor: Option<RequestDescriptor>,
}

impl Node {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Path of a node before and after a rename or move
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathChange {
    pub id: NodeId,
    pub old_path: String,
    pub new_path: String,
}

impl PathChange {
    pub fn is_noop(&self) -> bool {
        self.old_path == self.new_path
    }
}

/// A node removed by [`Tree::delete`], with the path it had
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedNode {
    pub id: NodeId,
    pub path: String,
    pub kind: NodeKind,
}

/// Counts from [`Tree::merge_from`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Joins names into a path string
pub fn join_path<S: AsRef<str>>(names: &[S]) -> String {
    let mut path = String::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(name.as_ref());
    }
    path
}

/// Checks a user-supplied name and returns it trimmed
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(PATH_SEPARATOR) || trimmed.contains(DIRTY_MARKER) {
        return Err(WorkspaceError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// The workspace tree
#[derive(Clone, Debug, Default)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|n| n.kind)
    }

    pub fn descriptor(&self, id: NodeId) -> Option<&RequestDescriptor> {
        self.nodes.get(&id).and_then(|n| n.descriptor.as_ref())
    }

    /// Current path of a node, recomputed from its ancestors
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        Some(join_path(&names))
    }

    /// Finds the node at `path`
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let mut parent = None;
        let mut found = None;
        for segment in path.split(PATH_SEPARATOR) {
            let id = self.child_named(parent, segment)?;
            found = Some(id);
            parent = Some(id);
        }
        found
    }

    /// Every path in the tree, pre-order
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(path) = self.path_of(id) {
                out.push(path);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// `id` itself plus all its descendants, pre-order
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(&current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// True when `ancestor` is `id` or lies on its parent chain
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    fn siblings(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => self.children(id),
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> &mut Vec<NodeId> {
        match parent.and_then(|id| self.nodes.get_mut(&id)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    fn child_named(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        self.siblings(parent)
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    fn require(&self, path: &str) -> Result<NodeId> {
        self.resolve(path)
            .ok_or_else(|| WorkspaceError::NotFound(path.to_string()))
    }

    fn describe_parent(&self, parent: Option<NodeId>) -> String {
        match parent.and_then(|id| self.path_of(id)) {
            Some(path) => format!("'{}'", path),
            None => String::from("the tree root"),
        }
    }

    fn ensure_unique(&self, parent: Option<NodeId>, name: &str, except: Option<NodeId>) -> Result<()> {
        match self.child_named(parent, name) {
            Some(existing) if Some(existing) != except => Err(WorkspaceError::DuplicateName {
                name: name.to_string(),
                parent: self.describe_parent(parent),
            }),
            _ => Ok(()),
        }
    }

    /// Resolves an optional parent path and checks it can hold a `kind`
    fn resolve_parent(&self, parent: Option<&str>, kind: NodeKind) -> Result<Option<NodeId>> {
        let Some(path) = parent else {
            return Ok(None);
        };
        let id = self.require(path)?;
        let target = DropTarget::Node(self.nodes[&id].kind);
        if !can_drop(kind, target) {
            return Err(WorkspaceError::InvalidPlacement {
                source_kind: kind,
                target,
                detail: "requests have no child slot",
            });
        }
        Ok(Some(id))
    }

    fn insert(
        &mut self,
        parent: Option<NodeId>,
        name: String,
        kind: NodeKind,
        descriptor: Option<RequestDescriptor>,
    ) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(
            id,
            Node {
                id,
                name,
                kind,
                parent,
                children: Vec::new(),
                descriptor,
            },
        );
        self.siblings_mut(parent).push(id);
        id
    }

    /// Creates a collection at the root (`parent == None`) or inside a collection
    pub fn create_collection(&mut self, parent: Option<&str>, name: &str) -> Result<NodeId> {
        let name = validate_name(name)?;
        let parent = self.resolve_parent(parent, NodeKind::Collection)?;
        self.ensure_unique(parent, &name, None)?;
        Ok(self.insert(parent, name, NodeKind::Collection, None))
    }

    /// Creates a request; its descriptor may be materialized later
    pub fn create_request(
        &mut self,
        parent: Option<&str>,
        name: &str,
        descriptor: Option<RequestDescriptor>,
    ) -> Result<NodeId> {
        let name = validate_name(name)?;
        let parent = self.resolve_parent(parent, NodeKind::Request)?;
        self.ensure_unique(parent, &name, None)?;
        Ok(self.insert(parent, name, NodeKind::Request, descriptor))
    }

    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<PathChange> {
        let id = self.require(path)?;
        let name = validate_name(new_name)?;
        let parent = self.nodes[&id].parent;
        self.ensure_unique(parent, &name, Some(id))?;

        let old_path = path.to_string();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = name;
        }
        let new_path = self.path_of(id).unwrap_or_default();
        Ok(PathChange {
            id,
            old_path,
            new_path,
        })
    }

    /// Re-parents `source` under `target_parent` (`None` is the root).
    pub fn move_node(&mut self, source: &str, target_parent: Option<&str>) -> Result<PathChange> {
        let id = self.require(source)?;
        let kind = self.nodes[&id].kind;
        let target_id = match target_parent {
            Some(path) => Some(self.require(path)?),
            None => None,
        };
        let target = match target_id {
            Some(t) => DropTarget::Node(self.nodes[&t].kind),
            None => DropTarget::Root,
        };

        if !can_drop(kind, target) {
            return Err(WorkspaceError::InvalidPlacement {
                source_kind: kind,
                target,
                detail: "requests have no child slot",
            });
        }
        if let Some(t) = target_id {
            if self.is_within(t, id) {
                return Err(WorkspaceError::InvalidPlacement {
                    source_kind: kind,
                    target,
                    detail: "a collection cannot move into itself or its own descendant",
                });
            }
        }

        let old_path = self.path_of(id).unwrap_or_default();
        let current_parent = self.nodes[&id].parent;
        if current_parent == target_id {
            return Ok(PathChange {
                id,
                old_path: old_path.clone(),
                new_path: old_path,
            });
        }
        let name = self.nodes[&id].name.clone();
        self.ensure_unique(target_id, &name, Some(id))?;

        self.siblings_mut(current_parent).retain(|c| *c != id);
        self.siblings_mut(target_id).push(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = target_id;
        }

        let new_path = self.path_of(id).unwrap_or_default();
        Ok(PathChange {
            id,
            old_path,
            new_path,
        })
    }

    /// Removes the node at `path` with its whole subtree.
    ///
    /// Returns every removed node, pre-order, with the path it had.
    pub fn delete(&mut self, path: &str) -> Result<Vec<RemovedNode>> {
        let id = self.require(path)?;
        let removed: Vec<RemovedNode> = self
            .subtree(id)
            .into_iter()
            .filter_map(|n| {
                Some(RemovedNode {
                    id: n,
                    path: self.path_of(n)?,
                    kind: self.nodes[&n].kind,
                })
            })
            .collect();

        let parent = self.nodes[&id].parent;
        self.siblings_mut(parent).retain(|c| *c != id);
        for node in &removed {
            self.nodes.remove(&node.id);
        }
        Ok(removed)
    }

    pub fn set_descriptor(&mut self, path: &str, descriptor: RequestDescriptor) -> Result<()> {
        let id = self.require(path)?;
        self.set_descriptor_by_id(id, descriptor)
    }

    pub fn set_descriptor_by_id(&mut self, id: NodeId, descriptor: RequestDescriptor) -> Result<()> {
        let path = self.path_of(id);
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;
        if node.kind != NodeKind::Request {
            return Err(WorkspaceError::NotARequest(path.unwrap_or_default()));
        }
        node.descriptor = Some(descriptor);
        Ok(())
    }

    /// Grafts `other` under the existing roots.
    ///
    /// Same-named collections merge recursively, same-named requests take
    /// the incoming descriptor, and collection/request clashes are skipped.
    pub fn merge_from(&mut self, other: &Tree) -> MergeReport {
        let mut report = MergeReport::default();
        self.merge_children(None, other, other.roots(), &mut report);
        report
    }

    fn merge_children(
        &mut self,
        parent: Option<NodeId>,
        other: &Tree,
        incoming: &[NodeId],
        report: &mut MergeReport,
    ) {
        for &src_id in incoming {
            let Some(src) = other.get(src_id) else {
                continue;
            };
            match self.child_named(parent, &src.name) {
                None => {
                    report.added += self.copy_subtree(parent, other, src_id);
                }
                Some(existing) => match (self.nodes[&existing].kind, src.kind) {
                    (NodeKind::Collection, NodeKind::Collection) => {
                        self.merge_children(Some(existing), other, src.children(), report);
                    }
                    (NodeKind::Request, NodeKind::Request) => {
                        if let (Some(descriptor), Some(node)) =
                            (src.descriptor.clone(), self.nodes.get_mut(&existing))
                        {
                            node.descriptor = Some(descriptor);
                        }
                        report.updated += 1;
                    }
                    (existing_kind, incoming_kind) => {
                        tracing::warn!(
                            name = %src.name,
                            existing = %existing_kind,
                            incoming = %incoming_kind,
                            "Skipping imported node that clashes with an existing node of another kind"
                        );
                        report.skipped += 1;
                    }
                },
            }
        }
    }

    fn copy_subtree(&mut self, parent: Option<NodeId>, other: &Tree, src_id: NodeId) -> usize {
        let Some(src) = other.get(src_id) else {
            return 0;
        };
        let id = self.insert(parent, src.name.clone(), src.kind, src.descriptor.clone());
        let mut copied = 1;
        for &child in src.children() {
            copied += self.copy_subtree(Some(id), other, child);
        }
        copied
    }
}
