//! Drop validation - decides whether a node may be re-parented under a target

use std::fmt;

use crate::models::NodeKind;

/// Where a dragged node is dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty space in the tree view; behaves like a collection.
    Root,
    Node(NodeKind),
}

impl DropTarget {
    /// The kind the target behaves as
    pub fn effective_kind(&self) -> NodeKind {
        match self {
            DropTarget::Root => NodeKind::Collection,
            DropTarget::Node(kind) => *kind,
        }
    }
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropTarget::Root => f.write_str("the tree root"),
            DropTarget::Node(kind) => write!(f, "a {}", kind),
        }
    }
}

/// Only collections have a child slot.
pub fn can_place(source: NodeKind, target: NodeKind) -> bool {
    match (source, target) {
        (NodeKind::Collection, NodeKind::Collection) => true,
        (NodeKind::Request, NodeKind::Collection) => true,
        (NodeKind::Collection, NodeKind::Request) => false,
        (NodeKind::Request, NodeKind::Request) => false,
    }
}

pub fn can_drop(source: NodeKind, target: DropTarget) -> bool {
    can_place(source, target.effective_kind())
}
