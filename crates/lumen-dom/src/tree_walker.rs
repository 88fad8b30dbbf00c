//! TreeWalker
//!
//! Pre-order traversal of a subtree with node type filtering. Shadow trees are
//! not entered; they are separate roots.

use crate::node::NodeType;
use crate::tree::DomTree;
use crate::NodeId;

/// What types of nodes to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhatToShow(u32);

impl WhatToShow {
    pub const ALL: WhatToShow = WhatToShow(0xFFFFFFFF);
    pub const ELEMENT: WhatToShow = WhatToShow(0x1);
    pub const TEXT: WhatToShow = WhatToShow(0x4);
    pub const COMMENT: WhatToShow = WhatToShow(0x80);
    pub const DOCUMENT: WhatToShow = WhatToShow(0x100);
    pub const DOCUMENT_FRAGMENT: WhatToShow = WhatToShow(0x400);

    /// Check if a node type is shown
    pub fn includes(self, node_type: NodeType) -> bool {
        let flag = match node_type {
            NodeType::Element => Self::ELEMENT.0,
            NodeType::Text => Self::TEXT.0,
            NodeType::Comment => Self::COMMENT.0,
            NodeType::Document => Self::DOCUMENT.0,
            NodeType::DocumentFragment | NodeType::ShadowRoot => Self::DOCUMENT_FRAGMENT.0,
        };
        (self.0 & flag) != 0
    }

    /// Union of two WhatToShow filters
    pub fn or(self, other: WhatToShow) -> WhatToShow {
        WhatToShow(self.0 | other.0)
    }
}

impl Default for WhatToShow {
    fn default() -> Self {
        Self::ALL
    }
}

/// TreeWalker for navigating the DOM tree
#[derive(Debug, Clone)]
pub struct TreeWalker {
    /// The root node of the traversal
    pub root: NodeId,
    /// What types of nodes to show
    pub what_to_show: WhatToShow,
    current_node: NodeId,
}

impl TreeWalker {
    /// Create a new TreeWalker
    pub fn new(root: NodeId, what_to_show: WhatToShow) -> Self {
        Self {
            root,
            what_to_show,
            current_node: root,
        }
    }

    /// Get the current node
    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// Advance to the next shown node in tree order
    pub fn next_node(&mut self, tree: &DomTree) -> Option<NodeId> {
        let mut node = self.current_node;
        loop {
            node = self.following(tree, node)?;
            if tree
                .node_type(node)
                .is_some_and(|t| self.what_to_show.includes(t))
            {
                self.current_node = node;
                return Some(node);
            }
        }
    }

    /// Next node in pre-order, bounded by the root
    fn following(&self, tree: &DomTree, node: NodeId) -> Option<NodeId> {
        if let Some(child) = tree.first_child(node) {
            return Some(child);
        }
        let mut current = node;
        while current != self.root {
            if let Some(next) = tree.next_sibling(current) {
                return Some(next);
            }
            current = tree.parent(current)?;
        }
        None
    }
}
