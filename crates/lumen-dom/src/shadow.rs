//! Shadow DOM
//!
//! Shadow root attachment, composed-tree navigation and named slot
//! assignment. Assignment is computed on demand from the host's light
//! children and their `slot` attributes.

use crate::node::NodeData;
use crate::tree::DomTree;
use crate::{DomError, NodeId};

impl DomTree {
    /// Attach an open shadow root to an element
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, DomError> {
        let element = self.element(host).ok_or(DomError::NotAnElement(host))?;
        if element.shadow_root.is_some() {
            return Err(DomError::ShadowRootExists(host));
        }
        let root = self.create_shadow_root(host);
        if let Some(element) = self.element_mut(host) {
            element.shadow_root = Some(root);
        }
        Ok(root)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host)?.shadow_root
    }

    /// Host of a shadow root
    pub fn shadow_host(&self, root: NodeId) -> Option<NodeId> {
        match self.get(root)?.data {
            NodeData::ShadowRoot { host } => Some(host),
            _ => None,
        }
    }

    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        self.shadow_host(id).is_some()
    }

    /// Parent, or the host when `id` is a shadow root
    pub fn parent_or_host(&self, id: NodeId) -> Option<NodeId> {
        self.shadow_host(id).or_else(|| self.parent(id))
    }

    /// Whether `ancestor` is `node` or an ancestor of it in the composed tree
    pub fn is_shadow_including_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_or_host(id);
        }
        false
    }

    /// Connected nodes reach a document through parents and hosts
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(next) = self.parent_or_host(current) {
            current = next;
        }
        matches!(self.get(current).map(|n| &n.data), Some(NodeData::Document))
    }

    /// `node` and its descendants, entering shadow trees right after their hosts
    pub fn shadow_including_inclusive_descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children: Vec<NodeId> = self.children(id).collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
            if let Some(root) = self.shadow_root(id) {
                stack.push(root);
            }
        }
        out
    }

    /// Name of a `<slot>` element ("" for the default slot)
    pub fn slot_name(&self, slot: NodeId) -> &str {
        self.attribute(slot, "name").unwrap_or("")
    }

    pub fn is_slot(&self, id: NodeId) -> bool {
        self.local_name(id) == Some("slot")
    }

    /// Slot name a light child asks for; `None` for nodes that are never slotted
    pub fn requested_slot(&self, node: NodeId) -> Option<&str> {
        match self.get(node).map(|n| &n.data) {
            Some(NodeData::Element(e)) => Some(e.get_attr("slot").unwrap_or("")),
            Some(NodeData::Text(_)) => Some(""),
            _ => None,
        }
    }

    /// Nodes assigned to a slot. With `flatten`, nested slots are replaced by
    /// their own assignment and an empty slot yields its fallback content.
    pub fn assigned_nodes(&self, slot: NodeId, flatten: bool) -> Vec<NodeId> {
        let root = self.root(slot);
        let Some(host) = self.shadow_host(root) else {
            return Vec::new();
        };
        let name = self.slot_name(slot);

        // only the first slot with a given name receives nodes
        let first_slot = self
            .descendants(root)
            .into_iter()
            .find(|&n| self.is_slot(n) && self.slot_name(n) == name);
        let assigned: Vec<NodeId> = if first_slot == Some(slot) {
            self.children(host)
                .filter(|&c| self.requested_slot(c) == Some(name))
                .collect()
        } else {
            Vec::new()
        };
        if !flatten {
            return assigned;
        }

        let source = if assigned.is_empty() {
            self.children(slot)
                .filter(|&c| self.requested_slot(c).is_some())
                .collect()
        } else {
            assigned
        };
        let mut out = Vec::new();
        for node in source {
            if self.is_slot(node) && self.is_shadow_root(self.root(node)) {
                out.extend(self.assigned_nodes(node, true));
            } else {
                out.push(node);
            }
        }
        out
    }
}
