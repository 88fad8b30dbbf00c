//! DOM Tree (arena-based allocation)
//!
//! Raw structural operations. [`crate::Document`] layers reactions, observers
//! and events on top; template skeletons use a bare tree directly.

use crate::custom_elements::is_valid_custom_element_name;
use crate::node::{CustomState, ElementData, Namespace, Node, NodeData, NodeType};
use crate::tree_walker::{TreeWalker, WhatToShow};
use crate::{DomError, NodeId};

/// Arena-based DOM tree for memory efficiency
#[derive(Debug, Default, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

/// Iterator over the children of a node
pub struct Children<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next_sibling(current);
        Some(current)
    }
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.get_mut(id).ok_or(DomError::NotFound(id))
    }

    pub(crate) fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    pub fn create_document(&mut self) -> NodeId {
        self.push(NodeData::Document)
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeData::DocumentFragment)
    }

    pub fn create_element(&mut self, local_name: &str, namespace: Namespace) -> NodeId {
        let mut data = ElementData::new(local_name, namespace);
        if is_valid_custom_element_name(local_name) {
            data.custom_state = CustomState::Undefined;
        }
        self.push(NodeData::Element(data))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(NodeData::Text(content.to_string()))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(NodeData::Comment(content.to_string()))
    }

    pub(crate) fn create_shadow_root(&mut self, host: NodeId) -> NodeId {
        self.push(NodeData::ShadowRoot { host })
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.prev_sibling
    }

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// Element children only
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).filter(|&c| self.is_element(c)).collect()
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(Node::node_type)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_element)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id)?.as_element()
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id)?.as_element_mut()
    }

    /// Local name of an element
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.local_name.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.get_attr(name)
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<Option<String>, DomError> {
        let element = self.element_mut(id).ok_or(DomError::NotAnElement(id))?;
        Ok(element.set_attr(name, value))
    }

    /// Remove an attribute, returning the previous value
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>, DomError> {
        let element = self.element_mut(id).ok_or(DomError::NotAnElement(id))?;
        Ok(element.remove_attr(name))
    }

    /// Data of a text or comment node
    pub fn character_data(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.character_data()
    }

    /// Replace the data of a text or comment node, returning the old data
    pub fn set_character_data(&mut self, id: NodeId, data: &str) -> Result<String, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(t) | NodeData::Comment(t) => Ok(std::mem::replace(t, data.to_string())),
            _ => Err(DomError::HierarchyRequest { parent: id, child: id }),
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(t)) | Some(NodeData::Comment(t)) => t.clone(),
            Some(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match self.get(d).map(|n| &n.data) {
                    Some(NodeData::Text(t)) => Some(t.as_str()),
                    _ => None,
                })
                .collect(),
            None => String::new(),
        }
    }

    /// Whether `ancestor` is `node` or one of its (light tree) ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Topmost ancestor (a document, fragment, shadow root or detached node)
    pub fn root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// All descendants in tree order, excluding `root`
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut walker = TreeWalker::new(root, WhatToShow::ALL);
        let mut out = Vec::new();
        while let Some(id) = walker.next_node(self) {
            out.push(id);
        }
        out
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append `child` to `parent`, returning the nodes actually inserted
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<Vec<NodeId>, DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end). Fragments insert
    /// their children. Returns the nodes actually inserted.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<Vec<NodeId>, DomError> {
        if !self.node(parent)?.is_container() {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        let child_type = self.node(child)?.node_type();
        if matches!(child_type, NodeType::Document | NodeType::ShadowRoot)
            || self.is_inclusive_ancestor(child, parent)
        {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        let mut reference = reference;
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotAChild { parent, child: r });
            }
            if r == child {
                reference = self.next_sibling(child);
            }
        }

        if child_type == NodeType::DocumentFragment {
            let moved: Vec<NodeId> = self.children(child).collect();
            for &node in &moved {
                self.detach(node)?;
                self.link(parent, node, reference);
            }
            return Ok(moved);
        }

        self.detach(child)?;
        self.link(parent, child, reference);
        Ok(vec![child])
    }

    fn link(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let prev = match reference {
            Some(r) => self.nodes[r.index()].prev_sibling,
            None => self.nodes[parent.index()].last_child,
        };
        {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        match reference {
            Some(r) => self.nodes[r.index()].prev_sibling = Some(child),
            None => self.nodes[parent.index()].last_child = Some(child),
        }
    }

    /// Unlink a node from its parent, returning the old parent
    pub fn detach(&mut self, id: NodeId) -> Result<Option<NodeId>, DomError> {
        let (parent, prev, next) = {
            let node = self.node(id)?;
            match node.parent {
                Some(parent) => (parent, node.prev_sibling, node.next_sibling),
                None => return Ok(None),
            }
        };
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = next,
            None => self.nodes[parent.index()].first_child = next,
        }
        match next {
            Some(n) => self.nodes[n.index()].prev_sibling = prev,
            None => self.nodes[parent.index()].last_child = prev,
        }
        let node = &mut self.nodes[id.index()];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        Ok(Some(parent))
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child)?;
        Ok(())
    }

    /// Copy a node (and optionally its subtree) from another tree into this one.
    /// Shadow roots and own properties are not copied.
    pub fn import_node(&mut self, src: &DomTree, node: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let plan = Self::copy_plan(src, node, deep)?;
        Ok(self.apply_copy_plan(plan))
    }

    /// Copy a node (and optionally its subtree) within this tree
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let plan = Self::copy_plan(self, node, deep)?;
        Ok(self.apply_copy_plan(plan))
    }

    fn copy_plan(src: &DomTree, node: NodeId, deep: bool) -> Result<Vec<(NodeData, Option<usize>)>, DomError> {
        let mut plan = Vec::new();
        let mut stack = vec![(node, None)];
        while let Some((id, parent_pos)) = stack.pop() {
            let data = match &src.node(id)?.data {
                NodeData::Element(e) => {
                    let mut copy = ElementData::new(&e.local_name, e.namespace);
                    copy.attrs = e.attrs.clone();
                    if is_valid_custom_element_name(&e.local_name) {
                        copy.custom_state = CustomState::Undefined;
                    }
                    NodeData::Element(copy)
                }
                NodeData::Document | NodeData::ShadowRoot { .. } => {
                    return Err(DomError::HierarchyRequest { parent: id, child: id });
                }
                other => other.clone(),
            };
            let pos = plan.len();
            plan.push((data, parent_pos));
            if deep {
                let children: Vec<NodeId> = src.children(id).collect();
                for child in children.into_iter().rev() {
                    stack.push((child, Some(pos)));
                }
            }
        }
        Ok(plan)
    }

    fn apply_copy_plan(&mut self, plan: Vec<(NodeData, Option<usize>)>) -> NodeId {
        let mut ids: Vec<NodeId> = Vec::with_capacity(plan.len());
        for (data, parent_pos) in plan {
            let id = self.push(data);
            if let Some(pos) = parent_pos {
                self.link(ids[pos], id, None);
            }
            ids.push(id);
        }
        ids[0]
    }
}
