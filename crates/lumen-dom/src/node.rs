//! DOM Node
//!
//! Arena node with sibling links; node-specific payload lives in [`NodeData`].

use std::collections::BTreeMap;

use crate::{NodeId, Value};

/// DOM Node - Core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node
    pub parent: Option<NodeId>,
    /// First child
    pub first_child: Option<NodeId>,
    /// Last child (for O(1) append)
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            data,
        }
    }

    /// Kind of node
    pub fn node_type(&self) -> NodeType {
        match &self.data {
            NodeData::Document => NodeType::Document,
            NodeData::DocumentFragment => NodeType::DocumentFragment,
            NodeData::ShadowRoot { .. } => NodeType::ShadowRoot,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Nodes that may hold children
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(
            self.data,
            NodeData::Document
                | NodeData::DocumentFragment
                | NodeData::ShadowRoot { .. }
                | NodeData::Element(_)
        )
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Text or comment data
    #[inline]
    pub fn character_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) | NodeData::Comment(t) => Some(t),
            _ => None,
        }
    }
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    DocumentFragment,
    ShadowRoot,
    Element,
    Text,
    Comment,
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Detached container whose children move on insertion
    DocumentFragment,
    /// Root of a shadow tree attached to `host`
    ShadowRoot { host: NodeId },
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

/// Element namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

/// Custom element state of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomState {
    /// Built-in element
    #[default]
    Uncustomized,
    /// Valid custom element name without a definition (yet)
    Undefined,
    /// Upgraded custom element
    Custom,
}

/// Element-specific data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Local name (lowercase for HTML)
    pub local_name: String,
    pub namespace: Namespace,
    pub attrs: Vec<Attribute>,
    /// Own properties assigned through script before an upgrade
    pub properties: BTreeMap<String, Value>,
    pub shadow_root: Option<NodeId>,
    pub custom_state: CustomState,
}

impl ElementData {
    pub fn new(local_name: &str, namespace: Namespace) -> Self {
        Self {
            local_name: local_name.to_string(),
            namespace,
            attrs: Vec::new(),
            properties: BTreeMap::new(),
            shadow_root: None,
            custom_state: CustomState::Uncustomized,
        }
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, returning the previous value
    pub fn set_attr(&mut self, name: &str, value: &str) -> Option<String> {
        // Check if attribute already exists
        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                return Some(std::mem::replace(&mut attr.value, value.to_string()));
            }
        }
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        None
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(pos).value)
    }
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}
