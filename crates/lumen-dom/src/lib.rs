//! Lumen DOM - Document Object Model
//!
//! Arena-allocated DOM tree exposing the browser surface a component runtime
//! relies on: attributes and own properties, shadow roots with named slot
//! assignment, custom element definitions and reactions, mutation observers
//! and event dispatch with capture, bubbling and composed paths.
//!
//! The model is single threaded. [`Document`] is a cheap `Rc` handle; it never
//! holds an internal borrow while running author callbacks, so listeners and
//! reactions are free to call back into it.

mod custom_elements;
mod deferred;
mod document;
mod events;
mod node;
mod observer;
mod serialize;
mod shadow;
mod tree;
mod tree_walker;
mod value;

pub use custom_elements::{
    CustomElementDefinition, CustomElementRegistry, ElementReactions, is_valid_custom_element_name,
};
pub use deferred::{Deferred, Promise};
pub use document::{Document, WeakDocument};
pub use events::{Event, EventInit, EventPhase, Listener, ListenerId, ListenerOptions};
pub use node::{Attribute, CustomState, ElementData, Namespace, Node, NodeData, NodeType};
pub use observer::{MutationCallback, MutationObserverInit, MutationRecord, MutationType};
pub use tree::DomTree;
pub use tree_walker::{TreeWalker, WhatToShow};
pub use value::Value;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID (the document node of a [`Document`])
    pub const ROOT: NodeId = NodeId(0);

    /// Arena index of this node
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// DOM errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    NotFound(NodeId),

    #[error("cannot insert {child:?} into {parent:?}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("element {0:?} already hosts a shadow root")]
    ShadowRootExists(NodeId),

    #[error("a mutation observer is already assigned to node {0:?}")]
    AlreadyObserved(NodeId),

    #[error("invalid custom element name: {0}")]
    InvalidName(String),

    #[error("custom element {0} is already defined")]
    AlreadyDefined(String),

    #[error("cannot assign property {0}")]
    ReadOnlyProperty(String),
}
