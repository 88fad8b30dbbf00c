//! Component instances
//!
//! Every upgraded element owns a [`ComponentCore`] holding its validated
//! state and lifecycle bookkeeping. Authors see components through
//! [`ElementRef`], a cheap handle pairing the core with its runtime.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use lumen_dom::{Deferred, Document, Event, EventInit, ListenerId, NodeId, Promise, Value};

use crate::ElementError;
use crate::class::ElementClass;
use crate::metadata::ElementMetadata;
use crate::runtime::Runtime;

/// Prefix of the namespaced twin of every fired event
pub const EVENT_PREFIX: &str = "lumen-";

/// Child property changes a slot reacts to
#[derive(Debug, Clone, Default)]
pub(crate) struct MonitoredProps {
    pub(crate) observed: Vec<String>,
    pub(crate) excluded: Vec<String>,
}

impl MonitoredProps {
    pub(crate) fn matches(&self, name: &str) -> bool {
        self.observed.iter().any(|p| p == name) && !self.excluded.iter().any(|p| p == name)
    }
}

#[derive(Default)]
pub(crate) struct SlotBookkeeping {
    /// Bumped by every slot update; stale asynchronous updates are dropped
    pub(crate) generation: u64,
    pub(crate) monitored: HashMap<String, MonitoredProps>,
    pub(crate) listeners: Vec<(NodeId, ListenerId)>,
    pub(crate) individual: Vec<(NodeId, String)>,
}

pub struct ComponentCore {
    pub(crate) host: NodeId,
    pub(crate) class: Rc<ElementClass>,
    pub(crate) metadata: Rc<ElementMetadata>,
    pub(crate) id: String,
    pub(crate) state: RefCell<IndexMap<String, Value>>,
    pub(crate) suppress_invalidation: Cell<bool>,
    pub(crate) connected: Cell<bool>,
    pub(crate) dom_ref_ready: Deferred,
    pub(crate) slots: RefCell<SlotBookkeeping>,
}

impl ComponentCore {
    pub(crate) fn new(host: NodeId, class: Rc<ElementClass>, id: String) -> Self {
        let metadata = class.metadata();
        let state = metadata.initial_state();
        Self {
            host,
            class,
            metadata,
            id,
            state: RefCell::new(state),
            suppress_invalidation: Cell::new(false),
            connected: Cell::new(false),
            dom_ref_ready: Deferred::new(),
            slots: RefCell::new(SlotBookkeeping::default()),
        }
    }

    pub(crate) fn value(&self, name: &str) -> Value {
        self.state.borrow().get(name).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for ComponentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCore")
            .field("host", &self.host)
            .field("tag", &self.class.tag())
            .field("id", &self.id)
            .finish()
    }
}

/// Handle to a live component
#[derive(Clone)]
pub struct ElementRef {
    runtime: Rc<Runtime>,
    core: Rc<ComponentCore>,
}

impl ElementRef {
    pub(crate) fn new(runtime: Rc<Runtime>, core: Rc<ComponentCore>) -> Self {
        Self { runtime, core }
    }

    pub(crate) fn core(&self) -> &Rc<ComponentCore> {
        &self.core
    }

    pub fn host(&self) -> NodeId {
        self.core.host
    }

    /// Per-instance id, `__el<n>`
    pub fn id(&self) -> &str {
        &self.core.id
    }

    pub fn tag(&self) -> &str {
        self.core.class.tag()
    }

    pub fn class(&self) -> &Rc<ElementClass> {
        &self.core.class
    }

    pub fn metadata(&self) -> &ElementMetadata {
        &self.core.metadata
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    pub fn document(&self) -> &Document {
        self.runtime.document()
    }

    /// Current value of a property or slot property
    pub fn get(&self, name: &str) -> Value {
        self.core.value(name)
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).as_bool().unwrap_or(false)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).as_str().map(str::to_string)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).as_f64()
    }

    /// Validated assignment; unchanged values are ignored
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ElementError> {
        self.runtime.set_property(&self.core, name, value.into())
    }

    /// Snapshot of the whole state
    pub fn state(&self) -> IndexMap<String, Value> {
        self.core.state.borrow().clone()
    }

    /// Nodes currently assigned to `slot`, in light DOM order
    pub fn slot(&self, slot: &str) -> Vec<NodeId> {
        let key = self.core.metadata.slot_property_name(slot).to_string();
        nodes_of(&self.get(&key))
    }

    /// Nodes of a slot property with nested `<slot>` elements replaced by the
    /// elements assigned to them
    pub fn get_slotted_nodes(&self, slot_property: &str) -> Vec<NodeId> {
        let doc = self.document();
        let mut nodes = Vec::new();
        for node in nodes_of(&self.get(slot_property)) {
            if doc.local_name(node).as_deref() == Some("slot") {
                nodes.extend(
                    doc.assigned_nodes(node, true)
                        .into_iter()
                        .filter(|&n| doc.is_element(n)),
                );
            } else {
                nodes.push(node);
            }
        }
        nodes
    }

    /// Generated `<slot>-<n>` name of a child in an individual slot
    pub fn individual_slot(&self, child: NodeId) -> Option<String> {
        self.core
            .slots
            .borrow()
            .individual
            .iter()
            .find(|(node, _)| *node == child)
            .map(|(_, name)| name.clone())
    }

    /// Request a deferred re-render
    pub fn invalidate(&self) {
        self.runtime.invalidate(&self.core);
    }

    pub fn shadow_root(&self) -> Option<NodeId> {
        self.document().shadow_root(self.core.host)
    }

    /// Main element of the rendered shadow tree, after the injected style
    pub fn dom_ref(&self) -> Option<NodeId> {
        let root = self.shadow_root()?;
        let children = self.document().element_children(root);
        match children.len() {
            0 => None,
            1 => Some(children[0]),
            _ => Some(children[1]),
        }
    }

    /// Completes after the first render following connection
    pub fn when_dom_ref_ready(&self) -> Promise {
        self.core.dom_ref_ready.promise()
    }

    pub fn is_connected(&self) -> bool {
        self.core.connected.get()
    }

    /// Dispatch `lumen-<name>` and, unless suppressed by the no-conflict
    /// setting, `<name>`. Returns false if either was cancelled.
    pub fn fire_event(&self, name: &str, detail: impl Into<Value>, cancelable: bool) -> bool {
        let doc = self.document();
        let init = EventInit {
            bubbles: true,
            cancelable,
            composed: false,
            detail: detail.into(),
        };
        let prefixed = format!("{EVENT_PREFIX}{name}");
        let namespaced = doc.dispatch_event(self.core.host, &mut Event::with_init(&prefixed, init.clone()));

        if self.runtime.configuration().no_conflict.suppresses(name) {
            return namespaced;
        }
        let plain = doc.dispatch_event(self.core.host, &mut Event::with_init(name, init));
        namespaced && plain
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementRef").field(&self.core).finish()
    }
}

pub(crate) fn nodes_of(value: &Value) -> Vec<NodeId> {
    value
        .as_list()
        .map(|items| items.iter().filter_map(Value::as_node).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitored_props() {
        let monitored = MonitoredProps {
            observed: vec!["text".into(), "icon".into()],
            excluded: vec!["icon".into()],
        };
        assert!(monitored.matches("text"));
        assert!(!monitored.matches("icon"));
        assert!(!monitored.matches("other"));
    }

    #[test]
    fn test_nodes_of() {
        let doc = Document::new();
        let a = doc.create_element("a");
        let list = Value::List(vec![Value::from(a), Value::from("x")]);
        assert_eq!(nodes_of(&list), vec![a]);
        assert!(nodes_of(&Value::Null).is_empty());
    }
}
