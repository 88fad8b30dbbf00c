//! DOM Events
//!
//! Event objects, listener options and propagation paths. Stopping is tracked
//! as two independent flags that callers can query after dispatch.

use std::rc::Rc;

use crate::node::NodeData;
use crate::tree::DomTree;
use crate::{NodeId, Value};

/// Event listener callback
pub type Listener = Rc<dyn Fn(&mut Event)>;

/// Listener registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Listener options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Capture phase
    pub capture: bool,
    /// Auto-remove after the first invocation
    pub once: bool,
    /// `prevent_default` is ignored
    pub passive: bool,
}

/// Event construction flags
#[derive(Debug, Clone, Default)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
    pub detail: Value,
}

/// Dispatch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// DOM event
#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    pub detail: Value,
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
    phase: EventPhase,
    path: Vec<NodeId>,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
    in_passive_listener: bool,
}

impl Event {
    /// Non-bubbling, non-cancelable event
    pub fn new(event_type: &str) -> Self {
        Self::with_init(event_type, EventInit::default())
    }

    pub fn with_init(event_type: &str, init: EventInit) -> Self {
        Self {
            event_type: event_type.to_string(),
            detail: init.detail,
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            composed: init.composed,
            target: None,
            current_target: None,
            phase: EventPhase::None,
            path: Vec::new(),
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            in_passive_listener: false,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Target as seen from the current listener (retargeted across shadow roots)
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    /// Propagation path starting at the original target
    pub fn composed_path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable && !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.immediate_propagation_stopped = true;
    }

    /// Whether `stop_propagation` was called
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Whether `stop_immediate_propagation` was called
    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }

    pub(crate) fn halts_propagation(&self) -> bool {
        self.propagation_stopped || self.immediate_propagation_stopped
    }

    pub(crate) fn begin(&mut self, target: NodeId, path: Vec<NodeId>) {
        self.target = Some(target);
        self.path = path;
    }

    pub(crate) fn enter(&mut self, current: NodeId, target: NodeId, phase: EventPhase) {
        self.current_target = Some(current);
        self.target = Some(target);
        self.phase = phase;
    }

    pub(crate) fn set_passive(&mut self, passive: bool) {
        self.in_passive_listener = passive;
    }

    pub(crate) fn finish(&mut self, original_target: NodeId) {
        self.current_target = None;
        self.phase = EventPhase::None;
        self.target = Some(original_target);
    }
}

/// Propagation path from `target` up to its root, crossing into shadow hosts
/// for composed events.
pub(crate) fn event_path(tree: &DomTree, target: NodeId, composed: bool) -> Vec<NodeId> {
    let mut path = vec![target];
    let mut current = target;
    loop {
        let next = match tree.get(current).map(|n| &n.data) {
            Some(NodeData::ShadowRoot { host }) if composed => Some(*host),
            Some(NodeData::ShadowRoot { .. }) => None,
            Some(_) => tree.parent(current),
            None => None,
        };
        match next {
            Some(node) => {
                path.push(node);
                current = node;
            }
            None => break,
        }
    }
    path
}

/// Retarget `target` against `node`: hide nodes of shadow trees that `node`
/// is not part of.
pub(crate) fn retarget(tree: &DomTree, target: NodeId, node: NodeId) -> NodeId {
    let mut current = target;
    loop {
        let root = tree.root(current);
        match tree.shadow_host(root) {
            Some(host) if !tree.is_shadow_including_inclusive_ancestor(root, node) => current = host,
            _ => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prevent_default_requires_cancelable() {
        let mut event = Event::new("click");
        event.prevent_default();
        assert!(!event.default_prevented());

        let mut event = Event::with_init(
            "click",
            EventInit {
                cancelable: true,
                ..Default::default()
            },
        );
        event.prevent_default();
        assert!(event.default_prevented());
    }

    #[test]
    fn test_stop_flags_are_independent() {
        let mut event = Event::new("keydown");
        event.stop_immediate_propagation();
        assert!(event.is_immediate_propagation_stopped());
        assert!(!event.is_propagation_stopped());
        assert!(event.halts_propagation());
    }
}
