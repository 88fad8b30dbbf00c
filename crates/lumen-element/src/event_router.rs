//! DOM event router
//!
//! One listener per managed event type sits on the document. When an event
//! arrives it walks from the deepest original target up to the document,
//! crossing shadow roots into their hosts, and hands the event to every
//! upgraded component on the way.

use std::cell::RefCell;
use std::rc::Rc;

use lumen_dom::{Document, Event, Listener, ListenerId, ListenerOptions, NodeId, WeakDocument};

/// Native event types delivered to convention handlers
pub const MANAGED_EVENTS: [&str; 25] = [
    "click",
    "dblclick",
    "contextmenu",
    "keydown",
    "keypress",
    "keyup",
    "mousedown",
    "mouseout",
    "mouseover",
    "mouseup",
    "select",
    "selectstart",
    "dragstart",
    "dragenter",
    "dragover",
    "dragleave",
    "dragend",
    "drop",
    "paste",
    "cut",
    "input",
    "touchstart",
    "touchend",
    "touchmove",
    "touchcancel",
];

/// Document flag set by the first router that installs its listeners
pub const ROUTER_FLAG: &str = "lumen/event-router";

pub struct EventRouter {
    doc: WeakDocument,
    listener: Listener,
    registrations: RefCell<Vec<ListenerId>>,
}

impl EventRouter {
    pub fn new(doc: &Document) -> Self {
        let weak = doc.downgrade();
        let listener: Listener = Rc::new(move |event: &mut Event| {
            if let Some(doc) = weak.upgrade() {
                route_event(&doc, event);
            }
        });
        Self {
            doc: doc.downgrade(),
            listener,
            registrations: RefCell::new(Vec::new()),
        }
    }

    /// Install the document listeners. Does nothing when any router already
    /// did so for this document; returns whether this call installed them.
    pub fn start(&self) -> bool {
        let Some(doc) = self.doc.upgrade() else {
            return false;
        };
        if !doc.set_global_flag(ROUTER_FLAG) {
            tracing::debug!("Event router already installed");
            return false;
        }
        let mut registrations = self.registrations.borrow_mut();
        for event_type in MANAGED_EVENTS {
            registrations.push(doc.add_event_listener(
                doc.root(),
                event_type,
                self.listener.clone(),
                ListenerOptions::default(),
            ));
        }
        tracing::debug!(events = MANAGED_EVENTS.len(), "Event router started");
        true
    }

    /// Remove the listeners this router installed
    pub fn stop(&self) {
        let registrations = std::mem::take(&mut *self.registrations.borrow_mut());
        if let Some(doc) = self.doc.upgrade() {
            for id in registrations {
                doc.remove_event_listener(doc.root(), id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.registrations.borrow().is_empty()
    }
}

/// Hand `event` to the components between its original target and the
/// document, stopping once a handler stops propagation.
pub fn route_event(doc: &Document, event: &mut Event) {
    let mut current = event.composed_path().first().copied().or(event.target());
    while let Some(node) = current {
        if !doc.is_element(node) {
            break;
        }
        if let Some(sink) = doc.reactions_for(node) {
            sink.native_event(node, event);
            if event.is_immediate_propagation_stopped() || event.is_propagation_stopped() {
                break;
            }
        }
        current = parent_across_shadow(doc, node);
    }
}

fn parent_across_shadow(doc: &Document, node: NodeId) -> Option<NodeId> {
    let parent = doc.parent(node)?;
    Some(doc.host(parent).unwrap_or(parent))
}
