//! Edge case tests for lumen-dom
//!
//! Re-entrancy, listener removal during dispatch and shadow boundaries.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use lumen_dom::{
    CustomState, Document, DomError, ElementReactions, Event, EventInit, ListenerOptions,
    MutationObserverInit, NodeId, Value,
};

// ============================================================================
// RE-ENTRANT REACTIONS
// ============================================================================

/// Appends a text child to every connected element
struct Decorator {
    doc: Document,
}

impl ElementReactions for Decorator {
    fn upgrade(&self, _: NodeId) {}

    fn connected(&self, element: NodeId) {
        let text = self.doc.create_text_node("decorated");
        self.doc.append_child(element, text).unwrap();
    }

    fn disconnected(&self, _: NodeId) {}

    fn attribute_changed(&self, _: NodeId, _: &str, _: Option<&str>, _: Option<&str>) {}

    fn set_property(&self, _: NodeId, name: &str, _: &Value) -> Result<bool, DomError> {
        if name == "locked" {
            return Err(DomError::ReadOnlyProperty(name.to_string()));
        }
        Ok(false)
    }
}

#[test]
fn test_reaction_mutates_document() {
    let doc = Document::new();
    let sink: Rc<dyn ElementReactions> = Rc::new(Decorator { doc: doc.clone() });
    doc.define("x-deco", vec![], Rc::downgrade(&sink)).unwrap();

    let el = doc.create_element("x-deco");
    assert_eq!(doc.custom_state(el), Some(CustomState::Custom));
    doc.append_child(doc.body(), el).unwrap();
    assert_eq!(doc.text_content(el), "decorated");
}

#[test]
fn test_property_interception_error() {
    let doc = Document::new();
    let sink: Rc<dyn ElementReactions> = Rc::new(Decorator { doc: doc.clone() });
    doc.define("x-lock", vec![], Rc::downgrade(&sink)).unwrap();
    let el = doc.create_element("x-lock");

    assert_eq!(
        doc.set_property(el, "locked", Value::Bool(true)),
        Err(DomError::ReadOnlyProperty("locked".into()))
    );
    doc.set_property(el, "free", Value::Bool(true)).unwrap();
    assert_eq!(doc.get_property(el, "free"), Value::Bool(true));
}

#[test]
fn test_dropped_sink_is_ignored() {
    let doc = Document::new();
    let weak: Weak<dyn ElementReactions> = {
        let sink: Rc<dyn ElementReactions> = Rc::new(Decorator { doc: doc.clone() });
        Rc::downgrade(&sink)
    };
    doc.define("x-gone", vec![], weak).unwrap();
    let el = doc.create_element("x-gone");
    doc.append_child(doc.body(), el).unwrap();
    assert_eq!(doc.text_content(el), "");
}

#[test]
fn test_invalid_definition_names() {
    let doc = Document::new();
    let sink: Rc<dyn ElementReactions> = Rc::new(Decorator { doc: doc.clone() });
    assert!(matches!(
        doc.define("plain", vec![], Rc::downgrade(&sink)),
        Err(DomError::InvalidName(_))
    ));
}

// ============================================================================
// LISTENERS DURING DISPATCH
// ============================================================================

#[test]
fn test_listener_removed_by_earlier_listener() {
    let doc = Document::new();
    let body = doc.body();
    let hits = Rc::new(Cell::new(0));
    let second_id = Rc::new(Cell::new(None));

    let d = doc.clone();
    let id_slot = second_id.clone();
    doc.add_event_listener(
        body,
        "go",
        Rc::new(move |_e: &mut Event| {
            if let Some(id) = id_slot.get() {
                d.remove_event_listener(body, id);
            }
        }),
        ListenerOptions::default(),
    );
    let counter = hits.clone();
    let id = doc.add_event_listener(
        body,
        "go",
        Rc::new(move |_e: &mut Event| counter.set(counter.get() + 1)),
        ListenerOptions::default(),
    );
    second_id.set(Some(id));

    doc.dispatch_event(body, &mut Event::new("go"));
    assert_eq!(hits.get(), 0);
}

#[test]
fn test_stop_immediate_propagation() {
    let doc = Document::new();
    let body = doc.body();
    let log = Rc::new(RefCell::new(Vec::new()));

    let l = log.clone();
    doc.add_event_listener(
        body,
        "go",
        Rc::new(move |e: &mut Event| {
            l.borrow_mut().push("first");
            e.stop_immediate_propagation();
        }),
        ListenerOptions::default(),
    );
    let l = log.clone();
    doc.add_event_listener(
        body,
        "go",
        Rc::new(move |_e: &mut Event| l.borrow_mut().push("second")),
        ListenerOptions::default(),
    );

    let mut event = Event::with_init("go", EventInit { bubbles: true, ..Default::default() });
    doc.dispatch_event(body, &mut event);
    assert_eq!(*log.borrow(), vec!["first"]);
    assert!(event.is_immediate_propagation_stopped());
    assert!(!event.is_propagation_stopped());
}

#[test]
fn test_passive_listener_cannot_prevent_default() {
    let doc = Document::new();
    doc.add_event_listener(
        doc.body(),
        "wheel",
        Rc::new(|e: &mut Event| e.prevent_default()),
        ListenerOptions {
            passive: true,
            ..Default::default()
        },
    );
    let mut event = Event::with_init("wheel", EventInit { cancelable: true, ..Default::default() });
    assert!(doc.dispatch_event(doc.body(), &mut event));
}

// ============================================================================
// OBSERVERS
// ============================================================================

#[test]
fn test_attribute_filter_and_old_value() {
    let doc = Document::new();
    let el = doc.create_element("div");
    doc.append_child(doc.body(), el).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    doc.observe(
        el,
        MutationObserverInit {
            attributes: true,
            attribute_old_value: true,
            attribute_filter: Some(vec!["title".into()]),
            ..Default::default()
        },
        Rc::new(move |records| {
            for r in records {
                sink.borrow_mut().push((r.attribute_name.unwrap_or_default(), r.old_value));
            }
        }),
    )
    .unwrap();

    doc.set_attribute(el, "title", "a").unwrap();
    doc.set_attribute(el, "class", "ignored").unwrap();
    doc.set_attribute(el, "title", "b").unwrap();
    doc.deliver_mutation_records();

    assert_eq!(
        *seen.borrow(),
        vec![("title".to_string(), None), ("title".to_string(), Some("a".to_string()))]
    );
}

#[test]
fn test_moving_node_between_parents() {
    let doc = Document::new();
    let a = doc.create_element("div");
    let b = doc.create_element("div");
    let child = doc.create_element("span");
    doc.append_child(doc.body(), a).unwrap();
    doc.append_child(doc.body(), b).unwrap();
    doc.append_child(a, child).unwrap();

    doc.append_child(b, child).unwrap();
    assert!(doc.children(a).is_empty());
    assert_eq!(doc.children(b), vec![child]);
    assert!(matches!(
        doc.append_child(child, b),
        Err(DomError::HierarchyRequest { .. })
    ));
}
