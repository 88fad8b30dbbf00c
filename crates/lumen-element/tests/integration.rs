//! Integration tests for lumen-element
//!
//! Defines component classes on a live document and drives the runtime
//! through host frames, the way an embedding application would.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use lumen_dom::{Document, Event, EventInit, NodeId, Value};
use lumen_element::{
    Configuration, ElementClass, ElementError, ListenFor, MemoryFetcher, MetadataDescriptor,
    NoConflict, PropertyDecl, Runtime, SchedulerConfig, SlotDecl, THEME_PROPERTIES_ATTRIBUTE,
};
use lumen_template::{TemplateResult, html};

fn runtime(doc: &Document) -> Rc<Runtime> {
    Runtime::builder(doc)
        .configuration(Configuration::default())
        .scheduler(SchedulerConfig::manual())
        .build()
        .unwrap()
}

fn item_class() -> Rc<ElementClass> {
    ElementClass::builder("lumen-item")
        .metadata(
            MetadataDescriptor::new()
                .property("text", PropertyDecl::string())
                .property("icon", PropertyDecl::string()),
        )
        .build()
}

/// Renders the `text` of every slotted item
fn list_class() -> Rc<ElementClass> {
    ElementClass::builder("lumen-list")
        .metadata(
            MetadataDescriptor::new().slot(
                "default",
                SlotDecl::tag("lumen-item")
                    .property_name("items")
                    .listen_for(ListenFor::Props(vec!["text".into()])),
            ),
        )
        .template(|el| {
            let runtime = el.runtime();
            let rows: Vec<TemplateResult> = el
                .get_slotted_nodes("items")
                .into_iter()
                .map(|node| {
                    let text = runtime
                        .element(node)
                        .and_then(|item| item.get_string("text"))
                        .unwrap_or_default();
                    html!("<li>${}</li>", text)
                })
                .collect();
            html!("<ul>${}</ul>", rows)
        })
        .build()
}

fn item(rt: &Runtime, text: &str) -> NodeId {
    let item = rt.create_element("lumen-item").unwrap();
    item.set("text", text).unwrap();
    item.host()
}

fn shadow_text(doc: &Document, rt: &Runtime, host: NodeId) -> String {
    let el = rt.element(host).unwrap();
    doc.text_content(el.shadow_root().unwrap())
}

// ============================================================================
// SLOTS
// ============================================================================

#[test]
fn test_slot_state_follows_light_dom_order() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(item_class()).unwrap();
    rt.define(list_class()).unwrap();
    let list = rt.create_element("lumen-list").unwrap();
    doc.append_child(doc.body(), list.host()).unwrap();

    let a = item(&rt, "A");
    let b = item(&rt, "B");
    let c = item(&rt, "C");
    doc.append_child(list.host(), c).unwrap();
    doc.insert_before(list.host(), a, Some(c)).unwrap();
    doc.insert_before(list.host(), b, Some(c)).unwrap();
    rt.animation_frame().unwrap();

    assert_eq!(list.slot("default"), vec![a, b, c]);
    assert_eq!(list.get("items"), Value::List(vec![a.into(), b.into(), c.into()]));
    assert_eq!(shadow_text(&doc, &rt, list.host()), "ABC");

    doc.remove(b).unwrap();
    rt.animation_frame().unwrap();
    assert_eq!(list.slot("default"), vec![a, c]);
    assert_eq!(shadow_text(&doc, &rt, list.host()), "AC");
}

#[test]
fn test_listed_child_property_invalidates_parent() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(item_class()).unwrap();
    rt.define(list_class()).unwrap();
    let list = rt.create_element("lumen-list").unwrap();
    let a = item(&rt, "A");
    doc.append_child(list.host(), a).unwrap();
    doc.append_child(doc.body(), list.host()).unwrap();
    assert_eq!(shadow_text(&doc, &rt, list.host()), "A");

    let child = rt.element(a).unwrap();
    child.set("icon", "star").unwrap();
    assert!(!rt.scheduler().is_queued(list.host()));

    child.set("text", "Z").unwrap();
    assert!(rt.scheduler().is_queued(list.host()));
    rt.animation_frame().unwrap();
    assert_eq!(shadow_text(&doc, &rt, list.host()), "Z");
}

#[test]
fn test_slot_type_mismatch_is_reported() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(item_class()).unwrap();
    rt.define(list_class()).unwrap();
    let list = rt.create_element("lumen-list").unwrap();
    let a = item(&rt, "A");
    let stray = doc.create_element("div");
    doc.append_child(list.host(), stray).unwrap();
    doc.append_child(list.host(), a).unwrap();
    doc.append_child(doc.body(), list.host()).unwrap();

    assert_eq!(list.slot("default"), vec![a]);
    let errors = rt.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ElementError::SlotType { node, .. } if node == stray));
}

#[test]
fn test_individual_slots_are_assigned_on_render() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(
        ElementClass::builder("lumen-carousel")
            .metadata(MetadataDescriptor::new().slot("items", SlotDecl::element().individual_slots()))
            .template(|el| html!("<div>${}</div>", el.slot("items").len()))
            .build(),
    )
    .unwrap();
    let carousel = rt.create_element("lumen-carousel").unwrap();
    let first = doc.create_element("img");
    let second = doc.create_element("img");
    let unslotted = doc.create_element("p");
    for child in [first, unslotted, second] {
        doc.append_child(carousel.host(), child).unwrap();
    }
    doc.set_attribute(first, "slot", "items").unwrap();
    doc.set_attribute(second, "slot", "items").unwrap();
    doc.append_child(doc.body(), carousel.host()).unwrap();

    assert_eq!(carousel.slot("items"), vec![first, second]);
    assert_eq!(doc.get_attribute(first, "slot").as_deref(), Some("items-1"));
    assert_eq!(doc.get_attribute(second, "slot").as_deref(), Some("items-2"));
    assert_eq!(carousel.individual_slot(second).as_deref(), Some("items-2"));
    assert_eq!(carousel.individual_slot(unslotted), None);
    assert_eq!(shadow_text(&doc, &rt, carousel.host()), "2");
}

#[test]
fn test_connect_waits_for_undefined_children() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(list_class()).unwrap();
    let list = rt.create_element("lumen-list").unwrap();
    let child = doc.create_element("lumen-item");
    doc.append_child(list.host(), child).unwrap();
    doc.append_child(doc.body(), list.host()).unwrap();

    rt.tick();
    assert!(!list.when_dom_ref_ready().is_settled());
    assert!(!rt.renderer().has_rendered(list.shadow_root().unwrap()));

    rt.define(item_class()).unwrap();
    rt.element(child).unwrap().set("text", "late").unwrap();
    rt.tick();
    assert!(list.when_dom_ref_ready().is_settled());
    assert_eq!(list.slot("default"), vec![child]);
    assert_eq!(shadow_text(&doc, &rt, list.host()), "late");
}

#[test]
fn test_upgrade_wait_is_bounded() {
    let doc = Document::new();
    let rt = Runtime::builder(&doc)
        .configuration(Configuration::default())
        .scheduler(SchedulerConfig {
            upgrade_timeout: Duration::from_millis(10),
            ..SchedulerConfig::manual()
        })
        .build()
        .unwrap();
    rt.define(list_class()).unwrap();
    let list = rt.create_element("lumen-list").unwrap();
    let child = doc.create_element("lumen-item");
    doc.append_child(list.host(), child).unwrap();
    doc.append_child(doc.body(), list.host()).unwrap();

    rt.run(smol::Timer::after(Duration::from_millis(60)));
    assert!(list.when_dom_ref_ready().is_settled());
    assert_eq!(list.slot("default"), vec![child]);
    assert!(rt.element(child).is_none());
}

#[test]
fn test_children_changed_hook() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    rt.define(
        ElementClass::builder("lumen-panel")
            .template(|_| html!("<section></section>"))
            .on_children_changed(move |_| seen.set(seen.get() + 1))
            .build(),
    )
    .unwrap();
    let panel = rt.create_element("lumen-panel").unwrap();
    doc.append_child(doc.body(), panel.host()).unwrap();
    assert_eq!(calls.get(), 1);
}

// ============================================================================
// EVENTS
// ============================================================================

fn record(doc: &Document, node: NodeId, event_type: &str, log: &Rc<RefCell<Vec<String>>>, prevent: bool) {
    let log = log.clone();
    doc.add_event_listener(
        node,
        event_type,
        Rc::new(move |event: &mut Event| {
            log.borrow_mut().push(event.event_type().to_string());
            if prevent {
                event.prevent_default();
            }
        }),
        Default::default(),
    );
}

fn plain_class() -> Rc<ElementClass> {
    ElementClass::builder("lumen-plain")
        .template(|_| html!("<button>go</button>"))
        .build()
}

#[test]
fn test_fire_event_dispatches_both_names() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(plain_class()).unwrap();
    let el = rt.create_element("lumen-plain").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    record(&doc, doc.body(), "lumen-press", &log, false);
    record(&doc, doc.body(), "press", &log, false);

    assert!(el.fire_event("press", Value::Null, true));
    assert_eq!(*log.borrow(), vec!["lumen-press", "press"]);
}

#[test]
fn test_no_conflict_suppresses_plain_names() {
    let doc = Document::new();
    let rt = Runtime::builder(&doc)
        .configuration(Configuration {
            no_conflict: NoConflict::Flag(true),
            ..Configuration::default()
        })
        .scheduler(SchedulerConfig::manual())
        .build()
        .unwrap();
    rt.define(plain_class()).unwrap();
    let el = rt.create_element("lumen-plain").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ["press", "lumen-press", "value-changed", "lumen-value-changed"] {
        record(&doc, doc.body(), name, &log, false);
    }

    el.fire_event("press", Value::Null, false);
    el.fire_event("value-changed", Value::Null, false);
    assert_eq!(
        *log.borrow(),
        vec!["lumen-press", "lumen-value-changed", "value-changed"]
    );
}

fn clicker(by_convention: bool, clicks: Rc<Cell<u32>>) -> Rc<ElementClass> {
    ElementClass::builder("lumen-clicker")
        .metadata(MetadataDescriptor::new().event_handlers_by_convention(by_convention))
        .template(|_| html!("<button>go</button>"))
        .on_event("click", move |_, _| clicks.set(clicks.get() + 1))
        .build()
}

fn click() -> Event {
    Event::with_init(
        "click",
        EventInit {
            bubbles: true,
            composed: true,
            ..Default::default()
        },
    )
}

#[test]
fn test_convention_handler_receives_shadow_clicks() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let clicks = Rc::new(Cell::new(0));
    rt.define(clicker(true, clicks.clone())).unwrap();
    let el = rt.create_element("lumen-clicker").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    let button = el.dom_ref().unwrap();
    doc.dispatch_event(button, &mut click());
    assert_eq!(clicks.get(), 1);
    assert!(rt.router().is_active());
}

#[test]
fn test_convention_handlers_are_opt_in() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let clicks = Rc::new(Cell::new(0));
    rt.define(clicker(false, clicks.clone())).unwrap();
    let el = rt.create_element("lumen-clicker").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    doc.dispatch_event(el.dom_ref().unwrap(), &mut click());
    assert_eq!(clicks.get(), 0);
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_enter_and_exit_hooks() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let log = Rc::new(RefCell::new(Vec::new()));
    let (enter, exit) = (log.clone(), log.clone());
    rt.define(
        ElementClass::builder("lumen-tracked")
            .template(|_| html!("<i></i>"))
            .on_enter_dom(move |_| enter.borrow_mut().push("enter"))
            .on_exit_dom(move |_| exit.borrow_mut().push("exit"))
            .build(),
    )
    .unwrap();
    let el = rt.create_element("lumen-tracked").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();
    assert!(el.is_connected());
    doc.remove(el.host()).unwrap();
    assert!(!el.is_connected());
    doc.append_child(doc.body(), el.host()).unwrap();
    assert_eq!(*log.borrow(), vec!["enter", "exit", "enter"]);
}

#[test]
fn test_slot_property_is_read_only() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(item_class()).unwrap();
    rt.define(list_class()).unwrap();
    let list = rt.create_element("lumen-list").unwrap();
    assert!(matches!(list.set("items", Value::List(Vec::new())), Err(ElementError::SlotAssignment(_))));
    assert!(doc.set_property(list.host(), "items", Value::Null).is_err());
}

#[test]
fn test_acronym_property_syncs_both_ways() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(
        ElementClass::builder("lumen-bidi")
            .metadata(MetadataDescriptor::new().property("isRTL", PropertyDecl::boolean()))
            .template(|_| html!("<i></i>"))
            .build(),
    )
    .unwrap();
    let el = rt.create_element("lumen-bidi").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    el.set("isRTL", true).unwrap();
    rt.animation_frame().unwrap();
    assert_eq!(doc.get_attribute(el.host(), "is-rtl").as_deref(), Some(""));

    doc.remove_attribute(el.host(), "is-rtl").unwrap();
    assert!(!el.get_bool("isRTL"));
    doc.set_attribute(el.host(), "is-rtl", "").unwrap();
    assert!(el.get_bool("isRTL"));
}

#[test]
fn test_resetting_nan_is_not_a_change() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(
        ElementClass::builder("lumen-samples")
            .metadata(MetadataDescriptor::new().property("samples", PropertyDecl::object()))
            .template(|_| html!("<i></i>"))
            .build(),
    )
    .unwrap();
    let el = rt.create_element("lumen-samples").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();
    let changes = Rc::new(Cell::new(0));
    let seen = changes.clone();
    doc.add_event_listener(
        el.host(),
        lumen_element::PROPERTY_CHANGE_EVENT,
        Rc::new(move |_: &mut Event| seen.set(seen.get() + 1)),
        Default::default(),
    );

    let samples = || Value::List(vec![Value::from(1), Value::Number(f64::NAN)]);
    el.set("samples", samples()).unwrap();
    el.set("samples", samples()).unwrap();
    assert_eq!(changes.get(), 1);
}

// ============================================================================
// CONFIGURATION AND THEMING
// ============================================================================

const DARK: &str = "https://cdn.example.com/lumen/main/lumen_dark.json";

#[test]
fn test_url_overrides_configuration() {
    let doc = Document::new();
    let rt = Runtime::builder(&doc)
        .url("https://app.example.com/?lumen-theme=lumen_dark&lumen-animation-mode=none")
        .scheduler(SchedulerConfig::manual())
        .build()
        .unwrap();
    assert_eq!(rt.configuration().theme, "lumen_dark");
    assert_eq!(rt.theming().current_theme(), "lumen_dark");
}

#[test]
fn test_theme_switch_rerenders_components() {
    let doc = Document::new();
    let fetcher = Rc::new(MemoryFetcher::new().with(DARK, r#"{"_":":root{--bg:#000}"}"#));
    let rt = Runtime::builder(&doc)
        .configuration(Configuration::default())
        .scheduler(SchedulerConfig::manual())
        .fetcher(fetcher.clone())
        .build()
        .unwrap();
    rt.theming()
        .register_theme_properties("@lumen/main", "lumen_default", ":root{--bg:#fff}");
    rt.theming().register_theme_properties("@lumen/main", "lumen_dark", DARK);
    rt.run(rt.boot());

    let styles = doc.find_by_attribute(doc.head(), THEME_PROPERTIES_ATTRIBUTE);
    assert_eq!(styles.len(), 1);
    assert_eq!(doc.text_content(styles[0]), ":root{--bg:#fff}");

    rt.define(plain_class()).unwrap();
    let el = rt.create_element("lumen-plain").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();
    let before = rt.scheduler().task_count();

    rt.run(rt.set_theme("lumen_dark"));
    assert_eq!(doc.text_content(styles[0]), ":root{--bg:#000}");
    assert!(rt.scheduler().is_queued(el.host()));
    rt.animation_frame().unwrap();
    assert_eq!(rt.scheduler().task_count(), before + 1);

    rt.run(rt.set_theme("lumen_dark"));
    assert_eq!(fetcher.requests(), 1);
}
