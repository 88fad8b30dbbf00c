//! Integration tests - components from definition to committed DOM
//!
//! Tests the complete workflow: class → runtime → scheduler → template → DOM

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lumen::element::SchedulerError;
use lumen::prelude::*;
use lumen::template::Renderer;

fn runtime(doc: &Document) -> Rc<Runtime> {
    Runtime::builder(doc)
        .configuration(Configuration::default())
        .scheduler(SchedulerConfig::manual())
        .build()
        .unwrap()
}

fn container(doc: &Document) -> NodeId {
    let div = doc.create_element("div");
    doc.append_child(doc.body(), div).unwrap();
    div
}

// ============================================================================
// TEMPLATES
// ============================================================================

#[test]
fn test_committing_same_primitive_twice_writes_once() {
    let values = [
        Value::from("text"),
        Value::from(42),
        Value::from(true),
        Value::Number(f64::NAN),
        Value::Null,
        Value::Undefined,
    ];
    for value in values {
        let doc = Document::new();
        let renderer = Renderer::new(doc.clone()).unwrap();
        let target = container(&doc);
        let options = RenderOptions::default();

        renderer.render(value.clone(), target, &options).unwrap();
        let first = doc.mutation_count();
        renderer.render(value.clone(), target, &options).unwrap();
        assert_eq!(doc.mutation_count(), first, "second commit of {value:?} mutated the DOM");
    }
}

fn card(title: &str, body: TemplateResult) -> TemplateResult {
    html!("<article><h1>${}</h1>${}</article>", title, body)
}

fn paragraph(text: &str) -> TemplateResult {
    html!("<p>${}</p>", text)
}

#[test]
fn test_same_call_site_reuses_template_and_instances() {
    let doc = Document::new();
    let renderer = Renderer::new(doc.clone()).unwrap();
    let target = container(&doc);
    let options = RenderOptions::default();

    let first = card("One", paragraph("x"));
    let second = card("Two", paragraph("y"));
    let cache = renderer.cache();
    assert!(Rc::ptr_eq(
        &cache.template_for(&first).unwrap(),
        &cache.template_for(&second).unwrap()
    ));

    renderer.render(first, target, &options).unwrap();
    let article = doc.elements_by_tag("article")[0];
    let p = doc.elements_by_tag("p")[0];

    renderer.render(second, target, &options).unwrap();
    assert_eq!(doc.elements_by_tag("article"), vec![article]);
    assert_eq!(doc.elements_by_tag("p"), vec![p]);
    assert_eq!(doc.text_content(target), "Twoy");
}

// ============================================================================
// SCHEDULING
// ============================================================================

fn counter(renders: Rc<RefCell<Vec<NodeId>>>) -> Rc<ElementClass> {
    ElementClass::builder("lumen-counter")
        .metadata(MetadataDescriptor::new().property("count", PropertyDecl::custom(Integer).default_value(0)))
        .template(|el| html!("<b>${}</b>", el.get("count")))
        .on_after_rendering(move |el| renders.borrow_mut().push(el.host()))
        .build()
}

fn connected_counter(doc: &Document, rt: &Runtime) -> ElementRef {
    let el = rt.create_element("lumen-counter").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();
    el
}

#[test]
fn test_deferred_renders_collapse_into_one() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let renders = Rc::new(RefCell::new(Vec::new()));
    rt.define(counter(renders.clone())).unwrap();
    let el = connected_counter(&doc, &rt);
    renders.borrow_mut().clear();

    let promises: Vec<_> = (0..5).map(|_| rt.render_deferred(el.host())).collect();
    assert!(promises.iter().all(|p| !p.is_settled()));
    rt.animation_frame().unwrap();

    assert_eq!(*renders.borrow(), vec![el.host()]);
    assert!(promises.iter().all(|p| p.is_settled()));
}

#[test]
fn test_runaway_component_trips_circuit_breaker() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let runaway = Rc::new(Cell::new(false));
    let attempts = Rc::new(Cell::new(0));
    let (flag, count) = (runaway.clone(), attempts.clone());
    rt.define(
        ElementClass::builder("lumen-runaway")
            .template(|_| html!("<i></i>"))
            .on_before_rendering(move |el| {
                if flag.get() {
                    count.set(count.get() + 1);
                    el.runtime().render_deferred(el.host());
                }
            })
            .build(),
    )
    .unwrap();
    let el = rt.create_element("lumen-runaway").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    runaway.set(true);
    rt.render_deferred(el.host());
    let err = rt.animation_frame().unwrap_err();
    assert!(matches!(
        err,
        ElementError::Scheduler(SchedulerError::RerenderLimit { host, .. }) if host == el.host()
    ));
    assert_eq!(attempts.get(), 11);
    assert!(!rt.scheduler().is_queued(el.host()));
    assert!(!rt.scheduler().is_running());
}

#[test]
fn test_count_attribute_appears_after_frame() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let renders = Rc::new(RefCell::new(Vec::new()));
    rt.define(counter(renders)).unwrap();
    let el = connected_counter(&doc, &rt);

    doc.set_property(el.host(), "count", Value::from(5)).unwrap();
    assert_eq!(doc.get_property(el.host(), "count"), Value::from(5));
    assert!(rt.scheduler().is_queued(el.host()));
    assert!(rt.scheduler().is_task_scheduled());
    assert!(!doc.has_attribute(el.host(), "count"));
    assert_eq!(doc.text_content(el.shadow_root().unwrap()), "0");

    rt.animation_frame().unwrap();
    assert_eq!(doc.get_attribute(el.host(), "count").as_deref(), Some("5"));
    assert_eq!(doc.text_content(el.shadow_root().unwrap()), "5");
}

#[test]
fn test_siblings_render_in_one_task_in_enqueue_order() {
    let doc = Document::new();
    let rt = runtime(&doc);
    let renders = Rc::new(RefCell::new(Vec::new()));
    rt.define(counter(renders.clone())).unwrap();
    let first = connected_counter(&doc, &rt);
    let second = connected_counter(&doc, &rt);
    renders.borrow_mut().clear();
    let tasks = rt.scheduler().task_count();

    second.set("count", 1).unwrap();
    first.set("count", 1).unwrap();
    rt.animation_frame().unwrap();

    assert_eq!(rt.scheduler().task_count(), tasks + 1);
    assert_eq!(*renders.borrow(), vec![second.host(), first.host()]);
}

// ============================================================================
// ATTRIBUTES AND EVENTS
// ============================================================================

fn toggle() -> Rc<ElementClass> {
    ElementClass::builder("lumen-toggle")
        .metadata(
            MetadataDescriptor::new()
                .property("readOnly", PropertyDecl::boolean())
                .event("select"),
        )
        .template(|el| html!("<input ?readonly=${}>", el.get_bool("readOnly")))
        .build()
}

#[test]
fn test_boolean_property_and_attribute_stay_in_sync() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(toggle()).unwrap();
    let el = rt.create_element("lumen-toggle").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    el.set("readOnly", true).unwrap();
    rt.animation_frame().unwrap();
    assert_eq!(doc.get_attribute(el.host(), "read-only").as_deref(), Some(""));
    assert!(doc.has_attribute(el.dom_ref().unwrap(), "readonly"));

    el.set("readOnly", false).unwrap();
    rt.animation_frame().unwrap();
    assert!(!doc.has_attribute(el.host(), "read-only"));

    doc.set_attribute(el.host(), "read-only", "no").unwrap();
    assert!(el.get_bool("readOnly"));
}

fn listen_select(doc: &Document, host: NodeId, prevent: &'static str) -> Rc<RefCell<Vec<(String, bool)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for name in ["lumen-select", "select"] {
        let seen = seen.clone();
        doc.add_event_listener(
            host,
            name,
            Rc::new(move |event: &mut Event| {
                if event.event_type() == prevent {
                    event.prevent_default();
                }
                seen.borrow_mut()
                    .push((event.event_type().to_string(), event.default_prevented()));
            }),
            Default::default(),
        );
    }
    seen
}

#[test]
fn test_select_fires_twice_and_reports_prevent_default() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(toggle()).unwrap();
    let el = rt.create_element("lumen-toggle").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    let seen = listen_select(&doc, el.host(), "select");
    assert!(!el.fire_event("select", Value::object_from([("item", 1)]), true));
    assert_eq!(
        *seen.borrow(),
        vec![("lumen-select".to_string(), false), ("select".to_string(), true)]
    );
}

#[test]
fn test_prevented_prefixed_select_is_reported() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(toggle()).unwrap();
    let el = rt.create_element("lumen-toggle").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    let seen = listen_select(&doc, el.host(), "lumen-select");
    assert!(!el.fire_event("select", Value::object_from([("item", 1)]), true));
    assert_eq!(
        *seen.borrow(),
        vec![("lumen-select".to_string(), true), ("select".to_string(), false)]
    );
}

#[test]
fn test_unprevented_select_reports_true() {
    let doc = Document::new();
    let rt = runtime(&doc);
    rt.define(toggle()).unwrap();
    let el = rt.create_element("lumen-toggle").unwrap();
    doc.append_child(doc.body(), el.host()).unwrap();

    let seen = listen_select(&doc, el.host(), "none");
    assert!(el.fire_event("select", Value::Null, true));
    assert_eq!(seen.borrow().len(), 2);
}

// ============================================================================
// BOOTSTRAP
// ============================================================================

#[test]
fn test_boot_reads_document_configuration() {
    let doc = Document::new();
    let script = doc.create_element("script");
    doc.set_attribute(script, lumen::element::CONFIG_ATTRIBUTE, "").unwrap();
    doc.set_text_content(script, r#"{"theme":"lumen_dark"}"#).unwrap();
    doc.append_child(doc.head(), script).unwrap();

    let rt = lumen::boot(&doc).unwrap();
    assert_eq!(rt.configuration().theme, "lumen_dark");
    assert_eq!(rt.theming().current_theme(), "lumen_dark");
    assert!(!lumen::VERSION.is_empty());
}
