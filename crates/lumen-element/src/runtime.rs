//! Component runtime
//!
//! A [`Runtime`] owns everything one framework instance shares between its
//! components: the renderer and its template cache, the render scheduler, the
//! theme manager, the event router, the configuration and the live component
//! table. Several runtimes may share a document; a tag belongs to the first
//! runtime that defines it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use lumen_dom::{Document, DomError, ElementReactions, Event, EventInit, NodeId, Promise, Value};
use lumen_template::{RenderOptions, Renderer, TemplateError};
use smol::LocalExecutor;

use crate::ElementError;
use crate::class::{ElementClass, HookKind};
use crate::component::{ComponentCore, ElementRef};
use crate::config::{Configuration, SchedulerConfig};
use crate::event_router::EventRouter;
use crate::metadata::camel_to_kebab;
use crate::scheduler::{RenderScheduler, RenderTarget, SchedulerError};
use crate::theming::{ResourceFetcher, ThemeManager};

/// Fired on a component after every validated property change
pub const PROPERTY_CHANGE_EVENT: &str = "_propertyChange";

/// Fired on a component between its before-rendering hook and the render
pub const STATE_FINALIZED_EVENT: &str = "_componentStateFinalized";

/// Set on components when compact size is configured
pub const COMPACT_SIZE_ATTRIBUTE: &str = "data-lumen-compact-size";

/// Builder for [`Runtime`]
pub struct RuntimeBuilder {
    doc: Document,
    configuration: Option<Configuration>,
    scheduler: SchedulerConfig,
    fetcher: Option<Rc<dyn ResourceFetcher>>,
    url: Option<String>,
}

impl RuntimeBuilder {
    pub fn new(doc: &Document) -> Self {
        Self {
            doc: doc.clone(),
            configuration: None,
            scheduler: SchedulerConfig::default(),
            fetcher: None,
            url: None,
        }
    }

    /// Use `configuration` instead of the one embedded in the document
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn fetcher(mut self, fetcher: Rc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Page URL whose `lumen-*` query parameters override the configuration
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn build(self) -> Result<Rc<Runtime>, ElementError> {
        let mut configuration = self
            .configuration
            .unwrap_or_else(|| Configuration::from_document(&self.doc));
        if let Some(url) = &self.url {
            configuration.apply_url_params(url)?;
        }
        let renderer = Renderer::new(self.doc.clone())?;
        let executor = Rc::new(LocalExecutor::new());
        let theming = ThemeManager::new(&configuration.theme, self.fetcher);
        let router = EventRouter::new(&self.doc);
        let scheduler_config = self.scheduler;

        let runtime = Rc::new_cyclic(|this: &Weak<Runtime>| {
            let target: Weak<dyn RenderTarget> = this.clone();
            Runtime {
                this: this.clone(),
                doc: self.doc,
                scheduler: RenderScheduler::new(scheduler_config, executor.clone(), target),
                executor,
                renderer,
                configuration,
                theming,
                router,
                sinks: RefCell::new(HashMap::new()),
                components: RefCell::new(HashMap::new()),
                reflections: RefCell::new(IndexSet::new()),
                errors: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                delivery_scheduled: Cell::new(false),
                booted: Cell::new(false),
            }
        });
        runtime.install();
        Ok(runtime)
    }
}

pub struct Runtime {
    this: Weak<Runtime>,
    doc: Document,
    executor: Rc<LocalExecutor<'static>>,
    renderer: Renderer,
    scheduler: Rc<RenderScheduler>,
    configuration: Configuration,
    theming: ThemeManager,
    router: EventRouter,
    sinks: RefCell<HashMap<String, Rc<DefinitionSink>>>,
    /// Upgraded hosts. Disconnected hosts stay registered so they can be
    /// reattached; [`Runtime::release`] drops them.
    components: RefCell<HashMap<NodeId, Rc<ComponentCore>>>,
    /// Properties whose attribute is rewritten by the next frame task
    reflections: RefCell<IndexSet<(NodeId, String)>>,
    errors: RefCell<Vec<ElementError>>,
    next_id: Cell<u64>,
    delivery_scheduled: Cell<bool>,
    booted: Cell<bool>,
}

impl Runtime {
    pub fn builder(doc: &Document) -> RuntimeBuilder {
        RuntimeBuilder::new(doc)
    }

    /// Runtime with default scheduler settings and the document's configuration
    pub fn new(doc: &Document) -> Result<Rc<Self>, ElementError> {
        RuntimeBuilder::new(doc).build()
    }

    fn install(&self) {
        let weak = self.this.clone();
        self.doc.set_mutation_notifier(Rc::new(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.schedule_delivery();
            }
        }));

        self.router.start();

        let weak = self.this.clone();
        self.theming.attach_theme_change(move |theme| {
            if let Some(runtime) = weak.upgrade() {
                tracing::debug!(%theme, "Theme changed");
                runtime.invalidate_all();
            }
        });
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn scheduler(&self) -> &Rc<RenderScheduler> {
        &self.scheduler
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn theming(&self) -> &ThemeManager {
        &self.theming
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Register `class` for its tag and upgrade existing candidates. A tag
    /// defined by another runtime is skipped with a warning.
    pub fn define(&self, class: Rc<ElementClass>) -> Result<(), ElementError> {
        let metadata = class.metadata();
        metadata.validate()?;
        let tag = class.tag().to_string();

        if self.sinks.borrow().contains_key(&tag) {
            return Ok(());
        }
        if self.doc.is_defined(&tag) {
            tracing::warn!(
                "Skipping definition of tag {}, because it was already defined by another runtime",
                tag
            );
            return Ok(());
        }

        let sink = Rc::new(DefinitionSink {
            runtime: self.this.clone(),
            class,
        });
        let reactions: Rc<dyn ElementReactions> = sink.clone();
        let weak = Rc::downgrade(&reactions);
        self.sinks.borrow_mut().insert(tag.clone(), sink);
        if let Err(err) = self.doc.define(&tag, metadata.attributes_list(), weak) {
            self.sinks.borrow_mut().remove(&tag);
            return Err(err.into());
        }
        tracing::debug!(%tag, attributes = ?metadata.attributes_list(), "Defined component");
        Ok(())
    }

    /// Whether this runtime defined `tag`
    pub fn is_defined(&self, tag: &str) -> bool {
        self.sinks.borrow().contains_key(tag)
    }

    /// Create an upgraded, not yet connected component
    pub fn create_element(&self, tag: &str) -> Result<ElementRef, ElementError> {
        let host = self.doc.create_element(tag);
        self.element(host).ok_or(ElementError::NotAComponent(host))
    }

    /// Component handle of `host`
    pub fn element(&self, host: NodeId) -> Option<ElementRef> {
        let core = self.component(host)?;
        self.element_ref(&core)
    }

    /// Drop the state and rendered template of a disconnected host. The node
    /// stays in the document but is no longer a component of this runtime.
    /// Returns false for connected hosts and unknown nodes.
    pub fn release(&self, host: NodeId) -> bool {
        let Some(core) = self.component(host) else {
            return false;
        };
        if core.connected.get() {
            return false;
        }
        self.components.borrow_mut().remove(&host);
        self.reflections.borrow_mut().retain(|(node, _)| *node != host);
        if let Some(root) = self.doc.shadow_root(host) {
            self.renderer.forget(root);
        }
        tracing::debug!(?host, "Component released");
        true
    }

    pub(crate) fn component(&self, host: NodeId) -> Option<Rc<ComponentCore>> {
        self.components.borrow().get(&host).cloned()
    }

    pub(crate) fn weak(&self) -> Weak<Runtime> {
        self.this.clone()
    }

    pub(crate) fn element_ref(&self, core: &Rc<ComponentCore>) -> Option<ElementRef> {
        Some(ElementRef::new(self.this.upgrade()?, core.clone()))
    }

    // ------------------------------------------------------------------
    // Driving the runtime
    // ------------------------------------------------------------------

    /// Run `future` to completion while driving the runtime's tasks
    pub fn run<T>(&self, future: impl Future<Output = T>) -> T {
        smol::block_on(self.executor.run(future))
    }

    /// Run every task that is ready without blocking
    pub fn tick(&self) {
        while self.executor.try_tick() {}
    }

    /// Host driven frame: finish ready tasks, deliver pending mutations and
    /// run the scheduled render task
    pub fn animation_frame(&self) -> Result<(), ElementError> {
        self.tick();
        self.deliver_mutations();
        self.scheduler.frame()?;
        Ok(())
    }

    /// Queue `host` for the next render task regardless of its state
    pub fn render_deferred(&self, host: NodeId) -> Promise {
        self.scheduler.render_deferred(host)
    }

    pub fn when_dom_updated(&self) -> Promise {
        self.scheduler.when_dom_updated()
    }

    pub async fn when_shadow_dom_ready(&self) {
        self.scheduler.when_shadow_dom_ready(&self.doc).await;
    }

    pub async fn when_finished(&self) {
        self.scheduler.when_finished(&self.doc).await;
    }

    /// Apply the configured theme once
    pub async fn boot(&self) {
        if self.booted.replace(true) {
            return;
        }
        let theme = self.theming.current_theme();
        self.theming.apply_theme(&self.doc, &theme).await;
        tracing::debug!(%theme, "Runtime booted");
    }

    /// Switch themes; components re-render with the new properties
    pub async fn set_theme(&self, theme: &str) {
        if self.theming.current_theme() == theme {
            return;
        }
        self.theming.apply_theme(&self.doc, theme).await;
    }

    /// Append CSS to every `tag` component and re-render them
    pub fn add_custom_css(&self, tag: &str, css: &str) {
        self.theming.add_custom_css(tag, css);
        let tag = tag.to_ascii_lowercase();
        for core in self.cores() {
            if core.class.tag() == tag {
                self.invalidate(&core);
            }
        }
    }

    /// Errors raised where no caller could receive them
    pub fn take_errors(&self) -> Vec<ElementError> {
        let mut errors = std::mem::take(&mut *self.errors.borrow_mut());
        errors.extend(self.scheduler.take_errors().into_iter().map(ElementError::from));
        errors
    }

    pub(crate) fn report(&self, err: ElementError) {
        tracing::error!(%err, "Component error");
        self.errors.borrow_mut().push(err);
    }

    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.executor.spawn(future).detach();
    }

    fn schedule_delivery(&self) {
        if self.delivery_scheduled.replace(true) {
            return;
        }
        let weak = self.this.clone();
        self.spawn(async move {
            if let Some(runtime) = weak.upgrade() {
                runtime.deliver_mutations();
            }
        });
    }

    fn deliver_mutations(&self) {
        self.delivery_scheduled.set(false);
        self.doc.deliver_mutation_records();
    }

    fn cores(&self) -> Vec<Rc<ComponentCore>> {
        self.components.borrow().values().cloned().collect()
    }

    fn invalidate_all(&self) {
        for core in self.cores() {
            self.invalidate(&core);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn upgrade_element(&self, host: NodeId, class: &Rc<ElementClass>) {
        if self.components.borrow().contains_key(&host) {
            return;
        }
        let number = self.next_id.get() + 1;
        self.next_id.set(number);
        let core = Rc::new(ComponentCore::new(host, class.clone(), format!("__el{number}")));

        if class.needs_shadow_dom() && self.doc.shadow_root(host).is_none() {
            if let Err(err) = self.doc.attach_shadow(host) {
                self.report(err.into());
            }
        }
        self.components.borrow_mut().insert(host, core.clone());
        tracing::debug!(tag = %class.tag(), id = %core.id, "Upgraded component");

        // values assigned before the definition existed
        for name in core.metadata.props_list() {
            if let Some(value) = self.doc.take_own_property(host, name) {
                if let Err(err) = self.set_property(&core, name, value) {
                    self.report(err);
                }
            }
        }
        for attribute in self.doc.attributes(host) {
            self.apply_attribute(&core, &attribute.name, Some(&attribute.value));
        }
    }

    fn connected(&self, host: NodeId) {
        let Some(core) = self.component(host) else {
            return;
        };
        core.connected.set(true);
        if self.configuration.compact_size {
            if let Err(err) = self.doc.set_attribute(host, COMPACT_SIZE_ATTRIBUTE, "") {
                self.report(err.into());
            }
        }
        if !core.class.needs_shadow_dom() {
            return;
        }

        // observation starts before any suspension so no mutation is missed
        self.observe_children(&core);
        match self.process_children(&core) {
            None => self.finish_connect(&core),
            Some(pending) => {
                let weak = self.this.clone();
                self.spawn(async move {
                    pending.await;
                    if let Some(runtime) = weak.upgrade() {
                        if core.connected.get() {
                            runtime.finish_connect(&core);
                        }
                    }
                });
            }
        }
    }

    fn finish_connect(&self, core: &Rc<ComponentCore>) {
        if let Err(err) = self.scheduler.render_immediately(core.host) {
            self.report(err.into());
        }
        core.dom_ref_ready.resolve();
        self.run_hook(core, HookKind::EnterDom);
    }

    fn disconnected(&self, host: NodeId) {
        let Some(core) = self.component(host) else {
            return;
        };
        core.connected.set(false);
        if !core.class.needs_shadow_dom() {
            return;
        }
        self.doc.unobserve(host);
        self.run_hook(&core, HookKind::ExitDom);
    }

    pub(crate) fn run_hook(&self, core: &Rc<ComponentCore>, kind: HookKind) {
        let Some(hook) = core.class.hook(kind).cloned() else {
            return;
        };
        if let Some(element) = self.element_ref(core) {
            hook(&element);
        }
    }

    // ------------------------------------------------------------------
    // Properties and attributes
    // ------------------------------------------------------------------

    pub(crate) fn set_property(
        &self,
        core: &Rc<ComponentCore>,
        name: &str,
        value: Value,
    ) -> Result<(), ElementError> {
        if core.metadata.is_slot_property(name) {
            return Err(ElementError::SlotAssignment(name.to_string()));
        }
        let decl = core
            .metadata
            .property(name)
            .ok_or_else(|| ElementError::UnknownProperty(name.to_string()))?;
        let value = decl.validate(value);
        {
            let mut state = core.state.borrow_mut();
            if state.get(name).is_some_and(|current| current.same_value(&value)) {
                return Ok(());
            }
            state.insert(name.to_string(), value.clone());
        }

        self.invalidate(core);
        if core.metadata.has_attribute(name) {
            self.reflections
                .borrow_mut()
                .insert((core.host, name.to_string()));
            self.scheduler.schedule_task();
        }

        let detail = Value::object_from([("name", Value::from(name)), ("newValue", value)]);
        let mut event = Event::with_init(
            PROPERTY_CHANGE_EVENT,
            EventInit {
                bubbles: true,
                detail,
                ..Default::default()
            },
        );
        self.doc.dispatch_event(core.host, &mut event);
        Ok(())
    }

    fn apply_attribute(&self, core: &Rc<ComponentCore>, attribute: &str, value: Option<&str>) {
        let Some((property, decl)) = core.metadata.property_for_attribute(attribute) else {
            return;
        };
        let property = property.to_string();
        let value = decl.from_attribute(value);
        if let Err(err) = self.set_property(core, &property, value) {
            self.report(err);
        }
    }

    /// Write pending property values to their attributes. Booleans toggle
    /// presence; null and object values are not reflected.
    fn apply_reflections(&self) {
        let pending = std::mem::take(&mut *self.reflections.borrow_mut());
        for (host, name) in pending {
            let Some(core) = self.component(host) else {
                continue;
            };
            let attribute = camel_to_kebab(&name);
            let result = match core.value(&name) {
                Value::Bool(present) => self.doc.toggle_attribute(host, &attribute, present),
                value if value.is_primitive() && !value.is_nullish() => {
                    let text = value.to_js_string();
                    if self.doc.get_attribute(host, &attribute).as_deref() == Some(text.as_str()) {
                        Ok(())
                    } else {
                        self.doc.set_attribute(host, &attribute, &text)
                    }
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                self.report(err.into());
            }
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Request a deferred render of a component that rendered before
    pub(crate) fn invalidate(&self, core: &ComponentCore) {
        if core.suppress_invalidation.get() || self.scheduler.is_queued(core.host) {
            return;
        }
        let rendered = self
            .doc
            .shadow_root(core.host)
            .is_some_and(|root| self.renderer.has_rendered(root));
        if rendered {
            self.scheduler.render_deferred(core.host);
        }
    }

    fn render_component(&self, core: &Rc<ComponentCore>) -> Result<(), SchedulerError> {
        let Some(element) = self.element_ref(core) else {
            return Ok(());
        };
        core.suppress_invalidation.set(true);
        self.run_hook(core, HookKind::BeforeRendering);
        self.doc
            .dispatch_event(core.host, &mut Event::new(STATE_FINALIZED_EVENT));
        let rendered = self.update_shadow_root(&element);
        core.suppress_invalidation.set(false);
        rendered?;

        self.assign_individual_slots(core);
        self.run_hook(core, HookKind::AfterRendering);
        Ok(())
    }

    fn update_shadow_root(&self, element: &ElementRef) -> Result<(), TemplateError> {
        let core = element.core();
        let (Some(template), Some(root)) = (core.class.template(), self.doc.shadow_root(core.host)) else {
            return Ok(());
        };
        let result = template(element);
        let styles = self.theming.effective_style(&core.class);
        let options = RenderOptions {
            event_context: Some(core.host),
        };
        if styles.trim().is_empty() {
            self.renderer.render(result, root, &options)
        } else {
            self.renderer.render_with_styles(&styles, result, root, &options)
        }
    }

    fn assign_individual_slots(&self, core: &ComponentCore) {
        let assignments = core.slots.borrow().individual.clone();
        for (child, slot) in assignments {
            if self.doc.parent(child) != Some(core.host) {
                continue;
            }
            if self.doc.get_attribute(child, "slot").as_deref() == Some(slot.as_str()) {
                continue;
            }
            if let Err(err) = self.doc.set_attribute(child, "slot", &slot) {
                self.report(err.into());
            }
        }
    }
}

impl RenderTarget for Runtime {
    fn prepare_frame(&self) {
        self.deliver_mutations();
        self.apply_reflections();
    }

    fn render(&self, host: NodeId) -> Result<(), SchedulerError> {
        match self.component(host) {
            Some(core) => self.render_component(&core),
            None => Ok(()),
        }
    }
}

/// Reactions of one defined tag, owned by the runtime that defined it
struct DefinitionSink {
    runtime: Weak<Runtime>,
    class: Rc<ElementClass>,
}

impl ElementReactions for DefinitionSink {
    fn upgrade(&self, element: NodeId) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.upgrade_element(element, &self.class);
        }
    }

    fn connected(&self, element: NodeId) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.connected(element);
        }
    }

    fn disconnected(&self, element: NodeId) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.disconnected(element);
        }
    }

    fn attribute_changed(&self, element: NodeId, name: &str, _old: Option<&str>, new: Option<&str>) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        if let Some(core) = runtime.component(element) {
            runtime.apply_attribute(&core, name, new);
        }
    }

    fn set_property(&self, element: NodeId, name: &str, value: &Value) -> Result<bool, DomError> {
        let Some(runtime) = self.runtime.upgrade() else {
            return Ok(false);
        };
        let Some(core) = runtime.component(element) else {
            return Ok(false);
        };
        match runtime.set_property(&core, name, value.clone()) {
            Ok(()) => Ok(true),
            Err(ElementError::UnknownProperty(_)) => Ok(false),
            Err(ElementError::SlotAssignment(name)) => Err(DomError::ReadOnlyProperty(name)),
            Err(err) => {
                runtime.report(err);
                Ok(true)
            }
        }
    }

    fn get_property(&self, element: NodeId, name: &str) -> Option<Value> {
        let runtime = self.runtime.upgrade()?;
        let core = runtime.component(element)?;
        let state = core.state.borrow();
        state.get(name).cloned()
    }

    fn native_event(&self, element: NodeId, event: &mut Event) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let Some(core) = runtime.component(element) else {
            return;
        };
        if !core.metadata.event_handlers_by_convention() {
            return;
        }
        let Some(handler) = core.class.handler(event.event_type()).cloned() else {
            return;
        };
        if let Some(component) = runtime.element_ref(&core) {
            handler(&component, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameMode;
    use crate::data_type::Integer;
    use crate::metadata::{MetadataDescriptor, PropertyDecl};
    use lumen_template::html;

    fn runtime(doc: &Document) -> Rc<Runtime> {
        Runtime::builder(doc)
            .configuration(Configuration::default())
            .scheduler(SchedulerConfig::manual())
            .build()
            .unwrap()
    }

    fn counter() -> Rc<ElementClass> {
        ElementClass::builder("lumen-counter")
            .metadata(
                MetadataDescriptor::new()
                    .property("count", PropertyDecl::custom(Integer).default_value(0))
                    .property("label", PropertyDecl::string())
                    .property("open", PropertyDecl::boolean())
                    .property("data", PropertyDecl::object()),
            )
            .template(|el| html!("<span>${}: ${}</span>", el.get("label"), el.get("count")))
            .build()
    }

    #[test]
    fn test_define_rejects_invalid_metadata() {
        let doc = Document::new();
        let rt = runtime(&doc);
        let class = ElementClass::builder("lumen-bad")
            .metadata(MetadataDescriptor::new().property("open", PropertyDecl::boolean().default_value(true)))
            .build();
        assert!(matches!(rt.define(class), Err(ElementError::Config(_))));
        assert!(!doc.is_defined("lumen-bad"));
    }

    #[test]
    fn test_tag_owned_by_first_runtime() {
        let doc = Document::new();
        let first = runtime(&doc);
        let second = runtime(&doc);
        first.define(counter()).unwrap();
        first.define(counter()).unwrap();
        second.define(counter()).unwrap();
        assert!(first.is_defined("lumen-counter"));
        assert!(!second.is_defined("lumen-counter"));
    }

    #[test]
    fn test_initial_state_and_ids() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let a = rt.create_element("lumen-counter").unwrap();
        let b = rt.create_element("lumen-counter").unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("__el"));
        assert_eq!(a.get("count"), Value::from(0));
        assert_eq!(a.get("label"), Value::from(""));
        assert!(!a.get_bool("open"));
        assert_eq!(a.get("data"), Value::object());
        assert!(a.shadow_root().is_some());
    }

    #[test]
    fn test_release_only_disconnected_hosts() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.append_child(doc.body(), el.host()).unwrap();
        let root = el.shadow_root().unwrap();
        assert!(rt.renderer().has_rendered(root));
        assert!(!rt.release(el.host()));

        el.set("count", 4).unwrap();
        doc.remove(el.host()).unwrap();
        assert!(rt.release(el.host()));
        assert!(rt.element(el.host()).is_none());
        assert!(!rt.renderer().has_rendered(root));
        assert!(!rt.release(el.host()));
        rt.animation_frame().unwrap();
        assert!(!doc.has_attribute(el.host(), "count"));
    }

    #[test]
    fn test_properties_set_before_upgrade() {
        let doc = Document::new();
        let rt = runtime(&doc);
        let host = doc.create_element("lumen-counter");
        doc.set_property(host, "count", Value::from(3)).unwrap();
        doc.set_attribute(host, "label", "Clicks").unwrap();
        doc.append_child(doc.body(), host).unwrap();

        rt.define(counter()).unwrap();
        let el = rt.element(host).unwrap();
        assert_eq!(el.get("count"), Value::from(3));
        assert_eq!(el.get_string("label").as_deref(), Some("Clicks"));
        assert_eq!(doc.text_content(el.shadow_root().unwrap()), "Clicks: 3");
    }

    #[test]
    fn test_connect_renders_immediately() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.append_child(doc.body(), el.host()).unwrap();
        assert!(el.when_dom_ref_ready().is_settled());
        assert_eq!(doc.local_name(el.dom_ref().unwrap()).as_deref(), Some("span"));
        assert_eq!(rt.scheduler().task_count(), 1);
    }

    #[test]
    fn test_property_set_coalesces_into_one_render() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.append_child(doc.body(), el.host()).unwrap();

        el.set("count", 1).unwrap();
        el.set("count", 2).unwrap();
        el.set("label", "n").unwrap();
        assert_eq!(doc.text_content(el.shadow_root().unwrap()), ": 0");
        rt.animation_frame().unwrap();
        assert_eq!(doc.text_content(el.shadow_root().unwrap()), "n: 2");
        assert_eq!(rt.scheduler().task_count(), 2);
    }

    #[test]
    fn test_validation_fallbacks() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        el.set("count", 2.5).unwrap();
        assert_eq!(el.get("count"), Value::from(0));
        el.set("open", "yes").unwrap();
        assert!(!el.get_bool("open"));
        el.set("label", 7).unwrap();
        assert_eq!(el.get_string("label").as_deref(), Some("7"));
        assert!(matches!(el.set("missing", 1), Err(ElementError::UnknownProperty(_))));
    }

    #[test]
    fn test_reflection_skips_objects_and_null() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        el.set("label", Value::Null).unwrap();
        el.set("data", Value::object_from([("a", 1)])).unwrap();
        el.set("open", true).unwrap();
        rt.animation_frame().unwrap();
        assert!(!doc.has_attribute(el.host(), "label"));
        assert!(!doc.has_attribute(el.host(), "data"));
        assert_eq!(doc.get_attribute(el.host(), "open").as_deref(), Some(""));
    }

    #[test]
    fn test_property_change_event() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        doc.add_event_listener(
            el.host(),
            PROPERTY_CHANGE_EVENT,
            Rc::new(move |event: &mut Event| sink.borrow_mut().push(event.detail.clone())),
            Default::default(),
        );
        el.set("count", 4).unwrap();
        el.set("count", 4).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get("name"), Some(&Value::from("count")));
        assert_eq!(seen[0].get("newValue"), Some(&Value::from(4)));
    }

    #[test]
    fn test_dom_property_access_goes_through_state() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.set_property(el.host(), "count", Value::from(9)).unwrap();
        assert_eq!(el.get("count"), Value::from(9));
        assert_eq!(doc.get_property(el.host(), "count"), Value::from(9));
        doc.set_property(el.host(), "custom", Value::from(1)).unwrap();
        assert_eq!(doc.get_property(el.host(), "custom"), Value::from(1));
    }

    #[test]
    fn test_compact_size_attribute() {
        let doc = Document::new();
        let configuration = Configuration {
            compact_size: true,
            ..Configuration::default()
        };
        let rt = Runtime::builder(&doc)
            .configuration(configuration)
            .scheduler(SchedulerConfig::manual())
            .build()
            .unwrap();
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.append_child(doc.body(), el.host()).unwrap();
        assert!(doc.has_attribute(el.host(), COMPACT_SIZE_ATTRIBUTE));
    }

    #[test]
    fn test_custom_css_rerenders() {
        let doc = Document::new();
        let rt = runtime(&doc);
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.append_child(doc.body(), el.host()).unwrap();
        rt.add_custom_css("lumen-counter", "span{color:red}");
        rt.animation_frame().unwrap();
        let root = el.shadow_root().unwrap();
        let style = doc.element_children(root)[0];
        assert_eq!(doc.local_name(style).as_deref(), Some("style"));
        assert!(doc.text_content(style).contains("span{color:red}"));
        assert_eq!(doc.local_name(el.dom_ref().unwrap()).as_deref(), Some("span"));
    }

    #[test]
    fn test_timer_mode_renders_without_host_frames() {
        let doc = Document::new();
        let rt = Runtime::builder(&doc)
            .configuration(Configuration::default())
            .scheduler(SchedulerConfig {
                frame_mode: FrameMode::Timer(std::time::Duration::from_millis(1)),
                quiescence_delay: std::time::Duration::from_millis(5),
                ..SchedulerConfig::default()
            })
            .build()
            .unwrap();
        rt.define(counter()).unwrap();
        let el = rt.create_element("lumen-counter").unwrap();
        doc.append_child(doc.body(), el.host()).unwrap();
        el.set("count", 8).unwrap();
        rt.run(rt.when_dom_updated());
        assert_eq!(doc.text_content(el.shadow_root().unwrap()), ": 8");
        assert_eq!(doc.get_attribute(el.host(), "count").as_deref(), Some("8"));
    }
}
