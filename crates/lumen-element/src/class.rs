//! Component classes
//!
//! An [`ElementClass`] bundles everything a tag needs: its metadata
//! descriptor, template function, styles, lifecycle hooks and convention
//! based native event handlers. A class may extend a parent class; template,
//! styles, hooks and handlers it does not set itself are inherited.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use lumen_dom::Event;
use lumen_template::TemplateResult;

use crate::component::ElementRef;
use crate::metadata::{ElementMetadata, MetadataDescriptor};

/// Renders a component; must not change its state
pub type TemplateFn = Rc<dyn Fn(&ElementRef) -> TemplateResult>;

/// Lifecycle hook
pub type Hook = Rc<dyn Fn(&ElementRef)>;

/// Convention handler for a native event type
pub type NativeHandler = Rc<dyn Fn(&ElementRef, &mut Event)>;

/// Optional lifecycle hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeRendering,
    AfterRendering,
    EnterDom,
    ExitDom,
    ChildrenChanged,
}

pub struct ElementClass {
    tag: String,
    parent: Option<Rc<ElementClass>>,
    descriptor: MetadataDescriptor,
    template: Option<TemplateFn>,
    styles: Option<Vec<String>>,
    hooks: HashMap<HookKind, Hook>,
    handlers: HashMap<String, NativeHandler>,
    metadata: OnceCell<Rc<ElementMetadata>>,
}

impl ElementClass {
    pub fn builder(tag: &str) -> ElementClassBuilder {
        ElementClassBuilder::new(tag)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<&Rc<ElementClass>> {
        self.parent.as_ref()
    }

    pub fn descriptor(&self) -> &MetadataDescriptor {
        &self.descriptor
    }

    /// Metadata merged over the ancestor chain, computed on first use
    pub fn metadata(&self) -> Rc<ElementMetadata> {
        self.metadata
            .get_or_init(|| {
                let mut chain = Vec::new();
                let mut class = Some(self);
                while let Some(current) = class {
                    chain.push(&current.descriptor);
                    class = current.parent.as_deref();
                }
                tracing::debug!(tag = %self.tag, levels = chain.len(), "Resolving element metadata");
                Rc::new(ElementMetadata::merge(chain.into_iter().rev()))
            })
            .clone()
    }

    pub fn template(&self) -> Option<&TemplateFn> {
        self.template
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.template()))
    }

    /// Classes with a template render into a shadow root
    pub fn needs_shadow_dom(&self) -> bool {
        self.template().is_some()
    }

    /// Ordered style fragments
    pub fn styles(&self) -> &[String] {
        match (&self.styles, &self.parent) {
            (Some(styles), _) => styles,
            (None, Some(parent)) => parent.styles(),
            (None, None) => &[],
        }
    }

    pub fn hook(&self, kind: HookKind) -> Option<&Hook> {
        self.hooks
            .get(&kind)
            .or_else(|| self.parent.as_ref().and_then(|p| p.hook(kind)))
    }

    /// Handler invoked for `event_type` by the event router (`on<type>`)
    pub fn handler(&self, event_type: &str) -> Option<&NativeHandler> {
        self.handlers
            .get(event_type)
            .or_else(|| self.parent.as_ref().and_then(|p| p.handler(event_type)))
    }
}

impl fmt::Debug for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementClass")
            .field("tag", &self.tag)
            .field("parent", &self.parent.as_ref().map(|p| p.tag.clone()))
            .field("has_template", &self.template.is_some())
            .finish()
    }
}

/// Builder for [`ElementClass`]
pub struct ElementClassBuilder {
    tag: String,
    parent: Option<Rc<ElementClass>>,
    descriptor: MetadataDescriptor,
    template: Option<TemplateFn>,
    styles: Option<Vec<String>>,
    hooks: HashMap<HookKind, Hook>,
    handlers: HashMap<String, NativeHandler>,
}

impl ElementClassBuilder {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            parent: None,
            descriptor: MetadataDescriptor::default(),
            template: None,
            styles: None,
            hooks: HashMap::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn extends(mut self, parent: Rc<ElementClass>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn metadata(mut self, descriptor: MetadataDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn template(mut self, template: impl Fn(&ElementRef) -> TemplateResult + 'static) -> Self {
        self.template = Some(Rc::new(template));
        self
    }

    pub fn style(mut self, css: &str) -> Self {
        self.styles.get_or_insert_with(Vec::new).push(css.to_string());
        self
    }

    pub fn hook(mut self, kind: HookKind, hook: impl Fn(&ElementRef) + 'static) -> Self {
        self.hooks.insert(kind, Rc::new(hook));
        self
    }

    pub fn on_before_rendering(self, hook: impl Fn(&ElementRef) + 'static) -> Self {
        self.hook(HookKind::BeforeRendering, hook)
    }

    pub fn on_after_rendering(self, hook: impl Fn(&ElementRef) + 'static) -> Self {
        self.hook(HookKind::AfterRendering, hook)
    }

    pub fn on_enter_dom(self, hook: impl Fn(&ElementRef) + 'static) -> Self {
        self.hook(HookKind::EnterDom, hook)
    }

    pub fn on_exit_dom(self, hook: impl Fn(&ElementRef) + 'static) -> Self {
        self.hook(HookKind::ExitDom, hook)
    }

    pub fn on_children_changed(self, hook: impl Fn(&ElementRef) + 'static) -> Self {
        self.hook(HookKind::ChildrenChanged, hook)
    }

    /// Convention handler, e.g. `on_event("click", ..)` for `onclick`
    pub fn on_event(
        mut self,
        event_type: &str,
        handler: impl Fn(&ElementRef, &mut Event) + 'static,
    ) -> Self {
        self.handlers.insert(event_type.to_string(), Rc::new(handler));
        self
    }

    pub fn build(self) -> Rc<ElementClass> {
        Rc::new(ElementClass {
            tag: self.tag,
            parent: self.parent,
            descriptor: self.descriptor,
            template: self.template,
            styles: self.styles,
            hooks: self.hooks,
            handlers: self.handlers,
            metadata: OnceCell::new(),
        })
    }
}
