//! Attribute, property, boolean and event parts
//!
//! A part holds the last committed value and the pending one. `set_value`
//! never touches the DOM; `commit` writes only when the value changed.
//! Attribute and property holes of one attribute share a committer that
//! renders the whole interpolated value once per commit.

use std::cell::RefCell;
use std::rc::Rc;

use lumen_dom::{Listener, ListenerId, ListenerOptions, NodeId, Value};

use crate::TemplateError;
use crate::render::RenderContext;
use crate::value::{DirectiveContext, EventHandler, PartKind, PartValue, resolve};

/// A dynamic binding of a template instance
pub trait Part {
    /// Stage a value; no DOM access
    fn set_value(&mut self, value: PartValue);

    /// Apply the staged value to the DOM
    fn commit(&mut self) -> Result<(), TemplateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitTarget {
    Attribute,
    Property,
}

#[derive(Debug)]
struct CommitterState {
    element: NodeId,
    name: String,
    strings: Vec<String>,
    values: Vec<PartValue>,
    dirty: bool,
    target: CommitTarget,
}

impl CommitterState {
    fn interpolate(&self) -> String {
        let mut text = String::new();
        let holes = self.strings.len().saturating_sub(1);
        for i in 0..holes {
            text.push_str(&self.strings[i]);
            match self.values.get(i) {
                Some(PartValue::List(items)) => {
                    for item in items {
                        text.push_str(&item.to_attribute_text());
                    }
                }
                Some(PartValue::Value(Value::List(items))) => {
                    for item in items {
                        text.push_str(&item.to_js_string());
                    }
                }
                Some(value) => text.push_str(&value.to_attribute_text()),
                None => {}
            }
        }
        if let Some(last) = self.strings.last() {
            text.push_str(last);
        }
        text
    }

    fn is_single(&self) -> bool {
        self.strings.len() == 2 && self.strings[0].is_empty() && self.strings[1].is_empty()
    }
}

fn commit_shared(ctx: &RenderContext, state: &RefCell<CommitterState>) -> Result<(), TemplateError> {
    let (element, name, target, value) = {
        let mut s = state.borrow_mut();
        if !s.dirty {
            return Ok(());
        }
        s.dirty = false;
        let value = match s.target {
            CommitTarget::Property if s.is_single() => s.values[0].to_value(),
            _ => Value::String(s.interpolate()),
        };
        (s.element, s.name.clone(), s.target, value)
    };
    match target {
        CommitTarget::Attribute => {
            let text = value.to_js_string();
            tracing::trace!(?element, name = %name, "commit attribute");
            ctx.doc.set_attribute(element, &name, &text)?;
        }
        CommitTarget::Property => {
            tracing::trace!(?element, name = %name, "commit property");
            ctx.doc.set_property(element, &name, value)?;
        }
    }
    Ok(())
}

/// Renders one attribute from its literal strings and hole values
pub struct AttributeCommitter {
    ctx: Rc<RenderContext>,
    state: Rc<RefCell<CommitterState>>,
}

impl AttributeCommitter {
    pub fn new(ctx: Rc<RenderContext>, element: NodeId, name: &str, strings: Vec<String>) -> Self {
        Self::with_target(ctx, element, name, strings, CommitTarget::Attribute)
    }

    fn with_target(
        ctx: Rc<RenderContext>,
        element: NodeId,
        name: &str,
        strings: Vec<String>,
        target: CommitTarget,
    ) -> Self {
        let holes = strings.len().saturating_sub(1);
        Self {
            ctx,
            state: Rc::new(RefCell::new(CommitterState {
                element,
                name: name.to_string(),
                strings,
                values: vec![PartValue::default(); holes],
                dirty: true,
                target,
            })),
        }
    }

    /// One part per hole
    pub fn parts(&self) -> Vec<AttributePart> {
        let (holes, kind) = {
            let s = self.state.borrow();
            let kind = match s.target {
                CommitTarget::Attribute => PartKind::Attribute,
                CommitTarget::Property => PartKind::Property,
            };
            (s.values.len(), kind)
        };
        (0..holes)
            .map(|index| AttributePart {
                ctx: self.ctx.clone(),
                state: self.state.clone(),
                index,
                kind,
            })
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    pub fn commit(&self) -> Result<(), TemplateError> {
        commit_shared(&self.ctx, &self.state)
    }
}

/// Assigns a property instead of an attribute. A binding that is the whole
/// value passes the raw value through; otherwise the interpolated string is
/// assigned.
pub struct PropertyCommitter(AttributeCommitter);

impl PropertyCommitter {
    pub fn new(ctx: Rc<RenderContext>, element: NodeId, name: &str, strings: Vec<String>) -> Self {
        Self(AttributeCommitter::with_target(
            ctx,
            element,
            name,
            strings,
            CommitTarget::Property,
        ))
    }

    pub fn parts(&self) -> Vec<AttributePart> {
        self.0.parts()
    }

    pub fn commit(&self) -> Result<(), TemplateError> {
        self.0.commit()
    }
}

/// One hole of an attribute or property binding
pub struct AttributePart {
    ctx: Rc<RenderContext>,
    state: Rc<RefCell<CommitterState>>,
    index: usize,
    kind: PartKind,
}

impl AttributePart {
    /// Currently staged value
    pub fn value(&self) -> PartValue {
        self.state.borrow().values[self.index].clone()
    }
}

impl Part for AttributePart {
    fn set_value(&mut self, value: PartValue) {
        if matches!(value, PartValue::NoChange) {
            return;
        }
        let mut s = self.state.borrow_mut();
        if value.is_primitive() && value.same_primitive(&s.values[self.index]) {
            return;
        }
        let directive = matches!(value, PartValue::Directive(_));
        s.values[self.index] = value;
        if !directive {
            s.dirty = true;
        }
    }

    fn commit(&mut self) -> Result<(), TemplateError> {
        loop {
            let (directive, element, name) = {
                let mut s = self.state.borrow_mut();
                let slot = &mut s.values[self.index];
                let directive = match std::mem::replace(slot, PartValue::NoChange) {
                    PartValue::Directive(d) => d,
                    other => {
                        *slot = other;
                        break;
                    }
                };
                (directive, s.element, s.name.clone())
            };
            let resolved = directive.call(&DirectiveContext {
                doc: &self.ctx.doc,
                kind: self.kind,
                element: Some(element),
                name: Some(&name),
            });
            self.set_value(resolved);
        }
        if matches!(self.state.borrow().values[self.index], PartValue::NoChange) {
            return Ok(());
        }
        commit_shared(&self.ctx, &self.state)
    }
}

/// `?name` binding: present when truthy, absent otherwise
pub struct BooleanAttributePart {
    ctx: Rc<RenderContext>,
    element: NodeId,
    name: String,
    value: Option<bool>,
    pending: PartValue,
}

impl BooleanAttributePart {
    pub fn new(
        ctx: Rc<RenderContext>,
        element: NodeId,
        name: &str,
        strings: Vec<String>,
    ) -> Result<Self, TemplateError> {
        if strings.len() != 2 || !strings[0].is_empty() || !strings[1].is_empty() {
            return Err(TemplateError::BooleanAttribute(name.to_string()));
        }
        Ok(Self {
            ctx,
            element,
            name: name.to_string(),
            value: None,
            pending: PartValue::default(),
        })
    }
}

impl Part for BooleanAttributePart {
    fn set_value(&mut self, value: PartValue) {
        self.pending = value;
    }

    fn commit(&mut self) -> Result<(), TemplateError> {
        let pending = std::mem::replace(&mut self.pending, PartValue::NoChange);
        let value = resolve(
            pending,
            &DirectiveContext {
                doc: &self.ctx.doc,
                kind: PartKind::BooleanAttribute,
                element: Some(self.element),
                name: Some(&self.name),
            },
        );
        let present = match value {
            PartValue::NoChange => return Ok(()),
            PartValue::Value(v) => v.is_truthy(),
            _ => true,
        };
        if self.value != Some(present) {
            if present {
                self.ctx.doc.set_attribute(self.element, &self.name, "")?;
            } else {
                self.ctx.doc.remove_attribute(self.element, &self.name)?;
            }
            self.value = Some(present);
        }
        Ok(())
    }
}

/// `@event` binding. One listener stays registered while the handler
/// changes; it is re-registered only when listener options differ.
pub struct EventPart {
    ctx: Rc<RenderContext>,
    element: NodeId,
    event_name: String,
    current: Rc<RefCell<Option<EventHandler>>>,
    bound: Listener,
    registration: Option<(ListenerId, ListenerOptions)>,
    pending: PartValue,
}

impl EventPart {
    pub fn new(ctx: Rc<RenderContext>, element: NodeId, event_name: &str) -> Self {
        let current: Rc<RefCell<Option<EventHandler>>> = Rc::new(RefCell::new(None));
        let this = ctx.event_context.unwrap_or(element);
        let slot = current.clone();
        let bound: Listener = Rc::new(move |event| {
            let handler = slot.borrow().clone();
            if let Some(handler) = handler {
                handler.call(this, event);
            }
        });
        Self {
            ctx,
            element,
            event_name: event_name.to_string(),
            current,
            bound,
            registration: None,
            pending: PartValue::default(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }
}

impl Part for EventPart {
    fn set_value(&mut self, value: PartValue) {
        self.pending = value;
    }

    fn commit(&mut self) -> Result<(), TemplateError> {
        let pending = std::mem::replace(&mut self.pending, PartValue::NoChange);
        let value = resolve(
            pending,
            &DirectiveContext {
                doc: &self.ctx.doc,
                kind: PartKind::Event,
                element: Some(self.element),
                name: Some(&self.event_name),
            },
        );
        let handler = match value {
            PartValue::NoChange => return Ok(()),
            PartValue::Listener(handler) => Some(handler),
            PartValue::Nothing => None,
            PartValue::Value(v) if v.is_nullish() => None,
            other => {
                tracing::warn!("`@{}` expects an event handler, got {:?}", self.event_name, other);
                None
            }
        };

        let should_remove = match (&handler, self.registration) {
            (None, _) => true,
            (Some(new), Some((_, options))) => new.options() != options,
            (Some(_), None) => false,
        };
        let should_add = handler.is_some() && (self.registration.is_none() || should_remove);

        if should_remove {
            if let Some((id, _)) = self.registration.take() {
                self.ctx.doc.remove_event_listener(self.element, id);
            }
        }
        if should_add {
            if let Some(new) = &handler {
                let id = self.ctx.doc.add_event_listener(
                    self.element,
                    &self.event_name,
                    self.bound.clone(),
                    new.options(),
                );
                self.registration = Some((id, new.options()));
            }
        }
        *self.current.borrow_mut() = handler;
        Ok(())
    }
}
