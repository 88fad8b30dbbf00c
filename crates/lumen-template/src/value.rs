//! Binding values
//!
//! Everything a template hole can hold: plain DOM values, nested template
//! results, lists, event handlers and directives, plus the two sentinels
//! `NoChange` and `Nothing`.

use std::fmt;
use std::rc::Rc;

use lumen_dom::{Document, Event, ListenerOptions, NodeId, Value};

use crate::result::TemplateResult;

/// Value bound to a template hole
#[derive(Clone, Debug)]
pub enum PartValue {
    Value(Value),
    Template(TemplateResult),
    List(Vec<PartValue>),
    Listener(EventHandler),
    Directive(Directive),
    /// Leave the part as it is
    NoChange,
    /// Clear a node part
    Nothing,
}

impl PartValue {
    /// Convert to a DOM value. Templates, listeners and sentinels have no
    /// DOM representation and become `Undefined`.
    pub fn to_value(&self) -> Value {
        match self {
            PartValue::Value(v) => v.clone(),
            PartValue::List(items) => Value::List(items.iter().map(PartValue::to_value).collect()),
            _ => Value::Undefined,
        }
    }

    /// Primitive DOM values compare by value; everything else is always
    /// treated as changed.
    pub fn is_primitive(&self) -> bool {
        matches!(self, PartValue::Value(v) if v.is_primitive())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, PartValue::Value(v) if v.is_nullish())
    }

    /// `String(value)` as an attribute interpolation sees it
    pub(crate) fn to_attribute_text(&self) -> String {
        match self {
            PartValue::Value(v) => v.to_js_string(),
            _ => "[object Object]".to_string(),
        }
    }

    pub(crate) fn same_primitive(&self, other: &PartValue) -> bool {
        match (self, other) {
            (PartValue::Value(a), PartValue::Value(b)) => a.is_primitive() && a.same_value(b),
            _ => false,
        }
    }
}

impl Default for PartValue {
    fn default() -> Self {
        PartValue::Value(Value::Undefined)
    }
}

impl From<Value> for PartValue {
    fn from(v: Value) -> Self {
        PartValue::Value(v)
    }
}

impl From<&str> for PartValue {
    fn from(s: &str) -> Self {
        PartValue::Value(Value::String(s.to_string()))
    }
}

impl From<String> for PartValue {
    fn from(s: String) -> Self {
        PartValue::Value(Value::String(s))
    }
}

impl From<&String> for PartValue {
    fn from(s: &String) -> Self {
        PartValue::Value(Value::String(s.clone()))
    }
}

impl From<bool> for PartValue {
    fn from(b: bool) -> Self {
        PartValue::Value(Value::Bool(b))
    }
}

impl From<f64> for PartValue {
    fn from(n: f64) -> Self {
        PartValue::Value(Value::Number(n))
    }
}

impl From<i32> for PartValue {
    fn from(n: i32) -> Self {
        PartValue::Value(Value::from(n))
    }
}

impl From<i64> for PartValue {
    fn from(n: i64) -> Self {
        PartValue::Value(Value::from(n))
    }
}

impl From<u32> for PartValue {
    fn from(n: u32) -> Self {
        PartValue::Value(Value::from(n))
    }
}

impl From<usize> for PartValue {
    fn from(n: usize) -> Self {
        PartValue::Value(Value::Number(n as f64))
    }
}

impl From<NodeId> for PartValue {
    fn from(node: NodeId) -> Self {
        PartValue::Value(Value::Node(node))
    }
}

impl From<TemplateResult> for PartValue {
    fn from(result: TemplateResult) -> Self {
        PartValue::Template(result)
    }
}

impl From<EventHandler> for PartValue {
    fn from(handler: EventHandler) -> Self {
        PartValue::Listener(handler)
    }
}

impl From<Directive> for PartValue {
    fn from(directive: Directive) -> Self {
        PartValue::Directive(directive)
    }
}

impl<T: Into<PartValue>> From<Vec<T>> for PartValue {
    fn from(items: Vec<T>) -> Self {
        PartValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PartValue>> From<Option<T>> for PartValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PartValue::Value(Value::Undefined), Into::into)
    }
}

/// Object form of an event handler
pub trait HandleEvent {
    fn handle_event(&self, this: NodeId, event: &mut Event);
}

/// Event listener bound through an `@event` attribute
#[derive(Clone)]
pub struct EventHandler {
    callback: Rc<dyn Fn(NodeId, &mut Event)>,
    options: ListenerOptions,
}

impl EventHandler {
    /// `callback` receives the `this` node (event context or the element)
    pub fn new(callback: impl Fn(NodeId, &mut Event) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
            options: ListenerOptions::default(),
        }
    }

    /// Wrap a handler object
    pub fn from_object<H: HandleEvent + 'static>(handler: Rc<H>) -> Self {
        Self::new(move |this, event| handler.handle_event(this, event))
    }

    pub fn with_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ListenerOptions {
        self.options
    }

    pub fn call(&self, this: NodeId, event: &mut Event) {
        (self.callback)(this, event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Which kind of part a directive is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Attribute,
    BooleanAttribute,
    Property,
    Event,
    Node,
}

/// What a directive can see of the part it runs against
pub struct DirectiveContext<'a> {
    pub doc: &'a Document,
    pub kind: PartKind,
    /// Bound element, absent for node parts
    pub element: Option<NodeId>,
    /// Bound attribute, property or event name
    pub name: Option<&'a str>,
}

/// Deferred computation resolved by the part at commit time
#[derive(Clone)]
pub struct Directive(Rc<dyn Fn(&DirectiveContext<'_>) -> PartValue>);

impl Directive {
    pub fn new(f: impl Fn(&DirectiveContext<'_>) -> PartValue + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, ctx: &DirectiveContext<'_>) -> PartValue {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Directive(..)")
    }
}

/// Resolve directives until a plain value or `NoChange` remains
pub(crate) fn resolve(mut value: PartValue, ctx: &DirectiveContext<'_>) -> PartValue {
    while let PartValue::Directive(directive) = value {
        value = directive.call(ctx);
    }
    value
}

/// Bind `value` unless it is undefined.
///
/// On attribute and property parts an undefined value removes the attribute,
/// and a value equal to the current attribute text skips the write.
pub fn if_defined(value: impl Into<PartValue>) -> Directive {
    let value = value.into();
    Directive::new(move |ctx| {
        let attribute_like = matches!(ctx.kind, PartKind::Attribute | PartKind::Property);
        let (Some(element), Some(name)) = (ctx.element, ctx.name) else {
            return value.clone();
        };
        if attribute_like && matches!(value, PartValue::Value(Value::Undefined)) {
            if let Err(err) = ctx.doc.remove_attribute(element, name) {
                tracing::warn!("if_defined could not remove `{}`: {}", name, err);
            }
            return PartValue::NoChange;
        }
        if attribute_like {
            if let PartValue::Value(Value::String(s)) = &value {
                if ctx.doc.get_attribute(element, name).as_deref() == Some(s.as_str()) {
                    return PartValue::NoChange;
                }
            }
        }
        value.clone()
    })
}
