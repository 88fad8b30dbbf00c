//! Element metadata
//!
//! Components declare their properties, slots and events in a
//! [`MetadataDescriptor`]. The descriptors of a class and its ancestors are
//! merged once into an immutable [`ElementMetadata`].

use std::rc::Rc;

use indexmap::IndexMap;
use lumen_dom::{Document, NodeId, Value};

use crate::ElementError;
use crate::data_type::DataType;

/// Members of native elements that component properties may not shadow
const NATIVE_MEMBERS: &[&str] = &[
    "accessKey", "addEventListener", "appendChild", "attachShadow", "attributes", "blur",
    "childNodes", "children", "classList", "className", "click", "cloneNode", "contains",
    "contentEditable", "dataset", "dir", "dispatchEvent", "draggable", "firstChild", "focus",
    "getAttribute", "hasAttribute", "hidden", "id", "innerHTML", "innerText", "insertBefore",
    "isConnected", "lang", "lastChild", "localName", "namespaceURI", "nextSibling", "nodeName",
    "nodeType", "nodeValue", "outerHTML", "ownerDocument", "parentElement", "parentNode",
    "previousSibling", "querySelector", "remove", "removeAttribute", "removeChild",
    "removeEventListener", "replaceChild", "setAttribute", "shadowRoot", "slot", "spellcheck",
    "style", "tabIndex", "tagName", "textContent", "title", "translate",
];

/// Whether `name` can be used for a property or slot property
pub fn is_valid_property_name(name: &str) -> bool {
    if name == "disabled" {
        return true;
    }
    !name.is_empty() && !NATIVE_MEMBERS.contains(&name)
}

/// `fooBarBaz` to `foo-bar-baz`
pub fn camel_to_kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('-');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// `foo-bar-baz` to `fooBarBaz`
pub fn kebab_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        match c {
            '-' => upper = true,
            c if upper && c.is_ascii_lowercase() => {
                out.push(c.to_ascii_uppercase());
                upper = false;
            }
            c => {
                if upper {
                    out.push('-');
                    upper = false;
                }
                out.push(c);
            }
        }
    }
    if upper {
        out.push('-');
    }
    out
}

/// Type of a declared property
#[derive(Clone, Debug)]
pub enum PropertyType {
    Boolean,
    String,
    /// Arbitrary values, never reflected to an attribute
    Object,
    Custom(Rc<dyn DataType>),
}

/// Declaration of one property
#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub ty: PropertyType,
    pub default: Option<Value>,
    pub multiple: bool,
    pub no_attribute: bool,
}

impl PropertyDecl {
    pub fn new(ty: PropertyType) -> Self {
        Self {
            ty,
            default: None,
            multiple: false,
            no_attribute: false,
        }
    }

    pub fn boolean() -> Self {
        Self::new(PropertyType::Boolean)
    }

    pub fn string() -> Self {
        Self::new(PropertyType::String)
    }

    pub fn object() -> Self {
        Self::new(PropertyType::Object)
    }

    pub fn custom(ty: impl DataType + 'static) -> Self {
        Self::new(PropertyType::Custom(Rc::new(ty)))
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn no_attribute(mut self) -> Self {
        self.no_attribute = true;
        self
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.ty, PropertyType::Boolean)
    }

    fn fallback(&self) -> Value {
        self.default.clone().unwrap_or_default()
    }

    /// Value a fresh instance starts with
    pub fn initial_value(&self) -> Value {
        match &self.ty {
            PropertyType::Boolean => Value::Bool(false),
            _ if self.multiple => Value::List(Vec::new()),
            PropertyType::Object => self.default.clone().unwrap_or_else(Value::object),
            PropertyType::String => self.default.clone().unwrap_or_else(|| Value::from("")),
            PropertyType::Custom(_) => self.fallback(),
        }
    }

    /// Coerce `value` to this declaration. Never fails; unusable values
    /// become the declared default.
    pub fn validate(&self, value: Value) -> Value {
        if !self.multiple {
            return self.validate_single(value);
        }
        match value {
            Value::List(items) => {
                Value::List(items.into_iter().map(|v| self.validate_single(v)).collect())
            }
            _ => Value::List(Vec::new()),
        }
    }

    fn validate_single(&self, value: Value) -> Value {
        match &self.ty {
            PropertyType::Boolean => match value {
                Value::Bool(_) => value,
                _ => Value::Bool(false),
            },
            PropertyType::String => match value {
                Value::String(_) | Value::Null | Value::Undefined => value,
                other => Value::String(other.to_js_string()),
            },
            PropertyType::Object => match value {
                Value::Object(_) | Value::List(_) | Value::Null | Value::Node(_) => value,
                _ => self.fallback(),
            },
            PropertyType::Custom(ty) => {
                if ty.is_valid(&value) {
                    value
                } else {
                    self.fallback()
                }
            }
        }
    }

    /// Property value for an attribute change
    pub fn from_attribute(&self, attribute: Option<&str>) -> Value {
        match &self.ty {
            PropertyType::Boolean => Value::Bool(attribute.is_some()),
            PropertyType::Custom(ty) => ty.from_attribute(attribute),
            _ => attribute.map_or(Value::Null, Value::from),
        }
    }
}

/// Nodes a slot accepts
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotType {
    /// Any node, text included
    Node,
    /// Any element
    Element,
    /// Elements with this local name
    Tag(String),
}

/// Which property changes of slotted children invalidate the parent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenFor {
    /// Exactly these properties
    Props(Vec<String>),
    /// The listed properties (all of the child's when `None`) minus `exclude`
    Filter {
        props: Option<Vec<String>>,
        exclude: Vec<String>,
    },
}

/// Declaration of one slot
#[derive(Clone, Debug)]
pub struct SlotDecl {
    pub ty: SlotType,
    /// State key holding the slotted nodes; the slot name when `None`
    pub property_name: Option<String>,
    /// Give every child its own `<name>-<n>` slot
    pub individual_slots: bool,
    pub listen_for: Option<ListenFor>,
}

impl SlotDecl {
    pub fn new(ty: SlotType) -> Self {
        Self {
            ty,
            property_name: None,
            individual_slots: false,
            listen_for: None,
        }
    }

    pub fn node() -> Self {
        Self::new(SlotType::Node)
    }

    pub fn element() -> Self {
        Self::new(SlotType::Element)
    }

    pub fn tag(name: &str) -> Self {
        Self::new(SlotType::Tag(name.to_ascii_lowercase()))
    }

    pub fn property_name(mut self, name: &str) -> Self {
        self.property_name = Some(name.to_string());
        self
    }

    pub fn individual_slots(mut self) -> Self {
        self.individual_slots = true;
        self
    }

    pub fn listen_for(mut self, listen_for: ListenFor) -> Self {
        self.listen_for = Some(listen_for);
        self
    }

    fn accepts(&self, doc: &Document, node: NodeId) -> bool {
        match &self.ty {
            SlotType::Node => true,
            SlotType::Element => doc.is_element(node),
            SlotType::Tag(tag) => doc.local_name(node).as_deref() == Some(tag.as_str()),
        }
    }

    fn type_name(&self) -> String {
        match &self.ty {
            SlotType::Node => "Node".to_string(),
            SlotType::Element => "Element".to_string(),
            SlotType::Tag(tag) => tag.clone(),
        }
    }
}

/// Declaration of one event
#[derive(Clone, Debug, Default)]
pub struct EventDecl {
    /// Detail keys, informational only
    pub detail: Vec<String>,
}

/// What a single class declares
#[derive(Clone, Debug, Default)]
pub struct MetadataDescriptor {
    pub properties: IndexMap<String, PropertyDecl>,
    pub slots: IndexMap<String, SlotDecl>,
    pub events: IndexMap<String, EventDecl>,
    /// Inherited from ancestors when `None`
    pub event_handlers_by_convention: Option<bool>,
}

impl MetadataDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: &str, decl: PropertyDecl) -> Self {
        self.properties.insert(name.to_string(), decl);
        self
    }

    pub fn slot(mut self, name: &str, decl: SlotDecl) -> Self {
        self.slots.insert(name.to_string(), decl);
        self
    }

    pub fn event(mut self, name: &str) -> Self {
        self.events.insert(name.to_string(), EventDecl::default());
        self
    }

    pub fn event_handlers_by_convention(mut self, enabled: bool) -> Self {
        self.event_handlers_by_convention = Some(enabled);
        self
    }
}

/// Merged metadata of a class and all of its ancestors
#[derive(Debug, Default)]
pub struct ElementMetadata {
    properties: IndexMap<String, PropertyDecl>,
    slots: IndexMap<String, SlotDecl>,
    events: IndexMap<String, EventDecl>,
    /// Observed attribute name to property name
    attributes: IndexMap<String, String>,
    event_handlers_by_convention: bool,
}

impl ElementMetadata {
    /// Merge descriptors ordered from the root ancestor to the class itself.
    /// Later declarations replace earlier ones of the same name.
    pub fn merge<'a>(chain: impl IntoIterator<Item = &'a MetadataDescriptor>) -> Self {
        let mut merged = Self::default();
        for descriptor in chain {
            for (name, decl) in &descriptor.properties {
                merged.properties.insert(name.clone(), decl.clone());
            }
            for (name, decl) in &descriptor.slots {
                merged.slots.insert(name.clone(), decl.clone());
            }
            for (name, decl) in &descriptor.events {
                merged.events.insert(name.clone(), decl.clone());
            }
            if let Some(enabled) = descriptor.event_handlers_by_convention {
                merged.event_handlers_by_convention = enabled;
            }
        }
        let attributes = merged
            .properties
            .keys()
            .filter(|name| merged.has_attribute(name))
            .map(|name| (camel_to_kebab(name), name.clone()))
            .collect();
        merged.attributes = attributes;
        merged
    }

    pub fn properties(&self) -> &IndexMap<String, PropertyDecl> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.get(name)
    }

    pub fn props_list(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    /// Whether the property is mirrored by an attribute
    pub fn has_attribute(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .is_some_and(|p| !matches!(p.ty, PropertyType::Object) && !p.no_attribute)
    }

    /// Observed attribute names, kebab-case
    pub fn attributes_list(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    /// Property mirrored by the attribute `attribute`
    pub fn property_for_attribute(&self, attribute: &str) -> Option<(&str, &PropertyDecl)> {
        let name = self.attributes.get(attribute)?;
        self.properties
            .get_key_value(name.as_str())
            .map(|(name, decl)| (name.as_str(), decl))
    }

    pub fn slots(&self) -> &IndexMap<String, SlotDecl> {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDecl> {
        self.slots.get(name)
    }

    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    /// State key of a slot
    pub fn slot_property_name<'a>(&'a self, slot: &'a str) -> &'a str {
        self.slots
            .get(slot)
            .and_then(|s| s.property_name.as_deref())
            .unwrap_or(slot)
    }

    /// Whether `name` is the state key of a slot
    pub fn is_slot_property(&self, name: &str) -> bool {
        self.slots.keys().any(|slot| self.slot_property_name(slot) == name)
    }

    pub fn events(&self) -> &IndexMap<String, EventDecl> {
        &self.events
    }

    pub fn event_handlers_by_convention(&self) -> bool {
        self.event_handlers_by_convention
    }

    /// Definition-time checks
    pub fn validate(&self) -> Result<(), ElementError> {
        for (name, decl) in &self.properties {
            if !is_valid_property_name(name) {
                return Err(ElementError::Config(format!(
                    "\"{name}\" is not a valid property name, it collides with a native element member"
                )));
            }
            if decl.is_boolean() && decl.default.is_some() {
                return Err(ElementError::Config(format!(
                    "cannot set a default value for property \"{name}\", booleans are false by default"
                )));
            }
        }
        for slot in self.slots.keys() {
            let name = self.slot_property_name(slot);
            if !is_valid_property_name(name) {
                return Err(ElementError::Config(format!(
                    "\"{name}\" is not a valid property name for slot \"{slot}\""
                )));
            }
        }
        Ok(())
    }

    /// State of a freshly constructed instance
    pub fn initial_state(&self) -> IndexMap<String, Value> {
        let mut state = IndexMap::new();
        for (name, decl) in &self.properties {
            state.insert(name.clone(), decl.initial_value());
        }
        for slot in self.slots.keys() {
            state.insert(self.slot_property_name(slot).to_string(), Value::List(Vec::new()));
        }
        state
    }

    /// Coerce `value` for the property declaration `decl`
    pub fn validate_property_value(value: Value, decl: &PropertyDecl) -> Value {
        decl.validate(value)
    }

    /// Check `node` against the slot's type. `<slot>` elements are checked
    /// through the elements assigned to them.
    pub fn validate_slot_value(doc: &Document, node: NodeId, decl: &SlotDecl) -> Result<NodeId, ElementError> {
        let nodes = if doc.local_name(node).as_deref() == Some("slot") {
            doc.assigned_nodes(node, true)
                .into_iter()
                .filter(|&n| doc.is_element(n))
                .collect()
        } else {
            vec![node]
        };
        match nodes.into_iter().find(|&n| !decl.accepts(doc, n)) {
            Some(bad) => Err(ElementError::SlotType {
                node: bad,
                expected: decl.type_name(),
            }),
            None => Ok(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::Integer;

    fn base() -> MetadataDescriptor {
        MetadataDescriptor::new()
            .property("disabled", PropertyDecl::boolean())
            .property("text", PropertyDecl::string().default_value("base"))
            .slot("default", SlotDecl::node().property_name("content"))
            .event("press")
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(camel_to_kebab("selectedIndex"), "selected-index");
        assert_eq!(camel_to_kebab("value2State"), "value2-state");
        assert_eq!(camel_to_kebab("text"), "text");
        assert_eq!(kebab_to_camel("selected-index"), "selectedIndex");
        assert_eq!(kebab_to_camel("a-b-c"), "aBC");
        assert_eq!(kebab_to_camel("plain"), "plain");
    }

    #[test]
    fn test_merge_subclass_wins() {
        let child = MetadataDescriptor::new()
            .property("text", PropertyDecl::string().default_value("child"))
            .property("count", PropertyDecl::custom(Integer).default_value(0))
            .event_handlers_by_convention(true);
        let merged = ElementMetadata::merge([&base(), &child]);
        assert_eq!(merged.props_list(), vec!["disabled", "text", "count"]);
        assert_eq!(
            merged.property("text").and_then(|p| p.default.clone()),
            Some(Value::from("child"))
        );
        assert!(merged.event_handlers_by_convention());
        assert!(merged.events().contains_key("press"));
    }

    #[test]
    fn test_attributes_list() {
        let descriptor = base()
            .property("selectedIndex", PropertyDecl::custom(Integer))
            .property("data", PropertyDecl::object())
            .property("hiddenState", PropertyDecl::string().no_attribute());
        let metadata = ElementMetadata::merge([&descriptor]);
        assert_eq!(metadata.attributes_list(), vec!["disabled", "text", "selected-index"]);
        assert!(!metadata.has_attribute("data"));
        assert_eq!(
            metadata.property_for_attribute("selected-index").map(|(n, _)| n),
            Some("selectedIndex")
        );
        assert!(metadata.property_for_attribute("data").is_none());
    }

    #[test]
    fn test_acronym_property_maps_back_from_attribute() {
        let descriptor = MetadataDescriptor::new()
            .property("isRTL", PropertyDecl::boolean())
            .property("ariaLabelID", PropertyDecl::string());
        let metadata = ElementMetadata::merge([&descriptor]);
        assert_eq!(metadata.attributes_list(), vec!["is-rtl", "aria-label-id"]);
        assert_eq!(metadata.property_for_attribute("is-rtl").map(|(n, _)| n), Some("isRTL"));
        assert_eq!(
            metadata.property_for_attribute("aria-label-id").map(|(n, _)| n),
            Some("ariaLabelID")
        );
        assert!(metadata.property_for_attribute("is-r-t-l").is_none());
    }

    #[test]
    fn test_validate_property_value() {
        let boolean = PropertyDecl::boolean();
        assert_eq!(boolean.validate(Value::from("yes")), Value::Bool(false));
        assert_eq!(boolean.validate(Value::Bool(true)), Value::Bool(true));

        let string = PropertyDecl::string();
        assert_eq!(string.validate(Value::from(3)), Value::from("3"));
        assert_eq!(string.validate(Value::Null), Value::Null);

        let object = PropertyDecl::object().default_value(Value::object());
        assert_eq!(object.validate(Value::from(1)), Value::object());
        assert_eq!(object.validate(Value::List(vec![])), Value::List(vec![]));

        let count = PropertyDecl::custom(Integer).default_value(0);
        assert_eq!(count.validate(Value::from(1.5)), Value::from(0));
        assert_eq!(count.validate(Value::from(7)), Value::from(7));

        let many = PropertyDecl::custom(Integer).default_value(0).multiple();
        assert_eq!(
            many.validate(Value::List(vec![Value::from(1), Value::from("x")])),
            Value::List(vec![Value::from(1), Value::from(0)])
        );
    }

    #[test]
    fn test_initial_state() {
        let descriptor = base()
            .property("items", PropertyDecl::string().multiple())
            .property("config", PropertyDecl::object())
            .property("count", PropertyDecl::custom(Integer).default_value(3));
        let state = ElementMetadata::merge([&descriptor]).initial_state();
        assert_eq!(state["disabled"], Value::Bool(false));
        assert_eq!(state["text"], Value::from("base"));
        assert_eq!(state["items"], Value::List(vec![]));
        assert_eq!(state["config"], Value::object());
        assert_eq!(state["count"], Value::from(3));
        assert_eq!(state["content"], Value::List(vec![]));
    }

    #[test]
    fn test_definition_errors() {
        let native = MetadataDescriptor::new().property("innerHTML", PropertyDecl::string());
        assert!(matches!(
            ElementMetadata::merge([&native]).validate(),
            Err(ElementError::Config(_))
        ));

        let boolean_default =
            MetadataDescriptor::new().property("open", PropertyDecl::boolean().default_value(true));
        assert!(ElementMetadata::merge([&boolean_default]).validate().is_err());

        let slot = MetadataDescriptor::new().slot("items", SlotDecl::element().property_name("title"));
        assert!(ElementMetadata::merge([&slot]).validate().is_err());

        assert!(ElementMetadata::merge([&base()]).validate().is_ok());
    }

    #[test]
    fn test_validate_slot_value() {
        let doc = Document::new();
        let item = doc.create_element("lumen-li");
        let other = doc.create_element("div");
        let decl = SlotDecl::tag("lumen-li");
        assert_eq!(ElementMetadata::validate_slot_value(&doc, item, &decl).unwrap(), item);
        assert!(matches!(
            ElementMetadata::validate_slot_value(&doc, other, &decl),
            Err(ElementError::SlotType { node, .. }) if node == other
        ));
        let text = doc.create_text_node("x");
        assert!(ElementMetadata::validate_slot_value(&doc, text, &SlotDecl::node()).is_ok());
        assert!(ElementMetadata::validate_slot_value(&doc, text, &SlotDecl::element()).is_err());
    }
}
