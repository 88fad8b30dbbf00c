//! Custom Elements
//!
//! Custom element registry and lifecycle reactions.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::deferred::{Deferred, Promise};
use crate::events::Event;
use crate::{DomError, NodeId, Value};

/// Lifecycle reactions of a custom element definition.
///
/// The document invokes these after its internal borrows are released, so
/// implementations may freely call back into the document.
pub trait ElementReactions {
    /// The element was created or upgraded for this definition
    fn upgrade(&self, element: NodeId);

    /// The element became connected to the document
    fn connected(&self, element: NodeId);

    /// The element was removed from the document
    fn disconnected(&self, element: NodeId);

    /// An observed attribute changed
    fn attribute_changed(&self, element: NodeId, name: &str, old: Option<&str>, new: Option<&str>);

    /// Intercept a property assignment. `Ok(true)` means handled.
    fn set_property(&self, _element: NodeId, _name: &str, _value: &Value) -> Result<bool, DomError> {
        Ok(false)
    }

    /// Intercept a property read
    fn get_property(&self, _element: NodeId, _name: &str) -> Option<Value> {
        None
    }

    /// A native event reached the element through a document level router
    fn native_event(&self, _element: NodeId, _event: &mut Event) {}
}

/// Custom element definition
#[derive(Clone)]
pub struct CustomElementDefinition {
    pub name: String,
    pub observed_attributes: Vec<String>,
    reactions: Weak<dyn ElementReactions>,
}

impl CustomElementDefinition {
    /// Reactions sink, if its owner is still alive
    pub fn reactions(&self) -> Option<Rc<dyn ElementReactions>> {
        self.reactions.upgrade()
    }
}

/// Custom elements registry
#[derive(Default)]
pub struct CustomElementRegistry {
    definitions: HashMap<String, CustomElementDefinition>,
    when_defined: HashMap<String, Deferred>,
}

impl CustomElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a custom element
    pub fn define(
        &mut self,
        name: &str,
        observed_attributes: Vec<String>,
        reactions: Weak<dyn ElementReactions>,
    ) -> Result<(), DomError> {
        if !is_valid_custom_element_name(name) {
            return Err(DomError::InvalidName(name.to_string()));
        }
        if self.definitions.contains_key(name) {
            return Err(DomError::AlreadyDefined(name.to_string()));
        }

        self.definitions.insert(
            name.to_string(),
            CustomElementDefinition {
                name: name.to_string(),
                observed_attributes,
                reactions,
            },
        );

        if let Some(deferred) = self.when_defined.remove(name) {
            deferred.resolve();
        }
        tracing::debug!("Defined custom element <{}>", name);
        Ok(())
    }

    /// Get element definition
    pub fn get(&self, name: &str) -> Option<&CustomElementDefinition> {
        self.definitions.get(name)
    }

    /// Check if element is defined
    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Completes once `name` is defined
    pub fn when_defined(&mut self, name: &str) -> Promise {
        if self.is_defined(name) {
            return Promise::resolved();
        }
        self.when_defined
            .entry(name.to_string())
            .or_default()
            .promise()
    }
}

/// Validate custom element name
pub fn is_valid_custom_element_name(name: &str) -> bool {
    // Must contain hyphen
    if !name.contains('-') {
        return false;
    }

    // Must start with lowercase letter
    if !name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }

    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return false;
    }

    // Reserved names
    let reserved = [
        "annotation-xml",
        "color-profile",
        "font-face",
        "font-face-src",
        "font-face-uri",
        "font-face-format",
        "font-face-name",
        "missing-glyph",
    ];
    !reserved.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoReactions;

    impl ElementReactions for NoReactions {
        fn upgrade(&self, _: NodeId) {}
        fn connected(&self, _: NodeId) {}
        fn disconnected(&self, _: NodeId) {}
        fn attribute_changed(&self, _: NodeId, _: &str, _: Option<&str>, _: Option<&str>) {}
    }

    fn sink() -> (Rc<dyn ElementReactions>, Weak<dyn ElementReactions>) {
        let rc: Rc<dyn ElementReactions> = Rc::new(NoReactions);
        let weak = Rc::downgrade(&rc);
        (rc, weak)
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_custom_element_name("my-element"));
        assert!(is_valid_custom_element_name("app-header"));
        assert!(!is_valid_custom_element_name("myelement")); // no hyphen
        assert!(!is_valid_custom_element_name("My-Element")); // uppercase
        assert!(!is_valid_custom_element_name("font-face"));
    }

    #[test]
    fn test_define() {
        let (_keep, weak) = sink();
        let mut registry = CustomElementRegistry::new();

        assert!(registry.define("my-element", vec![], weak.clone()).is_ok());
        assert!(registry.is_defined("my-element"));
        assert!(registry.get("my-element").and_then(|d| d.reactions()).is_some());

        // Duplicate
        assert_eq!(
            registry.define("my-element", vec![], weak),
            Err(DomError::AlreadyDefined("my-element".into()))
        );
    }

    #[test]
    fn test_when_defined_resolves_on_define() {
        let (_keep, weak) = sink();
        let mut registry = CustomElementRegistry::new();
        let pending = registry.when_defined("late-element");
        assert!(!pending.is_settled());

        registry.define("late-element", vec![], weak).unwrap();
        assert!(pending.is_settled());
        assert!(registry.when_defined("late-element").is_settled());
    }
}
