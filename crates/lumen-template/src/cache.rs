//! Template cache
//!
//! Prepared templates are looked up first by the identity of the literal
//! string array (one per macro call site), then by content so that equal
//! literals from different call sites share one template.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::TemplateError;
use crate::result::{TemplateKind, TemplateResult};
use crate::template::{Markers, Template};

type IdentityKey = (TemplateKind, usize, usize);

/// Cache of prepared templates, keyed per template kind
#[derive(Debug)]
pub struct TemplateCache {
    markers: Markers,
    by_identity: RefCell<HashMap<IdentityKey, Rc<Template>>>,
    by_key: RefCell<HashMap<(TemplateKind, String), Rc<Template>>>,
}

impl TemplateCache {
    pub fn new() -> Result<Self, TemplateError> {
        Ok(Self {
            markers: Markers::new()?,
            by_identity: RefCell::new(HashMap::new()),
            by_key: RefCell::new(HashMap::new()),
        })
    }

    /// Prepared template for `result`, preparing it on first use
    pub fn template_for(&self, result: &TemplateResult) -> Result<Rc<Template>, TemplateError> {
        let strings = result.strings();
        let identity = (result.kind(), strings.as_ptr() as usize, strings.len());
        if let Some(template) = self.by_identity.borrow().get(&identity) {
            return Ok(template.clone());
        }

        let key = (result.kind(), strings.join(&self.markers.marker));
        let cached = self.by_key.borrow().get(&key).cloned();
        let template = match cached {
            Some(template) => template,
            None => {
                let template = Rc::new(Template::new(strings, result.kind(), &self.markers)?);
                self.by_key.borrow_mut().insert(key, template.clone());
                template
            }
        };
        self.by_identity.borrow_mut().insert(identity, template.clone());
        Ok(template)
    }

    /// Number of distinct prepared templates
    pub fn len(&self) -> usize {
        self.by_key.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.borrow().is_empty()
    }
}
