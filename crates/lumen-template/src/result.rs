//! Template results
//!
//! The value produced by evaluating a template literal: its static strings
//! and the dynamic values for this evaluation.

use std::fmt;
use std::rc::Rc;

use crate::processor::{DefaultTemplateProcessor, TemplateProcessor};
use crate::value::PartValue;

/// Markup dialect of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Html,
    Svg,
}

/// One evaluation of a template literal
#[derive(Clone)]
pub struct TemplateResult {
    strings: &'static [&'static str],
    values: Vec<PartValue>,
    kind: TemplateKind,
    processor: Rc<dyn TemplateProcessor>,
}

impl TemplateResult {
    /// Result using the default processor. `strings` must be one more than
    /// `values`; the slice address identifies the call site.
    pub fn new(strings: &'static [&'static str], values: Vec<PartValue>, kind: TemplateKind) -> Self {
        Self::with_processor(strings, values, kind, Rc::new(DefaultTemplateProcessor))
    }

    pub fn with_processor(
        strings: &'static [&'static str],
        values: Vec<PartValue>,
        kind: TemplateKind,
        processor: Rc<dyn TemplateProcessor>,
    ) -> Self {
        debug_assert_eq!(strings.len(), values.len() + 1);
        Self {
            strings,
            values,
            kind,
            processor,
        }
    }

    pub fn strings(&self) -> &'static [&'static str] {
        self.strings
    }

    pub fn values(&self) -> &[PartValue] {
        &self.values
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn processor(&self) -> Rc<dyn TemplateProcessor> {
        self.processor.clone()
    }

    pub(crate) fn into_values(self) -> Vec<PartValue> {
        self.values
    }
}

impl fmt::Debug for TemplateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResult")
            .field("kind", &self.kind)
            .field("strings", &self.strings)
            .field("values", &self.values)
            .finish()
    }
}
