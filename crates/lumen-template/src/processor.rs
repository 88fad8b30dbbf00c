//! Template processors
//!
//! A processor decides which part implementation handles a binding. The
//! default one dispatches on the attribute name prefix.

use std::rc::Rc;

use lumen_dom::NodeId;

use crate::TemplateError;
use crate::node_part::NodePart;
use crate::parts::{AttributeCommitter, BooleanAttributePart, EventPart, Part, PropertyCommitter};
use crate::render::RenderContext;

/// Creates parts for the bindings of a template instance
pub trait TemplateProcessor {
    /// Parts for an attribute binding, one per hole
    fn handle_attribute_expressions(
        &self,
        element: NodeId,
        name: &str,
        strings: &[String],
        ctx: &Rc<RenderContext>,
    ) -> Result<Vec<Box<dyn Part>>, TemplateError>;

    /// Part for a content binding between `start` and `end`
    fn handle_text_expression(&self, ctx: &Rc<RenderContext>, start: NodeId, end: NodeId) -> Box<dyn Part> {
        Box::new(NodePart::new(ctx.clone(), start, end))
    }
}

/// `.prop`, `@event`, `?bool` and plain attribute bindings
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTemplateProcessor;

impl TemplateProcessor for DefaultTemplateProcessor {
    fn handle_attribute_expressions(
        &self,
        element: NodeId,
        name: &str,
        strings: &[String],
        ctx: &Rc<RenderContext>,
    ) -> Result<Vec<Box<dyn Part>>, TemplateError> {
        let parts: Vec<Box<dyn Part>> = match name.chars().next() {
            Some('.') => PropertyCommitter::new(ctx.clone(), element, &name[1..], strings.to_vec())
                .parts()
                .into_iter()
                .map(|p| Box::new(p) as Box<dyn Part>)
                .collect(),
            Some('@') => vec![Box::new(EventPart::new(ctx.clone(), element, &name[1..]))],
            Some('?') => vec![Box::new(BooleanAttributePart::new(
                ctx.clone(),
                element,
                &name[1..],
                strings.to_vec(),
            )?)],
            _ => AttributeCommitter::new(ctx.clone(), element, name, strings.to_vec())
                .parts()
                .into_iter()
                .map(|p| Box::new(p) as Box<dyn Part>)
                .collect(),
        };
        Ok(parts)
    }
}
