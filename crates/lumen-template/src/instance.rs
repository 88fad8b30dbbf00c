//! Template instances
//!
//! An instance is one clone of a template's skeleton in the document plus
//! the parts bound to it, in binding order.

use std::rc::Rc;

use lumen_dom::NodeId;

use crate::TemplateError;
use crate::parts::Part;
use crate::processor::TemplateProcessor;
use crate::render::RenderContext;
use crate::template::{Template, TemplatePart};
use crate::value::PartValue;

pub struct TemplateInstance {
    template: Rc<Template>,
    processor: Rc<dyn TemplateProcessor>,
    ctx: Rc<RenderContext>,
    /// `None` for bindings inside comments
    parts: Vec<Option<Box<dyn Part>>>,
}

impl TemplateInstance {
    pub fn new(template: Rc<Template>, processor: Rc<dyn TemplateProcessor>, ctx: Rc<RenderContext>) -> Self {
        Self {
            template,
            processor,
            ctx,
            parts: Vec::new(),
        }
    }

    pub fn template(&self) -> &Rc<Template> {
        &self.template
    }

    /// Stage every value, then commit every part
    pub fn update(&mut self, values: Vec<PartValue>) -> Result<(), TemplateError> {
        let mut values = values.into_iter();
        for part in &mut self.parts {
            let value = values.next().unwrap_or_default();
            if let Some(part) = part {
                part.set_value(value);
            }
        }
        for part in self.parts.iter_mut().flatten() {
            part.commit()?;
        }
        Ok(())
    }

    /// Import the skeleton into the document and create the parts. Returns
    /// the detached fragment holding the new nodes.
    pub fn clone_fragment(&mut self) -> Result<NodeId, TemplateError> {
        let doc = &self.ctx.doc;
        let fragment = doc.import_node(&self.template.tree, self.template.root, true)?;
        let nodes = doc.with_tree(|tree| tree.descendants(fragment));
        let node_at = |index: usize| nodes.get(index).copied().ok_or(TemplateError::MalformedTemplate);

        for part in self.template.parts() {
            match part {
                TemplatePart::Comment => self.parts.push(None),
                TemplatePart::Node { index } => {
                    let end = node_at(*index)?;
                    let start = doc.prev_sibling(end).ok_or(TemplateError::MalformedTemplate)?;
                    self.parts
                        .push(Some(self.processor.handle_text_expression(&self.ctx, start, end)));
                }
                TemplatePart::Attribute { index, name, strings } => {
                    let element = node_at(*index)?;
                    let parts = self
                        .processor
                        .handle_attribute_expressions(element, name, strings, &self.ctx)?;
                    self.parts.extend(parts.into_iter().map(Some));
                }
            }
        }
        Ok(fragment)
    }
}
