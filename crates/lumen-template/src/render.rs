//! Render function
//!
//! [`Renderer`] remembers one root node part per container. The first render
//! into a container empties it; later renders update the existing parts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lumen_dom::{Document, NodeId};

use crate::TemplateError;
use crate::cache::TemplateCache;
use crate::node_part::NodePart;
use crate::parts::Part;
use crate::result::{TemplateKind, TemplateResult};
use crate::value::PartValue;

static STYLED_STRINGS: [&str; 3] = ["<style>", "</style>", ""];

/// Shared by every part created under one root render
pub struct RenderContext {
    pub doc: Document,
    pub cache: Rc<TemplateCache>,
    /// `this` for event handlers; the bound element when absent
    pub event_context: Option<NodeId>,
}

impl RenderContext {
    pub fn new(doc: Document, cache: Rc<TemplateCache>, event_context: Option<NodeId>) -> Self {
        Self {
            doc,
            cache,
            event_context,
        }
    }
}

/// Options applied when a container is rendered into for the first time
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub event_context: Option<NodeId>,
}

/// Renders template results into containers of one document
pub struct Renderer {
    doc: Document,
    cache: Rc<TemplateCache>,
    parts: RefCell<HashMap<NodeId, NodePart>>,
}

impl Renderer {
    pub fn new(doc: Document) -> Result<Self, TemplateError> {
        Ok(Self::with_cache(doc, Rc::new(TemplateCache::new()?)))
    }

    pub fn with_cache(doc: Document, cache: Rc<TemplateCache>) -> Self {
        Self {
            doc,
            cache,
            parts: RefCell::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn cache(&self) -> &Rc<TemplateCache> {
        &self.cache
    }

    /// Render `value` into `container`
    pub fn render(
        &self,
        value: impl Into<PartValue>,
        container: NodeId,
        options: &RenderOptions,
    ) -> Result<(), TemplateError> {
        let existing = self.parts.borrow_mut().remove(&container);
        let mut part = match existing {
            Some(part) => part,
            None => {
                tracing::debug!(?container, "First render into container");
                self.doc.clear_children(container)?;
                let ctx = Rc::new(RenderContext::new(
                    self.doc.clone(),
                    self.cache.clone(),
                    options.event_context,
                ));
                NodePart::append_into(ctx, container)?
            }
        };
        // the part is out of the map while committing so nested renders can
        // use this renderer
        part.set_value(value.into());
        let outcome = part.commit();
        self.parts.borrow_mut().insert(container, part);
        outcome
    }

    /// Render `content` preceded by a `<style>` element holding `styles`
    pub fn render_with_styles(
        &self,
        styles: &str,
        content: impl Into<PartValue>,
        container: NodeId,
        options: &RenderOptions,
    ) -> Result<(), TemplateError> {
        let styled = TemplateResult::new(
            &STYLED_STRINGS,
            vec![PartValue::from(styles), content.into()],
            TemplateKind::Html,
        );
        self.render(styled, container, options)
    }

    /// Whether `container` has been rendered into
    pub fn has_rendered(&self, container: NodeId) -> bool {
        self.parts.borrow().contains_key(&container)
    }

    /// Drop the root part of `container`; its DOM is left as is
    pub fn forget(&self, container: NodeId) -> bool {
        self.parts.borrow_mut().remove(&container).is_some()
    }
}
