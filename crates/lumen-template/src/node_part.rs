//! Node parts
//!
//! A node part owns the live nodes between two marker nodes. It keeps the
//! last committed value so that re-rendering the same text, template or list
//! shape reuses what is already in the DOM.

use std::rc::Rc;

use lumen_dom::{NodeId, NodeType, Value};

use crate::TemplateError;
use crate::instance::TemplateInstance;
use crate::parts::Part;
use crate::render::RenderContext;
use crate::result::TemplateResult;
use crate::value::{DirectiveContext, PartKind, PartValue, resolve};

enum Committed {
    Text(Value),
    Instance(TemplateInstance),
    Node(NodeId),
    Iterable(Vec<NodePart>),
    Nothing,
}

/// Content binding between a start and an end marker
pub struct NodePart {
    ctx: Rc<RenderContext>,
    start: NodeId,
    end: NodeId,
    value: Committed,
    pending: PartValue,
}

impl NodePart {
    /// Part over the nodes strictly between `start` and `end`
    pub fn new(ctx: Rc<RenderContext>, start: NodeId, end: NodeId) -> Self {
        Self {
            ctx,
            start,
            end,
            value: Committed::Text(Value::Undefined),
            pending: PartValue::default(),
        }
    }

    /// Append fresh markers to `container` and bind between them
    pub fn append_into(ctx: Rc<RenderContext>, container: NodeId) -> Result<Self, TemplateError> {
        let start = ctx.doc.create_comment("");
        let end = ctx.doc.create_comment("");
        ctx.doc.append_child(container, start)?;
        ctx.doc.append_child(container, end)?;
        Ok(Self::new(ctx, start, end))
    }

    /// Insert fresh markers at the end of `parent`'s range
    fn append_into_part(parent: &NodePart) -> Result<Self, TemplateError> {
        let start = parent.ctx.doc.create_comment("");
        let end = parent.ctx.doc.create_comment("");
        parent.insert(start)?;
        parent.insert(end)?;
        Ok(Self::new(parent.ctx.clone(), start, end))
    }

    /// Split `previous`'s end off into a new part that follows it
    fn insert_after_part(previous: &mut NodePart) -> Result<Self, TemplateError> {
        let start = previous.ctx.doc.create_comment("");
        previous.insert(start)?;
        let part = Self::new(previous.ctx.clone(), start, previous.end);
        previous.end = start;
        Ok(part)
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    /// Nodes currently rendered between the markers
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut next = self.ctx.doc.next_sibling(self.start);
        while let Some(node) = next {
            if node == self.end {
                break;
            }
            nodes.push(node);
            next = self.ctx.doc.next_sibling(node);
        }
        nodes
    }

    fn insert(&self, node: NodeId) -> Result<(), TemplateError> {
        let parent = self.ctx.doc.parent(self.end).ok_or(TemplateError::DetachedPart)?;
        self.ctx.doc.insert_before(parent, node, Some(self.end))?;
        Ok(())
    }

    /// Remove everything after `from` up to the end marker
    pub fn clear(&self, from: NodeId) -> Result<(), TemplateError> {
        let Some(parent) = self.ctx.doc.parent(self.start) else {
            return Ok(());
        };
        let mut next = self.ctx.doc.next_sibling(from);
        while let Some(node) = next {
            if node == self.end {
                break;
            }
            next = self.ctx.doc.next_sibling(node);
            self.ctx.doc.remove_child(parent, node)?;
        }
        Ok(())
    }

    fn commit_node(&mut self, node: NodeId) -> Result<(), TemplateError> {
        if matches!(self.value, Committed::Node(current) if current == node) {
            return Ok(());
        }
        self.clear(self.start)?;
        self.insert(node)?;
        self.value = Committed::Node(node);
        Ok(())
    }

    fn commit_text(&mut self, value: Value) -> Result<(), TemplateError> {
        let text = if value.is_nullish() {
            String::new()
        } else {
            value.to_js_string()
        };
        let doc = &self.ctx.doc;
        let first = doc.next_sibling(self.start);
        let single_text = first.is_some()
            && first == doc.prev_sibling(self.end)
            && first.and_then(|n| doc.node_type(n)) == Some(NodeType::Text);
        match first {
            Some(node) if single_text => doc.set_text(node, &text)?,
            _ => {
                let node = doc.create_text_node(&text);
                self.commit_node(node)?;
            }
        }
        self.value = Committed::Text(value);
        Ok(())
    }

    fn commit_template(&mut self, result: TemplateResult) -> Result<(), TemplateError> {
        let template = self.ctx.cache.template_for(&result)?;
        if let Committed::Instance(instance) = &mut self.value {
            if Rc::ptr_eq(instance.template(), &template) {
                return instance.update(result.into_values());
            }
        }
        let mut instance = TemplateInstance::new(template, result.processor(), self.ctx.clone());
        let fragment = instance.clone_fragment()?;
        instance.update(result.into_values())?;
        self.clear(self.start)?;
        self.insert(fragment)?;
        self.value = Committed::Instance(instance);
        Ok(())
    }

    fn commit_iterable(&mut self, items: Vec<PartValue>) -> Result<(), TemplateError> {
        let mut parts = match std::mem::replace(&mut self.value, Committed::Nothing) {
            Committed::Iterable(parts) => parts,
            _ => {
                self.clear(self.start)?;
                Vec::new()
            }
        };
        let outcome = self.stamp_items(&mut parts, items);
        self.value = Committed::Iterable(parts);
        outcome
    }

    fn stamp_items(&self, parts: &mut Vec<NodePart>, items: Vec<PartValue>) -> Result<(), TemplateError> {
        let mut index = 0;
        for item in items {
            if index == parts.len() {
                let part = match index {
                    0 => NodePart::append_into_part(self)?,
                    _ => NodePart::insert_after_part(&mut parts[index - 1])?,
                };
                parts.push(part);
            }
            parts[index].set_value(item);
            parts[index].commit()?;
            index += 1;
        }
        if index < parts.len() {
            let from = match index {
                0 => self.start,
                _ => parts[index - 1].end,
            };
            parts.truncate(index);
            self.clear(from)?;
        }
        Ok(())
    }
}

impl Part for NodePart {
    fn set_value(&mut self, value: PartValue) {
        self.pending = value;
    }

    fn commit(&mut self) -> Result<(), TemplateError> {
        let pending = std::mem::replace(&mut self.pending, PartValue::NoChange);
        let value = resolve(
            pending,
            &DirectiveContext {
                doc: &self.ctx.doc,
                kind: PartKind::Node,
                element: None,
                name: None,
            },
        );
        match value {
            PartValue::NoChange => Ok(()),
            PartValue::Value(Value::Node(node)) => self.commit_node(node),
            PartValue::Value(Value::List(items)) => {
                self.commit_iterable(items.into_iter().map(PartValue::Value).collect())
            }
            PartValue::Value(v) if v.is_primitive() => {
                if matches!(&self.value, Committed::Text(current) if current.same_value(&v)) {
                    return Ok(());
                }
                self.commit_text(v)
            }
            PartValue::Template(result) => self.commit_template(result),
            PartValue::List(items) => self.commit_iterable(items),
            PartValue::Nothing => {
                self.value = Committed::Nothing;
                self.clear(self.start)
            }
            other => self.commit_text(other.to_value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TemplateCache;
    use lumen_dom::Document;

    fn part() -> (Document, NodeId, NodePart) {
        let doc = Document::new();
        let ctx = Rc::new(RenderContext::new(
            doc.clone(),
            Rc::new(TemplateCache::new().unwrap()),
            None,
        ));
        let container = doc.create_element("div");
        doc.append_child(doc.body(), container).unwrap();
        let part = NodePart::append_into(ctx, container).unwrap();
        (doc, container, part)
    }

    #[test]
    fn test_text_updates_in_place() {
        let (doc, container, mut part) = part();
        part.set_value(PartValue::from("a"));
        part.commit().unwrap();
        let text = part.nodes()[0];
        part.set_value(PartValue::from("b"));
        part.commit().unwrap();
        assert_eq!(part.nodes(), vec![text]);
        assert_eq!(doc.inner_html(container), "<!---->b<!---->");
    }

    #[test]
    fn test_same_primitive_skips_dom() {
        let (doc, _, mut part) = part();
        part.set_value(PartValue::from(5));
        part.commit().unwrap();
        let count = doc.mutation_count();
        part.set_value(PartValue::from(5));
        part.commit().unwrap();
        assert_eq!(doc.mutation_count(), count);
    }

    #[test]
    fn test_nan_recommit_skips_dom() {
        let (doc, container, mut part) = part();
        part.set_value(PartValue::Value(Value::Number(f64::NAN)));
        part.commit().unwrap();
        let count = doc.mutation_count();
        part.set_value(PartValue::Value(Value::Number(f64::NAN)));
        part.commit().unwrap();
        assert_eq!(doc.mutation_count(), count);
        assert_eq!(doc.text_content(container), "NaN");
    }

    #[test]
    fn test_nullish_renders_empty_text() {
        let (doc, container, mut part) = part();
        part.set_value(PartValue::from("x"));
        part.commit().unwrap();
        part.set_value(PartValue::Value(Value::Null));
        part.commit().unwrap();
        assert_eq!(doc.text_content(container), "");
    }

    #[test]
    fn test_iterable_reuse_and_truncate() {
        let (doc, container, mut part) = part();
        part.set_value(PartValue::from(vec!["a", "b", "c"]));
        part.commit().unwrap();
        assert_eq!(doc.text_content(container), "abc");
        let first_nodes = part.nodes();

        part.set_value(PartValue::from(vec!["x"]));
        part.commit().unwrap();
        assert_eq!(doc.text_content(container), "x");
        // the first item's markers and text node survive
        assert_eq!(part.nodes()[..2], first_nodes[..2]);

        part.set_value(PartValue::from(Vec::<PartValue>::new()));
        part.commit().unwrap();
        assert!(part.nodes().is_empty());
    }

    #[test]
    fn test_nothing_clears() {
        let (doc, container, mut part) = part();
        part.set_value(PartValue::from("x"));
        part.commit().unwrap();
        part.set_value(PartValue::Nothing);
        part.commit().unwrap();
        assert_eq!(doc.inner_html(container), "<!----><!---->");
    }

    #[test]
    fn test_raw_node() {
        let (doc, container, mut part) = part();
        let span = doc.create_element("span");
        part.set_value(PartValue::from(span));
        part.commit().unwrap();
        assert_eq!(doc.parent(span), Some(container));
        let count = doc.mutation_count();
        part.set_value(PartValue::from(span));
        part.commit().unwrap();
        assert_eq!(doc.mutation_count(), count);
    }
}
