//! HTML5 Parser implementation
//!
//! Uses html5ever's built-in RcDom and converts the content of a wrapping
//! `<template>` element to our DOM format. Whitespace-only text and comments
//! are kept: template markers live in comments and bindings may sit in
//! whitespace.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lumen_dom::{DomTree, Namespace, NodeId};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::HtmlError;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

/// A parsed fragment in its own tree
#[derive(Debug, Clone)]
pub struct ParsedFragment {
    pub tree: DomTree,
    /// Document fragment holding the parsed nodes
    pub root: NodeId,
}

/// HTML5 parser
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self
    }

    /// Parse markup as the content of a `<template>` element
    pub fn parse_fragment(&self, html: &str) -> Result<ParsedFragment, HtmlError> {
        let mut tree = DomTree::new();
        let root = self.parse_fragment_into(html, &mut tree)?;
        Ok(ParsedFragment { tree, root })
    }

    /// Parse markup into a new fragment of an existing tree
    pub fn parse_fragment_into(&self, html: &str, tree: &mut DomTree) -> Result<NodeId, HtmlError> {
        tracing::debug!("Parsing template markup ({} bytes)", html.len());

        let mut wrapped = String::with_capacity(html.len() + 21);
        wrapped.push_str("<template>");
        wrapped.push_str(html);
        wrapped.push_str("</template>");
        let dom = parse_document(RcDom::default(), Default::default()).one(wrapped);

        let content = find_template_content(&dom.document).ok_or(HtmlError::MissingTemplateContent)?;
        let root = tree.create_fragment();
        for child in content.children.borrow().iter() {
            self.convert_node(child, tree, root)?;
        }

        tracing::debug!("Parsed template into {} nodes", tree.len());
        Ok(root)
    }

    /// Convert an RcDom node to our DOM format
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) -> Result<(), HtmlError> {
        match &handle.data {
            RcNodeData::Text { contents } => {
                let id = tree.create_text(&contents.borrow());
                tree.append_child(parent, id)?;
            }
            RcNodeData::Comment { contents } => {
                let id = tree.create_comment(contents);
                tree.append_child(parent, id)?;
            }
            RcNodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let namespace = match &*name.ns {
                    SVG_NS => Namespace::Svg,
                    MATHML_NS => Namespace::MathMl,
                    _ => Namespace::Html,
                };
                let id = tree.create_element(&name.local, namespace);
                for attr in attrs.borrow().iter() {
                    tree.set_attribute(id, &attr.name.local, &attr.value)?;
                }
                tree.append_child(parent, id)?;

                // nested template content is flattened into the element
                if let Some(content) = template_contents.borrow().as_ref() {
                    for child in content.children.borrow().iter() {
                        self.convert_node(child, tree, id)?;
                    }
                }
                for child in handle.children.borrow().iter() {
                    self.convert_node(child, tree, id)?;
                }
            }
            RcNodeData::Document | RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}
        }
        Ok(())
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Content of the first `<template>` element in document order
fn find_template_content(handle: &Handle) -> Option<Handle> {
    if let RcNodeData::Element {
        name,
        template_contents,
        ..
    } = &handle.data
    {
        if &*name.local == "template" {
            return template_contents.borrow().clone();
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(find_template_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let parsed = HtmlParser::new().parse_fragment("<p>Hello</p>").unwrap();
        assert_eq!(parsed.tree.inner_html(parsed.root), "<p>Hello</p>");
    }

    #[test]
    fn test_keeps_comments_and_whitespace() {
        let parsed = HtmlParser::new()
            .parse_fragment("<div> <!--m--> </div>")
            .unwrap();
        assert_eq!(parsed.tree.inner_html(parsed.root), "<div> <!--m--> </div>");
    }

    #[test]
    fn test_table_content_is_not_foster_parented() {
        // template content accepts rows without a table
        let parsed = HtmlParser::new().parse_fragment("<tr><td>1</td></tr>").unwrap();
        assert_eq!(parsed.tree.inner_html(parsed.root), "<tr><td>1</td></tr>");
    }

    #[test]
    fn test_svg_namespace() {
        let parsed = HtmlParser::new()
            .parse_fragment("<svg><circle r=\"1\"></circle></svg>")
            .unwrap();
        let svg = parsed.tree.first_child(parsed.root).unwrap();
        let circle = parsed.tree.first_child(svg).unwrap();
        assert_eq!(parsed.tree.element(circle).unwrap().namespace, Namespace::Svg);
    }
}
