//! Lumen HTML Parser
//!
//! HTML5 parsing built on html5ever. Markup is parsed the way a browser
//! parses the contents of a `<template>` element and converted into a
//! detached [`lumen_dom::DomTree`] fragment.

mod parser;

pub use parser::{HtmlParser, ParsedFragment};

use lumen_dom::{Document, DomError, NodeId};

/// HTML parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HtmlError {
    #[error("parser produced no template content")]
    MissingTemplateContent,

    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Parse markup as template content
pub fn parse_fragment(html: &str) -> Result<ParsedFragment, HtmlError> {
    HtmlParser::new().parse_fragment(html)
}

/// Replace the children of `node` with parsed markup
pub fn set_inner_html(doc: &Document, node: NodeId, html: &str) -> Result<(), HtmlError> {
    let parsed = parse_fragment(html)?;
    let fragment = doc.import_node(&parsed.tree, parsed.root, true)?;
    doc.clear_children(node)?;
    doc.append_child(node, fragment)?;
    Ok(())
}
