//! Template preparation
//!
//! A template literal is joined into one HTML string with unique markers in
//! every hole, parsed once, and walked to turn the markers back into binding
//! descriptors. The marker-free result is the skeleton that every instance
//! clones.

use std::collections::HashMap;

use lumen_dom::{DomTree, NodeId, NodeType, TreeWalker, WhatToShow};
use lumen_html::HtmlParser;
use regex::Regex;

use crate::TemplateError;
use crate::result::TemplateKind;

/// Appended to the name of an attribute that carries bindings
pub(crate) const BOUND_ATTRIBUTE_SUFFIX: &str = "$lumen$";

/// Matches the attribute name and the start of its value at the end of a
/// literal string, i.e. a hole in attribute-value position.
const LAST_ATTRIBUTE_NAME: &str = concat!(
    r#"([ \x09\x0a\x0c\x0d])"#,
    r#"([^\x00-\x1F\x7F-\x9F "'>=/]+)"#,
    r#"([ \x09\x0a\x0c\x0d]*=[ \x09\x0a\x0c\x0d]*(?:[^ \x09\x0a\x0c\x0d"'`<>=]*|"[^"]*|'[^']*))$"#,
);

/// Per-cache marker strings
#[derive(Debug)]
pub(crate) struct Markers {
    pub marker: String,
    pub node_marker: String,
    pub comment_marker: String,
    pub marker_regex: Regex,
    pub attribute_regex: Regex,
}

impl Markers {
    pub fn new() -> Result<Self, TemplateError> {
        let marker = format!("{{{{lumen-{}}}}}", rand::random::<u64>());
        let node_marker = format!("<!--{marker}-->");
        let marker_regex = Regex::new(&format!(
            "{}|{}",
            regex::escape(&marker),
            regex::escape(&node_marker)
        ))?;
        Ok(Self {
            comment_marker: format!(" {marker} "),
            marker_regex,
            attribute_regex: Regex::new(LAST_ATTRIBUTE_NAME)?,
            marker,
            node_marker,
        })
    }

    /// Join literal strings into parseable HTML with a marker in each hole
    pub fn html_for(&self, strings: &[&str]) -> String {
        let Some((last, holes)) = strings.split_last() else {
            return String::new();
        };
        let mut html = String::new();
        let mut in_comment = false;
        for s in holes {
            let comment_open = s.rfind("<!--");
            let scan_from = comment_open.map_or(0, |i| i + 1);
            in_comment = (comment_open.is_some() || in_comment) && !s[scan_from..].contains("-->");

            match self.attribute_regex.captures(s) {
                Some(caps) => {
                    let start = caps.get(0).map_or(0, |m| m.start());
                    html.push_str(&s[..start]);
                    html.push_str(&caps[1]);
                    html.push_str(&caps[2]);
                    html.push_str(BOUND_ATTRIBUTE_SUFFIX);
                    html.push_str(&caps[3]);
                    html.push_str(&self.marker);
                }
                None => {
                    html.push_str(s);
                    html.push_str(if in_comment {
                        &self.comment_marker
                    } else {
                        &self.node_marker
                    });
                }
            }
        }
        html.push_str(last);
        html
    }

    /// Drop the bound suffix from an attribute name left in raw text
    fn strip_bound_suffix(&self, s: &str) -> String {
        if let Some(caps) = self.attribute_regex.captures(s) {
            if let Some(name) = caps[2].strip_suffix(BOUND_ATTRIBUTE_SUFFIX) {
                let start = caps.get(0).map_or(0, |m| m.start());
                return format!("{}{}{}{}", &s[..start], &caps[1], name, &caps[3]);
            }
        }
        s.to_string()
    }
}

/// Binding descriptor. Indices count nodes of the skeleton in tree order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Content hole; `index` is the node right after the start marker
    Node { index: usize },
    /// Attribute with one or more holes
    Attribute {
        index: usize,
        name: String,
        strings: Vec<String>,
    },
    /// Hole inside an HTML comment; consumes a value but never renders
    Comment,
}

impl TemplatePart {
    pub fn is_active(&self) -> bool {
        !matches!(self, TemplatePart::Comment)
    }
}

enum PendingPart {
    Node { start: NodeId },
    Attribute {
        element: NodeId,
        name: String,
        strings: Vec<String>,
    },
    Comment,
}

/// Prepared template: skeleton plus binding descriptors
#[derive(Debug)]
pub struct Template {
    pub(crate) tree: DomTree,
    pub(crate) root: NodeId,
    parts: Vec<TemplatePart>,
    kind: TemplateKind,
}

impl Template {
    pub(crate) fn new(
        strings: &[&str],
        kind: TemplateKind,
        markers: &Markers,
    ) -> Result<Self, TemplateError> {
        let html = markers.html_for(strings);
        let parser = HtmlParser::new();
        let mut tree = DomTree::new();
        let root = match kind {
            TemplateKind::Html => parser.parse_fragment_into(&html, &mut tree)?,
            TemplateKind::Svg => {
                let root = parser.parse_fragment_into(&format!("<svg>{html}</svg>"), &mut tree)?;
                if let Some(svg) = tree.first_child(root) {
                    tree.remove_child(root, svg)?;
                    let children: Vec<NodeId> = tree.children(svg).collect();
                    for child in children {
                        tree.append_child(root, child)?;
                    }
                }
                root
            }
        };

        let holes = strings.len().saturating_sub(1);
        let pending = collect_parts(&mut tree, root, strings, holes, markers)?;

        let positions: HashMap<NodeId, usize> = tree
            .descendants(root)
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let position = |id: NodeId| positions.get(&id).copied().ok_or(TemplateError::MalformedTemplate);

        let mut parts = Vec::with_capacity(pending.len());
        for part in pending {
            parts.push(match part {
                PendingPart::Node { start } => {
                    let end = tree.next_sibling(start).ok_or(TemplateError::MalformedTemplate)?;
                    TemplatePart::Node {
                        index: position(end)?,
                    }
                }
                PendingPart::Attribute {
                    element,
                    name,
                    strings,
                } => TemplatePart::Attribute {
                    index: position(element)?,
                    name,
                    strings,
                },
                PendingPart::Comment => TemplatePart::Comment,
            });
        }

        tracing::debug!(
            "Prepared {:?} template: {} holes, {} parts, {} nodes",
            kind,
            holes,
            parts.len(),
            positions.len()
        );
        Ok(Self {
            tree,
            root,
            parts,
            kind,
        })
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Serialized skeleton, markers included
    pub fn skeleton_html(&self) -> String {
        self.tree.inner_html(self.root)
    }
}

/// Walk the parsed skeleton once, replacing markers with part descriptors
fn collect_parts(
    tree: &mut DomTree,
    root: NodeId,
    strings: &[&str],
    holes: usize,
    markers: &Markers,
) -> Result<Vec<PendingPart>, TemplateError> {
    let mut parts = Vec::new();
    let mut to_remove: Vec<NodeId> = Vec::new();
    let mut last_start: Option<NodeId> = None;
    let mut part_index = 0;
    let mut walker = TreeWalker::new(root, WhatToShow::ALL);

    while part_index < holes {
        let Some(node) = walker.next_node(tree) else {
            tracing::warn!(
                "Template markup dropped {} of {} bindings",
                holes - part_index,
                holes
            );
            break;
        };
        match tree.node_type(node) {
            Some(NodeType::Element) => {
                let bound = tree.element(node).map_or(0, |e| {
                    e.attrs
                        .iter()
                        .filter(|a| a.name.ends_with(BOUND_ATTRIBUTE_SUFFIX))
                        .count()
                });
                for _ in 0..bound {
                    let source = strings.get(part_index).copied().unwrap_or_default();
                    let name = markers
                        .attribute_regex
                        .captures(source)
                        .map(|caps| caps[2].to_string())
                        .ok_or_else(|| TemplateError::MissingAttribute(source.to_string()))?;
                    let lookup = format!("{}{}", name.to_lowercase(), BOUND_ATTRIBUTE_SUFFIX);
                    let value = tree
                        .remove_attribute(node, &lookup)?
                        .ok_or_else(|| TemplateError::MissingAttribute(name.clone()))?;
                    let statics: Vec<String> = markers
                        .marker_regex
                        .split(&value)
                        .map(str::to_string)
                        .collect();
                    part_index += statics.len() - 1;
                    parts.push(PendingPart::Attribute {
                        element: node,
                        name,
                        strings: statics,
                    });
                }
            }
            Some(NodeType::Text) => {
                let data = tree.character_data(node).unwrap_or_default().to_string();
                if !data.contains(&markers.marker) {
                    continue;
                }
                let parent = tree.parent(node).ok_or(TemplateError::MalformedTemplate)?;
                let pieces: Vec<&str> = markers.marker_regex.split(&data).collect();
                let last = pieces.len() - 1;
                for piece in &pieces[..last] {
                    let insert = if piece.is_empty() {
                        tree.create_comment("")
                    } else {
                        tree.create_text(&markers.strip_bound_suffix(piece))
                    };
                    tree.insert_before(parent, insert, Some(node))?;
                    parts.push(PendingPart::Node { start: insert });
                }
                if pieces[last].is_empty() {
                    let end = tree.create_comment("");
                    tree.insert_before(parent, end, Some(node))?;
                    to_remove.push(node);
                } else {
                    tree.set_character_data(node, pieces[last])?;
                }
                part_index += last;
            }
            Some(NodeType::Comment) => {
                let data = tree.character_data(node).unwrap_or_default().to_string();
                if data == markers.marker {
                    let parent = tree.parent(node).ok_or(TemplateError::MalformedTemplate)?;
                    // two adjacent holes need a marker of their own
                    let start = match effective_prev(tree, node, &to_remove) {
                        Some(prev) if Some(prev) != last_start => prev,
                        _ => {
                            let marker = tree.create_comment("");
                            tree.insert_before(parent, marker, Some(node))?;
                            marker
                        }
                    };
                    last_start = Some(start);
                    parts.push(PendingPart::Node { start });
                    if tree.next_sibling(node).is_none() {
                        tree.set_character_data(node, "")?;
                    } else {
                        to_remove.push(node);
                    }
                    part_index += 1;
                } else {
                    for _ in data.matches(markers.marker.as_str()) {
                        parts.push(PendingPart::Comment);
                        part_index += 1;
                    }
                }
            }
            _ => {}
        }
    }

    for node in to_remove {
        tree.detach(node)?;
    }
    Ok(parts)
}

fn effective_prev(tree: &DomTree, node: NodeId, skip: &[NodeId]) -> Option<NodeId> {
    let mut prev = tree.prev_sibling(node);
    while let Some(p) = prev {
        if !skip.contains(&p) {
            return Some(p);
        }
        prev = tree.prev_sibling(p);
    }
    None
}
