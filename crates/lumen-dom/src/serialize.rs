//! HTML serialization
//!
//! Light-tree serialization used by diagnostics and tests. Shadow trees are
//! serialized separately through their root.

use crate::node::NodeData;
use crate::tree::DomTree;
use crate::NodeId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script"];

impl DomTree {
    /// Markup of the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Markup of `id` itself
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.data {
            NodeData::Element(e) => {
                out.push('<');
                out.push_str(&e.local_name);
                for attr in &e.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if !attr.value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(&attr.value, true));
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&e.local_name.as_str()) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&e.local_name);
                out.push('>');
            }
            NodeData::Text(t) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.local_name(p))
                    .is_some_and(|name| RAW_TEXT_ELEMENTS.contains(&name));
                if raw {
                    out.push_str(t);
                } else {
                    out.push_str(&escape(t, false));
                }
            }
            NodeData::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            _ => {
                for child in self.children(id) {
                    self.write_node(child, out);
                }
            }
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Namespace;

    #[test]
    fn test_serialize_fragment() {
        let mut tree = DomTree::new();
        let frag = tree.create_fragment();
        let div = tree.create_element("div", Namespace::Html);
        tree.set_attribute(div, "title", "a \"b\"").unwrap();
        tree.set_attribute(div, "hidden", "").unwrap();
        let text = tree.create_text("1 < 2");
        let br = tree.create_element("br", Namespace::Html);
        let comment = tree.create_comment("?");
        tree.append_child(frag, div).unwrap();
        tree.append_child(div, text).unwrap();
        tree.append_child(div, br).unwrap();
        tree.append_child(frag, comment).unwrap();

        assert_eq!(
            tree.inner_html(frag),
            "<div title=\"a &quot;b&quot;\" hidden>1 &lt; 2<br></div><!--?-->"
        );
    }
}
