//! Permissive HTML fragment parsing and serialization.
//!
//! Fragments are parsed the way a browser parses `innerHTML` assigned to a
//! `<body>`: html5ever never rejects input, it repairs it. Serialization is
//! done here rather than through html5ever's serializer so the sanitizer can
//! emit its allow-listed view of a tree without mutating it.

use std::fmt;

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, LocalName, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Elements that never have content or an end tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// A parsed HTML fragment: the headless stand-in for a DOM container.
pub struct HtmlFragment {
    dom: RcDom,
}

impl HtmlFragment {
    /// Parses `html` as the content of a `<body>` element.
    ///
    /// Malformed markup is repaired, never rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use posture_core::HtmlFragment;
    ///
    /// let fragment = HtmlFragment::parse("<p>unclosed <b>bold");
    /// assert_eq!(fragment.to_html(), "<p>unclosed <b>bold</b></p>");
    /// ```
    pub fn parse(html: &str) -> Self {
        let context = QualName::new(None, ns!(html), local_name!("body"));
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
            .one(html);
        Self { dom }
    }

    /// Returns the synthetic root element holding the fragment's nodes.
    pub(crate) fn root(&self) -> Handle {
        let document = &self.dom.document;
        let first = document.children.borrow().first().cloned();
        first.unwrap_or_else(|| document.clone())
    }

    /// Returns every element named `tag`, in document order.
    pub(crate) fn elements_named(&self, tag: &str) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_elements(&self.root(), tag, &mut found);
        found
    }

    /// Serializes the fragment back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        serialize_children(&self.root(), false, &mut out);
        out
    }
}

impl fmt::Debug for HtmlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlFragment")
            .field("html", &self.to_html())
            .finish()
    }
}

fn collect_elements(root: &Handle, tag: &str, found: &mut Vec<Handle>) {
    let mut pending: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = pending.pop() {
        if let NodeData::Element { name, .. } = &node.data {
            if name.ns == ns!(html) && &*name.local == tag {
                found.push(node.clone());
            }
        }
        pending.extend(node.children.borrow().iter().rev().cloned());
    }
}

enum Step {
    Node(Handle, bool),
    Close(LocalName),
}

fn push_children(stack: &mut Vec<Step>, parent: &Handle, raw_text: bool) {
    for child in parent.children.borrow().iter().rev() {
        stack.push(Step::Node(child.clone(), raw_text));
    }
}

// Iterative walk: nesting depth is bounded only by the parser.
fn serialize_children(root: &Handle, raw_text: bool, out: &mut String) {
    let mut stack = Vec::new();
    push_children(&mut stack, root, raw_text);

    while let Some(step) = stack.pop() {
        let (node, raw_text) = match step {
            Step::Close(tag) => {
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
                continue;
            }
            Step::Node(node, raw_text) => (node, raw_text),
        };

        match &node.data {
            NodeData::Text { contents } => {
                let text = contents.borrow();
                if raw_text {
                    out.push_str(&text);
                } else {
                    escape_text(&text, out);
                }
            }
            NodeData::Comment { contents } => {
                out.push_str("<!--");
                out.push_str(contents);
                out.push_str("-->");
            }
            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let tag = &*name.local;
                out.push('<');
                out.push_str(tag);
                for attr in attrs.borrow().iter() {
                    out.push(' ');
                    if let Some(prefix) = &attr.name.prefix {
                        out.push_str(prefix);
                        out.push(':');
                    }
                    out.push_str(&attr.name.local);
                    out.push_str("=\"");
                    escape_attr(&attr.value, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag) {
                    continue;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&tag);
                stack.push(Step::Close(name.local.clone()));
                let parent = template_contents
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| node.clone());
                push_children(&mut stack, &parent, raw);
            }
            NodeData::Document => push_children(&mut stack, &node, false),
            NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {}
        }
    }
}

/// Escapes text content.
pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Escapes a double-quoted attribute value.
pub(crate) fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
