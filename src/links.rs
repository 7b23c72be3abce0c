use html5ever::tendril::StrTendril;
use html5ever::{namespace_url, ns, Attribute, LocalName, QualName};
use markup5ever_rcdom::NodeData;

use crate::dom::HtmlFragment;

/// `target` given to anchors that declare none: open in a new browsing context.
pub const DEFAULT_TARGET: &str = "_blank";

/// Relation tokens every hardened anchor carries.
///
/// - `noopener`: the new context gets no `window.opener` handle.
/// - `noreferrer`: no `Referer` header is sent.
/// - `nofollow`: the link is not endorsed.
pub const SAFETY_REL_TOKENS: [&str; 3] = ["noopener", "noreferrer", "nofollow"];

/// Post-sanitization pass over anchors.
///
/// Every `<a>` in the fragment gets a `target` (only when absent) and a `rel`
/// containing [`SAFETY_REL_TOKENS`]. Existing tokens are kept in their
/// original order, duplicates are collapsed and the safety tokens appended
/// when missing. Tokens compare ASCII case-insensitively, as HTML does.
///
/// The pass is idempotent.
///
/// # Examples
///
/// ```
/// use posture_core::LinkHardener;
///
/// let html = LinkHardener::harden_html(r#"<a href="/x" rel="author">x</a>"#);
/// assert_eq!(
///     html,
///     r#"<a href="/x" rel="author noopener noreferrer nofollow" target="_blank">x</a>"#
/// );
/// assert_eq!(LinkHardener::harden_html(&html), html);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHardener;

impl LinkHardener {
    /// Hardens every anchor in `fragment` in place. Returns the number of anchors visited.
    pub fn harden(fragment: &HtmlFragment) -> usize {
        let anchors = fragment.elements_named("a");
        for anchor in &anchors {
            if let NodeData::Element { attrs, .. } = &anchor.data {
                harden_attributes(&mut attrs.borrow_mut());
            }
        }
        tracing::trace!(anchors = anchors.len(), "hardened links");
        anchors.len()
    }

    /// Parses `html`, hardens it and serializes the result.
    pub fn harden_html(html: &str) -> String {
        let fragment = HtmlFragment::parse(html);
        Self::harden(&fragment);
        fragment.to_html()
    }
}

fn harden_attributes(attrs: &mut Vec<Attribute>) {
    let rel = match attrs.iter_mut().find(|a| is_plain(a, "rel")) {
        Some(existing) => {
            let merged = merge_rel(&existing.value);
            existing.value = StrTendril::from(merged);
            None
        }
        None => Some(SAFETY_REL_TOKENS.join(" ")),
    };
    if let Some(value) = rel {
        attrs.push(plain_attribute("rel", &value));
    }

    if !attrs.iter().any(|a| is_plain(a, "target")) {
        attrs.push(plain_attribute("target", DEFAULT_TARGET));
    }
}

/// Merges the safety tokens into a whitespace-separated `rel` value.
pub(crate) fn merge_rel(existing: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for token in existing
        .split_ascii_whitespace()
        .chain(SAFETY_REL_TOKENS.iter().copied())
    {
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(token)) {
            tokens.push(token);
        }
    }
    tokens.join(" ")
}

fn is_plain(attr: &Attribute, name: &str) -> bool {
    attr.name.prefix.is_none() && &*attr.name.local == name
}

fn plain_attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, ns!(), LocalName::from(name)),
        value: StrTendril::from(value),
    }
}
