use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use html5ever::{namespace_url, ns};
use markup5ever_rcdom::{Handle, NodeData};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::{escape_attr, escape_text, HtmlFragment, VOID_ELEMENTS};
use crate::{Rendered, SecurityMode, Tainted};

/// Nesting depth past which subtrees are dropped instead of walked.
const MAX_NESTING_DEPTH: usize = 512;

const STANDARD_ALLOWED_TAGS: &[&str] = &[
    "b", "i", "em", "strong", "a", "p", "code", "pre", "ul", "ol", "li", "h1", "h2", "h3", "h4",
    "blockquote", "br", "hr", "span", "div",
];

const STANDARD_ALLOWED_ATTRIBUTES: &[&str] = &["href", "title", "target", "rel", "class"];

const STANDARD_FORBIDDEN_TAGS: &[&str] = &[
    "img", "iframe", "object", "embed", "form", "input", "textarea", "button", "select", "canvas",
    "video", "audio", "link", "base",
];

/// Event handlers, inline style, and navigation-hijack attributes.
const STANDARD_FORBIDDEN_ATTRIBUTE_PATTERNS: &[&str] =
    &["^on", "^style$", "^srcset$", "^formaction$"];

/// Elements removed together with everything inside them, even when a
/// custom rule set does not forbid them.
const STANDARD_DROP_CONTENT_TAGS: &[&str] = &[
    "script", "style", "template", "noscript", "noembed", "noframes", "plaintext", "xmp",
    "title", "head", "svg", "math",
];

/// Attributes whose value is a URI and must pass the scheme expression.
const STANDARD_URI_ATTRIBUTES: &[&str] = &[
    "href", "src", "action", "formaction", "xlink:href", "background", "poster", "cite",
];

/// `http(s):`, `mailto:`, `tel:`, a single-slash path, or a fragment.
const STANDARD_ALLOWED_URI: &str = r"(?i)^(?:(?:https?|mailto|tel):|/(?:[^/]|$)|#)";

static STANDARD_RULES: Lazy<Arc<RuleSet>> = Lazy::new(|| Arc::new(RuleSet::standard()));

/// What the sanitizer does with an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// Keep the element and its allowed attributes.
    Keep,
    /// Drop the element but keep its children.
    Unwrap,
    /// Drop the element and everything inside it.
    Drop,
}

/// Static configuration of the SECURE-mode allow-list.
///
/// Forbidden rules always win: a tag in both the allowed and forbidden sets is
/// dropped, an attribute matching a forbidden pattern is dropped even when
/// allowed.
///
/// # Examples
///
/// ```
/// use posture_core::{RuleSet, TagAction};
///
/// let rules = RuleSet::standard();
/// assert_eq!(rules.tag_action("p"), TagAction::Keep);
/// assert_eq!(rules.tag_action("img"), TagAction::Drop);
/// assert_eq!(rules.tag_action("table"), TagAction::Unwrap);
/// assert!(!rules.attribute_allowed("a", "href", "javascript:alert(1)"));
/// assert!(rules.attribute_allowed("a", "href", "https://example.com"));
/// ```
#[derive(Debug, Clone)]
pub struct RuleSet {
    allowed_tags: HashSet<String>,
    allowed_attributes: HashSet<String>,
    tag_attributes: HashMap<String, HashSet<String>>,
    forbidden_tags: HashSet<String>,
    forbidden_attribute_patterns: Vec<Regex>,
    drop_content_tags: HashSet<String>,
    uri_attributes: HashSet<String>,
    allowed_uri: Regex,
}

fn owned_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RuleSet {
    /// Creates an empty rule set: every element is unwrapped, every attribute dropped.
    pub fn new(allowed_uri: Regex) -> Self {
        Self {
            allowed_tags: HashSet::new(),
            allowed_attributes: HashSet::new(),
            tag_attributes: HashMap::new(),
            forbidden_tags: HashSet::new(),
            forbidden_attribute_patterns: Vec::new(),
            drop_content_tags: owned_set(STANDARD_DROP_CONTENT_TAGS),
            uri_attributes: owned_set(STANDARD_URI_ATTRIBUTES),
            allowed_uri,
        }
    }

    /// The rule set used by SECURE mode.
    ///
    /// - Tags: text formatting, headings up to `h4`, lists, quotes, code,
    ///   links, `span`/`div`, `br`/`hr`.
    /// - Attributes: `href`, `title`, `target`, `rel`, `class`.
    /// - Forbidden: media, embedding and form elements; `on*`, `style`,
    ///   `srcset`, `formaction`.
    /// - URIs: `http`, `https`, `mailto`, `tel`, same-origin paths, fragments.
    pub fn standard() -> Self {
        let patterns = STANDARD_FORBIDDEN_ATTRIBUTE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("valid regex"))
            .collect();
        let allowed_uri = Regex::new(STANDARD_ALLOWED_URI).expect("valid regex");
        Self {
            allowed_tags: owned_set(STANDARD_ALLOWED_TAGS),
            allowed_attributes: owned_set(STANDARD_ALLOWED_ATTRIBUTES),
            forbidden_tags: owned_set(STANDARD_FORBIDDEN_TAGS),
            forbidden_attribute_patterns: patterns,
            ..Self::new(allowed_uri)
        }
    }

    /// Adds tags to the allowed set.
    pub fn allow_tags(mut self, tags: &[&str]) -> Self {
        self.allowed_tags.extend(tags.iter().map(|t| t.to_ascii_lowercase()));
        self
    }

    /// Adds attributes allowed on every allowed tag.
    pub fn allow_attributes(mut self, attributes: &[&str]) -> Self {
        self.allowed_attributes
            .extend(attributes.iter().map(|a| a.to_ascii_lowercase()));
        self
    }

    /// Adds attributes allowed on `tag` only.
    pub fn allow_tag_attributes(mut self, tag: &str, attributes: &[&str]) -> Self {
        self.tag_attributes
            .entry(tag.to_ascii_lowercase())
            .or_default()
            .extend(attributes.iter().map(|a| a.to_ascii_lowercase()));
        self
    }

    /// Adds tags to the forbidden set.
    pub fn forbid_tags(mut self, tags: &[&str]) -> Self {
        self.forbidden_tags.extend(tags.iter().map(|t| t.to_ascii_lowercase()));
        self
    }

    /// Adds a pattern matched against lowercase attribute names.
    pub fn forbid_attribute_pattern(mut self, pattern: Regex) -> Self {
        self.forbidden_attribute_patterns.push(pattern);
        self
    }

    /// Decides what happens to an element named `tag`.
    pub fn tag_action(&self, tag: &str) -> TagAction {
        let tag = tag.to_ascii_lowercase();
        if self.forbidden_tags.contains(&tag) || self.drop_content_tags.contains(&tag) {
            TagAction::Drop
        } else if self.allowed_tags.contains(&tag) {
            TagAction::Keep
        } else {
            TagAction::Unwrap
        }
    }

    /// Returns `true` if attribute `name="value"` may stay on `tag`.
    pub fn attribute_allowed(&self, tag: &str, name: &str, value: &str) -> bool {
        let name = name.to_ascii_lowercase();
        if self
            .forbidden_attribute_patterns
            .iter()
            .any(|p| p.is_match(&name))
        {
            return false;
        }

        let allowed = self.allowed_attributes.contains(&name)
            || self
                .tag_attributes
                .get(&tag.to_ascii_lowercase())
                .is_some_and(|attrs| attrs.contains(&name));
        if !allowed {
            return false;
        }

        if self.uri_attributes.contains(&name) {
            return self.uri_allowed(value);
        }
        true
    }

    /// Returns `true` if `value` is an empty URI or uses a permitted scheme.
    ///
    /// Whitespace and control characters are removed before matching so
    /// `java\tscript:` cannot sneak past the expression.
    pub fn uri_allowed(&self, value: &str) -> bool {
        let compact: String = value
            .chars()
            .filter(|c| !is_attr_whitespace(*c))
            .collect();
        compact.is_empty() || self.allowed_uri.is_match(&compact)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

fn is_attr_whitespace(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{0020}'
        | '\u{00A0}'
        | '\u{1680}'
        | '\u{180E}'
        | '\u{2000}'..='\u{2029}'
        | '\u{205F}'
        | '\u{3000}')
}

/// Sanitizes untrusted markup according to `mode`.
///
/// - `Vuln`: identity. The input is returned unmodified.
/// - `Secure`: the input is parsed permissively and re-emitted keeping only
///   what [`RuleSet::standard`] allows. Comments are dropped.
///
/// Pure and deterministic; never fails.
///
/// # Examples
///
/// ```
/// use posture_core::{sanitize, SecurityMode};
///
/// let raw = "<img src=x onerror=alert(1)><b>hi</b>";
/// assert_eq!(sanitize(raw, SecurityMode::Vuln), raw);
/// assert_eq!(sanitize(raw, SecurityMode::Secure), "<b>hi</b>");
/// ```
pub fn sanitize(raw: &str, mode: SecurityMode) -> String {
    sanitize_with(raw, mode, &STANDARD_RULES)
}

/// [`sanitize`] for possibly-absent input; `None` yields an empty string.
pub fn sanitize_opt(raw: Option<&str>, mode: SecurityMode) -> String {
    raw.map(|r| sanitize(r, mode)).unwrap_or_default()
}

/// [`sanitize`] with a caller-supplied rule set.
pub fn sanitize_with(raw: &str, mode: SecurityMode, rules: &RuleSet) -> String {
    match mode {
        SecurityMode::Vuln => raw.to_string(),
        SecurityMode::Secure => {
            if raw.is_empty() {
                return String::new();
            }
            let fragment = HtmlFragment::parse(raw);
            let mut out = String::with_capacity(raw.len());
            emit_children(&fragment.root(), rules, 0, &mut out);
            out
        }
    }
}

fn emit_children(node: &Handle, rules: &RuleSet, depth: usize, out: &mut String) {
    if depth > MAX_NESTING_DEPTH {
        tracing::warn!(depth, "markup nested too deeply, dropping subtree");
        return;
    }
    for child in node.children.borrow().iter() {
        emit_node(child, rules, depth, out);
    }
}

fn emit_node(node: &Handle, rules: &RuleSet, depth: usize, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => escape_text(&contents.borrow(), out),
        NodeData::Element { name, attrs, .. } => {
            // Foreign content (SVG, MathML) is never allowed through.
            if name.ns != ns!(html) {
                return;
            }
            let tag = &*name.local;
            match rules.tag_action(tag) {
                TagAction::Drop => {}
                TagAction::Unwrap => emit_children(node, rules, depth + 1, out),
                TagAction::Keep => {
                    out.push('<');
                    out.push_str(tag);
                    for attr in attrs.borrow().iter() {
                        if attr.name.prefix.is_some() {
                            continue;
                        }
                        let attr_name = &*attr.name.local;
                        if rules.attribute_allowed(tag, attr_name, &attr.value) {
                            out.push(' ');
                            out.push_str(attr_name);
                            out.push_str("=\"");
                            escape_attr(&attr.value, out);
                            out.push('"');
                        }
                    }
                    out.push('>');
                    if VOID_ELEMENTS.contains(&tag) {
                        return;
                    }
                    emit_children(node, rules, depth + 1, out);
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
        _ => {}
    }
}

/// Moves [`Tainted`] markup to [`Rendered`] markup under one mode.
pub trait Sanitizer<T> {
    /// Applies the policy. Never fails: malformed input is handled best-effort.
    fn sanitize(&self, input: Tainted<T>) -> Rendered<T>;
}

/// [`Sanitizer`] applying [`sanitize_with`] for a fixed mode and rule set.
///
/// # Examples
///
/// ```
/// use posture_core::{HtmlSanitizer, Sanitizer, SecurityMode, Tainted};
///
/// let sanitizer = HtmlSanitizer::new(SecurityMode::Secure);
/// let rendered = sanitizer.sanitize(Tainted::new("<p onclick=x()>hi</p>".to_string()));
///
/// assert_eq!(rendered.as_ref(), "<p>hi</p>");
/// assert_eq!(rendered.mode(), SecurityMode::Secure);
/// ```
#[derive(Debug, Clone)]
pub struct HtmlSanitizer {
    mode: SecurityMode,
    rules: Arc<RuleSet>,
}

impl HtmlSanitizer {
    /// Creates a sanitizer using the standard rule set.
    pub fn new(mode: SecurityMode) -> Self {
        Self {
            mode,
            rules: STANDARD_RULES.clone(),
        }
    }

    /// Creates a sanitizer using `rules`.
    pub fn with_rules(mode: SecurityMode, rules: RuleSet) -> Self {
        Self {
            mode,
            rules: Arc::new(rules),
        }
    }

    /// Returns the mode this sanitizer applies.
    pub fn mode(&self) -> SecurityMode {
        self.mode
    }
}

impl Sanitizer<String> for HtmlSanitizer {
    fn sanitize(&self, input: Tainted<String>) -> Rendered<String> {
        let raw = input.into_inner();
        let clean = sanitize_with(&raw, self.mode, &self.rules);
        Rendered::new_unchecked(clean, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secure(raw: &str) -> String {
        sanitize(raw, SecurityMode::Secure)
    }

    #[test]
    fn vuln_is_identity() {
        let raw = "<script>alert(document.cookie)</script><img src=x onerror=alert(1)>";
        assert_eq!(sanitize(raw, SecurityMode::Vuln), raw);
    }

    #[test]
    fn empty_and_absent_input() {
        assert_eq!(secure(""), "");
        assert_eq!(sanitize("", SecurityMode::Vuln), "");
        assert_eq!(sanitize_opt(None, SecurityMode::Secure), "");
        assert_eq!(sanitize_opt(None, SecurityMode::Vuln), "");
        assert_eq!(sanitize_opt(Some("<b>x</b>"), SecurityMode::Secure), "<b>x</b>");
    }

    #[test]
    fn img_onerror_is_removed() {
        let out = secure("<img src=x onerror=alert(1)>");
        assert!(!out.contains("<img"));
        assert!(!out.contains("onerror"));
    }

    #[test]
    fn script_is_removed_with_content() {
        assert_eq!(secure("<p>a</p><script>alert(1)</script>"), "<p>a</p>");
    }

    #[test]
    fn event_handlers_are_stripped_from_allowed_tags() {
        assert_eq!(
            secure(r#"<b onclick="steal()" onmouseover="x">bold</b>"#),
            "<b>bold</b>"
        );
    }

    #[test]
    fn style_and_srcset_are_stripped() {
        assert_eq!(
            secure(r#"<div style="background:url(javascript:x)" class="note">n</div>"#),
            r#"<div class="note">n</div>"#
        );
    }

    #[test]
    fn dangerous_schemes_are_dropped() {
        assert_eq!(
            secure(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            secure(r#"<a href="java&#9;script:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            secure(r#"<a href="data:text/html,<script>x</script>">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(secure(r#"<a href="//evil.example">x</a>"#), "<a>x</a>");
    }

    #[test]
    fn permitted_schemes_survive() {
        for href in [
            "https://example.com/a?b=c",
            "HTTP://example.com",
            "mailto:someone@example.com",
            "tel:+15551234",
            "/articles/1",
            "/",
            "#comments",
        ] {
            let raw = format!(r#"<a href="{}">x</a>"#, href);
            let out = secure(&raw);
            assert!(out.contains("href="), "{} was dropped: {}", href, out);
        }
    }

    #[test]
    fn unknown_tags_are_unwrapped() {
        assert_eq!(
            secure("<table><tr><td>cell</td></tr></table>"),
            "cell"
        );
        assert_eq!(secure("<section><p>kept</p></section>"), "<p>kept</p>");
    }

    #[test]
    fn forbidden_tags_drop_their_content() {
        assert_eq!(secure("<form><b>inside</b></form>after"), "after");
        assert_eq!(secure("<button>click</button>"), "");
    }

    #[test]
    fn svg_is_removed() {
        let out = secure(r#"<svg><a xlink:href="javascript:alert(1)">x</a></svg>ok"#);
        assert_eq!(out, "ok");
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(secure("a<!-- <script> -->b"), "ab");
    }

    #[test]
    fn malformed_input_is_handled() {
        assert_eq!(secure("<b>unclosed <i>nested"), "<b>unclosed <i>nested</i></b>");
        assert_eq!(secure("<<<>>>"), "&lt;&lt;&lt;&gt;&gt;&gt;");
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(secure("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
    }

    #[test]
    fn deterministic() {
        let raw = r#"<p class="a" title="t">x<a href="/y" target="_self">y</a></p>"#;
        assert_eq!(secure(raw), secure(raw));
        assert_eq!(
            secure(raw),
            r#"<p class="a" title="t">x<a href="/y" target="_self">y</a></p>"#
        );
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let raw = "<span>".repeat(2000) + "deep";
        let out = secure(&raw);
        assert!(!out.contains("deep"));
        assert!(out.len() < raw.len() * 2);
    }

    #[test]
    fn forbidden_beats_allowed() {
        let rules = RuleSet::standard()
            .allow_tags(&["img"])
            .allow_attributes(&["onclick", "style"]);

        assert_eq!(rules.tag_action("img"), TagAction::Drop);
        assert!(!rules.attribute_allowed("p", "onclick", "x()"));
        assert!(!rules.attribute_allowed("p", "style", "color:red"));
    }

    #[test]
    fn per_tag_attributes() {
        let rules = RuleSet::standard()
            .allow_tags(&["abbr"])
            .allow_tag_attributes("abbr", &["data-full"]);

        assert!(rules.attribute_allowed("abbr", "data-full", "x"));
        assert!(!rules.attribute_allowed("span", "data-full", "x"));
        assert_eq!(
            sanitize_with(
                r#"<abbr data-full="HyperText">HT</abbr><span data-full="no">s</span>"#,
                SecurityMode::Secure,
                &rules
            ),
            r#"<abbr data-full="HyperText">HT</abbr><span>s</span>"#
        );
    }

    #[test]
    fn custom_forbidden_pattern() {
        let rules = RuleSet::standard().forbid_attribute_pattern(Regex::new("^title$").unwrap());
        assert!(!rules.attribute_allowed("p", "title", "t"));
    }

    #[test]
    fn empty_rule_set_unwraps_everything() {
        let rules = RuleSet::new(Regex::new("^https:").unwrap());
        assert_eq!(
            sanitize_with("<p><b>x</b></p><script>y</script>", SecurityMode::Secure, &rules),
            "x"
        );
    }

    #[test]
    fn html_sanitizer_vuln_passes_through() {
        let sanitizer = HtmlSanitizer::new(SecurityMode::Vuln);
        let raw = "<img src=x onerror=alert(1)>".to_string();
        let rendered = sanitizer.sanitize(Tainted::new(raw.clone()));

        assert_eq!(rendered.as_ref(), &raw);
        assert_eq!(rendered.mode(), SecurityMode::Vuln);
        assert_eq!(sanitizer.mode(), SecurityMode::Vuln);
    }
}
