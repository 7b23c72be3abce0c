use crate::dom::HtmlFragment;
use crate::links::LinkHardener;
use crate::sanitizer::sanitize;
use crate::{Rendered, SecurityMode, Tainted};

/// Turns untrusted markup into markup that may be inserted under `mode`.
///
/// - `Vuln`: the raw input, byte for byte.
/// - `Secure`: [`sanitize`], then [`LinkHardener::harden`] over the result.
///
/// # Examples
///
/// ```
/// use posture_core::{render_untrusted, SecurityMode, Tainted};
///
/// let comment = Tainted::new(r#"<a href="https://example.com" onclick="x()">site</a>"#.to_string());
///
/// let vuln = render_untrusted(comment.clone(), SecurityMode::Vuln);
/// assert!(vuln.as_ref().contains("onclick"));
///
/// let secure = render_untrusted(comment, SecurityMode::Secure);
/// assert_eq!(
///     secure.as_ref(),
///     r#"<a href="https://example.com" rel="noopener noreferrer nofollow" target="_blank">site</a>"#
/// );
/// ```
pub fn render_untrusted(input: Tainted<String>, mode: SecurityMode) -> Rendered<String> {
    let raw = input.into_inner();
    let output = match mode {
        SecurityMode::Vuln => raw,
        SecurityMode::Secure => {
            let clean = sanitize(&raw, mode);
            if clean.is_empty() {
                clean
            } else {
                let fragment = HtmlFragment::parse(&clean);
                LinkHardener::harden(&fragment);
                fragment.to_html()
            }
        }
    };
    tracing::debug!(mode = %mode, len = output.len(), "rendered untrusted markup");
    Rendered::new_unchecked(output, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vuln_returns_input_unchanged() {
        let raw = r#"<a href="javascript:alert(1)">x</a><script>alert(2)</script>"#;
        let rendered = render_untrusted(Tainted::new(raw.to_string()), SecurityMode::Vuln);

        assert_eq!(rendered.as_ref(), raw);
        assert_eq!(rendered.mode(), SecurityMode::Vuln);
    }

    #[test]
    fn secure_sanitizes_then_hardens() {
        let raw = r#"<p>see <a href="javascript:alert(1)" rel="author">this</a></p><img src=x onerror=alert(1)>"#;
        let rendered = render_untrusted(Tainted::new(raw.to_string()), SecurityMode::Secure);

        assert_eq!(
            rendered.into_inner(),
            r#"<p>see <a rel="author noopener noreferrer nofollow" target="_blank">this</a></p>"#
        );
    }

    #[test]
    fn secure_empty_input() {
        let rendered = render_untrusted(Tainted::new(String::new()), SecurityMode::Secure);
        assert_eq!(rendered.as_ref(), "");
    }

    #[test]
    fn secure_output_is_stable_when_rendered_again() {
        let raw = r#"<ul><li><a href="/article/1" target="_self">one</a></li></ul>"#;
        let once = render_untrusted(Tainted::new(raw.to_string()), SecurityMode::Secure).into_inner();
        let twice = render_untrusted(Tainted::new(once.clone()), SecurityMode::Secure).into_inner();
        assert_eq!(once, twice);
    }
}
