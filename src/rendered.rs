use crate::SecurityMode;

/// Markup that went through the render pipeline and may be inserted.
///
/// `Rendered<T>` is the only thing the pipeline hands back for insertion. It
/// remembers which [`SecurityMode`] produced it, because the guarantee it
/// carries depends on that mode:
///
/// - `Secure`: sanitized against the allow-list and link-hardened.
/// - `Vuln`: the raw input, unchanged. The type still marks where untrusted
///   markup crosses into the page, which is exactly what the demonstration
///   wants learners to see.
///
/// # Construction Invariants
///
/// There are no public constructors and no `From<T>` implementation.
/// Construction is restricted to crate-internal code through
/// `new_unchecked`, called by [`HtmlSanitizer`](crate::HtmlSanitizer) and
/// [`render_untrusted`](crate::render_untrusted).
///
/// ```compile_fail
/// use posture_core::Rendered;
///
/// let rendered = Rendered::new("<b>hi</b>".to_string());
/// ```
///
/// # Access
///
/// - [`AsRef::as_ref`]: Borrow the rendered value
/// - [`into_inner`](Self::into_inner): Consume and extract the value
/// - [`mode`](Self::mode): The posture that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered<T> {
    inner: T,
    mode: SecurityMode,
}

impl<T> Rendered<T> {
    /// Wraps a pipeline result.
    ///
    /// Callers are responsible for having applied the policy of `mode`.
    pub(crate) fn new_unchecked(value: T, mode: SecurityMode) -> Self {
        Self { inner: value, mode }
    }

    /// Returns the mode whose policy produced this value.
    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    /// Consumes the `Rendered<T>` and returns the inner value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Rendered<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}
