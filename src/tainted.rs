use std::fmt;

/// A wrapper for untrusted markup that must pass through the render pipeline.
///
/// Article bodies, comments, profile bios, search echoes and feedback
/// messages all arrive from users. Wrapping them in `Tainted<T>` at the point
/// they leave the API keeps them from being inserted anywhere without going
/// through [`render_untrusted`](crate::render_untrusted) or a
/// [`Sanitizer`](crate::Sanitizer).
///
/// # Security Properties
///
/// - Does NOT implement `Deref` or any implicit conversion traits
/// - Inner value is inaccessible outside this crate
///
/// # Examples
///
/// ```
/// use posture_core::Tainted;
///
/// let bio = Tainted::new("<img src=x onerror=alert(1)>".to_string());
/// println!("{:?}", bio); // Tainted { inner: "<img ..." }
/// ```
// BREAKING CHANGE WARNING: Do NOT remove Clone - the same input is rendered
// under both modes when the two postures are compared side by side.
#[derive(Clone)]
pub struct Tainted<T> {
    // BREAKING CHANGE WARNING: This field MUST remain private.
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value in `Tainted`.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Extracts the inner value for the render pipeline.
    ///
    /// BREAKING CHANGE WARNING: Changing visibility to `pub` lets untrusted
    /// markup skip the pipeline entirely.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

// BREAKING CHANGE WARNING: Do NOT add Deref, AsRef, Borrow, From<T>, Into<T>,
// or any other implicit conversion traits to Tainted<T>.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}
