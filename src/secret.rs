use std::fmt;

use serde::Serializer;

/// A wrapper that keeps credential material out of logs and debug output.
///
/// Bearer tokens read from client storage, `Authorization` header values and
/// login passwords all travel inside `Secret<String>`. The wrapped value can
/// only be reached through [`expose_secret`](Self::expose_secret), which keeps
/// every place that touches raw credential bytes greppable.
///
/// # Security Properties
///
/// - Does NOT implement `Deref`, `AsRef`, `Borrow`, `Clone`, or `Copy`
/// - Debug and Display output is always `[REDACTED]`
/// - Does NOT implement `Serialize`; request payloads opt in field by field
///
/// # Examples
///
/// ```
/// use posture_core::Secret;
///
/// let token = Secret::new("eyJhbGciOiJIUzI1NiJ9".to_string());
///
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(format!("{}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "eyJhbGciOiJIUzI1NiJ9");
/// ```
// BREAKING CHANGE WARNING: Do NOT add Clone, Copy, or Default derives.
// Copies of a token outlive the CredentialChannel's control over it.
pub struct Secret<T> {
    // BREAKING CHANGE WARNING: This field MUST remain private.
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// # Security Warning
    ///
    /// The name is verbose on purpose. Do not log or display what it returns.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// `serialize_with` helper for payload fields that must reach the server.
pub(crate) fn serialize_exposed<S>(secret: &Secret<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}
