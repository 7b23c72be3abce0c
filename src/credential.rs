use std::fmt;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::http::ApiRequest;
use crate::mode::{ModeSlot, SecurityMode};
use crate::storage::CredentialStore;
use crate::{Error, Secret};

/// Storage key of the VULN-mode bearer token.
pub const DEFAULT_CREDENTIAL_KEY: &str = "accessToken";

/// Decides where the session credential lives and how calls carry it.
///
/// | Mode     | `attach`                              | `store`            | `clear`          |
/// |----------|---------------------------------------|--------------------|------------------|
/// | `Vuln`   | `Authorization: Bearer <stored token>`| writes the store   | removes the key  |
/// | `Secure` | ambient-credential flag, no header    | no-op              | no-op            |
///
/// # Security Invariant
///
/// While the published mode is `Secure`, the channel never reads from or
/// writes to its [`CredentialStore`]. The mode is re-read on every call, so
/// the invariant holds across a mid-session switch. Switching does not
/// migrate a token already stored under VULN; it stays where it is until
/// cleared under VULN.
///
/// The channel is the only writer of the store.
pub struct CredentialChannel {
    store: Arc<dyn CredentialStore>,
    modes: ModeSlot,
    key: String,
    audit: AuditTrail,
}

impl CredentialChannel {
    /// Creates a channel over `store`, branching on `modes`.
    pub fn new(store: Arc<dyn CredentialStore>, modes: ModeSlot) -> Self {
        Self {
            store,
            modes,
            key: DEFAULT_CREDENTIAL_KEY.to_string(),
            audit: AuditTrail::new(),
        }
    }

    /// Uses `key` instead of [`DEFAULT_CREDENTIAL_KEY`].
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Records credential events into `audit`.
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the mode the next operation will branch on.
    pub fn mode(&self) -> SecurityMode {
        self.modes.get()
    }

    /// Decorates `request` so the server can authenticate it.
    ///
    /// In VULN mode a storage read failure is logged and the request goes out
    /// unauthenticated.
    pub fn attach(&self, request: &mut ApiRequest) {
        match self.modes.get() {
            SecurityMode::Vuln => match self.store.get(&self.key) {
                Ok(Some(token)) => {
                    request.set_bearer(&token);
                    tracing::debug!(path = %request.path(), "attached bearer credential");
                }
                Ok(None) => {
                    tracing::debug!(path = %request.path(), "no stored credential, sending unauthenticated");
                }
                Err(e) => {
                    tracing::warn!(path = %request.path(), error = %e, "credential read failed, sending unauthenticated");
                }
            },
            SecurityMode::Secure => {
                request.set_with_credentials(true);
                tracing::debug!(path = %request.path(), "requested ambient credentials");
            }
        }
    }

    /// Persists a credential returned by the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the VULN-mode write fails.
    pub fn store(&self, token: &Secret<String>) -> Result<(), Error> {
        match self.modes.get() {
            SecurityMode::Vuln => {
                self.store.set(&self.key, token)?;
                tracing::info!(key = %self.key, "stored credential in client-readable storage");
                self.audit.record(AuditEvent::new(
                    AuditEventKind::CredentialStored,
                    SecurityMode::Vuln,
                    AuditOutcome::Success,
                ));
            }
            SecurityMode::Secure => {
                tracing::debug!("credential is server-managed, nothing to store");
                self.audit.record(AuditEvent::new(
                    AuditEventKind::CredentialStoreSkipped,
                    SecurityMode::Secure,
                    AuditOutcome::Success,
                ));
            }
        }
        Ok(())
    }

    /// Removes any client-readable credential.
    ///
    /// In SECURE mode the server-side session is ended by the logout call;
    /// there is nothing on the client to remove.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the VULN-mode removal fails.
    pub fn clear(&self) -> Result<(), Error> {
        match self.modes.get() {
            SecurityMode::Vuln => {
                self.store.remove(&self.key)?;
                tracing::info!(key = %self.key, "cleared client-readable credential");
                self.audit.record(AuditEvent::new(
                    AuditEventKind::CredentialCleared,
                    SecurityMode::Vuln,
                    AuditOutcome::Success,
                ));
            }
            SecurityMode::Secure => {
                tracing::debug!("credential is server-managed, nothing to clear");
            }
        }
        Ok(())
    }

    /// Returns `false` when an identity probe is known to fail.
    ///
    /// In VULN mode an anonymous probe can never succeed, so the probe is
    /// only worth making when a token is stored. In SECURE mode ambient
    /// cookies may already authenticate the caller.
    pub fn should_probe_identity(&self) -> bool {
        match self.modes.get() {
            SecurityMode::Vuln => matches!(self.store.get(&self.key), Ok(Some(_))),
            SecurityMode::Secure => true,
        }
    }
}

impl fmt::Debug for CredentialChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChannel")
            .field("mode", &self.modes.get())
            .field("key", &self.key)
            .finish()
    }
}
