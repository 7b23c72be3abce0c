//! Audit event schema and types.

use std::fmt;

use crate::SecurityMode;

/// Kind of posture transition being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// Mode fetched from the configuration source
    ModeFetched,
    /// Mode switched through the administrative operation
    ModeSwitched,
    /// Credential written to client-readable storage
    CredentialStored,
    /// Credential store request ignored because the mode keeps it server-side
    CredentialStoreSkipped,
    /// Client-readable credential removed
    CredentialCleared,
    /// Login attempt
    Login,
    /// Registration attempt
    Register,
    /// Logout
    Logout,
    /// Identity probe against the "who am I" endpoint
    IdentityProbe,
    /// Recovery after an authentication-failure response
    AuthFailureRecovery,
    /// Access gate decision for a privileged route
    GateDecision,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::ModeFetched => write!(f, "mode_fetched"),
            AuditEventKind::ModeSwitched => write!(f, "mode_switched"),
            AuditEventKind::CredentialStored => write!(f, "credential_stored"),
            AuditEventKind::CredentialStoreSkipped => write!(f, "credential_store_skipped"),
            AuditEventKind::CredentialCleared => write!(f, "credential_cleared"),
            AuditEventKind::Login => write!(f, "login"),
            AuditEventKind::Register => write!(f, "register"),
            AuditEventKind::Logout => write!(f, "logout"),
            AuditEventKind::IdentityProbe => write!(f, "identity_probe"),
            AuditEventKind::AuthFailureRecovery => write!(f, "auth_failure_recovery"),
            AuditEventKind::GateDecision => write!(f, "gate_decision"),
        }
    }
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Operation succeeded
    Success,
    /// Operation was denied by policy
    Denied,
    /// Operation failed due to error
    Error,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// A structured audit event containing only non-sensitive metadata.
///
/// # Example
///
/// ```
/// use posture_core::audit::{AuditEvent, AuditEventKind, AuditOutcome};
/// use posture_core::SecurityMode;
///
/// let event = AuditEvent::new(AuditEventKind::Login, SecurityMode::Secure, AuditOutcome::Success)
///     .with_identity("alice");
///
/// assert_eq!(event.mode(), SecurityMode::Secure);
/// assert_eq!(event.identity(), Some("alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    kind: AuditEventKind,
    mode: SecurityMode,
    outcome: AuditOutcome,
    /// Username, when known
    identity: Option<String>,
    /// Route path, error description or similar. MUST NOT carry secrets.
    detail: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event with required fields.
    pub fn new(kind: AuditEventKind, mode: SecurityMode, outcome: AuditOutcome) -> Self {
        Self {
            kind,
            mode,
            outcome,
            identity: None,
            detail: None,
        }
    }

    /// Sets the identity the event concerns.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Sets a free-form detail.
    ///
    /// SAFETY: Caller must ensure this does not contain credential material.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns the event kind.
    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    /// Returns the mode in effect when the event happened.
    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    /// Returns the operation outcome.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// Returns the identity, if set.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns the detail, if set.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, mode={}, outcome={}, identity={}",
            self.kind,
            self.mode,
            self.outcome,
            self.identity.as_deref().unwrap_or("<none>")
        )?;

        if let Some(detail) = &self.detail {
            write!(f, ", detail={}", detail)?;
        }

        write!(f, "]")
    }
}
