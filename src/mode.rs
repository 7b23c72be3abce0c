//! The active security posture and the registry that owns it.
//!
//! [`SecurityMode`] is the tagged variant every mode-dependent component
//! matches on. [`ModeSlot`] is the process-wide published value: any number of
//! readers, one writer ([`ModeRegistry`]), enforced by visibility.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::http::{ApiRequest, Transport};
use crate::Error;

/// Endpoint answering the persisted mode.
pub const CONFIG_PATH: &str = "/config";
/// Endpoint switching the persisted mode.
pub const CONFIG_MODE_PATH: &str = "/config/mode";

/// The two demonstration postures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// No sanitization; bearer token kept in client-readable storage.
    Vuln,
    /// Allow-list sanitization; credential kept in a client-unreadable cookie.
    Secure,
}

impl SecurityMode {
    /// Mode in effect before the first successful fetch.
    ///
    /// This is the demonstration baseline, not a security default.
    pub const DEFAULT: SecurityMode = SecurityMode::Vuln;

    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityMode::Vuln => "vuln",
            SecurityMode::Secure => "secure",
        }
    }
}

impl Default for SecurityMode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vuln" => Ok(SecurityMode::Vuln),
            "secure" => Ok(SecurityMode::Secure),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

/// Read handle on the published mode.
///
/// Cloning is cheap; every clone observes the same value. Only
/// [`ModeRegistry`] can publish.
#[derive(Debug, Clone, Default)]
pub struct ModeSlot {
    inner: Arc<RwLock<SecurityMode>>,
}

impl ModeSlot {
    /// Creates a slot holding [`SecurityMode::DEFAULT`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last published mode.
    pub fn get(&self) -> SecurityMode {
        *self.inner.read()
    }

    pub(crate) fn publish(&self, mode: SecurityMode) {
        *self.inner.write() = mode;
    }
}

#[derive(Debug, Default, Deserialize)]
struct ModeEnvelope {
    #[serde(alias = "xssMode")]
    mode: Option<String>,
}

#[derive(Serialize)]
struct SwitchRequest {
    mode: SecurityMode,
}

/// Owner of the active [`SecurityMode`].
///
/// The server is authoritative: [`fetch`](Self::fetch) adopts whatever it
/// reports and [`switch`](Self::switch) adopts the server's confirmation, not
/// the requested target. Any failure leaves the published value untouched.
pub struct ModeRegistry {
    transport: Arc<dyn Transport>,
    slot: ModeSlot,
    loading: AtomicBool,
    audit: AuditTrail,
}

impl ModeRegistry {
    /// Creates a registry publishing into a fresh slot.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_slot(transport, ModeSlot::new())
    }

    /// Creates a registry publishing into `slot`.
    pub fn with_slot(transport: Arc<dyn Transport>, slot: ModeSlot) -> Self {
        Self {
            transport,
            slot,
            loading: AtomicBool::new(false),
            audit: AuditTrail::new(),
        }
    }

    /// Records mode transitions into `audit`.
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the last known mode.
    pub fn current(&self) -> SecurityMode {
        self.slot.get()
    }

    /// Returns a read handle on the published mode.
    pub fn slot(&self) -> ModeSlot {
        self.slot.clone()
    }

    /// Returns `true` while a fetch or switch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Fetches the persisted mode and publishes it.
    ///
    /// # Errors
    ///
    /// - Transport and status failures are returned; the mode is unchanged.
    /// - A missing or unrecognised mode value returns [`Error::InvalidMode`];
    ///   the last known good mode stays published.
    pub async fn fetch(&self) -> Result<SecurityMode, Error> {
        let result = self.round_trip(ApiRequest::get(CONFIG_PATH)).await;
        self.settle(AuditEventKind::ModeFetched, result)
    }

    /// Asks the server to persist `target` and publishes its confirmation.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch). A failed switch is always surfaced.
    pub async fn switch(&self, target: SecurityMode) -> Result<SecurityMode, Error> {
        let request = ApiRequest::post(CONFIG_MODE_PATH).with_json(&SwitchRequest { mode: target })?;
        let result = self.round_trip(request).await;
        if let Ok(confirmed) = &result {
            if *confirmed != target {
                tracing::warn!(requested = %target, confirmed = %confirmed, "server confirmed a different mode");
            }
        }
        self.settle(AuditEventKind::ModeSwitched, result)
    }

    async fn round_trip(&self, request: ApiRequest) -> Result<SecurityMode, Error> {
        self.loading.store(true, Ordering::Release);
        let result: Result<SecurityMode, Error> = async {
            let response = self.transport.send(request).await?;
            if !response.is_success() {
                return Err(Error::Status {
                    status: response.status(),
                    message: "mode request rejected".to_string(),
                });
            }
            let envelope: ModeEnvelope = response.json_or_default()?;
            match envelope.mode {
                Some(raw) => raw.parse(),
                None => Err(Error::InvalidMode(String::new())),
            }
        }
        .await;
        self.loading.store(false, Ordering::Release);
        result
    }

    fn settle(
        &self,
        kind: AuditEventKind,
        result: Result<SecurityMode, Error>,
    ) -> Result<SecurityMode, Error> {
        match result {
            Ok(mode) => {
                let previous = self.slot.get();
                self.slot.publish(mode);
                tracing::info!(%previous, current = %mode, "security mode published");
                self.audit
                    .record(AuditEvent::new(kind, mode, AuditOutcome::Success));
                Ok(mode)
            }
            Err(e) => {
                let kept = self.slot.get();
                tracing::warn!(error = %e, kept = %kept, "mode update failed, keeping last known mode");
                self.audit.record(
                    AuditEvent::new(kind, kept, AuditOutcome::Error).with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("current", &self.current())
            .field("loading", &self.is_loading())
            .finish()
    }
}
