//! In-memory audit trail recorder.

use std::sync::Arc;

use parking_lot::Mutex;

use super::AuditEvent;

/// Shared in-memory recorder for audit events.
///
/// Clones share the same event list, so one trail can be handed to the mode
/// registry, the session controller and the application context. Every
/// recorded event is also emitted through `tracing`.
///
/// # Example
///
/// ```
/// use posture_core::audit::{AuditTrail, AuditEvent, AuditEventKind, AuditOutcome};
/// use posture_core::SecurityMode;
///
/// let trail = AuditTrail::new();
/// let handle = trail.clone();
///
/// handle.record(AuditEvent::new(
///     AuditEventKind::Logout,
///     SecurityMode::Vuln,
///     AuditOutcome::Success,
/// ));
///
/// assert_eq!(trail.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditTrail {
    /// Creates a new empty audit trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an audit event and emits it as a structured log entry.
    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "posture_audit",
            kind = %event.kind(),
            mode = %event.mode(),
            outcome = %event.outcome(),
            identity = ?event.identity(),
            detail = ?event.detail(),
            "audit event"
        );
        self.events.lock().push(event);
    }

    /// Returns a snapshot of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
