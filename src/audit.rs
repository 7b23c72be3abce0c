//! Audit trail of posture-relevant transitions.
//!
//! This module provides:
//! - `AuditEvent`: what happened, under which mode, with which outcome
//! - `AuditTrail`: shared in-memory recorder that also emits each event
//!   through `tracing` under the `posture_audit` target
//!
//! Events are safe by default:
//! - No credential or password material
//! - No raw untrusted markup
//! - Only identities, modes, paths and short error descriptions

mod event;
mod trail;

pub use event::{AuditEvent, AuditEventKind, AuditOutcome};
pub use trail::AuditTrail;
