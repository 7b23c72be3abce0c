//! Dual-mode security posture for a teaching client.
//!
//! An operator flips the client between two postures so learners can watch
//! what changes:
//!
//! | Concern              | `Vuln`                                 | `Secure`                                  |
//! |----------------------|----------------------------------------|-------------------------------------------|
//! | Credential           | bearer token in client-readable storage | server-managed cookie, never seen by code |
//! | Untrusted markup     | inserted as-is                         | allow-list sanitized, links hardened      |
//!
//! The mode comes from the server. Every mode-dependent component re-reads the
//! published value on each operation, so a switch takes effect immediately and
//! no component can disagree with another about which posture is active.
//!
//! # Core Types
//!
//! - [`SecurityMode`], [`ModeRegistry`]: the active posture and its owner
//! - [`CredentialChannel`]: where the credential lives and how calls carry it
//! - [`SessionController`]: the `Anonymous / Authenticating / Authenticated` machine
//! - [`sanitize`], [`HtmlSanitizer`], [`LinkHardener`], [`render_untrusted`]: the render pipeline
//! - [`AccessGate`], [`RouteTable`]: privileged navigation
//! - [`Secret<T>`], [`Tainted<T>`], [`Rendered<T>`]: wrappers marking credentials,
//!   untrusted input and pipeline output
//! - [`AppContext`]: explicit context wiring all of the above
//!
//! # Examples
//!
//! ```
//! use posture_core::{render_untrusted, Secret, SecurityMode, Tainted};
//!
//! // Credentials are redacted in logs
//! let token = Secret::new("eyJhbGciOi".to_string());
//! assert_eq!(format!("{:?}", token), "[REDACTED]");
//!
//! // The same comment rendered under both postures
//! let comment = Tainted::new("<img src=x onerror=alert(1)>nice post".to_string());
//! let vuln = render_untrusted(comment.clone(), SecurityMode::Vuln);
//! let secure = render_untrusted(comment, SecurityMode::Secure);
//!
//! assert!(vuln.as_ref().contains("onerror"));
//! assert_eq!(secure.as_ref(), "nice post");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod config;
mod context;
mod credential;
mod dom;
mod error;
mod gate;
mod http;
mod links;
mod mode;
mod navigation;
mod render;
mod rendered;
mod sanitizer;
mod secret;
mod session;
mod storage;
mod tainted;

pub use config::{
    ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT, ENV_API_BASE_URL, ENV_CREDENTIAL_KEY,
    ENV_STORAGE_PATH, ENV_TIMEOUT_MS,
};
pub use context::AppContext;
pub use credential::{CredentialChannel, DEFAULT_CREDENTIAL_KEY};
pub use dom::HtmlFragment;
pub use error::{Error, ErrorKind};
pub use gate::{AccessGate, Decision, Requirement, Route, RouteTable};
pub use http::{
    ApiRequest, ApiResponse, HttpMethod, RecordedRequest, RecordingTransport, ReqwestTransport,
    Transport,
};
pub use links::{LinkHardener, DEFAULT_TARGET, SAFETY_REL_TOKENS};
pub use mode::{ModeRegistry, ModeSlot, SecurityMode, CONFIG_MODE_PATH, CONFIG_PATH};
pub use navigation::{
    should_redirect_to_login, MemoryNavigator, Navigator, HOME_PATH, LOGIN_PATH, PROFILE_PREFIX,
};
pub use render::render_untrusted;
pub use rendered::Rendered;
pub use sanitizer::{sanitize, sanitize_opt, sanitize_with, HtmlSanitizer, RuleSet, Sanitizer, TagAction};
pub use secret::Secret;
pub use session::{
    AuthState, LoginRequest, RegisterRequest, Role, Session, SessionController, LOGIN_ENDPOINT,
    LOGOUT_ENDPOINT, ME_ENDPOINT, REGISTER_ENDPOINT,
};
pub use storage::{CredentialStore, FileStore, MemoryStore};
pub use tainted::Tainted;
