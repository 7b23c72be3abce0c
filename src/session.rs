//! Session state machine.
//!
//! [`SessionController`] owns the local view of who is logged in. It is the
//! only component that mutates [`AuthState`], and it reaches the server and
//! the credential store only through [`Transport`] and
//! [`CredentialChannel`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::credential::CredentialChannel;
use crate::http::{ApiRequest, ApiResponse, Transport};
use crate::navigation::{should_redirect_to_login, Navigator, LOGIN_PATH};
use crate::secret::serialize_exposed;
use crate::{Error, Secret, Tainted};

/// Login endpoint.
pub const LOGIN_ENDPOINT: &str = "/auth/login";
/// Registration endpoint.
pub const REGISTER_ENDPOINT: &str = "/auth/register";
/// Logout endpoint.
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
/// "Who am I" endpoint.
pub const ME_ENDPOINT: &str = "/auth/me";

/// Role attached to an account.
///
/// Role strings other than `ADMIN` and `USER` are kept verbatim as
/// [`Role::Other`] and never satisfy a role requirement for the known roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// `ADMIN`
    Admin,
    /// `USER`
    User,
    /// Any other role string.
    Other(String),
}

impl Role {
    /// Returns the wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Other(raw) => raw,
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ADMIN" => Role::Admin,
            "USER" => Role::User,
            _ => Role::Other(raw),
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::from(raw.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user, as reported by the identity endpoint.
///
/// Unknown response fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    #[serde(default)]
    id: Option<u64>,
    #[serde(rename = "username", alias = "identity")]
    identity: String,
    #[serde(default)]
    email: Option<String>,
    role: Role,
    #[serde(default)]
    bio: Option<String>,
}

impl Session {
    /// Creates a session for `identity` holding `role`.
    pub fn new(identity: impl Into<String>, role: impl Into<Role>) -> Self {
        Self {
            id: None,
            identity: identity.into(),
            email: None,
            role: role.into(),
            bio: None,
        }
    }

    /// Sets the numeric account id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the e-mail address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the profile bio.
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Account id, when the server reports one.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Username.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// E-mail address, when the server reports one.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Account role.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns `true` for `ADMIN` accounts.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The user-authored bio. It is markup and must be rendered.
    pub fn bio(&self) -> Option<Tainted<String>> {
        self.bio.clone().map(Tainted::new)
    }
}

/// Local authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No session.
    #[default]
    Anonymous,
    /// A login or register call is in flight.
    Authenticating,
    /// Identity confirmed by the server.
    Authenticated(Session),
}

/// Body of a login call.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    username: String,
    #[serde(serialize_with = "serialize_exposed")]
    password: Secret<String>,
}

impl LoginRequest {
    /// Creates a login payload.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

/// Body of a registration call.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    #[serde(serialize_with = "serialize_exposed")]
    password: Secret<String>,
}

impl RegisterRequest {
    /// Creates a registration payload.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: Secret::new(password.into()),
        }
    }
}

#[derive(Default, Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// What happens after a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Clear, drop to anonymous, and redirect unless the view is exempt.
    Redirect,
    /// Clear and drop to anonymous.
    Silent,
}

/// Owner of the session state machine.
///
/// ```text
/// Anonymous ──login/register──▶ Authenticating ──ok + who-am-i──▶ Authenticated
///     ▲                               │                              │
///     └────────── failure ────────────┘◀──── logout / 401 / probe ───┘
/// ```
///
/// Any 401 received through [`send`](Self::send), [`login`](Self::login) or
/// [`register`](Self::register) triggers recovery: the credential is cleared,
/// the state drops to [`AuthState::Anonymous`], and the [`Navigator`] is sent
/// to the login surface unless the current view is exempt
/// (see [`should_redirect_to_login`]). Identity probes recover silently.
///
/// A 403 is returned as [`Error::Forbidden`] and leaves the session alone.
pub struct SessionController {
    transport: Arc<dyn Transport>,
    channel: Arc<CredentialChannel>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<AuthState>,
    audit: AuditTrail,
}

impl SessionController {
    /// Creates an anonymous controller.
    pub fn new(
        transport: Arc<dyn Transport>,
        channel: Arc<CredentialChannel>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            channel,
            navigator,
            state: Mutex::new(AuthState::Anonymous),
            audit: AuditTrail::new(),
        }
    }

    /// Records session events into `audit`.
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// Returns a snapshot of the state.
    pub fn state(&self) -> AuthState {
        self.state.lock().clone()
    }

    /// Returns the current session, if authenticated.
    pub fn session(&self) -> Option<Session> {
        match &*self.state.lock() {
            AuthState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Returns `true` when a session is established.
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.lock(), AuthState::Authenticated(_))
    }

    /// Returns `true` when the session belongs to an `ADMIN`.
    pub fn is_admin(&self) -> bool {
        matches!(&*self.state.lock(), AuthState::Authenticated(s) if s.is_admin())
    }

    /// Returns `true` while a login or register call is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.lock(), AuthState::Authenticating)
    }

    /// Returns the credential channel used to decorate calls.
    pub fn channel(&self) -> &Arc<CredentialChannel> {
        &self.channel
    }

    /// Startup probe.
    ///
    /// In VULN mode with no stored credential the probe is skipped: an
    /// anonymous probe cannot succeed there. In SECURE mode the probe always
    /// runs because ambient cookies may already authenticate the caller.
    pub async fn init(&self) -> Option<Session> {
        if !self.channel.should_probe_identity() {
            tracing::debug!(mode = %self.channel.mode(), "no stored credential, skipping identity probe");
            self.set_state(AuthState::Anonymous);
            return None;
        }
        self.who_am_i().await
    }

    /// Logs in, stores any returned credential, then probes identity.
    ///
    /// Returns the session established by the probe, or `None` when the
    /// server accepted the credentials but the probe failed.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthenticationInProgress`] if another login or register is
    ///   in flight; the state is left untouched.
    /// - Any transport, status or storage error; the state returns to
    ///   [`AuthState::Anonymous`]. Nothing is retried.
    pub async fn login(&self, request: LoginRequest) -> Result<Option<Session>, Error> {
        self.begin()?;
        let identity = request.username.clone();
        let payload = ApiRequest::post(LOGIN_ENDPOINT).with_json(&request);
        self.authenticate(AuditEventKind::Login, &identity, payload)
            .await
    }

    /// Registers a new account. Same shape as [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn register(&self, request: RegisterRequest) -> Result<Option<Session>, Error> {
        self.begin()?;
        let identity = request.username.clone();
        let payload = ApiRequest::post(REGISTER_ENDPOINT).with_json(&request);
        self.authenticate(AuditEventKind::Register, &identity, payload)
            .await
    }

    /// Ends the session.
    ///
    /// The server call is best-effort: a failure is logged and the local
    /// credential is cleared and the state dropped to anonymous regardless.
    pub async fn logout(&self) {
        let mode = self.channel.mode();
        let identity = self.session().map(|s| s.identity().to_string());

        let outcome = match self.dispatch(ApiRequest::post(LOGOUT_ENDPOINT)).await {
            Ok(_) => AuditOutcome::Success,
            Err(e) => {
                tracing::warn!(error = %e, "logout call failed, clearing local session anyway");
                AuditOutcome::Error
            }
        };
        self.clear_credential();
        self.set_state(AuthState::Anonymous);
        tracing::info!(%mode, "logged out");

        let mut event = AuditEvent::new(AuditEventKind::Logout, mode, outcome);
        if let Some(identity) = identity {
            event = event.with_identity(identity);
        }
        self.audit.record(event);
    }

    /// Asks the server who the caller is and reconciles local state.
    ///
    /// On success the session is replaced by the server's answer. On any
    /// failure the session is dropped; a 401 also clears the credential.
    /// Failures are logged, never returned, and never redirect.
    pub async fn who_am_i(&self) -> Option<Session> {
        let mode = self.channel.mode();
        let result = async {
            let response = self.dispatch(ApiRequest::get(ME_ENDPOINT)).await?;
            response.json::<Session>()
        }
        .await;

        match result {
            Ok(session) => {
                tracing::info!(%mode, identity = %session.identity(), role = %session.role(), "identity confirmed");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::IdentityProbe, mode, AuditOutcome::Success)
                        .with_identity(session.identity()),
                );
                self.set_state(AuthState::Authenticated(session.clone()));
                Some(session)
            }
            Err(e) => {
                tracing::warn!(%mode, error = %e, "identity probe failed, dropping session");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::IdentityProbe, mode, AuditOutcome::Error)
                        .with_detail(e.to_string()),
                );
                if e.is_unauthorized() {
                    self.recover(Recovery::Silent);
                } else {
                    self.set_state(AuthState::Anonymous);
                }
                None
            }
        }
    }

    /// Sends an authenticated call.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] after running recovery.
    /// - [`Error::Forbidden`] for a 403; the session is kept.
    /// - [`Error::Status`] for any other non-success status.
    /// - Transport failures as returned by the [`Transport`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let result = self.dispatch(request).await;
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.recover(Recovery::Redirect);
            }
        }
        result
    }

    async fn authenticate(
        &self,
        kind: AuditEventKind,
        identity: &str,
        payload: Result<ApiRequest, Error>,
    ) -> Result<Option<Session>, Error> {
        let mode = self.channel.mode();
        let result: Result<(), Error> = async {
            let response = self.send(payload?).await?;
            let body: AuthResponse = response.json_or_default()?;
            if let Some(token) = body.access_token {
                self.channel.store(&Secret::new(token))?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(%mode, %identity, "{} accepted", kind);
                self.audit.record(
                    AuditEvent::new(kind, mode, AuditOutcome::Success).with_identity(identity),
                );
                Ok(self.who_am_i().await)
            }
            Err(e) => {
                tracing::warn!(%mode, %identity, error = %e, "{} failed", kind);
                self.audit.record(
                    AuditEvent::new(kind, mode, AuditOutcome::Error)
                        .with_identity(identity)
                        .with_detail(e.to_string()),
                );
                self.set_state(AuthState::Anonymous);
                Err(e)
            }
        }
    }

    async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, Error> {
        self.channel.attach(&mut request);
        let method = request.method();
        let path = request.path().to_string();
        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        tracing::debug!(%method, %path, status = response.status(), "request rejected");
        Err(status_error(&response))
    }

    fn begin(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        if matches!(*state, AuthState::Authenticating) {
            return Err(Error::AuthenticationInProgress);
        }
        *state = AuthState::Authenticating;
        Ok(())
    }

    fn recover(&self, recovery: Recovery) {
        let mode = self.channel.mode();
        self.clear_credential();
        self.set_state(AuthState::Anonymous);

        let current = self.navigator.current_path();
        let redirect = recovery == Recovery::Redirect && should_redirect_to_login(&current);
        if redirect {
            self.navigator.redirect(LOGIN_PATH);
        }
        tracing::info!(%mode, %current, redirect, "recovered from authentication failure");
        self.audit.record(
            AuditEvent::new(AuditEventKind::AuthFailureRecovery, mode, AuditOutcome::Success)
                .with_detail(if redirect { LOGIN_PATH } else { current.as_str() }),
        );
    }

    fn clear_credential(&self) {
        if let Err(e) = self.channel.clear() {
            tracing::warn!(error = %e, "failed to clear stored credential");
        }
    }

    fn set_state(&self, next: AuthState) {
        *self.state.lock() = next;
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("channel", &self.channel)
            .finish()
    }
}

fn status_error(response: &ApiResponse) -> Error {
    match response.status() {
        401 => Error::Unauthorized,
        403 => Error::Forbidden,
        status => Error::Status {
            status,
            message: response
                .json::<ErrorBody>()
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "request failed".to_string()),
        },
    }
}
