use std::fmt;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::config::ClientConfig;
use crate::credential::CredentialChannel;
use crate::gate::{AccessGate, Decision, RouteTable};
use crate::http::{ReqwestTransport, Transport};
use crate::mode::{ModeRegistry, SecurityMode};
use crate::navigation::Navigator;
use crate::render::render_untrusted;
use crate::session::SessionController;
use crate::storage::{CredentialStore, FileStore, MemoryStore};
use crate::{Error, Rendered, Tainted};

/// Explicit application context.
///
/// Owns the two pieces of process-scoped state, the published mode (through
/// [`ModeRegistry`]) and the session (through [`SessionController`]), and
/// wires them to one transport, one credential store, one navigator and one
/// audit trail. Nothing in the crate reaches for a global.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use posture_core::{
///     AppContext, ClientConfig, Decision, MemoryNavigator, MemoryStore, RecordingTransport,
///     SecurityMode,
/// };
///
/// let ctx = AppContext::new(
///     ClientConfig::default(),
///     Arc::new(RecordingTransport::new()),
///     Arc::new(MemoryStore::new()),
///     Arc::new(MemoryNavigator::new()),
/// );
///
/// assert_eq!(ctx.mode(), SecurityMode::Vuln);
/// assert_eq!(ctx.navigate("/admin"), Decision::RedirectTo("/login"));
/// ```
pub struct AppContext {
    config: ClientConfig,
    modes: ModeRegistry,
    session: SessionController,
    navigator: Arc<dyn Navigator>,
    routes: RouteTable,
    audit: AuditTrail,
}

impl AppContext {
    /// Wires a context from explicit capabilities.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let audit = AuditTrail::new();
        let modes = ModeRegistry::new(transport.clone()).with_audit(audit.clone());
        let channel = CredentialChannel::new(store, modes.slot())
            .with_key(config.credential_key.clone())
            .with_audit(audit.clone());
        let session = SessionController::new(transport, Arc::new(channel), navigator.clone())
            .with_audit(audit.clone());

        Self {
            config,
            modes,
            session,
            navigator,
            routes: RouteTable::standard(),
            audit,
        }
    }

    /// Wires a context talking to a real server.
    ///
    /// Credentials persist to [`ClientConfig::storage_path`] when set and
    /// live in memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, Error> {
        let transport = Arc::new(ReqwestTransport::new(
            config.api_base_url.clone(),
            config.timeout,
        )?);
        let store: Arc<dyn CredentialStore> = match &config.storage_path {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(config, transport, store, navigator))
    }

    /// Replaces the standard route table.
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Startup sequence: fetch the mode, then probe the session.
    ///
    /// A failed fetch is logged and the default mode stays in effect.
    /// Returns the mode the session probe ran under.
    pub async fn init(&self) -> SecurityMode {
        if let Err(e) = self.modes.fetch().await {
            tracing::warn!(error = %e, mode = %self.modes.current(), "mode fetch failed, continuing with last known mode");
        }
        let mode = self.modes.current();
        let session = self.session.init().await;
        tracing::info!(
            %mode,
            authenticated = session.is_some(),
            "client initialised"
        );
        mode
    }

    /// Returns the published mode.
    pub fn mode(&self) -> SecurityMode {
        self.modes.current()
    }

    /// Administrative switch; see [`ModeRegistry::switch`].
    ///
    /// # Errors
    ///
    /// Every failure is returned; the previous mode stays published.
    pub async fn switch_mode(&self, target: SecurityMode) -> Result<SecurityMode, Error> {
        self.modes.switch(target).await
    }

    /// Returns the mode registry.
    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    /// Returns the session controller.
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Returns the route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Returns the configuration the context was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the shared audit trail.
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Navigates to `path`, consulting the [`AccessGate`] first.
    ///
    /// Aliases are followed before the gate runs. Unknown paths proceed. The
    /// [`Navigator`] ends up on `path` (or the alias target) when the gate
    /// proceeds and on the redirect target otherwise.
    pub fn navigate(&self, path: &str) -> Decision {
        let mut destination = path.to_string();
        let decision = match self.routes.resolve(path) {
            None => Decision::Proceed,
            Some(route) => {
                let target = match route.redirect() {
                    Some(alias) => {
                        destination = alias.to_string();
                        self.routes.resolve(alias).unwrap_or(route)
                    }
                    None => route,
                };
                let session = self.session.session();
                let decision = AccessGate::allow(target, session.as_ref());

                if target.requirement().is_some() {
                    let outcome = match decision {
                        Decision::Proceed => AuditOutcome::Success,
                        Decision::RedirectTo(_) => AuditOutcome::Denied,
                    };
                    let mut event = AuditEvent::new(AuditEventKind::GateDecision, self.mode(), outcome)
                        .with_detail(format!("{}: {}", target.name(), decision));
                    if let Some(session) = &session {
                        event = event.with_identity(session.identity());
                    }
                    self.audit.record(event);
                }
                decision
            }
        };

        match decision {
            Decision::Proceed => self.navigator.redirect(&destination),
            Decision::RedirectTo(target) => {
                tracing::debug!(requested = %path, %target, "navigation redirected by access gate");
                self.navigator.redirect(target)
            }
        }
        decision
    }

    /// Renders untrusted markup under the published mode.
    pub fn render(&self, input: Tainted<String>) -> Rendered<String> {
        render_untrusted(input, self.mode())
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("modes", &self.modes)
            .field("session", &self.session)
            .field("routes", &self.routes.routes().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ApiResponse, HttpMethod, RecordingTransport};
    use crate::navigation::MemoryNavigator;

    fn context(transport: &Arc<RecordingTransport>, nav: &Arc<MemoryNavigator>) -> AppContext {
        AppContext::new(
            ClientConfig::default(),
            transport.clone(),
            Arc::new(MemoryStore::new()),
            nav.clone(),
        )
    }

    #[tokio::test]
    async fn init_fetches_mode_before_probing() {
        let transport = Arc::new(RecordingTransport::new());
        let nav = Arc::new(MemoryNavigator::new());
        transport.respond(
            HttpMethod::Get,
            "/config",
            ApiResponse::new(200, r#"{"xssMode":"secure"}"#),
        );
        transport.respond(
            HttpMethod::Get,
            "/auth/me",
            ApiResponse::new(200, r#"{"username":"alice","role":"ADMIN"}"#),
        );
        let ctx = context(&transport, &nav);

        assert_eq!(ctx.init().await, SecurityMode::Secure);
        assert!(ctx.session().is_admin());

        let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/config", "/auth/me"]);
    }

    #[tokio::test]
    async fn init_survives_mode_fetch_failure() {
        let transport = Arc::new(RecordingTransport::new());
        let nav = Arc::new(MemoryNavigator::new());
        transport.fail(
            HttpMethod::Get,
            "/config",
            Error::Transport("unreachable".to_string()),
        );
        let ctx = context(&transport, &nav);

        assert_eq!(ctx.init().await, SecurityMode::Vuln);
        assert!(!ctx.session().is_authenticated());
        assert_eq!(transport.calls_to(HttpMethod::Get, "/auth/me"), 0);
    }

    #[tokio::test]
    async fn navigate_follows_alias_and_audits() {
        let transport = Arc::new(RecordingTransport::new());
        let nav = Arc::new(MemoryNavigator::new());
        transport.respond(
            HttpMethod::Get,
            "/config",
            ApiResponse::new(200, r#"{"mode":"secure"}"#),
        );
        transport.respond(
            HttpMethod::Get,
            "/auth/me",
            ApiResponse::new(200, r#"{"username":"alice","role":"ADMIN"}"#),
        );
        let ctx = context(&transport, &nav);
        ctx.init().await;

        assert_eq!(ctx.navigate("/admin"), Decision::Proceed);
        assert_eq!(nav.current_path(), "/admin/dashboard");

        let gate = ctx
            .audit()
            .events()
            .into_iter()
            .find(|e| e.kind() == AuditEventKind::GateDecision)
            .unwrap();
        assert_eq!(gate.outcome(), AuditOutcome::Success);
        assert_eq!(gate.identity(), Some("alice"));
    }

    #[test]
    fn unknown_and_public_paths_proceed_without_audit() {
        let transport = Arc::new(RecordingTransport::new());
        let nav = Arc::new(MemoryNavigator::new());
        let ctx = context(&transport, &nav);

        assert_eq!(ctx.navigate("/nowhere"), Decision::Proceed);
        assert_eq!(ctx.navigate("/article/3"), Decision::Proceed);
        assert_eq!(nav.current_path(), "/article/3");
        assert!(ctx.audit().is_empty());
    }

    #[test]
    fn render_uses_published_mode() {
        let transport = Arc::new(RecordingTransport::new());
        let nav = Arc::new(MemoryNavigator::new());
        let ctx = context(&transport, &nav);

        let raw = "<img src=x onerror=alert(1)>".to_string();
        let rendered = ctx.render(Tainted::new(raw.clone()));
        assert_eq!(rendered.mode(), SecurityMode::Vuln);
        assert_eq!(rendered.into_inner(), raw);
    }

    #[test]
    fn from_config_builds_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            storage_path: Some(dir.path().join("storage.json")),
            ..ClientConfig::default()
        };

        let ctx = AppContext::from_config(config, Arc::new(MemoryNavigator::new())).unwrap();
        assert_eq!(ctx.config().credential_key, "accessToken");
        assert_eq!(ctx.mode(), SecurityMode::Vuln);
    }
}
