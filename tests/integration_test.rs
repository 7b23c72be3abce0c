use std::sync::Arc;

use posture_core::audit::{AuditEventKind, AuditOutcome};
use posture_core::{
    ApiRequest, ApiResponse, AppContext, AuthState, ClientConfig, CredentialStore, Decision,
    Error, FileStore, HttpMethod, LoginRequest, MemoryNavigator, MemoryStore, Navigator,
    RecordingTransport, Secret, SecurityMode, Tainted, CONFIG_MODE_PATH, CONFIG_PATH,
    LOGIN_ENDPOINT, LOGOUT_ENDPOINT, ME_ENDPOINT,
};

const ALICE: &str = r#"{"id":1,"username":"alice","email":"alice@example.com","role":"ADMIN","bio":"<a href=\"javascript:alert(1)\" onclick=\"steal()\">me</a>"}"#;
const BOB: &str = r#"{"id":2,"username":"bob","email":"bob@example.com","role":"USER","bio":null}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Credential store that fails the test if it is touched at all.
struct SealedStore;

impl CredentialStore for SealedStore {
    fn get(&self, key: &str) -> Result<Option<Secret<String>>, Error> {
        panic!("client-readable storage read in SECURE mode (key {})", key);
    }

    fn set(&self, key: &str, _value: &Secret<String>) -> Result<(), Error> {
        panic!("client-readable storage written in SECURE mode (key {})", key);
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        panic!("client-readable storage cleared in SECURE mode (key {})", key);
    }
}

/// Scripted server: mode endpoints echo a switch, `/auth/me` answers per bearer token.
fn server(mode: SecurityMode) -> Arc<RecordingTransport> {
    let transport = Arc::new(RecordingTransport::new());
    transport.respond(
        HttpMethod::Get,
        CONFIG_PATH,
        ApiResponse::new(200, format!(r#"{{"xssMode":"{}"}}"#, mode)),
    );
    transport.route(HttpMethod::Post, CONFIG_MODE_PATH, |req| {
        let mode = req
            .body
            .as_ref()
            .and_then(|b| b["mode"].as_str())
            .unwrap_or("vuln")
            .to_string();
        Ok(ApiResponse::new(200, format!(r#"{{"mode":"{}"}}"#, mode)))
    });
    transport.respond(HttpMethod::Post, LOGOUT_ENDPOINT, ApiResponse::new(200, ""));
    transport
}

fn context(
    transport: &Arc<RecordingTransport>,
    store: Arc<dyn CredentialStore>,
    nav: &Arc<MemoryNavigator>,
) -> AppContext {
    AppContext::new(ClientConfig::default(), transport.clone(), store, nav.clone())
}

#[tokio::test]
async fn vuln_init_without_credential_makes_no_probe() {
    init_tracing();
    let transport = server(SecurityMode::Vuln);
    let nav = Arc::new(MemoryNavigator::new());
    let ctx = context(&transport, Arc::new(MemoryStore::new()), &nav);

    assert_eq!(ctx.init().await, SecurityMode::Vuln);

    assert_eq!(transport.calls_to(HttpMethod::Get, ME_ENDPOINT), 0);
    assert_eq!(ctx.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn secure_login_without_token_relies_on_ambient_cookie() {
    init_tracing();
    let transport = server(SecurityMode::Secure);
    transport.respond(HttpMethod::Post, LOGIN_ENDPOINT, ApiResponse::new(200, "{}"));
    transport.route(HttpMethod::Get, ME_ENDPOINT, |req| {
        if req.with_credentials && req.authorization.is_none() {
            Ok(ApiResponse::new(200, ALICE))
        } else {
            Ok(ApiResponse::new(401, ""))
        }
    });
    let nav = Arc::new(MemoryNavigator::at("/login"));
    let ctx = context(&transport, Arc::new(SealedStore), &nav);

    assert_eq!(ctx.init().await, SecurityMode::Secure);
    ctx.session().logout().await;

    let session = ctx
        .session()
        .login(LoginRequest::new("a", "b"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(session.identity(), "alice");
    assert!(ctx.session().is_admin());

    let login = transport.last_call(HttpMethod::Post, LOGIN_ENDPOINT).unwrap();
    assert!(login.with_credentials);
    assert!(login.authorization.is_none());
    assert_eq!(login.body.unwrap()["password"], "b");
}

#[tokio::test]
async fn vuln_login_attaches_bearer_until_logout() {
    init_tracing();
    let transport = server(SecurityMode::Vuln);
    transport.respond(
        HttpMethod::Post,
        LOGIN_ENDPOINT,
        ApiResponse::new(200, r#"{"accessToken":"jwt-abc"}"#),
    );
    transport.respond(HttpMethod::Get, ME_ENDPOINT, ApiResponse::new(200, BOB));
    transport.respond(HttpMethod::Get, "/articles/mine", ApiResponse::new(200, "[]"));
    let store = Arc::new(MemoryStore::new());
    let nav = Arc::new(MemoryNavigator::at("/login"));
    let ctx = context(&transport, store.clone(), &nav);
    ctx.init().await;

    ctx.session()
        .login(LoginRequest::new("bob", "pw"))
        .await
        .unwrap();
    ctx.session()
        .send(ApiRequest::get("/articles/mine"))
        .await
        .unwrap();

    let call = transport.last_call(HttpMethod::Get, "/articles/mine").unwrap();
    assert_eq!(call.authorization.as_deref(), Some("Bearer jwt-abc"));
    assert!(!call.with_credentials);

    ctx.session().logout().await;
    assert!(store.is_empty());
    assert!(!ctx.session().is_authenticated());

    let logout = transport.last_call(HttpMethod::Post, LOGOUT_ENDPOINT).unwrap();
    assert_eq!(logout.authorization.as_deref(), Some("Bearer jwt-abc"));
}

#[tokio::test]
async fn unauthorized_response_drops_session_and_gates_admin() {
    init_tracing();
    let transport = server(SecurityMode::Vuln);
    transport.respond(
        HttpMethod::Post,
        LOGIN_ENDPOINT,
        ApiResponse::new(200, r#"{"accessToken":"jwt-admin"}"#),
    );
    transport.respond(HttpMethod::Get, ME_ENDPOINT, ApiResponse::new(200, ALICE));
    transport.respond(HttpMethod::Get, "/admin/feedbacks", ApiResponse::new(401, ""));
    let store = Arc::new(MemoryStore::new());
    let nav = Arc::new(MemoryNavigator::at("/login"));
    let ctx = context(&transport, store.clone(), &nav);
    ctx.init().await;

    ctx.session()
        .login(LoginRequest::new("alice", "pw"))
        .await
        .unwrap();
    assert_eq!(ctx.navigate("/admin/feedbacks"), Decision::Proceed);

    let err = ctx
        .session()
        .send(ApiRequest::get("/admin/feedbacks"))
        .await
        .unwrap_err();

    assert_eq!(err, Error::Unauthorized);
    assert!(ctx.session().session().is_none());
    assert!(store.is_empty());
    assert_eq!(nav.current_path(), "/login");
    assert_eq!(ctx.navigate("/admin/dashboard"), Decision::RedirectTo("/login"));

    let kinds: Vec<AuditEventKind> = ctx.audit().events().iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&AuditEventKind::AuthFailureRecovery));
}

#[tokio::test]
async fn gate_sends_admin_through_and_user_home() {
    init_tracing();
    for (user, expected) in [
        (ALICE, Decision::Proceed),
        (BOB, Decision::RedirectTo("/")),
    ] {
        let transport = server(SecurityMode::Secure);
        transport.respond(HttpMethod::Get, ME_ENDPOINT, ApiResponse::new(200, user));
        let nav = Arc::new(MemoryNavigator::new());
        let ctx = context(&transport, Arc::new(SealedStore), &nav);
        ctx.init().await;

        assert_eq!(ctx.navigate("/admin/dashboard"), expected);

        let gate = ctx
            .audit()
            .events()
            .into_iter()
            .find(|e| e.kind() == AuditEventKind::GateDecision)
            .unwrap();
        let outcome = match expected {
            Decision::Proceed => AuditOutcome::Success,
            Decision::RedirectTo(_) => AuditOutcome::Denied,
        };
        assert_eq!(gate.outcome(), outcome);
    }
}

#[tokio::test]
async fn switching_mode_does_not_migrate_stored_token() {
    init_tracing();
    let transport = server(SecurityMode::Vuln);
    transport.respond(
        HttpMethod::Post,
        LOGIN_ENDPOINT,
        ApiResponse::new(200, r#"{"accessToken":"legacy"}"#),
    );
    transport.respond(HttpMethod::Get, ME_ENDPOINT, ApiResponse::new(200, ALICE));
    let store = Arc::new(MemoryStore::new());
    let nav = Arc::new(MemoryNavigator::at("/login"));
    let ctx = context(&transport, store.clone(), &nav);
    ctx.init().await;
    ctx.session()
        .login(LoginRequest::new("alice", "pw"))
        .await
        .unwrap();
    let writes_before = store.write_count();

    assert_eq!(
        ctx.switch_mode(SecurityMode::Secure).await.unwrap(),
        SecurityMode::Secure
    );
    ctx.session().who_am_i().await;
    ctx.session().logout().await;

    let probe = transport.last_call(HttpMethod::Get, ME_ENDPOINT).unwrap();
    assert!(probe.authorization.is_none());
    assert!(probe.with_credentials);
    assert_eq!(store.write_count(), writes_before);
    assert_eq!(
        store.get("accessToken").unwrap().unwrap().expose_secret(),
        "legacy"
    );
}

#[tokio::test]
async fn failed_switch_keeps_previous_mode() {
    init_tracing();
    let transport = server(SecurityMode::Vuln);
    transport.respond(
        HttpMethod::Post,
        CONFIG_MODE_PATH,
        ApiResponse::new(200, r#"{"mode":"paranoid"}"#),
    );
    let nav = Arc::new(MemoryNavigator::new());
    let ctx = context(&transport, Arc::new(MemoryStore::new()), &nav);
    ctx.init().await;

    let err = ctx.switch_mode(SecurityMode::Secure).await.unwrap_err();

    assert!(matches!(err, Error::InvalidMode(_)));
    assert_eq!(ctx.mode(), SecurityMode::Vuln);
    assert!(!ctx.modes().is_loading());
}

#[tokio::test]
async fn rendering_follows_the_published_mode() {
    init_tracing();
    let transport = server(SecurityMode::Vuln);
    transport.respond(HttpMethod::Get, ME_ENDPOINT, ApiResponse::new(200, ALICE));
    let store = Arc::new(MemoryStore::new());
    store.set("accessToken", &Secret::new("t".to_string())).unwrap();
    let nav = Arc::new(MemoryNavigator::new());
    let ctx = context(&transport, store, &nav);
    ctx.init().await;

    let bio: Tainted<String> = ctx.session().session().unwrap().bio().unwrap();
    let vuln = ctx.render(bio.clone());
    assert!(vuln.as_ref().contains("javascript:"));
    assert!(vuln.as_ref().contains("onclick"));

    ctx.switch_mode(SecurityMode::Secure).await.unwrap();
    let secure = ctx.render(bio);
    assert_eq!(secure.mode(), SecurityMode::Secure);
    assert_eq!(
        secure.as_ref(),
        r#"<a rel="noopener noreferrer nofollow" target="_blank">me</a>"#
    );
}

#[tokio::test]
async fn stored_token_survives_restart_in_vuln_mode() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let transport = server(SecurityMode::Vuln);
    transport.respond(
        HttpMethod::Post,
        LOGIN_ENDPOINT,
        ApiResponse::new(200, r#"{"accessToken":"persisted"}"#),
    );
    transport.route(HttpMethod::Get, ME_ENDPOINT, |req| {
        match req.authorization.as_deref() {
            Some("Bearer persisted") => Ok(ApiResponse::new(200, BOB)),
            _ => Ok(ApiResponse::new(401, "")),
        }
    });

    let nav = Arc::new(MemoryNavigator::at("/login"));
    let first = context(&transport, Arc::new(FileStore::new(&path)), &nav);
    first.init().await;
    first
        .session()
        .login(LoginRequest::new("bob", "pw"))
        .await
        .unwrap();

    let restarted = context(&transport, Arc::new(FileStore::new(&path)), &nav);
    restarted.init().await;

    assert_eq!(
        restarted.session().session().map(|s| s.identity().to_string()),
        Some("bob".to_string())
    );
}
