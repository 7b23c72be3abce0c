//! Scripted login against an in-memory server in both postures.
//!
//! Shows where the credential ends up: client-readable storage and a bearer
//! header under VULN, nowhere visible to the client under SECURE.
//!
//! Run with: `cargo run --example secure_login`

use std::sync::Arc;

use posture_core::{
    ApiResponse, AppContext, ClientConfig, HttpMethod, LoginRequest, MemoryNavigator,
    MemoryStore, RecordingTransport, SecurityMode, CONFIG_PATH, LOGIN_ENDPOINT, ME_ENDPOINT,
};

const ALICE: &str = r#"{"id":1,"username":"alice","email":"alice@example.com","role":"ADMIN"}"#;

fn server(mode: SecurityMode) -> Arc<RecordingTransport> {
    let transport = Arc::new(RecordingTransport::new());
    transport.respond(
        HttpMethod::Get,
        CONFIG_PATH,
        ApiResponse::new(200, format!(r#"{{"xssMode":"{}"}}"#, mode)),
    );
    let login_body = match mode {
        SecurityMode::Vuln => r#"{"accessToken":"eyJhbGciOiJIUzI1NiJ9.alice"}"#,
        SecurityMode::Secure => "{}",
    };
    transport.respond(HttpMethod::Post, LOGIN_ENDPOINT, ApiResponse::new(200, login_body));
    transport.respond(HttpMethod::Get, ME_ENDPOINT, ApiResponse::new(200, ALICE));
    transport
}

async fn run(mode: SecurityMode) {
    println!("--- {} ---", mode);

    let transport = server(mode);
    let store = Arc::new(MemoryStore::new());
    let ctx = AppContext::new(
        ClientConfig::default(),
        transport.clone(),
        store.clone(),
        Arc::new(MemoryNavigator::new()),
    );
    ctx.init().await;

    match ctx.session().login(LoginRequest::new("alice", "hunter2")).await {
        Ok(Some(session)) => println!("logged in as {} ({})", session.identity(), session.role()),
        Ok(None) => println!("login accepted, identity probe failed"),
        Err(e) => println!("login failed: {}", e),
    }

    println!("client-readable storage entries: {}", store.len());
    if let Some(probe) = transport.last_call(HttpMethod::Get, ME_ENDPOINT) {
        println!(
            "identity probe: bearer header={} with_credentials={}",
            probe.authorization.is_some(),
            probe.with_credentials
        );
    }

    println!("audit trail:");
    for event in ctx.audit().events() {
        println!("  {}", event);
    }
    println!();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== Login Posture Example ===\n");
    run(SecurityMode::Vuln).await;
    run(SecurityMode::Secure).await;
    println!("Notice: audit events name the identity but never carry the token.");
}
