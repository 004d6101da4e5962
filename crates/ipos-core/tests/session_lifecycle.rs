//! End-to-end session lifecycle against a mock IPos server.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use ipos_core::{
    ApiError, Credentials, FileTokenStore, IPosClient, IPosNode, ManualClock, MemoryTokenStore,
    SessionError, SessionManager, SessionState, TokenRecord, TokenStore,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH_PATH: &str = "/auth";
const USER_PATH: &str = "/s/customers/user";

struct Harness {
    server: MockServer,
    store: MemoryTokenStore,
    clock: ManualClock,
    manager: SessionManager,
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("a@b.com", "pw")
}

async fn harness() -> Harness {
    harness_with_timeout(StdDuration::from_secs(5)).await
}

async fn harness_with_timeout(timeout: StdDuration) -> Harness {
    let server = MockServer::start().await;
    let store = MemoryTokenStore::new();
    let clock = ManualClock::new(t0());
    let client = IPosClient::with_timeout(server.uri(), timeout).unwrap();
    let manager =
        SessionManager::with_clock(client, Arc::new(store.clone()), Arc::new(clock.clone()));

    Harness {
        server,
        store,
        clock,
        manager,
    }
}

impl Harness {
    /// Seed a token obtained `age` before the clock's current instant.
    fn seed_token(&self, token: &str, age: Duration) {
        let obtained_at = t0();
        self.store
            .write(TokenRecord::new(token, obtained_at).unwrap())
            .unwrap();
        self.clock.set(obtained_at + age);
    }

    fn cached_token(&self) -> Option<String> {
        self.store.read().unwrap().map(|r| r.token().to_string())
    }
}

fn login_ok(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "accessToken": token }))
}

fn user_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "email": "a@b.com" }))
}

// ============================================================================
// ensure_logged_in
// ============================================================================

#[tokio::test]
async fn fresh_process_logs_in_once() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .and(body_json(json!({ "login": "a@b.com", "password": "pw" })))
        .respond_with(login_ok("tok-1"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(user_ok())
        .expect(0)
        .mount(&h.server)
        .await;

    h.manager.ensure_logged_in(&credentials()).await.unwrap();

    let record = h.store.read().unwrap().unwrap();
    assert_eq!(record.token(), "tok-1");
    assert_eq!(record.obtained_at(), t0());
}

#[tokio::test]
async fn fresh_accepted_token_skips_login() {
    let h = harness().await;
    h.seed_token("cached", Duration::minutes(9));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer cached"))
        .respond_with(user_ok())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("unused"))
        .expect(0)
        .mount(&h.server)
        .await;

    h.manager.ensure_logged_in(&credentials()).await.unwrap();

    assert_eq!(h.cached_token().as_deref(), Some("cached"));
}

#[tokio::test]
async fn state_reports_each_session_condition() {
    let h = harness().await;
    assert_eq!(h.manager.state().await.unwrap(), SessionState::NoToken);

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer good"))
        .respond_with(user_ok())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("unused"))
        .expect(0)
        .mount(&h.server)
        .await;

    h.seed_token("good", Duration::minutes(10));
    assert_eq!(h.manager.state().await.unwrap(), SessionState::LocallyExpired);

    h.seed_token("good", Duration::minutes(5));
    assert_eq!(h.manager.state().await.unwrap(), SessionState::Valid);

    h.seed_token("revoked", Duration::minutes(5));
    assert_eq!(
        h.manager.state().await.unwrap(),
        SessionState::LocallyFreshRemoteRejected
    );
}

#[tokio::test]
async fn expired_token_reauthenticates_without_probe() {
    let h = harness().await;
    h.seed_token("stale", Duration::minutes(10));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(user_ok())
        .expect(0)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("renewed"))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.ensure_logged_in(&credentials()).await.unwrap();

    assert_eq!(h.cached_token().as_deref(), Some("renewed"));
}

#[tokio::test]
async fn revoked_token_reauthenticates_once() {
    let h = harness().await;
    h.seed_token("revoked", Duration::minutes(1));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("renewed"))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.ensure_logged_in(&credentials()).await.unwrap();

    assert_eq!(h.cached_token().as_deref(), Some("renewed"));
}

#[tokio::test]
async fn probe_server_error_propagates_without_login() {
    let h = harness().await;
    h.seed_token("cached", Duration::minutes(2));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("unused"))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.manager.ensure_logged_in(&credentials()).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::SessionCheck(ApiError::ServerError(ref body)) if body == "database down"
    ));
    assert_eq!(h.cached_token().as_deref(), Some("cached"));
}

#[tokio::test]
async fn probe_timeout_propagates_without_login() {
    let h = harness_with_timeout(StdDuration::from_millis(200)).await;
    h.seed_token("cached", Duration::minutes(2));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(user_ok().set_delay(StdDuration::from_secs(2)))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("unused"))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.manager.ensure_logged_in(&credentials()).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::SessionCheck(ApiError::NetworkError(_))
    ));
    assert_eq!(h.cached_token().as_deref(), Some("cached"));
}

#[tokio::test]
async fn probe_malformed_body_is_indeterminate() {
    let h = harness().await;
    h.seed_token("cached", Duration::minutes(2));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("unused"))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.manager.state().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::SessionCheck(ApiError::MalformedBody(_))
    ));
}

#[tokio::test]
async fn login_failure_propagates_and_leaves_store_untouched() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.manager.ensure_logged_in(&credentials()).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::AuthRequest(ApiError::Unauthorized)
    ));
    assert!(h.cached_token().is_none());
}

#[tokio::test]
async fn concurrent_calls_each_end_with_valid_token() {
    let h = harness().await;

    // No single-flight: racing callers may each log in.
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("tok"))
        .expect(1..=3)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(user_ok())
        .mount(&h.server)
        .await;

    let creds = credentials();
    let calls = (0..3).map(|_| h.manager.ensure_logged_in(&creds));
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.cached_token().as_deref(), Some("tok"));
}

// ============================================================================
// authenticate
// ============================================================================

#[tokio::test]
async fn authenticate_without_token_is_protocol_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .manager
        .authenticator()
        .authenticate(&credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AuthProtocol(ref msg) if msg.contains("accessToken")));
    assert!(h.cached_token().is_none());
}

#[tokio::test]
async fn authenticate_with_empty_token_is_protocol_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok(""))
        .mount(&h.server)
        .await;

    let err = h
        .manager
        .authenticator()
        .authenticate(&credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AuthProtocol(_)));
    assert!(h.cached_token().is_none());
}

#[tokio::test]
async fn authenticate_with_non_json_body_is_protocol_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&h.server)
        .await;

    let err = h
        .manager
        .authenticator()
        .authenticate(&credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AuthProtocol(_)));
}

#[tokio::test]
async fn authenticate_server_error_is_request_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .manager
        .authenticator()
        .authenticate(&credentials())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::AuthRequest(ApiError::ServerError(_))
    ));
    assert!(h.cached_token().is_none());
}

#[tokio::test]
async fn authenticate_unreachable_server_is_request_error() {
    // Port 9 (discard) is not served locally.
    let client =
        IPosClient::with_timeout("http://127.0.0.1:9", StdDuration::from_secs(2)).unwrap();
    let store = MemoryTokenStore::new();
    let manager = SessionManager::new(client, Arc::new(store.clone()));

    let err = manager
        .authenticator()
        .authenticate(&credentials())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::AuthRequest(ApiError::NetworkError(_))
    ));
    assert!(store.read().unwrap().is_none());
}

#[tokio::test]
async fn authenticate_stamps_wall_clock_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("tok"))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let client = IPosClient::new(server.uri()).unwrap();
    let manager = SessionManager::new(client, Arc::new(store.clone()));

    let before = Utc::now();
    manager
        .authenticator()
        .authenticate(&credentials())
        .await
        .unwrap();
    let after = Utc::now();

    let record = store.read().unwrap().unwrap();
    assert_eq!(record.token(), "tok");
    assert!(record.obtained_at() >= before && record.obtained_at() <= after);
}

// ============================================================================
// Callers
// ============================================================================

#[tokio::test]
async fn node_execute_establishes_session() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("node-token"))
        .expect(1)
        .mount(&h.server)
        .await;

    let node = IPosNode::new(h.manager.clone());
    let output = node.execute(&credentials()).await.unwrap();

    assert!(output.is_empty());
    assert_eq!(
        node.session().access_token().unwrap().as_deref(),
        Some("node-token")
    );
}

#[tokio::test]
async fn current_user_returns_profile_payload() {
    let h = harness().await;
    h.seed_token("cached", Duration::minutes(3));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer cached"))
        .respond_with(user_ok())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("unused"))
        .expect(0)
        .mount(&h.server)
        .await;

    let user = h.manager.current_user(&credentials()).await.unwrap();
    assert_eq!(user["email"], "a@b.com");
}

#[tokio::test]
async fn current_user_logs_in_then_fetches_profile_once() {
    let h = harness().await;
    h.seed_token("revoked", Duration::minutes(3));

    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("renewed"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer renewed"))
        .respond_with(user_ok())
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.manager.current_user(&credentials()).await.unwrap();
    assert_eq!(user["id"], 7);
}

#[tokio::test]
async fn persisted_session_survives_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(login_ok("persisted"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .and(header("Authorization", "Bearer persisted"))
        .respond_with(user_ok())
        .expect(1)
        .mount(&server)
        .await;

    let first = SessionManager::new(
        IPosClient::new(server.uri()).unwrap(),
        Arc::new(FileTokenStore::new(dir.path().to_path_buf())),
    );
    first.ensure_logged_in(&credentials()).await.unwrap();

    let second = SessionManager::new(
        IPosClient::new(server.uri()).unwrap(),
        Arc::new(FileTokenStore::new(dir.path().to_path_buf())),
    );
    second.ensure_logged_in(&credentials()).await.unwrap();

    assert_eq!(second.access_token().unwrap().as_deref(), Some("persisted"));
}
