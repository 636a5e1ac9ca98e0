// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process SSO service, builders, and
//! assertion helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::FileConfig;
use crate::sso::oidc::{DeviceAuthorization, DEVICE_CODE_GRANT};
use crate::sso::portal::BEARER_HEADER;
use crate::token::ConfirmFn;

/// Device code handed out by the mock's device authorization.
pub const MOCK_DEVICE_CODE: &str = "mock-device-code";

/// One account as served by [`MockSso`].
#[derive(Debug, Clone)]
pub struct MockAccount {
    pub id: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<Option<String>>,
    /// Role pages at or past this index answer 500.
    pub fail_roles_from_page: Option<usize>,
}

impl MockAccount {
    pub fn new(id: &str, name: &str, roles: &[&str]) -> Self {
        Self {
            id: Some(id.to_owned()),
            name: Some(name.to_owned()),
            roles: roles.iter().map(|r| Some((*r).to_owned())).collect(),
            fail_roles_from_page: None,
        }
    }

    pub fn failing_roles_from(mut self, page: usize) -> Self {
        self.fail_roles_from_page = Some(page);
        self
    }
}

/// Request counters, one per route.
#[derive(Debug, Default)]
pub struct Hits {
    pub register: AtomicU32,
    pub device_authorization: AtomicU32,
    pub token: AtomicU32,
    pub accounts: AtomicU32,
    pub roles: AtomicU32,
    pub credentials: AtomicU32,
    pub federation: AtomicU32,
}

/// Stand-in for the OIDC, portal and federation services.
#[derive(Debug)]
pub struct MockSso {
    pub accounts: Vec<MockAccount>,
    pub page_size: usize,
    pub access_token: String,
    pub expires_in: u64,
    pub signin_token: String,
    /// Replaces the `roleCredentials` object when set.
    pub role_credentials: Option<Value>,
    /// `/token` answers with this OAuth error code when set.
    pub token_error: Option<String>,
    pub hits: Hits,
    /// Last `Session` payload seen by the federation endpoint.
    pub last_session: Mutex<Option<Value>>,
}

impl Default for MockSso {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            page_size: 2,
            access_token: "mock-access-token".to_owned(),
            expires_in: 28_800,
            signin_token: "mock-signin-token".to_owned(),
            role_credentials: None,
            token_error: None,
            hits: Hits::default(),
            last_session: Mutex::new(None),
        }
    }
}

impl MockSso {
    pub fn with_accounts(accounts: Vec<MockAccount>) -> Self {
        Self { accounts, ..Default::default() }
    }
}

fn page<T: Clone>(items: &[T], next: Option<&String>, size: usize) -> (Vec<T>, usize, Option<String>) {
    let start = next.and_then(|n| n.parse::<usize>().ok()).unwrap_or(0).min(items.len());
    let end = (start + size.max(1)).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    (items[start..end].to_vec(), start / size.max(1), next)
}

fn status(code: StatusCode, body: Value) -> Response {
    (code, Json(body)).into_response()
}

fn authorized(state: &MockSso, headers: &HeaderMap) -> bool {
    headers.get(BEARER_HEADER).and_then(|v| v.to_str().ok()) == Some(state.access_token.as_str())
}

async fn register(State(s): State<Arc<MockSso>>, Json(body): Json<Value>) -> Response {
    s.hits.register.fetch_add(1, Ordering::SeqCst);
    if body["clientType"] != "public" {
        return status(StatusCode::BAD_REQUEST, json!({"error": "invalid_client_metadata"}));
    }
    Json(json!({
        "clientId": "mock-client-id",
        "clientSecret": "mock-client-secret",
        "clientIdIssuedAt": 1_700_000_000,
        "clientSecretExpiresAt": 1_707_776_000,
    }))
    .into_response()
}

async fn device_authorization(
    State(s): State<Arc<MockSso>>,
    Json(body): Json<Value>,
) -> Response {
    s.hits.device_authorization.fetch_add(1, Ordering::SeqCst);
    if body["clientId"] != "mock-client-id" || body["startUrl"].as_str().unwrap_or("").is_empty() {
        return status(StatusCode::BAD_REQUEST, json!({"error": "invalid_request"}));
    }
    Json(json!({
        "deviceCode": MOCK_DEVICE_CODE,
        "userCode": "ABCD-EFGH",
        "verificationUri": "https://device.sso.example/",
        "verificationUriComplete": "https://device.sso.example/?user_code=ABCD-EFGH",
        "expiresIn": 600,
        "interval": 1,
    }))
    .into_response()
}

async fn token(State(s): State<Arc<MockSso>>, Json(body): Json<Value>) -> Response {
    s.hits.token.fetch_add(1, Ordering::SeqCst);
    if let Some(ref code) = s.token_error {
        return status(
            StatusCode::BAD_REQUEST,
            json!({"error": code, "error_description": "device not approved"}),
        );
    }
    if body["grantType"] != DEVICE_CODE_GRANT || body["deviceCode"] != MOCK_DEVICE_CODE {
        return status(StatusCode::BAD_REQUEST, json!({"error": "invalid_grant"}));
    }
    Json(json!({
        "accessToken": s.access_token,
        "tokenType": "Bearer",
        "expiresIn": s.expires_in,
    }))
    .into_response()
}

async fn accounts(
    State(s): State<Arc<MockSso>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    s.hits.accounts.fetch_add(1, Ordering::SeqCst);
    if !authorized(&s, &headers) {
        return status(StatusCode::UNAUTHORIZED, json!({"message": "Session token not found or invalid"}));
    }
    let (items, _, next) = page(&s.accounts, q.get("next_token"), s.page_size);
    let list: Vec<Value> = items
        .iter()
        .map(|a| json!({"accountId": a.id, "accountName": a.name, "emailAddress": null}))
        .collect();
    Json(json!({"accountList": list, "nextToken": next})).into_response()
}

async fn roles(
    State(s): State<Arc<MockSso>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    s.hits.roles.fetch_add(1, Ordering::SeqCst);
    if !authorized(&s, &headers) {
        return status(StatusCode::UNAUTHORIZED, json!({"message": "Session token not found or invalid"}));
    }
    let id = q.get("account_id");
    let Some(account) = s.accounts.iter().find(|a| a.id.as_ref() == id) else {
        return status(StatusCode::NOT_FOUND, json!({"message": "no such account"}));
    };
    let (items, index, next) = page(&account.roles, q.get("next_token"), s.page_size);
    if account.fail_roles_from_page.is_some_and(|from| index >= from) {
        return status(StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "role listing failed"}));
    }
    let list: Vec<Value> =
        items.iter().map(|r| json!({"roleName": r, "accountId": account.id})).collect();
    Json(json!({"roleList": list, "nextToken": next})).into_response()
}

async fn credentials(
    State(s): State<Arc<MockSso>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    s.hits.credentials.fetch_add(1, Ordering::SeqCst);
    if !authorized(&s, &headers) {
        return status(StatusCode::UNAUTHORIZED, json!({"message": "Session token not found or invalid"}));
    }
    let (Some(account), Some(role)) = (q.get("account_id"), q.get("role_name")) else {
        return status(StatusCode::BAD_REQUEST, json!({"message": "missing account_id or role_name"}));
    };
    let creds = s.role_credentials.clone().unwrap_or_else(|| {
        json!({
            "accessKeyId": format!("AKIA{account}"),
            "secretAccessKey": format!("secret-{role}"),
            "sessionToken": format!("session-{account}-{role}"),
            "expiration": 1_767_225_600_000_i64,
        })
    });
    Json(json!({"roleCredentials": creds})).into_response()
}

async fn federation(State(s): State<Arc<MockSso>>, Query(q): Query<HashMap<String, String>>) -> Response {
    s.hits.federation.fetch_add(1, Ordering::SeqCst);
    if q.get("Action").map(String::as_str) != Some("getSigninToken")
        || q.get("SessionType").map(String::as_str) != Some("json")
    {
        return status(StatusCode::BAD_REQUEST, json!({"message": "bad action"}));
    }
    let session = q.get("Session").and_then(|raw| serde_json::from_str::<Value>(raw).ok());
    let Some(session) = session else {
        return status(StatusCode::BAD_REQUEST, json!({"message": "bad session"}));
    };
    *s.last_session.lock().await = Some(session);
    Json(json!({"SigninToken": s.signin_token})).into_response()
}

/// Serve `mock` on a random local port. Returns the shared state and the
/// base URL; the federation endpoint is `<base>/federation`.
pub async fn spawn_mock_sso(mock: MockSso) -> anyhow::Result<(Arc<MockSso>, String)> {
    let state = Arc::new(mock);
    let router = Router::new()
        .route("/client/register", post(register))
        .route("/device_authorization", post(device_authorization))
        .route("/token", post(token))
        .route("/assignment/accounts", get(accounts))
        .route("/assignment/roles", get(roles))
        .route("/federation/credentials", get(credentials))
        .route("/federation", get(federation))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((state, format!("http://{addr}")))
}

/// A config pointing every endpoint at `base`.
pub fn mock_config(base: &str) -> FileConfig {
    FileConfig {
        region: "ap-southeast-2".to_owned(),
        start_url: "https://startup.awsapps.com/start".to_owned(),
        oidc_endpoint: Some(base.to_owned()),
        portal_endpoint: Some(base.to_owned()),
        federation_endpoint: Some(format!("{base}/federation")),
        ..Default::default()
    }
}

/// A confirmation gate that approves immediately and counts its calls.
pub fn counting_confirm() -> (ConfirmFn, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let confirm: ConfirmFn = Arc::new(move |_: &DeviceAuthorization| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (confirm, calls)
}

/// A confirmation gate that must never run.
pub fn refusing_confirm() -> ConfirmFn {
    Arc::new(|_: &DeviceAuthorization| anyhow::bail!("confirmation was not expected"))
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
