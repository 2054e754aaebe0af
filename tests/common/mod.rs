//! 测试公共模块
//! 提供模拟后端、模拟令牌端点和令牌生成工具

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use plant_monitor::{
    auth::{MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY},
    config::{ApiConfig, DEFAULT_PUBLIC_ENDPOINTS},
    error::AppError,
    models::auth::{Identity, LoginRequest, LoginResponse, RefreshTokenResponse},
    services::{HttpTokenEndpoint, SessionManager, SessionOptions, TokenEndpoint},
};
use secrecy::Secret;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERVICE_TOKEN: &str = "home-dashboard-service-token";
pub const REFRESH_TOKEN: &str = "refresh-token-1";
pub const PASSWORD: &str = "TestPass123";

static TOKEN_SEQ: AtomicUsize = AtomicUsize::new(0);

/// 生成访问令牌，`ttl_secs` 为距离过期的秒数（可为负）
pub fn mint_token(ttl_secs: i64) -> String {
    let seq = TOKEN_SEQ.fetch_add(1, Ordering::SeqCst);
    encode(
        &Header::default(),
        &json!({
            "token_type": "access",
            "exp": Utc::now().timestamp() + ttl_secs,
            "iat": Utc::now().timestamp(),
            "jti": format!("jti-{}", seq),
            "user_id": 7,
        }),
        &EncodingKey::from_secret(b"backend-signing-key-not-known-to-clients"),
    )
    .expect("Failed to mint token")
}

pub fn test_identity() -> Identity {
    Identity {
        name: "jsilva".to_string(),
        groups: vec!["supervisor".to_string()],
        level: 2,
        sectors: vec!["packing".to_string()],
    }
}

/// 预置令牌的内存存储
pub fn seeded_store(access: Option<&str>, refresh: Option<&str>) -> Arc<MemoryTokenStore> {
    let store = Arc::new(MemoryTokenStore::new());
    if let Some(access) = access {
        store.set(ACCESS_TOKEN_KEY, access).unwrap();
    }
    if let Some(refresh) = refresh {
        store.set(REFRESH_TOKEN_KEY, refresh).unwrap();
    }
    store
}

// ===== 模拟令牌端点 =====

pub struct FakeTokenEndpoint {
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
    /// 新签发令牌的有效期（秒）
    pub issued_ttl_secs: AtomicI64,
    pub rotated_refresh: Mutex<Option<String>>,
    pub delay: Duration,
}

impl FakeTokenEndpoint {
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            issued_ttl_secs: AtomicI64::new(3600),
            rotated_refresh: Mutex::new(None),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        let endpoint = Self::new();
        endpoint.fail_refresh.store(true, Ordering::SeqCst);
        endpoint
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn obtain(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if request.password != PASSWORD {
            return Err(AppError::http(reqwest::StatusCode::UNAUTHORIZED, "bad credentials"));
        }
        Ok(LoginResponse {
            access: mint_token(3600),
            refresh: REFRESH_TOKEN.to_string(),
            user: Some(test_identity()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshTokenResponse, AppError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AppError::http(reqwest::StatusCode::UNAUTHORIZED, "token_not_valid"));
        }
        Ok(RefreshTokenResponse {
            access: mint_token(self.issued_ttl_secs.load(Ordering::SeqCst)),
            refresh: self.rotated_refresh.lock().unwrap().clone(),
        })
    }
}

pub fn fake_session(
    store: Arc<MemoryTokenStore>,
    endpoint: Arc<FakeTokenEndpoint>,
    options: SessionOptions,
) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(store, endpoint, options))
}

// ===== 模拟后端 =====

/// 刷新端点行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// 签发并接受新令牌
    Issue,
    /// 签发但后端仍拒绝新令牌
    IssueRejected,
    /// 拒绝刷新
    Reject,
}

pub struct BackendState {
    pub refresh_calls: AtomicUsize,
    pub refresh_mode: Mutex<RefreshMode>,
    pub accepted: Mutex<HashSet<String>>,
    pub service_token: Mutex<String>,
    /// 数据端点收到的 Authorization 令牌（按请求顺序）
    pub seen: Mutex<Vec<Option<String>>>,
}

impl BackendState {
    pub fn accept(&self, token: &str) {
        self.accepted.lock().unwrap().insert(token.to_string());
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string());
        self.seen.lock().unwrap().push(token.clone());
        token
    }

    fn is_user_token(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.accepted.lock().unwrap().contains(t))
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            refresh_calls: AtomicUsize::new(0),
            refresh_mode: Mutex::new(RefreshMode::Issue),
            accepted: Mutex::new(HashSet::new()),
            service_token: Mutex::new(SERVICE_TOKEN.to_string()),
            seen: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/token/", post(login))
            .route("/api/token/refresh/", post(refresh))
            .route("/api/efficiency/", get(efficiency))
            .route("/api/action-plans/", get(action_plans))
            .route("/api/absences/", post(create_absence))
            .route("/api/stock/broken/", get(broken))
            .route("/api/production/", get(malformed))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, state }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: format!("http://{}", self.addr),
            home_token: Secret::new(SERVICE_TOKEN.to_string()),
            public_endpoints: DEFAULT_PUBLIC_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            login_path: "/api/token/".to_string(),
            refresh_path: "/api/token/refresh/".to_string(),
            timeout_secs: 5,
        }
    }

    /// 使用真实 HTTP 端点的会话
    pub fn session(&self, store: Arc<MemoryTokenStore>) -> Arc<SessionManager> {
        let endpoint = Arc::new(HttpTokenEndpoint::new(&self.api_config()).unwrap());
        Arc::new(SessionManager::new(store, endpoint, SessionOptions::default()))
    }
}

async fn login(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response();
    }

    let access = mint_token(3600);
    state.accept(&access);
    Json(json!({
        "access": access,
        "refresh": REFRESH_TOKEN,
        "user": {"username": body["username"], "groups": ["supervisor"], "functional_level": 2, "sectors": ["packing"]}
    }))
    .into_response()
}

async fn refresh(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let mode = *state.refresh_mode.lock().unwrap();
    if mode == RefreshMode::Reject || body["refresh"] != REFRESH_TOKEN {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
            .into_response();
    }

    let access = mint_token(3600);
    if mode == RefreshMode::Issue {
        state.accept(&access);
    }
    Json(json!({ "access": access })).into_response()
}

async fn efficiency(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let token = state.record(&headers);
    if params.get("line").is_some_and(|l| l != "L1") {
        return Json(json!([])).into_response();
    }
    let service = state.service_token.lock().unwrap().clone();
    if token.as_deref() == Some(service.as_str()) || state.is_user_token(token.as_deref()) {
        return Json(json!([
            {"date": "2024-03-01", "shift": "A", "line": "L1", "efficiency": 90.0, "run_minutes": 300.0}
        ]))
        .into_response();
    }
    StatusCode::UNAUTHORIZED.into_response()
}

async fn action_plans(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let token = state.record(&headers);
    if state.is_user_token(token.as_deref()) {
        return Json(json!([
            {"id": 1, "title": "Fix sealing jaw", "status": "open", "opened_on": "2024-03-01"}
        ]))
        .into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type"})),
    )
        .into_response()
}

async fn create_absence(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let token = state.record(&headers);
    if !state.is_user_token(token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut created = body;
    created["id"] = json!(101);
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn broken(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record(&headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn malformed(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record(&headers);
    Json(json!({"results": "not a list"})).into_response()
}
