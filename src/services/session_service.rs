//! 会话服务：登录、登出、令牌刷新
//! 唯一持有令牌存储读写权的组件，所有刷新路径在此串行化

use crate::{
    auth::{decode_claims, Claims, FileTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY},
    client::{decode_response, ensure_success},
    config::{ApiConfig, AppConfig, SessionConfig},
    error::AppError,
    models::auth::*,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tokio::sync::Mutex as TokioMutex;

/// 令牌端点（登录与刷新）
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn obtain(&self, request: &LoginRequest) -> Result<LoginResponse, AppError>;
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshTokenResponse, AppError>;
}

/// 基于 reqwest 的令牌端点
pub struct HttpTokenEndpoint {
    client: Client,
    login_url: String,
    refresh_url: String,
}

impl HttpTokenEndpoint {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            login_url: config.endpoint(&config.login_path),
            refresh_url: config.endpoint(&config.refresh_path),
        })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn obtain(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        let response = self.client.post(&self.login_url).json(request).send().await?;
        decode_response(ensure_success(response).await?).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshTokenResponse, AppError> {
        let body = RefreshTokenRequest {
            refresh: refresh_token.to_string(),
        };
        let response = self.client.post(&self.refresh_url).json(&body).send().await?;
        decode_response(ensure_success(response).await?).await
    }
}

/// 触发刷新的调用点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// 请求收到 401
    Unauthorized,
    /// 定时检查或发送前发现令牌过期
    Proactive,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Unauthorized => "unauthorized",
            RefreshTrigger::Proactive => "proactive",
        }
    }
}

/// 刷新失败后的处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Logout,
    KeepSession,
}

/// 主动检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 缺少令牌，未检查
    Skipped,
    NotNeeded,
    Refreshed,
}

/// 最近一次刷新的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_succeeded: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub refresh_threshold: Duration,
    pub logout_on_proactive_failure: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::minutes(5),
            logout_on_proactive_failure: false,
        }
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            refresh_threshold: config.refresh_threshold(),
            logout_on_proactive_failure: config.logout_on_proactive_failure,
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    options: SessionOptions,
    identity: RwLock<Option<Identity>>,
    status: RwLock<RefreshStatus>,
    refresh_gate: TokioMutex<()>,
}

/// 锁中毒时记录错误并继续使用内部数据
fn write_recovering<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::error!(lock = name, "Session lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        options: SessionOptions,
    ) -> Self {
        Self {
            store,
            endpoint,
            options,
            identity: RwLock::new(None),
            status: RwLock::new(RefreshStatus::default()),
            refresh_gate: TokioMutex::new(()),
        }
    }

    /// 使用文件存储与 HTTP 端点创建
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let store = Arc::new(FileTokenStore::new(&config.session.token_file));
        let endpoint = Arc::new(HttpTokenEndpoint::new(&config.api)?);
        Ok(Self::new(store, endpoint, SessionOptions::from(&config.session)))
    }

    /// 用户登录
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<Identity>, AppError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self.endpoint.obtain(&request).await.map_err(|e| {
            tracing::warn!(username = %username, error = %e, "Login failed");
            e
        })?;

        self.establish(response)?;
        tracing::info!(username = %username, "Login succeeded");
        Ok(self.identity())
    }

    /// 保存登录结果
    pub fn establish(&self, response: LoginResponse) -> Result<(), AppError> {
        self.store.set(ACCESS_TOKEN_KEY, &response.access)?;
        self.store.set(REFRESH_TOKEN_KEY, &response.refresh)?;
        self.set_identity(response.user);
        Ok(())
    }

    /// 登出：清除令牌与身份
    pub fn logout(&self) -> Result<(), AppError> {
        self.set_identity(None);
        let access = self.store.remove(ACCESS_TOKEN_KEY);
        let refresh = self.store.remove(REFRESH_TOKEN_KEY);
        tracing::info!("Session cleared");
        access.and(refresh)
    }

    pub fn access_token(&self) -> Result<Option<String>, AppError> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, AppError> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// 两个令牌都不存在即视为未登录
    pub fn is_authenticated(&self) -> Result<bool, AppError> {
        Ok(self.access_token()?.is_some() || self.refresh_token()?.is_some())
    }

    /// 当前访问令牌的声明
    pub fn claims(&self) -> Result<Option<Claims>, AppError> {
        self.access_token()?
            .map(|token| decode_claims(&token))
            .transpose()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        *write_recovering(&self.identity, "identity") = identity;
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn failure_policy(&self, trigger: RefreshTrigger) -> FailurePolicy {
        match trigger {
            RefreshTrigger::Unauthorized => FailurePolicy::Logout,
            RefreshTrigger::Proactive if self.options.logout_on_proactive_failure => {
                FailurePolicy::Logout
            }
            RefreshTrigger::Proactive => FailurePolicy::KeepSession,
        }
    }

    /// 刷新访问令牌
    ///
    /// `observed` 为调用方看到的访问令牌；若进入临界区时存储中的令牌已被替换，
    /// 直接返回新令牌而不再请求刷新端点。
    pub async fn refresh(
        &self,
        trigger: RefreshTrigger,
        observed: Option<&str>,
    ) -> Result<String, AppError> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.access_token()? {
            if observed != Some(current.as_str()) {
                tracing::debug!(trigger = trigger.as_str(), "Access token already replaced, reusing it");
                return Ok(current);
            }
        }

        match self.perform_refresh().await {
            Ok(token) => {
                {
                    let mut status = write_recovering(&self.status, "refresh status");
                    status.last_refreshed_at = Some(Utc::now());
                    status.last_succeeded = Some(true);
                }
                metrics::counter!("session_refresh_total", "trigger" => trigger.as_str(), "outcome" => "success")
                    .increment(1);
                tracing::info!(trigger = trigger.as_str(), "Access token refreshed");
                Ok(token)
            }
            Err(e) => {
                write_recovering(&self.status, "refresh status").last_succeeded = Some(false);
                metrics::counter!("session_refresh_total", "trigger" => trigger.as_str(), "outcome" => "failure")
                    .increment(1);
                tracing::warn!(trigger = trigger.as_str(), error = %e, "Access token refresh failed");

                if self.failure_policy(trigger) == FailurePolicy::Logout {
                    if let Err(logout_err) = self.logout() {
                        tracing::error!(error = %logout_err, "Failed to clear session after refresh failure");
                    }
                }

                Err(AppError::Refresh(Box::new(e)))
            }
        }
    }

    async fn perform_refresh(&self) -> Result<String, AppError> {
        let refresh_token = self.refresh_token()?.ok_or(AppError::MissingRefreshToken)?;
        let response = self.endpoint.refresh(&refresh_token).await?;

        self.store.set(ACCESS_TOKEN_KEY, &response.access)?;
        if let Some(rotated) = response.refresh.as_deref() {
            self.store.set(REFRESH_TOKEN_KEY, rotated)?;
        }

        Ok(response.access)
    }

    /// 剩余有效期低于阈值时刷新
    pub async fn refresh_if_expiring(&self, now: DateTime<Utc>) -> Result<RefreshOutcome, AppError> {
        let Some(access) = self.access_token()? else {
            return Ok(RefreshOutcome::Skipped);
        };
        if self.refresh_token()?.is_none() {
            return Ok(RefreshOutcome::Skipped);
        }

        let expiring = match decode_claims(&access) {
            Ok(claims) => {
                let remaining = claims.remaining(now);
                tracing::debug!(remaining_secs = remaining.num_seconds(), "Access token expiry checked");
                remaining < self.options.refresh_threshold
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored access token is undecodable, refreshing");
                true
            }
        };

        if !expiring {
            return Ok(RefreshOutcome::NotNeeded);
        }

        self.refresh(RefreshTrigger::Proactive, Some(&access)).await?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// 返回可用的访问令牌；已过期时先尝试刷新
    pub async fn valid_access_token(&self, now: DateTime<Utc>) -> Result<Option<String>, AppError> {
        let Some(token) = self.access_token()? else {
            return Ok(None);
        };

        match decode_claims(&token) {
            Ok(claims) if claims.is_expired(now) => {
                match self.refresh(RefreshTrigger::Proactive, Some(&token)).await {
                    Ok(fresh) => Ok(Some(fresh)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Sending request with the stored token");
                        self.access_token()
                    }
                }
            }
            _ => Ok(Some(token)),
        }
    }
}
