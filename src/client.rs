//! 后端 API 客户端
//! 请求授权 + 401 自动刷新重试 + 响应结构校验

use crate::{
    auth::{interceptor::set_bearer, CredentialSource, PublicEndpoints, RequestAuthorizer},
    config::ApiConfig,
    error::AppError,
    services::session_service::{RefreshTrigger, SessionManager},
};
use chrono::Utc;
use reqwest::{header::HeaderMap, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// 出站请求描述
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// 授权阶段选定的凭证
    pub credential: CredentialSource,
    /// 是否已经因 401 重试过
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            credential: CredentialSource::Anonymous,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// 非 2xx 响应转为错误
pub(crate) async fn ensure_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::http(status, body))
}

/// 按目标类型解析响应；结构不符即失败
pub(crate) async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let url = response.url().path().to_string();
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::Decode(format!("{}: {}", url, e)))
}

/// API 客户端
pub struct ApiClient {
    http: Client,
    base_url: String,
    authorizer: RequestAuthorizer,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// 创建新的客户端
    pub fn new(config: &ApiConfig, session: Arc<SessionManager>) -> Result<Self, AppError> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorizer: RequestAuthorizer::new(
                PublicEndpoints::new(config.public_endpoints.iter().cloned()),
                config.home_token.clone(),
            ),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Response, AppError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers.clone())
            .header("x-request-id", &request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            metrics::counter!("api_requests_total", "outcome" => "transport_error").increment(1);
            tracing::warn!(request_id = %request_id, path = %request.path, error = %e, "Request failed");
            e
        })?;

        tracing::debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            retried = request.retried,
            "Response received"
        );

        Ok(response)
    }

    /// 发送请求
    ///
    /// 401 时最多刷新并重发一次；其余失败原样返回。
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, AppError> {
        let user_token = self.session.valid_access_token(Utc::now()).await?;
        let request = self.authorizer.authorize(request, user_token.as_deref());

        let response = self.dispatch(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.finish(response).await;
        }

        self.recover_unauthorized(request, response).await
    }

    async fn recover_unauthorized(
        &self,
        mut request: ApiRequest,
        response: Response,
    ) -> Result<Response, AppError> {
        if request.retried {
            return self.finish(response).await;
        }
        request.retried = true;

        // 公开端点上未携带用户令牌的请求，无法通过用户刷新恢复
        if request.credential != CredentialSource::User
            && self.authorizer.public_endpoints().is_public(&request.path)
        {
            tracing::warn!(
                path = %request.path,
                credential = ?request.credential,
                "Public request rejected without user token"
            );
            return self.finish(response).await;
        }

        let observed = crate::auth::extract_bearer(&request.headers);
        let fresh = self
            .session
            .refresh(RefreshTrigger::Unauthorized, observed.as_deref())
            .await?;

        set_bearer(&mut request.headers, &fresh);
        request.credential = CredentialSource::User;

        tracing::debug!(path = %request.path, "Resubmitting request with refreshed token");
        let response = self.dispatch(&request).await?;
        self.finish(response).await
    }

    async fn finish(&self, response: Response) -> Result<Response, AppError> {
        let outcome = if response.status().is_success() {
            "success"
        } else {
            "error"
        };
        metrics::counter!("api_requests_total", "outcome" => outcome).increment(1);
        ensure_success(response).await
    }

    /// GET 并解析 JSON
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let response = self.execute(ApiRequest::get(path)).await?;
        decode_response(response).await
    }

    /// 发送 JSON 请求体并解析响应
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self
            .execute(ApiRequest::new(method, path).with_body(body))
            .await?;
        decode_response(response).await
    }
}
