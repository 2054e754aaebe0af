//! 请求授权拦截
//! 按请求路径决定附加用户令牌、首页服务令牌或不附加

use crate::client::ApiRequest;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, Secret};

/// 请求实际使用的凭证来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    User,
    Service,
    Anonymous,
}

/// 公开看板端点白名单
#[derive(Debug, Clone)]
pub struct PublicEndpoints {
    fragments: Vec<String>,
}

impl PublicEndpoints {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// 子串匹配
    pub fn is_public(&self, path: &str) -> bool {
        self.fragments.iter().any(|f| path.contains(f.as_str()))
    }
}

/// 请求授权器
#[derive(Debug, Clone)]
pub struct RequestAuthorizer {
    public_endpoints: PublicEndpoints,
    service_token: Secret<String>,
}

impl RequestAuthorizer {
    pub fn new(public_endpoints: PublicEndpoints, service_token: Secret<String>) -> Self {
        Self {
            public_endpoints,
            service_token,
        }
    }

    pub fn public_endpoints(&self) -> &PublicEndpoints {
        &self.public_endpoints
    }

    /// 选择凭证
    pub fn select<'a>(
        &'a self,
        path: &str,
        user_token: Option<&'a str>,
    ) -> (CredentialSource, Option<&'a str>) {
        let user_token = user_token.filter(|t| !t.is_empty());
        match (self.public_endpoints.is_public(path), user_token) {
            (_, Some(token)) => (CredentialSource::User, Some(token)),
            (true, None) => {
                let service = self.service_token.expose_secret().as_str();
                if service.is_empty() {
                    (CredentialSource::Anonymous, None)
                } else {
                    (CredentialSource::Service, Some(service))
                }
            }
            (false, None) => (CredentialSource::Anonymous, None),
        }
    }

    /// 为请求附加 Authorization 头
    pub fn authorize(&self, mut request: ApiRequest, user_token: Option<&str>) -> ApiRequest {
        let (source, token) = self.select(&request.path, user_token);
        request.headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            set_bearer(&mut request.headers, token);
        }
        request.credential = source;

        tracing::trace!(path = %request.path, credential = ?source, "Request authorized");
        request
    }
}

/// 写入 Bearer 令牌；非法字符的令牌不写入
pub fn set_bearer(headers: &mut HeaderMap, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::warn!("Token contains characters not allowed in headers, skipping");
            headers.remove(AUTHORIZATION);
        }
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
