//! 统一错误模型
//! 定义客户端所有错误类型及其面向用户的提示

use reqwest::StatusCode;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status {status}")]
    Http { status: StatusCode, body: String },

    #[error("Token refresh failed: {0}")]
    Refresh(#[source] Box<AppError>),

    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Login required")]
    LoginRequired,

    #[error("Access denied")]
    Forbidden,
}

impl AppError {
    /// 构造 HTTP 状态错误
    pub fn http(status: StatusCode, body: impl Into<String>) -> Self {
        AppError::Http {
            status,
            body: body.into(),
        }
    }

    /// 获取 HTTP 状态码（仅 HTTP 类错误）
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            AppError::Transport(e) => e.status(),
            AppError::Refresh(inner) => inner.status_code(),
            _ => None,
        }
    }

    /// 是否为 401
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// 是否需要重新登录
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AppError::Refresh(_) | AppError::MissingRefreshToken | AppError::LoginRequired
        ) || self.is_unauthorized()
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Transport(_) => "Could not reach the server".to_string(),
            AppError::Http { status, .. } => match *status {
                StatusCode::UNAUTHORIZED => "Authentication failed".to_string(),
                StatusCode::FORBIDDEN => "Access denied".to_string(),
                StatusCode::NOT_FOUND => "Resource not found".to_string(),
                s if s.is_server_error() => "Server error, try again later".to_string(),
                _ => "Request rejected by the server".to_string(),
            },
            AppError::Refresh(_) | AppError::MissingRefreshToken | AppError::LoginRequired => {
                "Session expired, please log in again".to_string()
            }
            AppError::InvalidToken(_) => "Invalid session token".to_string(),
            AppError::Decode(_) => "Unexpected data received from the server".to_string(),
            AppError::Storage(_) => "Could not access the local session".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
        }
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Decode(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::InvalidToken(e.to_string())
    }
}
