//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 默认的公开看板端点片段（按子串匹配请求路径）
pub const DEFAULT_PUBLIC_ENDPOINTS: &[&str] = &[
    "efficiency",
    "performance",
    "repair",
    "absenteeism",
    "presence",
    "stock",
    "cart-count",
    "machine-info",
    "quality-production",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 后端 API 根地址，例如 "http://localhost:8000"
    pub base_url: String,
    /// 首页看板固定服务令牌（使用 Secret 包装，防止日志泄露）
    pub home_token: Secret<String>,
    /// 允许使用服务令牌访问的端点片段
    pub public_endpoints: Vec<String>,
    /// 登录端点路径
    pub login_path: String,
    /// 刷新端点路径
    pub refresh_path: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// 拼接完整 URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 令牌持久化文件
    pub token_file: PathBuf,
    /// 主动刷新检查间隔（秒）
    pub refresh_interval_secs: u64,
    /// 剩余有效期低于该阈值时刷新（秒）
    pub refresh_threshold_secs: u64,
    /// 定时刷新失败时是否登出
    pub logout_on_proactive_failure: bool,
}

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_threshold_secs as i64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, compact
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionPlanConfig {
    /// 每升一级所需的天数
    pub days_per_level: u32,
    /// 最高等级
    pub max_level: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub action_plan: ActionPlanConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("api.base_url", "http://localhost:8000")?
            .set_default("api.home_token", "")?
            .set_default("api.public_endpoints", DEFAULT_PUBLIC_ENDPOINTS.to_vec())?
            .set_default("api.login_path", "/api/token/")?
            .set_default("api.refresh_path", "/api/token/refresh/")?
            .set_default("api.timeout_secs", 30)?
            .set_default("session.token_file", ".plant-monitor/session.json")?
            .set_default("session.refresh_interval_secs", 240)?
            .set_default("session.refresh_threshold_secs", 300)?
            .set_default("session.logout_on_proactive_failure", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("action_plan.days_per_level", 7)?
            .set_default("action_plan.max_level", 3)?;

        // 从环境变量加载配置（前缀为 PLANT_）
        settings = settings.add_source(
            Environment::with_prefix("PLANT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.public_endpoints")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证 API 地址
        let base = url::Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::Message(format!("Invalid api.base_url {}: {}", self.api.base_url, e))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConfigError::Message(format!(
                "api.base_url must use http or https, got {}",
                base.scheme()
            )));
        }

        for (name, path) in [
            ("login_path", &self.api.login_path),
            ("refresh_path", &self.api.refresh_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Message(format!(
                    "api.{} must start with '/'",
                    name
                )));
            }
        }

        if self.api.public_endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigError::Message(
                "api.public_endpoints must not contain empty entries".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 || self.api.timeout_secs > 300 {
            return Err(ConfigError::Message(
                "api.timeout_secs must be between 1 and 300".to_string(),
            ));
        }

        // 验证刷新节奏
        if self.session.refresh_interval_secs < 10 {
            return Err(ConfigError::Message(
                "session.refresh_interval_secs must be >= 10".to_string(),
            ));
        }

        if self.session.refresh_threshold_secs == 0 {
            return Err(ConfigError::Message(
                "session.refresh_threshold_secs must be > 0".to_string(),
            ));
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        if self.action_plan.days_per_level == 0 {
            return Err(ConfigError::Message(
                "action_plan.days_per_level must be > 0".to_string(),
            ));
        }

        if self.action_plan.max_level == 0 {
            return Err(ConfigError::Message(
                "action_plan.max_level must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
