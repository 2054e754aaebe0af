//! 权限检查服务
//! 按用户组、职能等级和所属部门判断页面访问

use crate::{error::AppError, models::auth::Identity};

/// 不受组与部门限制的用户组
pub const ADMIN_GROUP: &str = "admin";

/// 页面访问要求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    /// 至少属于其中一个组（为空则不限制）
    pub groups: Vec<String>,
    /// 最低职能等级
    pub min_level: Option<u8>,
    /// 至少属于其中一个部门（为空则不限制）
    pub sectors: Vec<String>,
}

impl RouteGuard {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_min_level(mut self, level: u8) -> Self {
        self.min_level = Some(level);
        self
    }

    pub fn with_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors = sectors.into_iter().map(Into::into).collect();
        self
    }
}

/// 访问判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    /// 未登录，应跳转登录页
    LoginRequired,
    Denied,
}

pub struct PermissionService;

impl PermissionService {
    /// 判定身份能否访问页面
    pub fn evaluate(identity: Option<&Identity>, guard: &RouteGuard) -> AccessDecision {
        let Some(identity) = identity else {
            return AccessDecision::LoginRequired;
        };

        let is_admin = identity.in_group(ADMIN_GROUP);

        if !is_admin
            && !guard.groups.is_empty()
            && !guard.groups.iter().any(|g| identity.in_group(g))
        {
            return AccessDecision::Denied;
        }

        if let Some(min_level) = guard.min_level {
            if identity.level < min_level {
                return AccessDecision::Denied;
            }
        }

        if !is_admin
            && !guard.sectors.is_empty()
            && !guard.sectors.iter().any(|s| identity.in_sector(s))
        {
            return AccessDecision::Denied;
        }

        AccessDecision::Granted
    }

    /// 检查权限，如果无权限则返回错误
    pub fn require(identity: Option<&Identity>, guard: &RouteGuard) -> Result<(), AppError> {
        match Self::evaluate(identity, guard) {
            AccessDecision::Granted => Ok(()),
            AccessDecision::LoginRequired => Err(AppError::LoginRequired),
            AccessDecision::Denied => {
                tracing::warn!(
                    user = identity.map(|i| i.name.as_str()).unwrap_or_default(),
                    groups = ?guard.groups,
                    min_level = ?guard.min_level,
                    "Permission denied"
                );
                Err(AppError::Forbidden)
            }
        }
    }
}
