//! Authentication-related models

use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<Identity>,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest {
    pub refresh: String,
}

/// Token refresh response
///
/// `refresh` is only present when the backend rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Logged-in user, held in memory only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Functional level, higher grants broader access
    #[serde(default, alias = "functional_level")]
    pub level: u8,
    #[serde(default)]
    pub sectors: Vec<String>,
}

impl Identity {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g.eq_ignore_ascii_case(group))
    }

    pub fn in_sector(&self, sector: &str) -> bool {
        self.sectors.iter().any(|s| s.eq_ignore_ascii_case(sector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_with_user() {
        let json = r#"{
            "access": "a.b.c",
            "refresh": "d.e.f",
            "user": {"username": "jsilva", "groups": ["Supervisor"], "functional_level": 2, "sectors": ["Packing"]}
        }"#;
        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        let user = resp.user.unwrap();
        assert_eq!(user.name, "jsilva");
        assert_eq!(user.level, 2);
        assert!(user.in_group("supervisor"));
        assert!(user.in_sector("packing"));
    }

    #[test]
    fn test_login_response_rejects_missing_tokens() {
        let json = r#"{"access": "a.b.c"}"#;
        assert!(serde_json::from_str::<LoginResponse>(json).is_err());
    }

    #[test]
    fn test_refresh_response_optional_rotation() {
        let resp: RefreshTokenResponse = serde_json::from_str(r#"{"access": "x"}"#).unwrap();
        assert_eq!(resp.access, "x");
        assert!(resp.refresh.is_none());
    }
}
