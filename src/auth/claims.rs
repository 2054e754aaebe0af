//! Access token claim decoding
//! The client never holds the signing key, so only the payload is read

use crate::error::AppError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier as issued by the backend (numeric or string)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Expiration (unix seconds)
    pub exp: i64,

    /// Issued at
    #[serde(default)]
    pub iat: Option<i64>,

    /// User identifier
    #[serde(default)]
    pub user_id: Option<UserId>,

    /// Token type (access or refresh)
    #[serde(default)]
    pub token_type: Option<String>,

    /// JWT ID
    #[serde(default)]
    pub jti: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Time left until expiry; negative once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at() - now
    }

    pub fn expires_within(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.remaining(now) < threshold
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= Duration::zero()
    }
}

/// Decode token payload without signature or expiry validation
pub fn decode_claims(token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token decoding failed: {:?}", e);
            AppError::from(e)
        })
}
