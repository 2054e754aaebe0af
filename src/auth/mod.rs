//! Authentication: token storage, claim decoding and request authorization

pub mod claims;
pub mod interceptor;
pub mod store;

pub use claims::{decode_claims, Claims, UserId};
pub use interceptor::{extract_bearer, CredentialSource, PublicEndpoints, RequestAuthorizer};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
