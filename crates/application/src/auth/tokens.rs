//! HS256 token mint/verify used by both the HTTP login surface and the
//! gateway auth handler.

use crate::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const DEMO_TOKEN_PREFIX: &str = "demo_token_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub platform: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mint a token for a freshly authenticated user.
pub fn mint(user_id: &str, platform: &str, secret: &str, expire_hours: i64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user_id.to_string(),
        platform: platform.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(expire_hours)).timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verify signature and expiry; tampered tokens surface as
/// [`AppError::Authentication`], expired ones as [`AppError::TokenExpired`].
pub fn verify(token: &str, secret: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Development shortcut: `demo_token_<uid>` names the user directly. The
/// gateway only consults this when the config switch allows it.
pub fn demo_user_id(token: &str) -> Option<&str> {
    token
        .strip_prefix(DEMO_TOKEN_PREFIX)
        .filter(|uid| !uid.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn mint_and_verify_round_trip() {
        let token = mint("alice", "ios", SECRET, 24).unwrap();
        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, "alice");
        assert_eq!(claims.platform, "ios");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint("alice", "ios", SECRET, 24).unwrap();
        let err = verify(&token, "other-secret").unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = mint("alice", "ios", SECRET, 24).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[1] = format!("{}AA", parts[1]);
        let err = verify(&parts.join("."), SECRET).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let token = mint("alice", "ios", SECRET, -1).unwrap();
        let err = verify(&token, SECRET).unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
    }

    #[test]
    fn demo_prefix_extracts_user() {
        assert_eq!(demo_user_id("demo_token_alice"), Some("alice"));
        assert_eq!(demo_user_id("demo_token_"), None);
        assert_eq!(demo_user_id("bearer-xyz"), None);
    }
}
