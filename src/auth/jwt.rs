use crate::config::JwtConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub uid: i64,
    pub token_type: TokenType,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, username: String, token_type: TokenType, lifetime: Duration) -> Self {
        let now = Utc::now();
        Claims {
            sub: username,
            uid: user_id,
            token_type,
            jti: Uuid::new_v4().to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, anyhow::Error> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

/// Issues a short-lived access token and a longer-lived refresh token, both
/// bound to the username claim.
pub fn issue_token_pair(
    user_id: i64,
    username: &str,
    config: &JwtConfig,
) -> Result<TokenPair, anyhow::Error> {
    let access = Claims::new(
        user_id,
        username.to_string(),
        TokenType::Access,
        Duration::minutes(config.access_token_minutes),
    );
    let refresh = Claims::new(
        user_id,
        username.to_string(),
        TokenType::Refresh,
        Duration::days(config.refresh_token_days),
    );

    Ok(TokenPair {
        access_token: create_token(&access, &config.secret)?,
        refresh_token: create_token(&refresh, &config.secret)?,
    })
}

/// Decodes and checks signature, expiry and the expected token type.
pub fn verify_token(
    token: &str,
    secret: &str,
    expected: TokenType,
) -> Result<Claims, anyhow::Error> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    if token_data.claims.token_type != expected {
        anyhow::bail!(
            "expected {:?} token, got {:?}",
            expected,
            token_data.claims.token_type
        );
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_token_minutes: 30,
            refresh_token_days: 7,
        }
    }

    #[test]
    fn token_pair_round_trips_with_matching_types() {
        let config = jwt_config();
        let pair = issue_token_pair(42, "alice", &config).unwrap();

        let access = verify_token(&pair.access_token, &config.secret, TokenType::Access).unwrap();
        assert_eq!(access.sub, "alice");
        assert_eq!(access.uid, 42);

        let refresh =
            verify_token(&pair.refresh_token, &config.secret, TokenType::Refresh).unwrap();
        assert_eq!(refresh.sub, "alice");
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn token_types_are_not_interchangeable() {
        let config = jwt_config();
        let pair = issue_token_pair(1, "bob", &config).unwrap();

        assert!(verify_token(&pair.refresh_token, &config.secret, TokenType::Access).is_err());
        assert!(verify_token(&pair.access_token, &config.secret, TokenType::Refresh).is_err());
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let config = jwt_config();
        let expired = Claims::new(1, "carol".into(), TokenType::Access, Duration::hours(-2));
        let token = create_token(&expired, &config.secret).unwrap();
        assert!(verify_token(&token, &config.secret, TokenType::Access).is_err());

        let pair = issue_token_pair(1, "carol", &config).unwrap();
        assert!(verify_token(&pair.access_token, "other-secret", TokenType::Access).is_err());
    }
}
