use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::usermodel::{Actor, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: UserRole,
    pub iat: usize,
    pub exp: usize,
}

/// Tokens are issued by the identity service; this is kept for local tooling
/// and the router tests.
pub fn create_token(
    user_id: &str,
    role: UserRole,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if user_id.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::seconds(expires_in_seconds)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        role,
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<Actor, jsonwebtoken::errors::Error> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;

    let id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSubject))?;

    Ok(Actor::new(id, decoded.claims.role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_role() {
        let id = Uuid::new_v4();
        let token = create_token(&id.to_string(), UserRole::Professional, b"secret", 60).unwrap();
        let actor = decode_token(token, b"secret").unwrap();
        assert_eq!(actor, Actor::professional(id));
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let id = Uuid::new_v4().to_string();
        let token = create_token(&id, UserRole::Client, b"secret", 60).unwrap();
        assert!(decode_token(token, b"other").is_err());

        let expired = create_token(&id, UserRole::Client, b"secret", -3600).unwrap();
        assert!(decode_token(expired, b"secret").is_err());
    }

    #[test]
    fn rejects_non_uuid_subjects() {
        let token = create_token("not-a-uuid", UserRole::Client, b"secret", 60).unwrap();
        assert!(decode_token(token, b"secret").is_err());
        assert!(create_token("", UserRole::Client, b"secret", 60).is_err());
    }
}
