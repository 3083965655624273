use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::persistence::UserId;
use crate::utils::error::AuthError;

/// Claims carried by access tokens. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Turns a bearer token into the id of the calling user.
pub trait Authenticator: Send + Sync {
    fn verify(&self, bearer_token: &str) -> Result<UserId, AuthError>;
}

/// Signs and verifies HS256 tokens with a shared secret.
///
/// Verification rejects any other algorithm, tokens without `exp` or `sub`,
/// expired tokens and tokens whose subject is not a UUID.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthenticator {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue a token for `user_id` valid for the configured lifetime.
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + self.ttl.as_secs() as i64,
            iat: now,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }
}

impl Authenticator for JwtAuthenticator {
    fn verify(&self, bearer_token: &str) -> Result<UserId, AuthError> {
        if bearer_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<Claims>(bearer_token, &self.decoding, &self.validation)?;
        UserId::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidClaims)
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
