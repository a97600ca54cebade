/// Session tokens for the `local` authentication strategy
///
/// Register, login and refresh hand out a [`TokenPair`]: a short-lived access
/// token for the `Authorization` header and a long-lived refresh token that
/// can only be exchanged for a new pair. Both are HS256 JWTs carrying the
/// user id in `sub`. The `email` claim is informational; the gate re-reads
/// the user row on every request, so a deleted account stops working at once.
///
/// | kind    | lifetime | accepted by                |
/// |---------|----------|----------------------------|
/// | access  | 24 hours | every authenticated route  |
/// | refresh | 30 days  | `POST /api/users/refresh`  |
///
/// # Example
///
/// ```
/// use dailytask_shared::auth::jwt::{issue_token_pair, validate_access_token, validate_refresh_token};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-key-that-is-at-least-32-bytes";
/// let pair = issue_token_pair(Uuid::new_v4(), "ada@example.com", secret)?;
///
/// assert!(validate_access_token(&pair.token, secret).is_ok());
/// assert!(validate_refresh_token(&pair.token, secret).is_err());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `iss` on every token this service signs
pub const ISSUER: &str = "dailytask";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Could not sign token: {0}")]
    Signing(String),

    #[error("Malformed or forged token: {0}")]
    Invalid(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token was not issued by this service")]
    ForeignIssuer,

    /// A refresh token presented as an access token, or the reverse
    #[error("Expected {expected} token, got {actual} token")]
    WrongKind {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub email: String,
    pub token_type: TokenType,
}

impl Claims {
    pub fn new(user_id: Uuid, email: &str, token_type: TokenType) -> Self {
        Self::issued_at(Utc::now(), user_id, email, token_type, token_type.lifetime())
    }

    /// Claims valid for `lifetime` from now; negative lifetimes are already expired
    pub fn with_expiration(
        user_id: Uuid,
        email: &str,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Self {
        Self::issued_at(Utc::now(), user_id, email, token_type, lifetime)
    }

    fn issued_at(
        now: DateTime<Utc>,
        user_id: Uuid,
        email: &str,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Self {
        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            email: email.to_string(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Returned by register, login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access token
    pub token: String,
    pub refresh_token: String,
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Signing(e.to_string()))
}

pub fn issue_token_pair(user_id: Uuid, email: &str, secret: &str) -> Result<TokenPair, JwtError> {
    Ok(TokenPair {
        token: create_token(&Claims::new(user_id, email, TokenType::Access), secret)?,
        refresh_token: create_token(&Claims::new(user_id, email, TokenType::Refresh), secret)?,
    })
}

/// Checks signature, issuer, `exp` and `nbf`; does not look at the kind
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::ForeignIssuer,
            _ => JwtError::Invalid(e.to_string()),
        })
}

fn validate_kind(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongKind {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_kind(token, secret, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_kind(token, secret, TokenType::Refresh)
}
