/// Signed bearer tokens
///
/// Every token is an HS256 JWT whose claims name the user (`sub`), the
/// user's global role, and whether it is an access or a refresh token.
/// Role guards read the role straight from the claims. Revocation lives in
/// [`super::blacklist`].
///
/// ```
/// use planboard_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use planboard_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let token = create_token(
///     &Claims::new(user_id, UserRole::User, TokenType::Access),
///     "signing-secret",
/// )?;
///
/// assert_eq!(validate_access_token(&token, "signing-secret")?.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// `iss` claim stamped on and required of every token
pub const ISSUER: &str = "planboard";

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Malformed or tampered token: {0}")]
    Malformed(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token was not issued by planboard")]
    ForeignIssuer,

    #[error("Expected a {expected} token")]
    WrongType { expected: TokenType },

    #[error("Token has been revoked")]
    Revoked,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::ForeignIssuer,
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long each kind of token stays valid
///
/// Defaults to one day for access tokens and thirty days for refresh
/// tokens; the API overrides both from its environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn of(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access,
            TokenType::Refresh => self.refresh,
        }
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::days(1),
            refresh: Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub role: UserRole,
    pub token_type: TokenType,
}

impl Claims {
    /// Claims valid from now for the default lifetime of `token_type`
    pub fn new(user_id: Uuid, role: UserRole, token_type: TokenType) -> Self {
        let ttl = TokenLifetimes::default().of(token_type);
        Self::valid_for(user_id, role, token_type, ttl)
    }

    /// Claims valid from now for `ttl`; a negative `ttl` yields expired claims
    pub fn valid_for(user_id: Uuid, role: UserRole, token_type: TokenType, ttl: Duration) -> Self {
        let issued_at = Utc::now().timestamp();

        Self {
            sub: user_id,
            iss: ISSUER.to_owned(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at + ttl.num_seconds(),
            role,
            token_type,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        let left = self.exp - Utc::now().timestamp();
        (left > 0).then(|| Duration::seconds(left))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(ALGORITHM),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Signing(e.to_string()))
}

/// Signs a fresh `(access, refresh)` pair for a user
pub fn issue_token_pair(
    user_id: Uuid,
    role: UserRole,
    lifetimes: &TokenLifetimes,
    secret: &str,
) -> Result<(String, String), JwtError> {
    let sign = |token_type| {
        let claims = Claims::valid_for(user_id, role, token_type, lifetimes.of(token_type));
        create_token(&claims, secret)
    };

    Ok((sign(TokenType::Access)?, sign(TokenType::Refresh)?))
}

/// Checks signature, issuer, `exp` and `nbf`, without regard to token type
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut rules = Validation::new(ALGORITHM);
    rules.set_issuer(&[ISSUER]);
    rules.validate_nbf = true;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &rules,
    )?;

    Ok(data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != expected {
        return Err(JwtError::WrongType { expected });
    }
    Ok(claims)
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Signs a lone access token, as handed out by a refresh
pub fn issue_access_token(
    user_id: Uuid,
    role: UserRole,
    lifetime: Duration,
    secret: &str,
) -> Result<String, JwtError> {
    create_token(&Claims::valid_for(user_id, role, TokenType::Access, lifetime), secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "jwt-unit-test-secret-0123456789abcdef";

    fn sign(claims: &Claims) -> String {
        create_token(claims, SECRET).unwrap()
    }

    #[test]
    fn test_default_lifetimes() {
        let lifetimes = TokenLifetimes::default();
        assert_eq!(lifetimes.of(TokenType::Access), Duration::days(1));
        assert_eq!(lifetimes.of(TokenType::Refresh), Duration::days(30));
    }

    #[test]
    fn test_new_claims_carry_user_and_role() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, UserRole::Admin, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.iat, claims.nbf);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_remaining_lifetime() {
        let claims =
            Claims::valid_for(Uuid::new_v4(), UserRole::User, TokenType::Access, Duration::hours(1));

        let left = claims.remaining().unwrap().num_seconds();
        assert!((3590..=3600).contains(&left));
    }

    #[test]
    fn test_signed_token_validates() {
        let user_id = Uuid::new_v4();
        let token = sign(&Claims::new(user_id, UserRole::User, TokenType::Access));

        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = sign(&Claims::new(Uuid::new_v4(), UserRole::User, TokenType::Access));

        assert!(matches!(
            validate_token(&token, "some-other-secret-0123456789abcdef"),
            Err(JwtError::Malformed(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = Claims::valid_for(
            Uuid::new_v4(),
            UserRole::User,
            TokenType::Access,
            Duration::hours(-1),
        );
        assert!(claims.is_expired());

        assert!(matches!(validate_token(&sign(&claims), SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), UserRole::User, TokenType::Access);
        claims.iss = "someone-else".to_string();

        assert!(matches!(
            validate_token(&sign(&claims), SECRET),
            Err(JwtError::ForeignIssuer)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            validate_token("not.a.jwt", SECRET),
            Err(JwtError::Malformed(_))
        ));
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let (access, refresh) =
            issue_token_pair(Uuid::new_v4(), UserRole::User, &TokenLifetimes::default(), SECRET)
                .unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongType { expected: TokenType::Access })
        ));
        assert!(matches!(
            validate_refresh_token(&access, SECRET),
            Err(JwtError::WrongType { expected: TokenType::Refresh })
        ));
    }

    #[test]
    fn test_issued_access_token_uses_given_role_and_lifetime() {
        let user_id = Uuid::new_v4();
        let access =
            issue_access_token(user_id, UserRole::User, Duration::minutes(15), SECRET).unwrap();
        let claims = validate_access_token(&access, SECRET).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::User);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }
}
