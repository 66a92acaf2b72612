//! Authentication and authorization
//!
//! The token subject is the acting user and the `company` claim the company
//! the user acts for; together they make the [`ActionContext`] of a request.

use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{ActionContext, CompanyId, CoreError, UserId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Company the user acts for
    pub company: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Builds the action context for a request running as of `as_of`
    pub fn context(&self, as_of: NaiveDate) -> Result<ActionContext, CoreError> {
        let user_id: UserId = self
            .sub
            .parse()
            .map_err(|_| CoreError::validation(format!("Invalid user id in token: {}", self.sub)))?;
        let company_id: CompanyId = self
            .company
            .parse()
            .map_err(|_| CoreError::validation(format!("Invalid company id in token: {}", self.company)))?;
        Ok(ActionContext::new(company_id, user_id, as_of))
    }

    /// Fails unless the user holds `permission` or is an admin
    pub fn require(&self, permission: &str) -> Result<(), AuthError> {
        if has_role(self, permission) {
            Ok(())
        } else {
            Err(AuthError::MissingPermission(permission.to_string()))
        }
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `company_id` - Company the user acts for
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: UserId,
    company_id: CompanyId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        company: company_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

/// Permission definitions
pub mod permissions {
    pub const PAYMENT_READ: &str = "payment:read";
    pub const PAYMENT_WRITE: &str = "payment:write";
    pub const PAYMENT_EXCEPTION: &str = "payment:exception";
    pub const REPLACEMENT_WRITE: &str = "replacement:write";
    pub const BATCH_WRITE: &str = "batch:write";
    pub const LEDGER_READ: &str = "ledger:read";
}
