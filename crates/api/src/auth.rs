use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use db::models::UserRole;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::types::UserId;
use std::future::Future;

use crate::state::AppState;

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub role: String, // Role at token mint time
    pub exp: usize,   // Expiration time
    pub iat: usize,   // Issued at
}

impl Claims {
    pub fn new(user_id: UserId, role: UserRole, expires_in_hours: i64) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: user_id.to_string(),
            role: role.to_string(),
            exp: (now + chrono::Duration::hours(expires_in_hours)).timestamp() as usize,
            iat: now.timestamp() as usize,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }

    pub fn role(&self) -> Option<UserRole> {
        self.role.parse().ok()
    }
}

/// Create a JWT token
pub fn create_token(
    user_id: UserId,
    role: UserRole,
    secret: &str,
    expires_in_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, role, expires_in_hours);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify and decode a JWT token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn claims_from_parts(parts: &Parts, state: &AppState) -> Result<Claims, (StatusCode, &'static str)> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid authorization header"))?;

    verify_token(token, &state.config.jwt_secret)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token"))
}

/// Extractor for authenticated user
pub struct AuthUser {
    pub user_id: UserId,
    pub role: UserRole,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 AppState,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let auth_result = (|| {
            let claims = claims_from_parts(parts, state)?;

            let user_id = claims
                .user_id()
                .ok_or((StatusCode::UNAUTHORIZED, "Invalid user ID in token"))?;
            let role = claims
                .role()
                .ok_or((StatusCode::UNAUTHORIZED, "Invalid role in token"))?;

            Ok(AuthUser { user_id, role })
        })();

        Box::pin(std::future::ready(auth_result))
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Extractor for admin-only routes
pub struct AdminUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, &'static str);

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 AppState,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let auth_result = (|| {
            let claims = claims_from_parts(parts, state)?;

            let user_id = claims
                .user_id()
                .ok_or((StatusCode::UNAUTHORIZED, "Invalid user ID in token"))?;

            if claims.role() != Some(UserRole::Admin) {
                return Err((StatusCode::FORBIDDEN, "Admin access required"));
            }

            Ok(AdminUser { user_id })
        })();

        Box::pin(std::future::ready(auth_result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let user_id = UserId::new();
        let token = create_token(user_id, UserRole::Owl, "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id(), Some(user_id));
        assert_eq!(claims.role(), Some(UserRole::Owl));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(UserId::new(), UserRole::Guest, "secret", 1).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token(UserId::new(), UserRole::Guest, "secret", -1).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
