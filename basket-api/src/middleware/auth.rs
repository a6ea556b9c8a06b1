use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: String,
    pub email: Option<String>,
    pub role: String,
    pub exp: usize,
}

impl UserClaims {
    /// Subjects are user UUIDs issued by the auth service.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthenticationError("Invalid token subject".to_string()))
    }
}

fn bearer_token(req: &Request) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Provide a bearer token".to_string()))
}

// ============================================================================
// User Authentication Middleware
// ============================================================================

pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let token = bearer_token(&req)?;

    // 2. Decode and validate JWT
    let token_data = decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;

    // 3. Check role is USER or ADMIN (admins can place orders too)
    if token_data.claims.role != "USER" && token_data.claims.role != "ADMIN" {
        return Err(AppError::AuthorizationError(
            "User access required".to_string(),
        ));
    }

    // 4. Inject claims into request extensions
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token
    let token = bearer_token(&req)?;

    // 2. Decode JWT
    let token_data = decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;

    // 3. Check role is ADMIN
    if token_data.claims.role != "ADMIN" {
        return Err(AppError::AuthorizationError(
            "Admin access required".to_string(),
        ));
    }

    // 4. Inject claims
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}
