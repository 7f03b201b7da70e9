use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use resale_core::{CoreError, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role().to_owned(),
        exp: (chrono::Utc::now() + chrono::Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

// ============================================================================
// User Authentication Middleware
// ============================================================================

/// Resolves the bearer token to a live account and stores the `User` in the
/// request extensions.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || AppError::AuthenticationError("missing or invalid token".into());

    // 1. Extract token from Authorization header
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| unauthorized())?;

    // 3. The account must still exist; roles come from the stored user
    let user = match state.accounts.profile(token_data.claims.sub).await {
        Ok(user) => user,
        Err(CoreError::NotFound(_)) => return Err(unauthorized()),
        Err(e) => return Err(e.into()),
    };

    // 4. Inject user into request extensions
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authorization Middleware
// ============================================================================

/// Runs inside `user_auth_middleware`.
pub async fn admin_auth_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<User>() {
        Some(user) if user.is_admin => Ok(next.run(req).await),
        Some(_) => Err(AppError::AuthorizationError("admin access required".into())),
        None => Err(AppError::AuthenticationError("missing or invalid token".into())),
    }
}
