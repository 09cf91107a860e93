use axum::{extract::Request, middleware::Next, response::Response};

use crate::{
    error::{AppError, Result},
    middleware::AuthUser,
};

/// Operator-only routes. Runs after `auth_middleware` has verified the token;
/// the role comes from the identity provider's claims.
pub async fn admin_authorization(
    AuthUser(claims): AuthUser,
    request: Request,
    next: Next,
) -> Result<Response> {
    if !claims.is_operator() {
        tracing::warn!("Operator route refused for subject {}", claims.sub);
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
