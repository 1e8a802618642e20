use crate::AppState;
use crate::api::error::AppError;
use crate::entities::prelude::*;
use crate::utils::auth::validate_jwt;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;

/// Requires `Authorization: Bearer <token>` signed with the configured
/// secret, unexpired, and naming an admin that still exists. The decoded
/// claims are attached to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = validate_jwt(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    let admin = Admin::find_by_id(claims.id).one(&state.db).await?;
    if admin.is_none() {
        return Err(AppError::Unauthorized("Unknown admin".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
