//! Shared-secret bearer auth for the stage-trigger endpoints

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use postpilot_core::AppError;
use subtle::ConstantTimeEq;

use crate::error::HttpAppError;
use crate::state::AppState;

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Require `Authorization: Bearer <CRON_SECRET>` when a secret is
/// configured. An absent secret disables the check, a local-development
/// mode that `Config::validate()` refuses in production.
pub async fn cron_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let Some(secret) = &state.cron_secret else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Missing bearer token".to_string(),
            ))
        })?;

    if !secure_compare(token, secret) {
        return Err(HttpAppError(AppError::Unauthorized(
            "Invalid bearer token".to_string(),
        )));
    }
    Ok(next.run(request).await)
}
