use std::collections::HashSet;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use campusdesk_auth::{validate_claims, Claims};
use campusdesk_infra::Workflow;

use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    key: DecodingKey,
    validation: Validation,
    issuer: String,
    workflow: Workflow,
}

impl AuthState {
    /// HS256 tokens signed with `secret`. Time and issuer checks are left to
    /// [`validate_claims`] so they run against one clock.
    pub fn new(secret: &[u8], issuer: impl Into<String>, workflow: Workflow) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
            issuer: issuer.into(),
            workflow,
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = jsonwebtoken::decode::<Claims>(token, &state.key, &state.validation)
        .map_err(|_e| StatusCode::UNAUTHORIZED)?
        .claims;
    validate_claims(&claims, &state.issuer, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        StatusCode::UNAUTHORIZED
    })?;

    let user = state
        .workflow
        .persistence
        .users
        .find_by_id(&claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "user lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if !user.is_active {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut()
        .insert(PrincipalContext::new(user.principal()));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
