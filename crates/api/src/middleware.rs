use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use casahub_auth::{JwtValidator, Principal};
use casahub_core::UserId;
use casahub_infra::{StoreError, UserStore};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub users: Arc<dyn UserStore>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "missing bearer token",
        );
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "invalid token");
        }
    };

    let principal = match resolve_principal(state.users.as_ref(), claims.sub).await {
        Ok(principal) => principal,
        Err(resp) => return resp,
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));

    next.run(req).await
}

/// Load the token's account as it stands now. Roles granted or revoked
/// since login apply immediately; a deleted account is unauthenticated.
async fn resolve_principal(users: &dyn UserStore, user_id: UserId) -> Result<Principal, Response> {
    match users.get_user(user_id).await {
        Ok(user) => Ok(Principal {
            user_id: user.id,
            roles: user.role_names(),
            email: user.email,
            name: user.name,
        }),
        Err(StoreError::NotFound(_)) => {
            tracing::debug!(%user_id, "token for a deleted account");
            Err(errors::json_error(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "account no longer exists",
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, %user_id, "principal lookup failed");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "storage error",
            ))
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
