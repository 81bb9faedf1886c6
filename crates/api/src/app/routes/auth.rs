use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use casahub_auth::Credentials;

use crate::app::{errors, services::AppServices};

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match services.login(body, Utc::now()).await {
        Ok(session) => Json(session).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
