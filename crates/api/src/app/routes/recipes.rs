use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use casahub_core::RecipeId;
use casahub_recipes::RecipeDraft;

use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_recipes).post(create_recipe))
        .route("/:id", get(get_recipe).put(update_recipe).delete(delete_recipe))
        .route("/:id/availability", get(availability))
}

pub async fn list_recipes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.list_recipes(&principal).await {
        Ok(recipes) => Json(recipes).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_recipe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecipeId = match errors::parse_id(&id, "recipe") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_recipe(&principal, id).await {
        Ok(recipe) => Json(recipe).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_recipe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<RecipeDraft>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match services.create_recipe(&principal, body).await {
        Ok(recipe) => (StatusCode::CREATED, Json(recipe)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_recipe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<RecipeDraft>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    let id: RecipeId = match errors::parse_id(&id, "recipe") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.update_recipe(&principal, id, body).await {
        Ok(recipe) => Json(recipe).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_recipe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecipeId = match errors::parse_id(&id, "recipe") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_recipe(&principal, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn availability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecipeId = match errors::parse_id(&id, "recipe") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.check_recipe_availability(&principal, id).await {
        Ok(availability) => Json(availability).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
