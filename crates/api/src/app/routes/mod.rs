use axum::{routing::get, Router};

pub mod auth;
pub mod kitchen;
pub mod recipes;
pub mod roles;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/kitchen", kitchen::router())
        .nest("/recipes", recipes::router())
        .nest("/admin/users", users::router())
        .nest("/admin/roles", roles::router())
}
