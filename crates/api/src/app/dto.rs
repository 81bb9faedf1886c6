use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use casahub_auth::Role;
use casahub_core::{DomainError, DomainResult, RoleId, UserId};
use casahub_inventory::{Category, Location};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

/// Partial update: absent fields are left alone. An empty `phone`/`image`
/// clears the stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub role_ids: Option<Vec<RoleId>>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

/// The identity a token speaks for.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct KitchenMetadata {
    pub locations: Vec<Location>,
    pub categories: Vec<Category>,
}

// -------------------------
// Field helpers
// -------------------------

/// Blank optional text becomes `None`.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Profile images are either an absolute http(s) URL or empty (no image).
pub fn normalize_image(value: Option<String>) -> DomainResult<Option<String>> {
    let Some(url) = blank_to_none(value) else {
        return Ok(None);
    };
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| DomainError::validation("image must be a URL"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("image must be a URL"));
    }
    Ok(Some(url))
}
