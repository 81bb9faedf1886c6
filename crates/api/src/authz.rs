//! API-side authorization guards.
//!
//! Checks run at the operation boundary (before touching a store), while
//! the stores themselves stay auth-agnostic.

use casahub_auth::{AuthzError, require_admin};

use crate::context::PrincipalContext;

/// User and role administration is ADMIN-only.
pub fn authorize_admin(principal: &PrincipalContext) -> Result<(), AuthzError> {
    require_admin(Some(principal.principal()))
}
