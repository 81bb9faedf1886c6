//! Role checks at the operation boundary.
//!
//! - No IO
//! - No panics
//! - Pure policy: a principal either holds the role or it does not

use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: role '{0}' required")]
    Forbidden(String),
}

/// Require `role` on an (optionally) authenticated principal.
pub fn require_role(principal: Option<&Principal>, role: &Role) -> Result<(), AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthenticated)?;
    if principal.has_role(role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id, role = %role, "role check denied");
        Err(AuthzError::Forbidden(role.to_string()))
    }
}

/// Administrative screens (users, roles) are ADMIN-only.
pub fn require_admin(principal: Option<&Principal>) -> Result<(), AuthzError> {
    require_role(principal, &Role::ADMIN)
}

#[cfg(test)]
mod tests {
    use casahub_core::UserId;

    use super::*;

    fn principal(roles: Vec<Role>) -> Principal {
        Principal {
            user_id: UserId::new(),
            email: "someone@casahub.local".into(),
            name: "Someone".into(),
            roles,
        }
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        assert_eq!(require_admin(None), Err(AuthzError::Unauthenticated));
    }

    #[test]
    fn plain_user_is_forbidden_from_admin() {
        let p = principal(vec![Role::USER]);
        assert_eq!(
            require_admin(Some(&p)),
            Err(AuthzError::Forbidden("ADMIN".into()))
        );
    }

    #[test]
    fn admin_passes_and_custom_roles_are_checked_by_name() {
        let p = principal(vec![Role::USER, Role::ADMIN]);
        assert!(require_admin(Some(&p)).is_ok());
        assert!(require_role(Some(&p), &Role::new("COOK")).is_err());
    }
}
