use serde::Serialize;

use casahub_core::UserId;

use crate::Role;

/// An authenticated caller: the account a validated bearer token points at,
/// with the roles that account holds right now.
///
/// Passed explicitly to every operation that needs to know who is acting;
/// nothing looks this up from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::ADMIN)
    }
}
