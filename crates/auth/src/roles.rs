use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role name used for role-based access checks.
///
/// Role names are stored upper-cased; [`Role::normalized`] applies that rule
/// to user input. `ADMIN` and `USER` always exist and cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("ADMIN"));
    pub const USER: Role = Role(Cow::Borrowed("USER"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a role from free-form input (trimmed, upper-cased).
    pub fn normalized(name: &str) -> Self {
        Self(Cow::Owned(name.trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// System roles are seeded at startup and protected from deletion.
    pub fn is_system(&self) -> bool {
        *self == Self::ADMIN || *self == Self::USER
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
