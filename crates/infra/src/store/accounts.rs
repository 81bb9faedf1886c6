//! Account records: users and the roles assigned to them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use casahub_auth::Role;
use casahub_core::{Entity, RoleId, UserId};

/// A role as listed in the admin screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: Role,
    pub description: Option<String>,
    /// Number of users currently holding the role.
    pub user_count: u64,
}

impl RoleRecord {
    pub fn new(name: Role, description: Option<String>) -> Self {
        Self {
            id: RoleId::new(),
            name,
            description,
            user_count: 0,
        }
    }

    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

impl Entity for RoleRecord {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Role reference embedded in a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<RoleSummary>,
}

impl User {
    pub fn role_names(&self) -> Vec<Role> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A user ready to be stored. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub role_ids: Vec<RoleId>,
}

/// Partial update; `None` leaves the field as it is.
///
/// `phone` and `image` use `Some(None)` to clear the value. `role_ids`, when
/// present, replaces every assignment.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub role_ids: Option<Vec<RoleId>>,
}
