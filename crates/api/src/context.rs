use casahub_auth::{Principal, Role};
use casahub_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted by the auth middleware and handed to every operation
/// explicitly; nothing looks the caller up from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn email(&self) -> &str {
        &self.principal.email
    }

    pub fn name(&self) -> &str {
        &self.principal.name
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
