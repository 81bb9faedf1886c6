//! `casahub-auth` — authentication and authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it knows how to hash and
//! verify passwords, mint and validate bearer tokens, and decide whether a
//! principal may perform an action. Looking users up is someone else's job.

pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, require_admin, require_role};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use credentials::{Credentials, MIN_PASSWORD_LEN, validate_email, validate_password};
pub use jwt::{Hs256Jwt, JwtError, JwtIssuer, JwtValidator};
pub use password::{PasswordError, hash_password, verify_password};
pub use principal::Principal;
pub use roles::Role;
