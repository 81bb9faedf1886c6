//! `casahub-core` — shared domain building blocks.
//!
//! Identifiers, the domain error model and small value objects used by every
//! other crate. Nothing in here performs IO.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, IngredientId, LocationId, ProductId, RecipeId, RoleId, UserId};
pub use value_object::{Quantity, ValueObject};
