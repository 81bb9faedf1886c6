//! Infrastructure layer: configuration, persistence and startup seeding.
//!
//! Domain crates stay IO-free; everything that touches the environment or a
//! database lives here behind the store traits in [`store`].

pub mod config;
pub mod error;
pub mod seed;
pub mod store;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use error::{StoreError, StoreResult};
pub use store::{
    InMemoryStore, KitchenStore, NewUser, PostgresStore, RecipeStore, RoleRecord, RoleStore,
    RoleSummary, Stores, User, UserChanges, UserStore,
};
