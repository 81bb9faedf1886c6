//! Storage abstractions for the household data.
//!
//! Every store is an async trait object so the API can run on either backend:
//! - [`InMemoryStore`]: `RwLock`-guarded maps for tests/dev
//! - [`PostgresStore`]: sqlx pool with explicit transactions for
//!   multi-row writes (recipe + ingredients, user + role assignments)

use std::sync::Arc;

use async_trait::async_trait;

use casahub_auth::Role;
use casahub_core::{ProductId, RecipeId, RoleId, UserId};
use casahub_inventory::{Category, Location, Product, ProductFilter, ProductView};
use casahub_recipes::Recipe;

use crate::error::StoreResult;

pub mod accounts;
pub mod memory;
pub mod postgres;

pub use accounts::{NewUser, RoleRecord, RoleSummary, User, UserChanges};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Products plus the locations/categories they reference.
#[async_trait]
pub trait KitchenStore: Send + Sync {
    /// Matching products ordered by name, joined with their references.
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<ProductView>>;

    async fn get_product(&self, id: ProductId) -> StoreResult<Product>;

    /// The subset of `ids` that exist (unknown ids are skipped).
    async fn products_by_ids(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>>;

    /// Fails with `Invalid` when the location or category does not exist.
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;

    async fn update_product(&self, product: &Product) -> StoreResult<()>;

    /// Ingredient lines linked to the product lose their link.
    async fn delete_product(&self, id: ProductId) -> StoreResult<()>;

    async fn list_locations(&self) -> StoreResult<Vec<Location>>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    async fn insert_location(&self, location: &Location) -> StoreResult<()>;

    async fn insert_category(&self, category: &Category) -> StoreResult<()>;
}

/// Recipes with their ordered ingredient lines.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// All recipes ordered by name.
    async fn list_recipes(&self) -> StoreResult<Vec<Recipe>>;

    async fn get_recipe(&self, id: RecipeId) -> StoreResult<Recipe>;

    async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<()>;

    /// Overwrite the recipe and swap its whole ingredient list in one
    /// all-or-nothing step.
    async fn replace_recipe(&self, recipe: &Recipe) -> StoreResult<()>;

    /// Removes the recipe and its ingredient lines.
    async fn delete_recipe(&self, id: RecipeId) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Newest first.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn get_user(&self, id: UserId) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Stores the user and its role assignments together.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    /// Applies the changes (and role replacement, if any) together.
    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<User>;

    async fn delete_user(&self, id: UserId) -> StoreResult<()>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Ordered by name, each with its user count.
    async fn list_roles(&self) -> StoreResult<Vec<RoleRecord>>;

    async fn get_role(&self, id: RoleId) -> StoreResult<RoleRecord>;

    async fn find_role_by_name(&self, name: &Role) -> StoreResult<Option<RoleRecord>>;

    async fn insert_role(&self, role: &RoleRecord) -> StoreResult<()>;

    async fn update_role(
        &self,
        id: RoleId,
        name: &Role,
        description: Option<&str>,
    ) -> StoreResult<RoleRecord>;

    async fn delete_role(&self, id: RoleId) -> StoreResult<()>;
}

/// The set of stores handed to the API layer.
#[derive(Clone)]
pub struct Stores {
    pub kitchen: Arc<dyn KitchenStore>,
    pub recipes: Arc<dyn RecipeStore>,
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
}

impl Stores {
    /// Use one backend for every store.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: KitchenStore + RecipeStore + UserStore + RoleStore + 'static,
    {
        Self {
            kitchen: backend.clone(),
            recipes: backend.clone(),
            users: backend.clone(),
            roles: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }

    /// Connect to Postgres and make sure the schema exists.
    pub async fn postgres(database_url: &str) -> StoreResult<Self> {
        let store = PostgresStore::connect(database_url).await?;
        store.migrate().await?;
        Ok(Self::from_backend(Arc::new(store)))
    }
}
