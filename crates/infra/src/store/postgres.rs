//! Postgres-backed store implementation.
//!
//! ## Transactions
//!
//! Writes that touch more than one table run inside an explicit transaction:
//! - recipe insert/replace: recipe row + every ingredient line
//! - user insert/update: user row + role assignments
//!
//! Replacing a recipe deletes all of its ingredient lines and inserts the new
//! ones in the same transaction, so readers see either the old list or the
//! new one.
//!
//! ## Referential behavior
//!
//! - deleting a recipe cascades to its ingredients
//! - deleting a product sets `ingredients.product_id` to NULL
//! - deleting a user or role cascades to `user_roles`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use casahub_auth::Role;
use casahub_core::{
    CategoryId, IngredientId, LocationId, ProductId, Quantity, RecipeId, RoleId, UserId,
};
use casahub_inventory::{Category, Location, Product, ProductFilter, ProductView};
use casahub_recipes::{Ingredient, Recipe};

use super::{
    KitchenStore, NewUser, RecipeStore, RoleRecord, RoleStore, RoleSummary, User, UserChanges,
    UserStore,
};
use crate::error::{StoreError, StoreResult, map_sqlx_error};

const EMAIL_IN_USE: &str = "email already in use";
const ROLE_EXISTS: &str = "role already exists";

/// Tables are created on startup when missing; statements run in order.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        phone TEXT,
        image TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        icon TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        quantity DOUBLE PRECISION NOT NULL CHECK (quantity >= 0),
        unit TEXT NOT NULL,
        location_id UUID NOT NULL REFERENCES locations(id),
        category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
        expiry_date TIMESTAMPTZ,
        opened_at TIMESTAMPTZ,
        min_stock DOUBLE PRECISION CHECK (min_stock >= 0),
        notes TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_location ON products (location_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (category_id)",
    r#"
    CREATE TABLE IF NOT EXISTS recipes (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        instructions TEXT,
        servings BIGINT CHECK (servings >= 0),
        prep_time BIGINT CHECK (prep_time >= 0),
        cook_time BIGINT CHECK (cook_time >= 0),
        image_url TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ingredients (
        id UUID PRIMARY KEY,
        recipe_id UUID NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        quantity DOUBLE PRECISION NOT NULL CHECK (quantity >= 0),
        unit TEXT NOT NULL,
        product_id UUID REFERENCES products(id) ON DELETE SET NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients (recipe_id, position)",
];

const PRODUCT_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.name, p.quantity, p.unit, p.location_id, p.category_id,
        p.expiry_date, p.opened_at, p.min_stock, p.notes,
        l.name AS location_name, l.icon AS location_icon,
        c.name AS category_name
    FROM products p
    JOIN locations l ON l.id = p.location_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const PRODUCT_SELECT: &str = r#"
    SELECT id, name, quantity, unit, location_id, category_id,
           expiry_date, opened_at, min_stock, notes
    FROM products
"#;

const RECIPE_SELECT: &str = r#"
    SELECT id, name, description, instructions, servings, prep_time, cook_time, image_url
    FROM recipes
"#;

const USER_SELECT: &str = r#"
    SELECT id, name, email, password_hash, phone, image, created_at
    FROM users
"#;

const ROLE_SELECT: &str = r#"
    SELECT r.id, r.name, r.description, COUNT(ur.user_id) AS user_count
    FROM roles r
    LEFT JOIN user_roles ur ON ur.role_id = r.id
"#;

/// Postgres-backed implementation of every store trait.
///
/// ## Thread Safety
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    /// Create a new PostgresStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create any missing tables and indexes.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        tracing::info!(statements = SCHEMA.len(), "schema ready");
        Ok(())
    }

    async fn load_user_roles(&self, users: &mut [User]) -> StoreResult<()> {
        if users.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = users.iter().map(|u| *u.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT ur.user_id, r.id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_user_roles", e))?;

        let mut by_user: HashMap<UserId, Vec<RoleSummary>> = HashMap::new();
        for row in rows {
            let (user_id, summary) =
                role_summary_from_row(&row).map_err(|e| map_sqlx_error("load_user_roles", e))?;
            by_user.entry(user_id).or_default().push(summary);
        }
        for user in users.iter_mut() {
            user.roles = by_user.remove(&user.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn load_ingredients(&self, recipes: &mut [Recipe]) -> StoreResult<()> {
        if recipes.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = recipes.iter().map(|r| *r.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT recipe_id, id, name, quantity, unit, product_id
            FROM ingredients
            WHERE recipe_id = ANY($1)
            ORDER BY recipe_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_ingredients", e))?;

        let mut by_recipe: HashMap<RecipeId, Vec<Ingredient>> = HashMap::new();
        for row in rows {
            let (recipe_id, line) =
                ingredient_from_row(&row).map_err(|e| map_sqlx_error("load_ingredients", e))?;
            by_recipe.entry(recipe_id).or_default().push(line);
        }
        for recipe in recipes.iter_mut() {
            recipe.ingredients = by_recipe.remove(&recipe.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl KitchenStore for PostgresStore {
    #[instrument(skip(self), fields(count = tracing::field::Empty), err)]
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<ProductView>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let sql = format!(
            r#"{PRODUCT_VIEW_SELECT}
            WHERE ($1::uuid IS NULL OR p.location_id = $1)
              AND ($2::uuid IS NULL OR p.category_id = $2)
              AND ($3::text IS NULL OR p.name ILIKE $3)
            ORDER BY lower(p.name), p.name
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.location_id.map(|id| *id.as_uuid()))
            .bind(filter.category_id.map(|id| *id.as_uuid()))
            .bind(search)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        let views = rows
            .iter()
            .map(product_view_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_products", e))?;
        tracing::Span::current().record("count", views.len());
        Ok(views)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        let row = sqlx::query(&format!("{PRODUCT_SELECT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?
            .ok_or(StoreError::NotFound("product"))?;
        product_from_row(&row).map_err(|e| map_sqlx_error("get_product", e))
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!("{PRODUCT_SELECT} WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("products_by_ids", e))?;
        rows.iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("products_by_ids", e))
    }

    #[instrument(skip_all, fields(product_id = %product.id.as_uuid()), err)]
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, quantity, unit, location_id, category_id,
                expiry_date, opened_at, min_stock, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.quantity.value())
        .bind(&product.unit)
        .bind(product.location_id.as_uuid())
        .bind(product.category_id.map(|id| *id.as_uuid()))
        .bind(product.expiry_date)
        .bind(product.opened_at)
        .bind(product.min_stock.map(Quantity::value))
        .bind(&product.notes)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(product_id = %product.id.as_uuid()), err)]
    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = $2, quantity = $3, unit = $4, location_id = $5, category_id = $6,
                expiry_date = $7, opened_at = $8, min_stock = $9, notes = $10
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.quantity.value())
        .bind(&product.unit)
        .bind(product.location_id.as_uuid())
        .bind(product.category_id.map(|id| *id.as_uuid()))
        .bind(product.expiry_date)
        .bind(product.opened_at)
        .bind(product.min_stock.map(Quantity::value))
        .bind(&product.notes)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("product"));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id.as_uuid()), err)]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("product"));
        }
        Ok(())
    }

    async fn list_locations(&self) -> StoreResult<Vec<Location>> {
        let rows = sqlx::query("SELECT id, name, icon FROM locations ORDER BY lower(name), name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_locations", e))?;
        rows.iter()
            .map(|row| {
                Ok(Location {
                    id: LocationId::from_uuid(row.try_get("id")?),
                    name: row.try_get("name")?,
                    icon: row.try_get("icon")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("list_locations", e))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY lower(name), name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: CategoryId::from_uuid(row.try_get("id")?),
                    name: row.try_get("name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("list_categories", e))
    }

    #[instrument(skip_all, fields(name = %location.name), err)]
    async fn insert_location(&self, location: &Location) -> StoreResult<()> {
        sqlx::query("INSERT INTO locations (id, name, icon) VALUES ($1, $2, $3)")
            .bind(location.id.as_uuid())
            .bind(&location.name)
            .bind(&location.icon)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(name = %category.name), err)]
    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for PostgresStore {
    async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
        let rows = sqlx::query(&format!("{RECIPE_SELECT} ORDER BY lower(name), name"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_recipes", e))?;
        let mut recipes = rows
            .iter()
            .map(recipe_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_recipes", e))?;
        self.load_ingredients(&mut recipes).await?;
        Ok(recipes)
    }

    async fn get_recipe(&self, id: RecipeId) -> StoreResult<Recipe> {
        let row = sqlx::query(&format!("{RECIPE_SELECT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_recipe", e))?
            .ok_or(StoreError::NotFound("recipe"))?;
        let mut recipes = vec![recipe_from_row(&row).map_err(|e| map_sqlx_error("get_recipe", e))?];
        self.load_ingredients(&mut recipes).await?;
        recipes.pop().ok_or(StoreError::NotFound("recipe"))
    }

    #[instrument(skip_all, fields(recipe_id = %recipe.id.as_uuid(), lines = recipe.ingredients.len()), err)]
    async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_recipe", e))?;

        sqlx::query(
            r#"
            INSERT INTO recipes (
                id, name, description, instructions, servings, prep_time, cook_time, image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(recipe.id.as_uuid())
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(&recipe.instructions)
        .bind(recipe.servings.map(i64::from))
        .bind(recipe.prep_time.map(i64::from))
        .bind(recipe.cook_time.map(i64::from))
        .bind(&recipe.image_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_recipe", e))?;

        insert_ingredients(&mut tx, recipe)
            .await
            .map_err(|e| map_sqlx_error("insert_recipe", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_recipe", e))
    }

    #[instrument(skip_all, fields(recipe_id = %recipe.id.as_uuid(), lines = recipe.ingredients.len()), err)]
    async fn replace_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("replace_recipe", e))?;

        let result = sqlx::query(
            r#"
            UPDATE recipes SET
                name = $2, description = $3, instructions = $4,
                servings = $5, prep_time = $6, cook_time = $7, image_url = $8
            WHERE id = $1
            "#,
        )
        .bind(recipe.id.as_uuid())
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(&recipe.instructions)
        .bind(recipe.servings.map(i64::from))
        .bind(recipe.prep_time.map(i64::from))
        .bind(recipe.cook_time.map(i64::from))
        .bind(&recipe.image_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_recipe", e))?;

        // Dropping `tx` without commit rolls back.
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("recipe"));
        }

        sqlx::query("DELETE FROM ingredients WHERE recipe_id = $1")
            .bind(recipe.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_recipe", e))?;

        insert_ingredients(&mut tx, recipe)
            .await
            .map_err(|e| map_sqlx_error("replace_recipe", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("replace_recipe", e))
    }

    #[instrument(skip(self), fields(recipe_id = %id.as_uuid()), err)]
    async fn delete_recipe(&self, id: RecipeId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_recipe", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("recipe"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!("{USER_SELECT} ORDER BY created_at DESC, id DESC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        let mut users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_users", e))?;
        self.load_user_roles(&mut users).await?;
        Ok(users)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let row = sqlx::query(&format!("{USER_SELECT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?
            .ok_or(StoreError::NotFound("user"))?;
        let mut users = vec![user_from_row(&row).map_err(|e| map_sqlx_error("get_user", e))?];
        self.load_user_roles(&mut users).await?;
        users.pop().ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("{USER_SELECT} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut users =
            vec![user_from_row(&row).map_err(|e| map_sqlx_error("find_user_by_email", e))?];
        self.load_user_roles(&mut users).await?;
        Ok(users.pop())
    }

    #[instrument(skip_all, fields(user_id = %user.id.as_uuid(), roles = user.role_ids.len()), err)]
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, phone, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.image)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e).with_conflict_message(EMAIL_IN_USE))?;

        assign_roles(&mut tx, user.id, &user.role_ids)
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;

        self.get_user(user.id).await
    }

    #[instrument(skip_all, fields(user_id = %id.as_uuid()), err)]
    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                phone = CASE WHEN $7 THEN $5 ELSE phone END,
                image = CASE WHEN $8 THEN $6 ELSE image END
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(changes.phone.clone().flatten())
        .bind(changes.image.clone().flatten())
        .bind(changes.phone.is_some())
        .bind(changes.image.is_some())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e).with_conflict_message(EMAIL_IN_USE))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }

        if let Some(role_ids) = &changes.role_ids {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_user", e))?;
            assign_roles(&mut tx, id, role_ids)
                .await
                .map_err(|e| map_sqlx_error("update_user", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;

        self.get_user(id).await
    }

    #[instrument(skip(self), fields(user_id = %id.as_uuid()), err)]
    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn list_roles(&self) -> StoreResult<Vec<RoleRecord>> {
        let rows = sqlx::query(&format!("{ROLE_SELECT} GROUP BY r.id ORDER BY r.name"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_roles", e))
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<RoleRecord> {
        let row = sqlx::query(&format!("{ROLE_SELECT} WHERE r.id = $1 GROUP BY r.id"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?
            .ok_or(StoreError::NotFound("role"))?;
        role_from_row(&row).map_err(|e| map_sqlx_error("get_role", e))
    }

    async fn find_role_by_name(&self, name: &Role) -> StoreResult<Option<RoleRecord>> {
        let row = sqlx::query(&format!("{ROLE_SELECT} WHERE r.name = $1 GROUP BY r.id"))
            .bind(name.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_name", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_role_by_name", e))
    }

    #[instrument(skip_all, fields(role = %role.name), err)]
    async fn insert_role(&self, role: &RoleRecord) -> StoreResult<()> {
        sqlx::query("INSERT INTO roles (id, name, description) VALUES ($1, $2, $3)")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .bind(&role.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e).with_conflict_message(ROLE_EXISTS))?;
        Ok(())
    }

    #[instrument(skip(self, description), fields(role_id = %id.as_uuid()), err)]
    async fn update_role(
        &self,
        id: RoleId,
        name: &Role,
        description: Option<&str>,
    ) -> StoreResult<RoleRecord> {
        let result = sqlx::query("UPDATE roles SET name = $2, description = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(name.as_str())
            .bind(description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_role", e).with_conflict_message(ROLE_EXISTS))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role"));
        }
        self.get_role(id).await
    }

    #[instrument(skip(self), fields(role_id = %id.as_uuid()), err)]
    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role"));
        }
        Ok(())
    }
}

async fn insert_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe: &Recipe,
) -> Result<(), sqlx::Error> {
    for (position, line) in recipe.ingredients.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO ingredients (id, recipe_id, position, name, quantity, unit, product_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(recipe.id.as_uuid())
        .bind(position as i32)
        .bind(&line.name)
        .bind(line.quantity.value())
        .bind(&line.unit)
        .bind(line.product_id.map(|id| *id.as_uuid()))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn assign_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    role_ids: &[RoleId],
) -> Result<(), sqlx::Error> {
    for role_id in role_ids {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn quantity(value: f64) -> Result<Quantity, sqlx::Error> {
    Quantity::new(value).map_err(decode_error)
}

fn count(value: Option<i64>) -> Result<Option<u32>, sqlx::Error> {
    value.map(u32::try_from).transpose().map_err(decode_error)
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        quantity: quantity(row.try_get("quantity")?)?,
        unit: row.try_get("unit")?,
        location_id: LocationId::from_uuid(row.try_get("location_id")?),
        category_id: row
            .try_get::<Option<Uuid>, _>("category_id")?
            .map(CategoryId::from_uuid),
        expiry_date: row.try_get("expiry_date")?,
        opened_at: row.try_get("opened_at")?,
        min_stock: row
            .try_get::<Option<f64>, _>("min_stock")?
            .map(quantity)
            .transpose()?,
        notes: row.try_get("notes")?,
    })
}

fn product_view_from_row(row: &PgRow) -> Result<ProductView, sqlx::Error> {
    let product = product_from_row(row)?;
    let location = Location {
        id: product.location_id,
        name: row.try_get("location_name")?,
        icon: row.try_get("location_icon")?,
    };
    let category = match (product.category_id, row.try_get::<Option<String>, _>("category_name")?) {
        (Some(id), Some(name)) => Some(Category { id, name }),
        _ => None,
    };
    Ok(ProductView {
        product,
        location: Some(location),
        category,
    })
}

fn recipe_from_row(row: &PgRow) -> Result<Recipe, sqlx::Error> {
    Ok(Recipe {
        id: RecipeId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        instructions: row.try_get("instructions")?,
        servings: count(row.try_get("servings")?)?,
        prep_time: count(row.try_get("prep_time")?)?,
        cook_time: count(row.try_get("cook_time")?)?,
        image_url: row.try_get("image_url")?,
        ingredients: Vec::new(),
    })
}

fn ingredient_from_row(row: &PgRow) -> Result<(RecipeId, Ingredient), sqlx::Error> {
    let recipe_id = RecipeId::from_uuid(row.try_get("recipe_id")?);
    let line = Ingredient {
        id: IngredientId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        quantity: quantity(row.try_get("quantity")?)?,
        unit: row.try_get("unit")?,
        product_id: row
            .try_get::<Option<Uuid>, _>("product_id")?
            .map(ProductId::from_uuid),
    };
    Ok((recipe_id, line))
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        phone: row.try_get("phone")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
        roles: Vec::new(),
    })
}

fn role_summary_from_row(row: &PgRow) -> Result<(UserId, RoleSummary), sqlx::Error> {
    Ok((
        UserId::from_uuid(row.try_get("user_id")?),
        RoleSummary {
            id: RoleId::from_uuid(row.try_get("id")?),
            name: Role::new(row.try_get::<String, _>("name")?),
        },
    ))
}

fn role_from_row(row: &PgRow) -> Result<RoleRecord, sqlx::Error> {
    let user_count: i64 = row.try_get("user_count")?;
    Ok(RoleRecord {
        id: RoleId::from_uuid(row.try_get("id")?),
        name: Role::new(row.try_get::<String, _>("name")?),
        description: row.try_get("description")?,
        user_count: u64::try_from(user_count).map_err(decode_error)?,
    })
}
