//! Operation layer between the HTTP handlers and the stores.
//!
//! Every operation takes the caller's [`PrincipalContext`] explicitly and
//! runs its authorization check before touching a store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use casahub_auth::{
    Credentials, Hs256Jwt, JwtClaims, JwtIssuer, Role, hash_password, validate_email,
    validate_password, verify_password,
};
use casahub_core::error::require_non_empty;
use casahub_core::{DomainError, ProductId, RecipeId, RoleId, UserId};
use casahub_infra::{NewUser, RoleRecord, Stores, User, UserChanges};
use casahub_inventory::{
    KitchenAlerts, Product, ProductDraft, ProductFilter, ProductView, evaluate_alerts,
};
use casahub_recipes::{Recipe, RecipeAvailability, RecipeDraft, evaluate_availability};

use crate::app::dto::{
    CreateUserRequest, KitchenMetadata, LoginResponse, RoleRequest, SessionUser,
    UpdateUserRequest, blank_to_none, normalize_image,
};
use crate::app::errors::{ServiceError, ServiceResult};
use crate::authz::authorize_admin;
use crate::context::PrincipalContext;

/// Shared state behind every protected route.
pub struct AppServices {
    stores: Stores,
    jwt: Arc<Hs256Jwt>,
    token_ttl: Duration,
}

impl AppServices {
    pub fn new(stores: Stores, jwt: Arc<Hs256Jwt>, token_ttl: Duration) -> Self {
        Self {
            stores,
            jwt,
            token_ttl,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn jwt(&self) -> Arc<Hs256Jwt> {
        self.jwt.clone()
    }

    // -------------------------
    // Authentication
    // -------------------------

    pub async fn login(&self, credentials: Credentials, now: DateTime<Utc>) -> ServiceResult<LoginResponse> {
        if credentials.validate().is_err() {
            return Err(ServiceError::InvalidCredentials);
        }

        let Some(user) = self.stores.users.find_user_by_email(credentials.email.trim()).await? else {
            tracing::info!("login rejected: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        let hash = user.password_hash.clone();
        let password = credentials.password;
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(format!("password check task failed: {e}")))?;
        if !matches {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let claims = JwtClaims::for_user(
            user.id,
            user.email.clone(),
            user.name.clone(),
            user.role_names(),
            now,
            self.token_ttl,
        );
        let token = self
            .jwt
            .issue(&claims)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))?;

        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(LoginResponse {
            token,
            expires_at: claims.expires_at,
            user: SessionUser {
                id: user.id,
                name: user.name,
                email: user.email,
                roles: claims.roles,
            },
        })
    }

    // -------------------------
    // Kitchen
    // -------------------------

    pub async fn list_products(
        &self,
        _principal: &PrincipalContext,
        filter: &ProductFilter,
    ) -> ServiceResult<Vec<ProductView>> {
        Ok(self.stores.kitchen.list_products(filter).await?)
    }

    pub async fn create_product(
        &self,
        principal: &PrincipalContext,
        draft: ProductDraft,
    ) -> ServiceResult<Product> {
        let product = Product::from_draft(ProductId::new(), draft)?;
        self.stores.kitchen.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, user_id = %principal.user_id(), "product created");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        principal: &PrincipalContext,
        id: ProductId,
        draft: ProductDraft,
    ) -> ServiceResult<Product> {
        let mut product = self.stores.kitchen.get_product(id).await?;
        product.apply_draft(draft)?;
        self.stores.kitchen.update_product(&product).await?;
        tracing::info!(product_id = %id, user_id = %principal.user_id(), "product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, principal: &PrincipalContext, id: ProductId) -> ServiceResult<()> {
        self.stores.kitchen.delete_product(id).await?;
        tracing::info!(product_id = %id, user_id = %principal.user_id(), "product deleted");
        Ok(())
    }

    pub async fn mark_product_opened(
        &self,
        principal: &PrincipalContext,
        id: ProductId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Product> {
        let mut product = self.stores.kitchen.get_product(id).await?;
        product.mark_opened(now);
        self.stores.kitchen.update_product(&product).await?;
        tracing::info!(product_id = %id, user_id = %principal.user_id(), "product opened");
        Ok(product)
    }

    pub async fn kitchen_metadata(&self, _principal: &PrincipalContext) -> ServiceResult<KitchenMetadata> {
        Ok(KitchenMetadata {
            locations: self.stores.kitchen.list_locations().await?,
            categories: self.stores.kitchen.list_categories().await?,
        })
    }

    pub async fn kitchen_alerts(
        &self,
        _principal: &PrincipalContext,
        now: DateTime<Utc>,
    ) -> ServiceResult<KitchenAlerts<ProductView>> {
        let products = self.stores.kitchen.list_products(&ProductFilter::default()).await?;
        let alerts = evaluate_alerts(&products, now);
        tracing::info!(
            expiring = alerts.expiring_soon.len(),
            low_stock = alerts.low_stock.len(),
            opened = alerts.opened_long_ago.len(),
            "kitchen alerts evaluated"
        );
        Ok(alerts)
    }

    // -------------------------
    // Recipes
    // -------------------------

    pub async fn list_recipes(&self, _principal: &PrincipalContext) -> ServiceResult<Vec<Recipe>> {
        Ok(self.stores.recipes.list_recipes().await?)
    }

    pub async fn get_recipe(&self, _principal: &PrincipalContext, id: RecipeId) -> ServiceResult<Recipe> {
        Ok(self.stores.recipes.get_recipe(id).await?)
    }

    pub async fn create_recipe(
        &self,
        principal: &PrincipalContext,
        draft: RecipeDraft,
    ) -> ServiceResult<Recipe> {
        let recipe = Recipe::from_draft(RecipeId::new(), draft)?;
        self.stores.recipes.insert_recipe(&recipe).await?;
        tracing::info!(
            recipe_id = %recipe.id,
            ingredients = recipe.ingredients.len(),
            user_id = %principal.user_id(),
            "recipe created"
        );
        Ok(recipe)
    }

    pub async fn update_recipe(
        &self,
        principal: &PrincipalContext,
        id: RecipeId,
        draft: RecipeDraft,
    ) -> ServiceResult<Recipe> {
        let mut recipe = self.stores.recipes.get_recipe(id).await?;
        recipe.replace_with(draft)?;
        self.stores.recipes.replace_recipe(&recipe).await?;
        tracing::info!(
            recipe_id = %id,
            ingredients = recipe.ingredients.len(),
            user_id = %principal.user_id(),
            "recipe updated"
        );
        Ok(recipe)
    }

    pub async fn delete_recipe(&self, principal: &PrincipalContext, id: RecipeId) -> ServiceResult<()> {
        self.stores.recipes.delete_recipe(id).await?;
        tracing::info!(recipe_id = %id, user_id = %principal.user_id(), "recipe deleted");
        Ok(())
    }

    pub async fn check_recipe_availability(
        &self,
        _principal: &PrincipalContext,
        id: RecipeId,
    ) -> ServiceResult<RecipeAvailability> {
        let recipe = self.stores.recipes.get_recipe(id).await?;
        let products = self
            .stores
            .kitchen
            .products_by_ids(&recipe.linked_products())
            .await?;
        let availability = evaluate_availability(&recipe, &products);
        tracing::info!(
            recipe_id = %id,
            available = availability.available_count(),
            total = availability.ingredients.len(),
            status = ?availability.status,
            "recipe availability checked"
        );
        Ok(availability)
    }

    // -------------------------
    // Users (ADMIN)
    // -------------------------

    pub async fn list_users(&self, principal: &PrincipalContext) -> ServiceResult<Vec<User>> {
        authorize_admin(principal)?;
        Ok(self.stores.users.list_users().await?)
    }

    pub async fn create_user(
        &self,
        principal: &PrincipalContext,
        req: CreateUserRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<User> {
        authorize_admin(principal)?;

        require_non_empty("name", &req.name)?;
        let email = req.email.trim().to_string();
        validate_email(&email)?;
        validate_password(&req.password)?;
        let image = normalize_image(req.image)?;
        if req.role_ids.is_empty() {
            return Err(DomainError::validation("at least one role is required").into());
        }
        if self.stores.users.find_user_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict("email already in use").into());
        }

        let password_hash = hash(req.password).await?;
        let user = self
            .stores
            .users
            .insert_user(NewUser {
                id: UserId::new(),
                name: req.name.trim().to_string(),
                email,
                password_hash,
                phone: blank_to_none(req.phone),
                image,
                created_at: now,
                role_ids: req.role_ids,
            })
            .await?;

        tracing::info!(user_id = %user.id, roles = user.roles.len(), by = %principal.user_id(), "user created");
        Ok(user)
    }

    pub async fn update_user(
        &self,
        principal: &PrincipalContext,
        id: UserId,
        req: UpdateUserRequest,
    ) -> ServiceResult<User> {
        authorize_admin(principal)?;

        let mut changes = UserChanges::default();
        if let Some(name) = req.name {
            require_non_empty("name", &name)?;
            changes.name = Some(name.trim().to_string());
        }
        if let Some(email) = req.email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            changes.email = Some(email);
        }
        if let Some(password) = req.password {
            validate_password(&password)?;
            changes.password_hash = Some(hash(password).await?);
        }
        if let Some(phone) = req.phone {
            changes.phone = Some(blank_to_none(Some(phone)));
        }
        if let Some(image) = req.image {
            changes.image = Some(normalize_image(Some(image))?);
        }
        if let Some(role_ids) = req.role_ids {
            if role_ids.is_empty() {
                return Err(DomainError::validation("at least one role is required").into());
            }
            changes.role_ids = Some(role_ids);
        }

        let user = self.stores.users.update_user(id, changes).await?;
        tracing::info!(user_id = %id, by = %principal.user_id(), "user updated");
        Ok(user)
    }

    pub async fn delete_user(&self, principal: &PrincipalContext, id: UserId) -> ServiceResult<()> {
        authorize_admin(principal)?;
        self.stores.users.delete_user(id).await?;
        tracing::info!(user_id = %id, by = %principal.user_id(), "user deleted");
        Ok(())
    }

    // -------------------------
    // Roles (ADMIN)
    // -------------------------

    pub async fn list_roles(&self, principal: &PrincipalContext) -> ServiceResult<Vec<RoleRecord>> {
        authorize_admin(principal)?;
        Ok(self.stores.roles.list_roles().await?)
    }

    pub async fn create_role(&self, principal: &PrincipalContext, req: RoleRequest) -> ServiceResult<RoleRecord> {
        authorize_admin(principal)?;
        require_non_empty("role name", &req.name)?;

        let name = Role::normalized(&req.name);
        if self.stores.roles.find_role_by_name(&name).await?.is_some() {
            return Err(DomainError::conflict("role already exists").into());
        }

        let role = RoleRecord::new(name, blank_to_none(req.description));
        self.stores.roles.insert_role(&role).await?;
        tracing::info!(role_id = %role.id, role = %role.name, by = %principal.user_id(), "role created");
        Ok(role)
    }

    pub async fn update_role(
        &self,
        principal: &PrincipalContext,
        id: RoleId,
        req: RoleRequest,
    ) -> ServiceResult<RoleRecord> {
        authorize_admin(principal)?;
        require_non_empty("role name", &req.name)?;

        let name = Role::normalized(&req.name);
        let description = blank_to_none(req.description);
        let role = self
            .stores
            .roles
            .update_role(id, &name, description.as_deref())
            .await?;
        tracing::info!(role_id = %id, role = %role.name, by = %principal.user_id(), "role updated");
        Ok(role)
    }

    /// System roles and roles still held by someone cannot be deleted.
    pub async fn delete_role(&self, principal: &PrincipalContext, id: RoleId) -> ServiceResult<()> {
        authorize_admin(principal)?;

        let role = self.stores.roles.get_role(id).await?;
        if role.name.is_system() {
            return Err(DomainError::conflict("system roles (ADMIN/USER) cannot be deleted").into());
        }
        if role.user_count > 0 {
            return Err(DomainError::conflict(format!(
                "role cannot be deleted: {} users assigned",
                role.user_count
            ))
            .into());
        }

        self.stores.roles.delete_role(id).await?;
        tracing::info!(role_id = %id, role = %role.name, by = %principal.user_id(), "role deleted");
        Ok(())
    }
}

async fn hash(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}
