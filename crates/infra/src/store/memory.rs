//! In-memory store for tests/dev.
//!
//! All data sits behind one `RwLock`, so every write (including the
//! multi-row ones) is applied under a single guard and is never observed
//! half-done.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use casahub_auth::Role;
use casahub_core::{CategoryId, LocationId, ProductId, RecipeId, RoleId, UserId};
use casahub_inventory::{Category, Location, Product, ProductFilter, ProductView};
use casahub_recipes::Recipe;

use super::{
    KitchenStore, NewUser, RecipeStore, RoleRecord, RoleStore, RoleSummary, User, UserChanges,
    UserStore,
};
use crate::error::{StoreError, StoreResult};

const EMAIL_IN_USE: &str = "email already in use";
const ROLE_EXISTS: &str = "role already exists";

#[derive(Debug, Clone)]
struct StoredUser {
    id: UserId,
    name: String,
    email: String,
    password_hash: String,
    phone: Option<String>,
    image: Option<String>,
    created_at: DateTime<Utc>,
    role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone)]
struct StoredRole {
    id: RoleId,
    name: Role,
    description: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    locations: HashMap<LocationId, Location>,
    categories: HashMap<CategoryId, Category>,
    recipes: HashMap<RecipeId, Recipe>,
    users: HashMap<UserId, StoredUser>,
    roles: HashMap<RoleId, StoredRole>,
}

impl State {
    fn check_references(&self, product: &Product) -> StoreResult<()> {
        if !self.locations.contains_key(&product.location_id) {
            return Err(StoreError::Invalid("location does not exist".into()));
        }
        if let Some(category_id) = product.category_id {
            if !self.categories.contains_key(&category_id) {
                return Err(StoreError::Invalid("category does not exist".into()));
            }
        }
        Ok(())
    }

    fn check_links(&self, recipe: &Recipe) -> StoreResult<()> {
        let dangling = recipe
            .ingredients
            .iter()
            .filter_map(|line| line.product_id)
            .any(|id| !self.products.contains_key(&id));
        if dangling {
            return Err(StoreError::Invalid("product does not exist".into()));
        }
        Ok(())
    }

    fn check_roles(&self, role_ids: &[RoleId]) -> StoreResult<()> {
        if role_ids.iter().all(|id| self.roles.contains_key(id)) {
            Ok(())
        } else {
            Err(StoreError::Invalid("role does not exist".into()))
        }
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &Role, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| &r.name == name && Some(r.id) != except)
    }

    fn view(&self, product: &Product) -> ProductView {
        ProductView {
            product: product.clone(),
            location: self.locations.get(&product.location_id).cloned(),
            category: product
                .category_id
                .and_then(|id| self.categories.get(&id).cloned()),
        }
    }

    fn user(&self, stored: &StoredUser) -> User {
        let mut roles: Vec<_> = stored
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id))
            .map(|r| RoleSummary {
                id: r.id,
                name: r.name.clone(),
            })
            .collect();
        roles.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

        User {
            id: stored.id,
            name: stored.name.clone(),
            email: stored.email.clone(),
            password_hash: stored.password_hash.clone(),
            phone: stored.phone.clone(),
            image: stored.image.clone(),
            created_at: stored.created_at,
            roles,
        }
    }

    fn role_record(&self, role: &StoredRole) -> RoleRecord {
        let user_count = self
            .users
            .values()
            .filter(|u| u.role_ids.contains(&role.id))
            .count() as u64;
        RoleRecord {
            id: role.id,
            name: role.name.clone(),
            description: role.description.clone(),
            user_count,
        }
    }
}

fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by_cached_key(|item| {
        let name = name(item);
        (name.to_lowercase(), name.to_string())
    });
}

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl KitchenStore for InMemoryStore {
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<ProductView>> {
        let state = self.read()?;
        let mut views: Vec<ProductView> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .map(|p| state.view(p))
            .collect();
        sort_by_name(&mut views, |v| v.product.name.as_str());
        Ok(views)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        self.read()?
            .products
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("product"))
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.write()?;
        state.check_references(product)?;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::Conflict("product already exists".into()));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.products.contains_key(&product.id) {
            return Err(StoreError::NotFound("product"));
        }
        state.check_references(product)?;
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut state = self.write()?;
        state
            .products
            .remove(&id)
            .ok_or(StoreError::NotFound("product"))?;
        for line in state
            .recipes
            .values_mut()
            .flat_map(|r| r.ingredients.iter_mut())
            .filter(|line| line.product_id == Some(id))
        {
            line.product_id = None;
        }
        Ok(())
    }

    async fn list_locations(&self) -> StoreResult<Vec<Location>> {
        let mut locations: Vec<_> = self.read()?.locations.values().cloned().collect();
        sort_by_name(&mut locations, |l| l.name.as_str());
        Ok(locations)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories: Vec<_> = self.read()?.categories.values().cloned().collect();
        sort_by_name(&mut categories, |c| c.name.as_str());
        Ok(categories)
    }

    async fn insert_location(&self, location: &Location) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.locations.values().any(|l| l.name == location.name) {
            return Err(StoreError::Conflict("location already exists".into()));
        }
        state.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::Conflict("category already exists".into()));
        }
        state.categories.insert(category.id, category.clone());
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for InMemoryStore {
    async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
        let mut recipes: Vec<_> = self.read()?.recipes.values().cloned().collect();
        sort_by_name(&mut recipes, |r| r.name.as_str());
        Ok(recipes)
    }

    async fn get_recipe(&self, id: RecipeId) -> StoreResult<Recipe> {
        self.read()?
            .recipes
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("recipe"))
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
        let mut state = self.write()?;
        state.check_links(recipe)?;
        if state.recipes.contains_key(&recipe.id) {
            return Err(StoreError::Conflict("recipe already exists".into()));
        }
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn replace_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
        let mut state = self.write()?;
        state.check_links(recipe)?;
        let slot = state
            .recipes
            .get_mut(&recipe.id)
            .ok_or(StoreError::NotFound("recipe"))?;
        *slot = recipe.clone();
        Ok(())
    }

    async fn delete_recipe(&self, id: RecipeId) -> StoreResult<()> {
        self.write()?
            .recipes
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("recipe"))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let state = self.read()?;
        let mut users: Vec<User> = state.users.values().map(|u| state.user(u)).collect();
        users.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });
        Ok(users)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let state = self.read()?;
        state
            .users
            .get(&id)
            .map(|u| state.user(u))
            .ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.read()?;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| state.user(u)))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.write()?;
        if state.email_taken(&user.email, None) {
            return Err(StoreError::Conflict(EMAIL_IN_USE.into()));
        }
        state.check_roles(&user.role_ids)?;

        let stored = StoredUser {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            phone: user.phone,
            image: user.image,
            created_at: user.created_at,
            role_ids: user.role_ids,
        };
        let created = state.user(&stored);
        state.users.insert(stored.id, stored);
        Ok(created)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<User> {
        let mut state = self.write()?;
        if !state.users.contains_key(&id) {
            return Err(StoreError::NotFound("user"));
        }
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict(EMAIL_IN_USE.into()));
            }
        }
        if let Some(role_ids) = &changes.role_ids {
            state.check_roles(role_ids)?;
        }

        let stored = state
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound("user"))?;
        if let Some(name) = changes.name {
            stored.name = name;
        }
        if let Some(email) = changes.email {
            stored.email = email;
        }
        if let Some(hash) = changes.password_hash {
            stored.password_hash = hash;
        }
        if let Some(phone) = changes.phone {
            stored.phone = phone;
        }
        if let Some(image) = changes.image {
            stored.image = image;
        }
        if let Some(role_ids) = changes.role_ids {
            stored.role_ids = role_ids;
        }

        let stored = stored.clone();
        Ok(state.user(&stored))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        self.write()?
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("user"))
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn list_roles(&self) -> StoreResult<Vec<RoleRecord>> {
        let state = self.read()?;
        let mut roles: Vec<RoleRecord> =
            state.roles.values().map(|r| state.role_record(r)).collect();
        roles.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(roles)
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<RoleRecord> {
        let state = self.read()?;
        state
            .roles
            .get(&id)
            .map(|r| state.role_record(r))
            .ok_or(StoreError::NotFound("role"))
    }

    async fn find_role_by_name(&self, name: &Role) -> StoreResult<Option<RoleRecord>> {
        let state = self.read()?;
        Ok(state
            .roles
            .values()
            .find(|r| &r.name == name)
            .map(|r| state.role_record(r)))
    }

    async fn insert_role(&self, role: &RoleRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.role_name_taken(&role.name, None) {
            return Err(StoreError::Conflict(ROLE_EXISTS.into()));
        }
        state.roles.insert(
            role.id,
            StoredRole {
                id: role.id,
                name: role.name.clone(),
                description: role.description.clone(),
            },
        );
        Ok(())
    }

    async fn update_role(
        &self,
        id: RoleId,
        name: &Role,
        description: Option<&str>,
    ) -> StoreResult<RoleRecord> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&id) {
            return Err(StoreError::NotFound("role"));
        }
        if state.role_name_taken(name, Some(id)) {
            return Err(StoreError::Conflict(ROLE_EXISTS.into()));
        }
        let role = state.roles.get_mut(&id).ok_or(StoreError::NotFound("role"))?;
        role.name = name.clone();
        role.description = description.map(str::to_string);

        let role = role.clone();
        Ok(state.role_record(&role))
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        let mut state = self.write()?;
        state.roles.remove(&id).ok_or(StoreError::NotFound("role"))?;
        for user in state.users.values_mut() {
            user.role_ids.retain(|r| *r != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use casahub_core::{IngredientId, Quantity};
    use casahub_recipes::Ingredient;

    use super::*;

    fn location(name: &str) -> Location {
        Location {
            id: LocationId::new(),
            name: name.to_string(),
            icon: None,
        }
    }

    fn product(name: &str, location_id: LocationId) -> Product {
        Product {
            id: ProductId::new(),
            name: name.to_string(),
            quantity: Quantity::new(1.0).unwrap(),
            unit: "ud".to_string(),
            location_id,
            category_id: None,
            expiry_date: None,
            opened_at: None,
            min_stock: None,
            notes: None,
        }
    }

    fn recipe(name: &str, product_id: Option<ProductId>) -> Recipe {
        Recipe {
            id: RecipeId::new(),
            name: name.to_string(),
            description: None,
            instructions: None,
            servings: None,
            prep_time: None,
            cook_time: None,
            image_url: None,
            ingredients: vec![Ingredient {
                id: IngredientId::new(),
                name: "huevos".to_string(),
                quantity: Quantity::new(2.0).unwrap(),
                unit: "ud".to_string(),
                product_id,
            }],
        }
    }

    fn new_user(email: &str, role_ids: Vec<RoleId>) -> NewUser {
        NewUser {
            id: UserId::new(),
            name: "Someone".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            phone: None,
            image: None,
            created_at: Utc::now(),
            role_ids,
        }
    }

    #[tokio::test]
    async fn products_list_by_name_with_filters() {
        let store = InMemoryStore::new();
        let fridge = location("Nevera");
        let pantry = location("Despensa");
        store.insert_location(&fridge).await.unwrap();
        store.insert_location(&pantry).await.unwrap();

        store.insert_product(&product("yogur", fridge.id)).await.unwrap();
        store.insert_product(&product("Arroz", pantry.id)).await.unwrap();
        store.insert_product(&product("leche", fridge.id)).await.unwrap();

        let all = store.list_products(&ProductFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|v| v.product.name.as_str()).collect();
        assert_eq!(names, vec!["Arroz", "leche", "yogur"]);
        assert_eq!(all[0].location.as_ref().map(|l| l.name.as_str()), Some("Despensa"));

        let in_fridge = store
            .list_products(&ProductFilter {
                location_id: Some(fridge.id),
                search: Some("LECHE".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_fridge.len(), 1);
    }

    #[tokio::test]
    async fn product_needs_an_existing_location() {
        let store = InMemoryStore::new();
        let err = store
            .insert_product(&product("leche", LocationId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn deleting_a_product_unlinks_ingredients() {
        let store = InMemoryStore::new();
        let fridge = location("Nevera");
        store.insert_location(&fridge).await.unwrap();
        let eggs = product("huevos", fridge.id);
        store.insert_product(&eggs).await.unwrap();
        let r = recipe("Tortilla", Some(eggs.id));
        store.insert_recipe(&r).await.unwrap();

        store.delete_product(eggs.id).await.unwrap();

        let stored = store.get_recipe(r.id).await.unwrap();
        assert_eq!(stored.ingredients[0].product_id, None);
        assert_eq!(
            store.get_product(eggs.id).await.unwrap_err(),
            StoreError::NotFound("product")
        );
    }

    #[tokio::test]
    async fn recipe_links_must_point_at_existing_products() {
        let store = InMemoryStore::new();
        let err = store
            .insert_recipe(&recipe("Tortilla", Some(ProductId::new())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn replace_recipe_swaps_everything() {
        let store = InMemoryStore::new();
        let mut r = recipe("Tortilla", None);
        store.insert_recipe(&r).await.unwrap();

        r.name = "Tortilla de patatas".into();
        r.ingredients.clear();
        store.replace_recipe(&r).await.unwrap();

        let stored = store.get_recipe(r.id).await.unwrap();
        assert_eq!(stored, r);
        assert_eq!(
            store.replace_recipe(&recipe("ghost", None)).await.unwrap_err(),
            StoreError::NotFound("recipe")
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = InMemoryStore::new();
        let admin = RoleRecord::new(Role::ADMIN, None);
        store.insert_role(&admin).await.unwrap();

        store
            .insert_user(new_user("a@casahub.local", vec![admin.id]))
            .await
            .unwrap();
        let err = store
            .insert_user(new_user("a@casahub.local", vec![admin.id]))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict("email already in use".into()));
    }

    #[tokio::test]
    async fn update_user_is_partial_and_replaces_roles() {
        let store = InMemoryStore::new();
        let admin = RoleRecord::new(Role::ADMIN, None);
        let user = RoleRecord::new(Role::USER, None);
        store.insert_role(&admin).await.unwrap();
        store.insert_role(&user).await.unwrap();
        let created = store
            .insert_user(new_user("a@casahub.local", vec![admin.id]))
            .await
            .unwrap();

        let updated = store
            .update_user(
                created.id,
                UserChanges {
                    phone: Some(Some("600000000".into())),
                    role_ids: Some(vec![user.id]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Someone");
        assert_eq!(updated.phone.as_deref(), Some("600000000"));
        assert_eq!(updated.role_names(), vec![Role::USER]);

        let err = store
            .update_user(
                created.id,
                UserChanges {
                    role_ids: Some(vec![RoleId::new()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.get_user(created.id).await.unwrap().role_names(), vec![Role::USER]);
    }

    #[tokio::test]
    async fn users_are_listed_newest_first() {
        let store = InMemoryStore::new();
        let mut older = new_user("old@casahub.local", vec![]);
        older.created_at = Utc::now() - chrono::Duration::days(1);
        store.insert_user(older).await.unwrap();
        store.insert_user(new_user("new@casahub.local", vec![])).await.unwrap();

        let emails: Vec<_> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, vec!["new@casahub.local", "old@casahub.local"]);
    }

    #[tokio::test]
    async fn roles_carry_user_counts_and_names_stay_unique() {
        let store = InMemoryStore::new();
        let admin = RoleRecord::new(Role::ADMIN, None);
        let cook = RoleRecord::new(Role::new("COOK"), Some("kitchen".into()));
        store.insert_role(&admin).await.unwrap();
        store.insert_role(&cook).await.unwrap();
        store
            .insert_user(new_user("a@casahub.local", vec![admin.id]))
            .await
            .unwrap();

        let roles = store.list_roles().await.unwrap();
        assert_eq!(roles[0].name, Role::ADMIN);
        assert_eq!(roles[0].user_count, 1);
        assert_eq!(roles[1].user_count, 0);

        let err = store
            .update_role(cook.id, &Role::ADMIN, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.delete_role(admin.id).await.unwrap();
        assert!(store.find_role_by_name(&Role::ADMIN).await.unwrap().is_none());
    }
}
