//! Startup seeding: system roles, the first admin and the default kitchen
//! layout. Safe to run on every start; existing rows are left untouched.

use anyhow::Context;
use chrono::Utc;

use casahub_auth::{Role, hash_password};
use casahub_core::{CategoryId, LocationId, UserId};
use casahub_inventory::{Category, Location};

use crate::store::{NewUser, RoleRecord, Stores};

pub const ADMIN_NAME: &str = "Admin CasaHub";

/// Default storage locations with their icon hints.
pub const DEFAULT_LOCATIONS: &[(&str, &str)] = &[
    ("Nevera", "IceCream"),
    ("Congelador", "Snowflake"),
    ("Despensa", "Archive"),
    ("Frutero", "Apple"),
    ("Armario Especias", "Flame"),
];

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Lácteos",
    "Carnes",
    "Pescados",
    "Verduras/Frutas",
    "Bebidas",
    "Pasta/Arroz/Legumbres",
    "Conservas",
    "Congelados",
    "Dulces/Snacks",
    "Especias/Aceites",
];

/// What a seeding run actually created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles: usize,
    pub admin: bool,
    pub locations: usize,
    pub categories: usize,
}

pub async fn seed(stores: &Stores, admin_email: &str, admin_password: &str) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    let mut admin_role = None;
    for (role, description) in [
        (Role::ADMIN, "Full access to the whole system"),
        (Role::USER, "Standard household member"),
    ] {
        let existing = stores
            .roles
            .find_role_by_name(&role)
            .await
            .with_context(|| format!("looking up role {role}"))?;
        let record = match existing {
            Some(record) => record,
            None => {
                let record = RoleRecord::new(role.clone(), Some(description.to_string()));
                stores
                    .roles
                    .insert_role(&record)
                    .await
                    .with_context(|| format!("creating role {role}"))?;
                report.roles += 1;
                record
            }
        };
        if role == Role::ADMIN {
            admin_role = Some(record.id);
        }
    }
    let admin_role = admin_role.context("ADMIN role missing after seeding")?;

    let admin_exists = stores
        .users
        .find_user_by_email(admin_email)
        .await
        .context("looking up admin user")?
        .is_some();
    if !admin_exists {
        let password = admin_password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")??;
        stores
            .users
            .insert_user(NewUser {
                id: UserId::new(),
                name: ADMIN_NAME.to_string(),
                email: admin_email.to_string(),
                password_hash,
                phone: None,
                image: None,
                created_at: Utc::now(),
                role_ids: vec![admin_role],
            })
            .await
            .context("creating admin user")?;
        report.admin = true;
    }

    let locations = stores.kitchen.list_locations().await?;
    for (name, icon) in DEFAULT_LOCATIONS {
        if locations.iter().any(|l| l.name == *name) {
            continue;
        }
        stores
            .kitchen
            .insert_location(&Location {
                id: LocationId::new(),
                name: name.to_string(),
                icon: Some(icon.to_string()),
            })
            .await
            .with_context(|| format!("creating location {name}"))?;
        report.locations += 1;
    }

    let categories = stores.kitchen.list_categories().await?;
    for name in DEFAULT_CATEGORIES {
        if categories.iter().any(|c| c.name == *name) {
            continue;
        }
        stores
            .kitchen
            .insert_category(&Category {
                id: CategoryId::new(),
                name: name.to_string(),
            })
            .await
            .with_context(|| format!("creating category {name}"))?;
        report.categories += 1;
    }

    tracing::info!(
        roles = report.roles,
        admin = report.admin,
        locations = report.locations,
        categories = report.categories,
        "seed complete"
    );
    Ok(report)
}
