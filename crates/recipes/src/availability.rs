//! Can this recipe be cooked with what is in the kitchen right now?
//!
//! Each ingredient line is checked against the stock of its linked product,
//! then the per-line results are folded into a traffic-light status.

use std::collections::HashMap;

use serde::Serialize;

use casahub_core::{IngredientId, ProductId, Quantity, RecipeId};
use casahub_inventory::Product;

use crate::Recipe;

/// Per-ingredient result.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientStatus {
    /// Linked product holds at least the required quantity.
    Available,
    /// Linked product exists but holds less than required.
    Insufficient,
    /// No linked product (or it no longer exists); counts as unavailable.
    Unknown,
}

/// Whole-recipe readiness.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    /// Every ingredient is available.
    Green,
    /// At least half of the ingredients are available.
    Yellow,
    /// Fewer than half available, or nothing to check.
    Red,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientAvailability {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub product_id: Option<ProductId>,
    pub status: IngredientStatus,
    pub available: bool,
    pub required_quantity: Quantity,
    /// Stock of the linked product; absent for unknown lines.
    pub current_quantity: Option<Quantity>,
    /// How much is still needed (the full requirement for unknown lines).
    pub missing: Quantity,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeAvailability {
    pub recipe_id: RecipeId,
    pub ingredients: Vec<IngredientAvailability>,
    pub status: AvailabilityStatus,
}

impl RecipeAvailability {
    pub fn available_count(&self) -> usize {
        self.ingredients.iter().filter(|i| i.available).count()
    }
}

/// Fold `available` out of `total` into a traffic light.
///
/// Zero ingredients is red: nothing is confirmed available.
pub fn overall_status(available: usize, total: usize) -> AvailabilityStatus {
    if total == 0 {
        AvailabilityStatus::Red
    } else if available == total {
        AvailabilityStatus::Green
    } else if 2 * available >= total {
        // available >= total / 2 without integer truncation; an exact half is yellow.
        AvailabilityStatus::Yellow
    } else {
        AvailabilityStatus::Red
    }
}

/// Check `recipe` against the current stock in `products`.
///
/// `products` only needs to contain the linked products; anything else is
/// ignored. Stock is read, never modified.
pub fn evaluate_availability<P>(recipe: &Recipe, products: &[P]) -> RecipeAvailability
where
    P: AsRef<Product>,
{
    let stock: HashMap<ProductId, &Product> = products
        .iter()
        .map(|p| {
            let p = p.as_ref();
            (p.id, p)
        })
        .collect();

    let ingredients: Vec<IngredientAvailability> = recipe
        .ingredients
        .iter()
        .map(|ingredient| {
            let linked = ingredient.product_id.and_then(|id| stock.get(&id).copied());
            let (status, current_quantity, missing) = match linked {
                None => (IngredientStatus::Unknown, None, ingredient.quantity),
                Some(product) => {
                    let status = if product.quantity >= ingredient.quantity {
                        IngredientStatus::Available
                    } else {
                        IngredientStatus::Insufficient
                    };
                    (
                        status,
                        Some(product.quantity),
                        product.quantity.shortfall_to(ingredient.quantity),
                    )
                }
            };

            IngredientAvailability {
                ingredient_id: ingredient.id,
                name: ingredient.name.clone(),
                product_id: ingredient.product_id,
                status,
                available: status == IngredientStatus::Available,
                required_quantity: ingredient.quantity,
                current_quantity,
                missing,
                unit: ingredient.unit.clone(),
            }
        })
        .collect();

    let available = ingredients.iter().filter(|i| i.available).count();
    let status = overall_status(available, ingredients.len());

    RecipeAvailability {
        recipe_id: recipe.id,
        ingredients,
        status,
    }
}
