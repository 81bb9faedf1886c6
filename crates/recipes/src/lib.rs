//! Recipe domain module.
//!
//! Recipes own an ordered list of ingredient lines; a line may point at a
//! kitchen product so availability can be checked against current stock.

pub mod availability;
pub mod recipe;

pub use availability::{
    AvailabilityStatus, IngredientAvailability, IngredientStatus, RecipeAvailability,
    evaluate_availability, overall_status,
};
pub use recipe::{Ingredient, IngredientDraft, Recipe, RecipeDraft};
