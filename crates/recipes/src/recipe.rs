use serde::{Deserialize, Serialize};

use casahub_core::error::require_non_empty;
use casahub_core::{DomainResult, Entity, IngredientId, ProductId, Quantity, RecipeId};

/// A named dish with optional preparation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub servings: Option<u32>,
    /// Minutes.
    pub prep_time: Option<u32>,
    /// Minutes.
    pub cook_time: Option<u32>,
    pub image_url: Option<String>,
    /// Ingredient lines in display order.
    pub ingredients: Vec<Ingredient>,
}

/// One line of a recipe ("200 g flour"), owned by exactly one recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
    /// Weak link to a kitchen product, used only for stock lookups.
    pub product_id: Option<ProductId>,
}

impl Recipe {
    /// Build a recipe from a validated draft, minting ids for every line.
    pub fn from_draft(id: RecipeId, draft: RecipeDraft) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name.trim().to_string(),
            description: non_blank(draft.description),
            instructions: non_blank(draft.instructions),
            servings: draft.servings,
            prep_time: draft.prep_time,
            cook_time: draft.cook_time,
            image_url: non_blank(draft.image_url),
            ingredients: draft
                .ingredients
                .into_iter()
                .map(IngredientDraft::into_ingredient)
                .collect(),
        })
    }

    /// Replace every field and the whole ingredient list.
    ///
    /// Old lines are dropped and new ones get fresh ids; there is no diffing.
    pub fn replace_with(&mut self, draft: RecipeDraft) -> DomainResult<()> {
        *self = Self::from_draft(self.id, draft)?;
        Ok(())
    }

    /// Products referenced by any ingredient line (duplicates removed).
    pub fn linked_products(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::new();
        for id in self.ingredients.iter().filter_map(|i| i.product_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

impl Entity for Recipe {
    type Id = RecipeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Create/update payload for a recipe (updates are full replacements).
///
/// Times and servings are unsigned, so negative values are refused when the
/// payload is decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub servings: Option<u32>,
    #[serde(default)]
    pub prep_time: Option<u32>,
    #[serde(default)]
    pub cook_time: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientDraft {
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

impl RecipeDraft {
    pub fn validate(&self) -> DomainResult<()> {
        require_non_empty("recipe name", &self.name)?;
        for ingredient in &self.ingredients {
            ingredient.validate()?;
        }
        Ok(())
    }
}

impl IngredientDraft {
    pub fn validate(&self) -> DomainResult<()> {
        require_non_empty("ingredient name", &self.name)?;
        require_non_empty("ingredient unit", &self.unit)
    }

    fn into_ingredient(self) -> Ingredient {
        Ingredient {
            id: IngredientId::new(),
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            product_id: self.product_id,
        }
    }
}
