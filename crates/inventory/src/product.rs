use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use casahub_core::error::require_non_empty;
use casahub_core::{CategoryId, DomainResult, Entity, LocationId, ProductId, Quantity};

use crate::{Category, Location};

/// A tracked kitchen item: how much there is, where it lives, and the
/// optional dates/thresholds the alert rules look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
    pub location_id: LocationId,
    pub category_id: Option<CategoryId>,
    pub expiry_date: Option<DateTime<Utc>>,
    /// When the package was opened (set once by "mark as opened").
    pub opened_at: Option<DateTime<Utc>>,
    /// Low-stock threshold. Products without one are never low on stock.
    pub min_stock: Option<Quantity>,
    pub notes: Option<String>,
}

impl Product {
    pub fn from_draft(id: ProductId, draft: ProductDraft) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name.trim().to_string(),
            quantity: draft.quantity,
            unit: draft.unit.trim().to_string(),
            location_id: draft.location_id,
            category_id: draft.category_id,
            expiry_date: draft.expiry_date,
            opened_at: draft.opened_at,
            min_stock: draft.min_stock,
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
        })
    }

    /// Overwrite the editable fields from `draft`.
    ///
    /// `opened_at` is kept: only [`Product::mark_opened`] moves it, so an edit
    /// never takes a product out of the opened-long-ago alert.
    pub fn apply_draft(&mut self, draft: ProductDraft) -> DomainResult<()> {
        let opened_at = self.opened_at;
        *self = Self::from_draft(self.id, draft)?;
        self.opened_at = opened_at;
        Ok(())
    }

    /// Record the moment the package was opened.
    pub fn mark_opened(&mut self, now: DateTime<Utc>) {
        self.opened_at = Some(now);
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AsRef<Product> for Product {
    fn as_ref(&self) -> &Product {
        self
    }
}

/// A product joined with the location and category it points at.
///
/// This is what listings return; the alert rules accept it directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub location: Option<Location>,
    pub category: Option<Category>,
}

impl AsRef<Product> for ProductView {
    fn as_ref(&self) -> &Product {
        &self.product
    }
}

/// Create/update payload for a product.
///
/// Updates replace every field except `opened_at`, which is only honoured
/// on create (see [`Product::apply_draft`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
    pub location_id: LocationId,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub min_stock: Option<Quantity>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProductDraft {
    /// Field-level checks. Quantities are already non-negative by
    /// construction; whether the referenced location/category exist is the
    /// store's concern.
    pub fn validate(&self) -> DomainResult<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("unit", &self.unit)?;
        Ok(())
    }
}

/// Optional narrowing for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    pub location_id: Option<LocationId>,
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring match on the product name.
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.location_id.is_some_and(|l| l != product.location_id) {
            return false;
        }
        if self.category_id.is_some() && self.category_id != product.category_id {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => product
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, unit: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            quantity: Quantity::new(2.0).unwrap(),
            unit: unit.to_string(),
            location_id: LocationId::new(),
            category_id: None,
            expiry_date: None,
            opened_at: None,
            min_stock: None,
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn from_draft_trims_and_drops_blank_notes() {
        let p = Product::from_draft(ProductId::new(), draft("  Leche ", " l ")).unwrap();
        assert_eq!(p.name, "Leche");
        assert_eq!(p.unit, "l");
        assert_eq!(p.notes, None);
    }

    #[test]
    fn name_and_unit_are_required() {
        assert!(Product::from_draft(ProductId::new(), draft("", "l")).is_err());
        assert!(Product::from_draft(ProductId::new(), draft("Leche", " ")).is_err());
    }

    #[test]
    fn negative_quantity_is_rejected_at_the_boundary() {
        let json = serde_json::json!({
            "name": "Leche",
            "quantity": -1.0,
            "unit": "l",
            "location_id": LocationId::new(),
        });
        assert!(serde_json::from_value::<ProductDraft>(json).is_err());
    }

    #[test]
    fn filter_matches_location_category_and_search() {
        let mut p = Product::from_draft(ProductId::new(), draft("Leche Entera", "l")).unwrap();
        let cat = CategoryId::new();
        p.category_id = Some(cat);

        assert!(ProductFilter::default().matches(&p));
        assert!(ProductFilter { search: Some("entera".into()), ..Default::default() }.matches(&p));
        assert!(!ProductFilter { search: Some("queso".into()), ..Default::default() }.matches(&p));
        assert!(ProductFilter { category_id: Some(cat), ..Default::default() }.matches(&p));
        assert!(
            !ProductFilter { category_id: Some(CategoryId::new()), ..Default::default() }.matches(&p)
        );
        assert!(
            !ProductFilter { location_id: Some(LocationId::new()), ..Default::default() }.matches(&p)
        );
    }

    #[test]
    fn view_serializes_flat_with_its_references() {
        let p = Product::from_draft(ProductId::new(), draft("Leche", "l")).unwrap();
        let location = Location {
            id: p.location_id,
            name: "Nevera".into(),
            icon: Some("IceCream".into()),
        };
        let view = ProductView {
            product: p.clone(),
            location: Some(location),
            category: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["name"], "Leche");
        assert_eq!(json["location"]["name"], "Nevera");
        assert!(json["category"].is_null());
        assert_eq!(AsRef::<Product>::as_ref(&view), &p);
    }

    #[test]
    fn edits_keep_the_opened_timestamp() {
        let mut p = Product::from_draft(ProductId::new(), draft("Yogur", "ud")).unwrap();
        let opened = Utc::now() - chrono::Duration::days(10);
        p.mark_opened(opened);

        let mut edit = draft("Yogur natural", "ud");
        edit.quantity = Quantity::new(0.5).unwrap();
        p.apply_draft(edit).unwrap();
        assert_eq!(p.name, "Yogur natural");
        assert_eq!(p.quantity, Quantity::new(0.5).unwrap());
        assert_eq!(p.opened_at, Some(opened));

        let mut tampered = draft("Yogur", "ud");
        tampered.opened_at = Some(Utc::now());
        p.apply_draft(tampered).unwrap();
        assert_eq!(p.opened_at, Some(opened));
    }

    #[test]
    fn failed_edit_leaves_the_product_alone() {
        let mut p = Product::from_draft(ProductId::new(), draft("Yogur", "ud")).unwrap();
        let before = p.clone();
        assert!(p.apply_draft(draft(" ", "ud")).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn mark_opened_sets_timestamp() {
        let mut p = Product::from_draft(ProductId::new(), draft("Yogur", "ud")).unwrap();
        let now = Utc::now();
        p.mark_opened(now);
        assert_eq!(p.opened_at, Some(now));
    }
}
