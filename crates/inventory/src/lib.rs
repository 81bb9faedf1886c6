//! Kitchen inventory domain module.
//!
//! Products, where they are stored and how they are categorised, plus the
//! alert rules that flag products needing attention. Pure domain logic: no
//! IO, no HTTP, no storage.

pub mod alerts;
pub mod location;
pub mod product;

pub use alerts::{EXPIRY_WINDOW_DAYS, KitchenAlerts, OPENED_TOO_LONG_DAYS, evaluate_alerts};
pub use location::{Category, Location};
pub use product::{Product, ProductDraft, ProductFilter, ProductView};
