//! Kitchen alert rules.
//!
//! [`evaluate_alerts`] sorts products into three independent buckets. A
//! product can land in several buckets at once (opened long ago *and* low on
//! stock) or in none. Buckets keep the input order.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::Product;

/// Products expiring within this many days from now (inclusive) are flagged.
pub const EXPIRY_WINDOW_DAYS: i64 = 3;

/// Products opened more than this many days ago are flagged.
pub const OPENED_TOO_LONG_DAYS: i64 = 7;

/// The three alert buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KitchenAlerts<P = Product> {
    pub expiring_soon: Vec<P>,
    pub low_stock: Vec<P>,
    pub opened_long_ago: Vec<P>,
}

impl<P> KitchenAlerts<P> {
    pub fn is_empty(&self) -> bool {
        self.expiring_soon.is_empty() && self.low_stock.is_empty() && self.opened_long_ago.is_empty()
    }
}

/// `now <= expiry_date <= now + 3 days`.
pub fn is_expiring_soon(product: &Product, now: DateTime<Utc>) -> bool {
    let horizon = now + Duration::days(EXPIRY_WINDOW_DAYS);
    product
        .expiry_date
        .is_some_and(|expiry| now <= expiry && expiry <= horizon)
}

/// `quantity <= min_stock`, only for products that declare a threshold.
pub fn is_low_stock(product: &Product) -> bool {
    product
        .min_stock
        .is_some_and(|min| product.quantity <= min)
}

/// `opened_at < now - 7 days`.
pub fn is_opened_long_ago(product: &Product, now: DateTime<Utc>) -> bool {
    let cutoff = now - Duration::days(OPENED_TOO_LONG_DAYS);
    product.opened_at.is_some_and(|opened| opened < cutoff)
}

/// Partition `products` into alert buckets as of `now`.
///
/// Generic over anything that exposes a [`Product`], so callers can pass
/// enriched views (product + location) and get the same views back.
pub fn evaluate_alerts<P>(products: &[P], now: DateTime<Utc>) -> KitchenAlerts<P>
where
    P: AsRef<Product> + Clone,
{
    KitchenAlerts {
        expiring_soon: select(products, |p| is_expiring_soon(p, now)),
        low_stock: select(products, is_low_stock),
        opened_long_ago: select(products, |p| is_opened_long_ago(p, now)),
    }
}

fn select<P>(products: &[P], rule: impl Fn(&Product) -> bool) -> Vec<P>
where
    P: AsRef<Product> + Clone,
{
    products
        .iter()
        .filter(|p| rule(p.as_ref()))
        .cloned()
        .collect()
}
