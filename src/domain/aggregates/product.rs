//! Product Aggregate
//!
//! Products are owned by the backend. The client only reads them, apart from
//! the admin editor's write-through calls.

use crate::domain::value_objects::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// Categories offered by the catalog filter and the admin form.
pub const CATEGORIES: [&str; 6] = ["Electronics", "Clothing", "Books", "Home & Kitchen", "Sports", "Toys"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub barcode: String,
    pub description: String,
    pub price: Money,
    pub quantity: u32,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Product {
    /// Out-of-stock products stay listed but cannot be added to the cart.
    pub fn is_in_stock(&self) -> bool { self.quantity >= 1 }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.description.to_lowercase().contains(&term) || self.barcode.to_lowercase().contains(&term)
    }
}

#[cfg(test)]
pub(crate) fn sample(id: ProductId, description: &str, price: rust_decimal::Decimal) -> Product {
    Product {
        id,
        barcode: format!("BC-{id:04}"),
        description: description.to_string(),
        price: Money::new(price),
        quantity: 10,
        category: "Electronics".to_string(),
        image_url: None,
    }
}
