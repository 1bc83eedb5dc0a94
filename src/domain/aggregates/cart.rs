//! Cart Aggregate
//!
//! The cart lives only for the running session. Every operation is total:
//! there is no I/O and no failure mode.

use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Money, ProductId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: ProductId,
    pub description: String,
    pub price: Money,
    pub quantity: u32,
    pub image_url: Option<String>,
}

impl CartLineItem {
    fn from_product(product: &Product) -> Self {
        Self {
            id: product.id,
            description: product.description.clone(),
            price: product.price,
            quantity: 1,
            image_url: product.image_url.clone(),
        }
    }

    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &[CartLineItem] { &self.items }
    pub fn get(&self, id: ProductId) -> Option<&CartLineItem> { self.items.iter().find(|i| i.id == id) }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Total units across all lines (the cart badge count).
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    /// Sum of `price * quantity`, recomputed on every call.
    pub fn cart_total(&self) -> Money { self.items.iter().map(CartLineItem::line_total).sum() }

    /// Stock is not checked here; the backend validates it when the order is placed.
    pub fn add_to_cart(&mut self, product: &Product) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == product.id) {
            existing.quantity = existing.quantity.saturating_add(1);
        } else {
            self.items.push(CartLineItem::from_product(product));
        }
        tracing::debug!(product_id = product.id, lines = self.items.len(), "added to cart");
    }

    /// Quantities below one remove the line instead of storing them.
    pub fn update_quantity(&mut self, id: ProductId, quantity: i64) {
        if quantity < 1 {
            self.remove_from_cart(id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    pub fn remove_from_cart(&mut self, id: ProductId) { self.items.retain(|i| i.id != id); }

    pub fn clear_cart(&mut self) { self.items.clear(); }
}
