//! Order Aggregate
//!
//! The client never holds an order of its own; it builds the submission
//! payload from the cart and reads back the identifier the backend assigns.

use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::checkout::{PaymentMethod, ShippingDetails};
use crate::domain::value_objects::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_details: ShippingDetails,
    pub payment_method: PaymentMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLine {
    pub id: ProductId,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl OrderRequest {
    pub fn from_cart(cart: &Cart, shipping_details: ShippingDetails, payment_method: PaymentMethod) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|i| OrderLine { id: i.id, quantity: i.quantity, price: i.price.amount() })
                .collect(),
            shipping_details,
            payment_method,
            total_amount: cart.cart_total().amount(),
        }
    }
}

/// The `order` object of a successful submission response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlacedOrder {
    #[serde(deserialize_with = "order_id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaceOrderResponse {
    pub order: PlacedOrder,
}

// Backends hand out numeric or string identifiers.
fn order_id<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id { Num(u64), Text(String) }
    Ok(match Id::deserialize(deserializer)? { Id::Num(n) => n.to_string(), Id::Text(s) => s })
}
