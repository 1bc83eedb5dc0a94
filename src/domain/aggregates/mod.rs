//! Aggregates module
pub mod product;
pub mod cart;
pub mod order;
pub mod checkout;

pub use product::{Product, CATEGORIES};
pub use cart::{Cart, CartLineItem};
pub use order::{OrderLine, OrderRequest, PlacedOrder};
pub(crate) use order::PlaceOrderResponse;
pub use checkout::{
    validate_shipping, CheckoutError, CheckoutPhase, CheckoutWizard, PaymentMethod, ReviewSummary, ShippingDetails,
    STEP_LABELS,
};
