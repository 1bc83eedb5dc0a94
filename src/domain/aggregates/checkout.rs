//! Checkout Aggregate
//!
//! A three-step wizard over the cart: shipping details, payment method,
//! review. The wizard is a single [`CheckoutPhase`] value; `Idle` is the
//! closed state that both a placed order and a cancellation return to.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::api::{ApiError, StorefrontApi};
use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::order::{OrderRequest, PlacedOrder};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{not_blank, Money};
use crate::session::Session;

pub const STEP_LABELS: [&str; 3] = ["Shipping Details", "Payment Method", "Confirm Order"];

const INCOMPLETE_SHIPPING: &str = "Please fill in all required fields";
const EMPTY_CART: &str = "Your cart is empty";
const ORDER_FALLBACK: &str = "Failed to place order. Please try again.";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[validate(custom = "not_blank")]
    pub full_name: String,
    #[validate(custom = "not_blank")]
    pub address: String,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[validate(custom = "not_blank")]
    pub postal_code: String,
    #[validate(custom = "not_blank")]
    pub phone: String,
}

/// All five fields must be non-empty after trimming.
pub fn validate_shipping(details: &ShippingDetails) -> Result<(), ValidationErrors> { details.validate() }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self { Self::Cod => "Cash on Delivery" }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckoutPhase {
    #[default]
    Idle,
    Shipping,
    Payment,
    Review,
}

impl CheckoutPhase {
    /// Stepper index; the closed wizard sits on step 0.
    pub fn active_step(&self) -> usize {
        match self { Self::Idle | Self::Shipping => 0, Self::Payment => 1, Self::Review => 2 }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please fill in all required fields")]
    IncompleteShipping(ValidationErrors),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("checkout is not open at the {0:?} step")]
    WrongStep(CheckoutPhase),

    #[error("{message}")]
    Rejected { message: String, #[source] source: ApiError },
}

#[derive(Debug, Default, PartialEq)]
pub struct CheckoutWizard {
    phase: CheckoutPhase,
    shipping: ShippingDetails,
    payment_method: PaymentMethod,
    last_error: Option<String>,
    events: Vec<DomainEvent>,
}

impl CheckoutWizard {
    pub fn new() -> Self { Self::default() }

    pub fn phase(&self) -> CheckoutPhase { self.phase }
    pub fn active_step(&self) -> usize { self.phase.active_step() }
    pub fn is_open(&self) -> bool { self.phase != CheckoutPhase::Idle }
    pub fn shipping(&self) -> &ShippingDetails { &self.shipping }
    pub fn shipping_mut(&mut self) -> &mut ShippingDetails { &mut self.shipping }
    pub fn set_shipping(&mut self, details: ShippingDetails) { self.shipping = details; }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn select_payment(&mut self, method: PaymentMethod) { self.payment_method = method; }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

    /// Opens the wizard on a blank shipping step. Already open: no-op.
    pub fn open(&mut self) {
        if self.phase == CheckoutPhase::Idle {
            self.reset();
            self.phase = CheckoutPhase::Shipping;
        }
    }

    pub fn next(&mut self) -> Result<CheckoutPhase, CheckoutError> {
        match self.phase {
            CheckoutPhase::Shipping => {
                if let Err(errors) = validate_shipping(&self.shipping) {
                    tracing::debug!(fields = errors.field_errors().len(), "shipping step incomplete");
                    self.last_error = Some(INCOMPLETE_SHIPPING.to_string());
                    return Err(CheckoutError::IncompleteShipping(errors));
                }
                self.advance(CheckoutPhase::Payment)
            }
            // cod is always a valid selection
            CheckoutPhase::Payment => self.advance(CheckoutPhase::Review),
            CheckoutPhase::Review | CheckoutPhase::Idle => Err(CheckoutError::WrongStep(self.phase)),
        }
    }

    pub fn back(&mut self) {
        self.phase = match self.phase {
            CheckoutPhase::Payment => CheckoutPhase::Shipping,
            CheckoutPhase::Review => CheckoutPhase::Payment,
            other => other,
        };
    }

    /// Closes the wizard and forgets what was entered. The cart is untouched.
    pub fn cancel(&mut self) { self.reset(); }

    /// Places the order. Only valid on the review step.
    ///
    /// Each call issues a new request; a retry after a failure is not
    /// deduplicated here.
    pub async fn submit_order(
        &mut self,
        cart: &mut Cart,
        session: &Session,
        api: &dyn StorefrontApi,
    ) -> Result<PlacedOrder, CheckoutError> {
        if self.phase != CheckoutPhase::Review {
            return Err(CheckoutError::WrongStep(self.phase));
        }
        if cart.is_empty() {
            self.last_error = Some(EMPTY_CART.to_string());
            return Err(CheckoutError::EmptyCart);
        }

        let order = OrderRequest::from_cart(cart, self.shipping.clone(), self.payment_method);
        match api.place_order(session, &order).await {
            Ok(placed) => {
                tracing::info!(
                    order_id = %placed.id,
                    lines = order.items.len(),
                    total = %order.total_amount,
                    "order placed"
                );
                cart.clear_cart();
                self.reset();
                self.events.push(DomainEvent::Order(OrderEvent::Placed { order_id: placed.id.clone() }));
                Ok(placed)
            }
            Err(source) => {
                let message = source.message_or(ORDER_FALLBACK);
                tracing::warn!(error = %source, "order submission failed");
                self.last_error = Some(message.clone());
                Err(CheckoutError::Rejected { message, source })
            }
        }
    }

    /// What the review step shows; `None` unless the wizard is on it.
    pub fn review_summary(&self, cart: &Cart) -> Option<ReviewSummary> {
        (self.phase == CheckoutPhase::Review).then(|| ReviewSummary {
            lines: cart
                .items()
                .iter()
                .map(|i| ReviewLine {
                    description: i.description.clone(),
                    quantity: i.quantity,
                    line_total: i.line_total(),
                })
                .collect(),
            shipping: self.shipping.clone(),
            payment_method: self.payment_method,
            total: cart.cart_total(),
        })
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn advance(&mut self, to: CheckoutPhase) -> Result<CheckoutPhase, CheckoutError> {
        self.last_error = None;
        self.phase = to;
        Ok(to)
    }

    fn reset(&mut self) {
        self.phase = CheckoutPhase::Idle;
        self.shipping = ShippingDetails::default();
        self.payment_method = PaymentMethod::default();
        self.last_error = None;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReviewLine {
    pub description: String,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReviewSummary {
    pub lines: Vec<ReviewLine>,
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub total: Money,
}

impl fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Order Summary")?;
        for line in &self.lines {
            writeln!(f, "  {} x {} = {}", line.description, line.quantity, line.line_total)?;
        }
        writeln!(f, "Shipping Details:")?;
        writeln!(f, "  {}", self.shipping.full_name)?;
        writeln!(f, "  {}", self.shipping.address)?;
        writeln!(f, "  {}, {}", self.shipping.city, self.shipping.postal_code)?;
        writeln!(f, "  Phone: {}", self.shipping.phone)?;
        writeln!(f, "Payment Method: {}", self.payment_method.label())?;
        write!(f, "Total Amount: {}", self.total)
    }
}
