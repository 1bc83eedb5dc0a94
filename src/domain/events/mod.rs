//! Domain events
//!
//! Components record events as they complete user actions; the front-end
//! drains them with `take_events` and shows each as a notification.

use crate::domain::value_objects::ProductId;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainEvent {
    Order(OrderEvent),
    Product(ProductEvent),
    Failed { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderEvent {
    Placed { order_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductEvent {
    Created { product_id: ProductId },
    Updated { product_id: ProductId },
    Deleted { product_id: ProductId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// A message ready for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Success => write!(f, "✔ {}", self.message),
            Severity::Error => write!(f, "✖ {}", self.message),
        }
    }
}

impl DomainEvent {
    pub fn failed(message: impl Into<String>) -> Self { Self::Failed { message: message.into() } }

    pub fn notification(&self) -> Notification {
        let (severity, message) = match self {
            Self::Order(OrderEvent::Placed { order_id }) => {
                (Severity::Success, format!("Order placed successfully! Your order ID is: #{order_id}"))
            }
            Self::Product(event) => {
                let verb = match event {
                    ProductEvent::Created { .. } => "created",
                    ProductEvent::Updated { .. } => "updated",
                    ProductEvent::Deleted { .. } => "deleted",
                };
                (Severity::Success, format!("Product {verb} successfully!"))
            }
            Self::Failed { message } => (Severity::Error, message.clone()),
        };
        Notification { severity, message }
    }
}
