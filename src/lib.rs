//! Storefront client
//!
//! Client-side state for a small e-commerce shop backed by a REST API.
//!
//! ## Features
//! - Session handling with role-gated navigation
//! - Product catalog with search and category filters
//! - Shopping cart and a three-step checkout
//! - Admin product editor with image uploads

pub mod admin;
pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod session;

pub use admin::{AdminProductEditor, EditorError, ImageUpload, ProductForm};
pub use api::{ApiError, HttpApi, StorefrontApi};
pub use catalog::{CatalogError, CatalogFilter, CategoryFilter, ProductCatalog};
pub use config::{ConfigError, StorefrontConfig};
pub use domain::aggregates::{Cart, CheckoutError, CheckoutWizard, Product};
pub use session::{AuthError, FileSessionStore, Session, SessionManager, SessionStoreError};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Session storage error: {0}")]
    Session(#[from] SessionStoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorefrontError {
    /// Text fit for showing to a shopper. Transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.message_or("Something went wrong. Please try again."),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
