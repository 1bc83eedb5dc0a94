//! Backend API contract.
//!
//! [`StorefrontApi`] is the only way the rest of the crate reaches the
//! network. [`HttpApi`] implements it over `reqwest`; tests substitute
//! `MockStorefrontApi`.

mod http;

pub use http::HttpApi;

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

use crate::admin::ProductForm;
use crate::domain::aggregates::{OrderRequest, PlacedOrder, Product};
use crate::domain::value_objects::ProductId;
use crate::session::{Credentials, Registration, Session, User};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("API error: {status}{}", .message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default())]
    Rejected { status: u16, message: Option<String> },

    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected { status, message: Some(message.into()) }
    }

    /// Human-readable text the backend put in the error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            Self::Http(_) | Self::Parse(_) => None,
        }
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) => None,
        }
    }

    /// 401 only: the token is missing or no longer accepted.
    pub fn is_unauthenticated(&self) -> bool { self.status() == Some(401) }
}

/// Body of a successful login or registration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[automock]
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// `POST /login`
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Establishes the security cookie that must precede registration.
    async fn csrf_cookie(&self) -> Result<(), ApiError>;

    /// `POST /register`
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError>;

    /// `GET /products`
    async fn list_products(&self, session: &Session) -> Result<Vec<Product>, ApiError>;

    /// `POST /products` (multipart)
    async fn create_product(&self, session: &Session, form: &ProductForm) -> Result<Product, ApiError>;

    /// `POST /products/{id}` (multipart)
    async fn update_product(&self, session: &Session, id: ProductId, form: &ProductForm) -> Result<Product, ApiError>;

    /// `DELETE /products/{id}`
    async fn delete_product(&self, session: &Session, id: ProductId) -> Result<(), ApiError>;

    /// `POST /orders`
    async fn place_order(&self, session: &Session, order: &OrderRequest) -> Result<PlacedOrder, ApiError>;
}
