//! Product catalog reader: the fetched product list plus search and category
//! filters. Read-only with respect to the backend.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::api::{ApiError, StorefrontApi};
use crate::domain::aggregates::Product;
use crate::domain::value_objects::ProductId;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Please login to view products")]
    LoginRequired(#[source] ApiError),
    #[error("Failed to fetch products")]
    Unavailable(#[source] ApiError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl FromStr for CategoryFilter {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() || s.eq_ignore_ascii_case("all") { Self::All } else { Self::Only(s.to_string()) })
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::All => f.write_str("All"), Self::Only(name) => f.write_str(name) }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub search: String,
    pub category: CategoryFilter,
}

impl CatalogFilter {
    /// Category must match exactly; the search term is a case-insensitive
    /// substring of the description or barcode. Both must hold.
    pub fn matches(&self, product: &Product) -> bool {
        let category_ok = match &self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(name) => &product.category == name,
        };
        category_ok && (self.search.is_empty() || product.matches_search(&self.search))
    }

    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products.iter().filter(|p| self.matches(p)).collect()
    }
}

#[derive(Debug, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
    filter: CatalogFilter,
    last_error: Option<String>,
}

impl ProductCatalog {
    pub fn new() -> Self { Self::default() }

    /// Reloads the list. On failure the previous list stays in place.
    pub async fn refresh(&mut self, session: &Session, api: &dyn StorefrontApi) -> Result<usize, CatalogError> {
        match api.list_products(session).await {
            Ok(products) => {
                tracing::debug!(count = products.len(), "catalog refreshed");
                self.products = products;
                self.last_error = None;
                Ok(self.products.len())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch products");
                let err = if e.is_unauthenticated() {
                    CatalogError::LoginRequired(e)
                } else {
                    CatalogError::Unavailable(e)
                };
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn products(&self) -> &[Product] { &self.products }
    pub fn find(&self, id: ProductId) -> Option<&Product> { self.products.iter().find(|p| p.id == id) }
    pub fn filter(&self) -> &CatalogFilter { &self.filter }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

    pub fn set_search(&mut self, term: impl Into<String>) { self.filter.search = term.into(); }
    pub fn set_category(&mut self, category: CategoryFilter) { self.filter.category = category; }

    /// Products passing the current filter, in server order.
    pub fn visible(&self) -> Vec<&Product> { self.filter.apply(&self.products) }

    pub(crate) fn remove(&mut self, id: ProductId) { self.products.retain(|p| p.id != id); }
}
