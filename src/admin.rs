//! Admin product editor.
//!
//! Create, update and delete products against the backend. Image files are
//! checked locally (size and type) before anything is sent, deletes need an
//! explicit confirmation step, and local image previews are handles that are
//! released when replaced or when the editing session ends.

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::api::{ApiError, StorefrontApi};
use crate::catalog::{CatalogError, ProductCatalog};
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{not_blank, ProductId};
use crate::session::Session;

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const SAVE_FALLBACK: &str = "Failed to save product";
const DELETE_FALLBACK: &str = "Failed to delete product";

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Please correct the highlighted fields")]
    Invalid(ValidationErrors),

    #[error("Image size must be less than 5MB")]
    ImageTooLarge { size: usize },

    #[error("Please upload an image file")]
    NotAnImage { mime: String },

    #[error("No product is being edited")]
    NotEditing,

    #[error("No delete is awaiting confirmation")]
    NothingToConfirm,

    #[error("{message}")]
    Rejected { message: String, #[source] source: ApiError },
}

/// A file picked for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    mime: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), mime: mime.into(), bytes }
    }

    /// Reads a file, taking its type from the extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "upload".to_string());
        let mime = mime_for_extension(path.extension().and_then(|e| e.to_str()).unwrap_or_default());
        Ok(Self::new(file_name, mime, bytes))
    }

    pub fn file_name(&self) -> &str { &self.file_name }
    pub fn mime(&self) -> &str { &self.mime }
    pub fn bytes(&self) -> &[u8] { &self.bytes }
    pub fn size(&self) -> usize { self.bytes.len() }

    fn check(&self) -> Result<(), EditorError> {
        if self.size() > MAX_IMAGE_BYTES {
            return Err(EditorError::ImageTooLarge { size: self.size() });
        }
        if !self.mime.to_ascii_lowercase().starts_with("image/") {
            return Err(EditorError::NotAnImage { mime: self.mime.clone() });
        }
        Ok(())
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Counts live local previews.
#[derive(Clone, Debug, Default)]
pub struct PreviewRegistry {
    live: Arc<AtomicUsize>,
}

impl PreviewRegistry {
    pub fn live(&self) -> usize { self.live.load(Ordering::SeqCst) }

    fn issue(&self, image: &ImageUpload) -> PreviewHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        PreviewHandle { id: Uuid::new_v4(), file_name: image.file_name.clone(), live: Arc::clone(&self.live) }
    }
}

/// A local preview. Released when dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    file_name: String,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    pub fn url(&self) -> String { format!("preview:{}", self.id) }
    pub fn file_name(&self) -> &str { &self.file_name }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(preview = %self.id, "preview released");
    }
}

#[derive(Debug)]
pub enum Preview {
    /// The image the product already has on the server
    Remote(String),
    Local(PreviewHandle),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Validate)]
pub struct ProductForm {
    #[validate(custom = "not_blank")]
    pub barcode: String,
    #[validate(custom = "not_blank")]
    pub description: String,
    #[validate(custom = "price_amount")]
    pub price: String,
    #[validate(custom = "stock_quantity")]
    pub quantity: String,
    #[validate(custom = "not_blank")]
    pub category: String,
    pub image: Option<ImageUpload>,
}

impl ProductForm {
    pub fn from_product(product: &Product) -> Self {
        Self {
            barcode: product.barcode.clone(),
            description: product.description.clone(),
            price: product.price.amount().to_string(),
            quantity: product.quantity.to_string(),
            category: product.category.clone(),
            image: None,
        }
    }
}

fn price_amount(value: &str) -> Result<(), ValidationError> {
    match Decimal::from_str(value.trim()) {
        Ok(amount) if !amount.is_sign_negative() => Ok(()),
        _ => {
            let mut error = ValidationError::new("price");
            error.message = Some("Price must be a non-negative amount".into());
            Err(error)
        }
    }
}

fn stock_quantity(value: &str) -> Result<(), ValidationError> {
    value.trim().parse::<u32>().map(drop).map_err(|_| {
        let mut error = ValidationError::new("quantity");
        error.message = Some("Quantity must be a whole number".into());
        error
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Closed,
    Creating,
    Editing(ProductId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteConfirmation {
    pub product_id: ProductId,
    pub product_name: String,
}

#[derive(Debug, Default)]
pub struct AdminProductEditor {
    catalog: ProductCatalog,
    mode: EditorMode,
    form: ProductForm,
    preview: Option<Preview>,
    pending_delete: Option<DeleteConfirmation>,
    registry: PreviewRegistry,
    events: Vec<DomainEvent>,
}

impl AdminProductEditor {
    pub fn new() -> Self { Self::default() }

    pub fn with_registry(registry: PreviewRegistry) -> Self { Self { registry, ..Self::default() } }

    pub fn catalog(&self) -> &ProductCatalog { &self.catalog }
    pub fn catalog_mut(&mut self) -> &mut ProductCatalog { &mut self.catalog }
    pub fn mode(&self) -> EditorMode { self.mode }
    pub fn form(&self) -> &ProductForm { &self.form }
    pub fn form_mut(&mut self) -> &mut ProductForm { &mut self.form }
    pub fn preview(&self) -> Option<&Preview> { self.preview.as_ref() }
    pub fn pending_delete(&self) -> Option<&DeleteConfirmation> { self.pending_delete.as_ref() }
    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    pub async fn refresh(&mut self, session: &Session, api: &dyn StorefrontApi) -> Result<usize, CatalogError> {
        self.catalog.refresh(session, api).await
    }

    pub fn open_create(&mut self) {
        self.close();
        self.mode = EditorMode::Creating;
    }

    pub fn open_edit(&mut self, product: &Product) {
        self.close();
        self.mode = EditorMode::Editing(product.id);
        self.form = ProductForm::from_product(product);
        self.preview = product.image_url.clone().map(Preview::Remote);
    }

    /// Rejected files leave the form and preview as they were.
    pub fn select_image(&mut self, image: ImageUpload) -> Result<(), EditorError> {
        if self.mode == EditorMode::Closed {
            return Err(EditorError::NotEditing);
        }
        if let Err(e) = image.check() {
            tracing::debug!(file = image.file_name(), size = image.size(), mime = image.mime(), "image rejected");
            self.events.push(DomainEvent::failed(e.to_string()));
            return Err(e);
        }
        // the old handle drops here
        self.preview = Some(Preview::Local(self.registry.issue(&image)));
        self.form.image = Some(image);
        Ok(())
    }

    pub async fn submit(&mut self, session: &Session, api: &dyn StorefrontApi) -> Result<Product, EditorError> {
        let mode = self.mode;
        if mode == EditorMode::Closed {
            return Err(EditorError::NotEditing);
        }
        self.form.validate().map_err(EditorError::Invalid)?;

        let saved = match mode {
            EditorMode::Editing(id) => api.update_product(session, id, &self.form).await,
            _ => api.create_product(session, &self.form).await,
        };
        let product = match saved {
            Ok(product) => product,
            Err(source) => {
                let message = source.message_or(SAVE_FALLBACK);
                tracing::warn!(error = %source, ?mode, "product save failed");
                self.events.push(DomainEvent::failed(message.clone()));
                return Err(EditorError::Rejected { message, source });
            }
        };

        tracing::info!(product_id = product.id, ?mode, "product saved");
        self.events.push(DomainEvent::Product(match mode {
            EditorMode::Editing(_) => ProductEvent::Updated { product_id: product.id },
            _ => ProductEvent::Created { product_id: product.id },
        }));
        self.close();
        if let Err(e) = self.catalog.refresh(session, api).await {
            self.events.push(DomainEvent::failed(e.to_string()));
        }
        Ok(product)
    }

    /// Ends the editing session, releasing any local preview.
    pub fn close(&mut self) {
        self.mode = EditorMode::Closed;
        self.form = ProductForm::default();
        self.preview = None;
    }

    /// First step of a delete: nothing is sent until [`Self::confirm_delete`].
    pub fn request_delete(&mut self, id: ProductId) -> &DeleteConfirmation {
        let product_name = self.catalog.find(id).map(|p| p.description.clone()).unwrap_or_default();
        self.pending_delete.insert(DeleteConfirmation { product_id: id, product_name })
    }

    pub fn cancel_delete(&mut self) { self.pending_delete = None; }

    /// The product leaves the local list only once the backend confirms.
    pub async fn confirm_delete(
        &mut self,
        session: &Session,
        api: &dyn StorefrontApi,
    ) -> Result<ProductId, EditorError> {
        let id = self.pending_delete.as_ref().map(|d| d.product_id).ok_or(EditorError::NothingToConfirm)?;

        if let Err(source) = api.delete_product(session, id).await {
            let message = source.message_or(DELETE_FALLBACK);
            tracing::warn!(product_id = id, error = %source, "product delete failed");
            self.events.push(DomainEvent::failed(message.clone()));
            return Err(EditorError::Rejected { message, source });
        }

        tracing::info!(product_id = id, "product deleted");
        self.catalog.remove(id);
        self.pending_delete = None;
        self.events.push(DomainEvent::Product(ProductEvent::Deleted { product_id: id }));
        Ok(id)
    }
}
