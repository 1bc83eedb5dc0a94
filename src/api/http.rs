//! `reqwest` implementation of the backend contract.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ApiError, AuthResponse, StorefrontApi};
use crate::admin::ProductForm;
use crate::config::StorefrontConfig;
use crate::domain::aggregates::{OrderRequest, PlaceOrderResponse, PlacedOrder, Product};
use crate::domain::value_objects::ProductId;
use crate::session::{Credentials, Registration, Session};

/// Backend client.
///
/// Keeps a cookie jar so the cookie set by the CSRF endpoint rides along with
/// the registration request that follows it.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    csrf_url: String,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers).cookie_store(true);
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            csrf_url: config.csrf_url.to_string(),
        })
    }

    fn url(&self, path: &str) -> String { format!("{}/{}", self.base_url, path.trim_start_matches('/')) }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request.bearer_auth(session.token().expose_secret())
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        response.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn ensure_success(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), "backend rejected request");
        Err(ApiError::Rejected { status: status.as_u16(), message: error_message(&body) })
    }

    fn product_form(form: &ProductForm) -> Result<Form, ApiError> {
        let mut multipart = Form::new()
            .text("barcode", form.barcode.trim().to_string())
            .text("description", form.description.trim().to_string())
            .text("price", form.price.trim().to_string())
            .text("quantity", form.quantity.trim().to_string())
            .text("category", form.category.trim().to_string());

        if let Some(image) = &form.image {
            let part = Part::bytes(image.bytes().to_vec())
                .file_name(image.file_name().to_string())
                .mime_str(image.mime())?;
            multipart = multipart.part("image", part);
        }
        Ok(multipart)
    }
}

/// Pulls the human-readable message out of an error body: `message`, then
/// `error`, then the first entry of a field-keyed `errors` object.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    };

    text(value.get("message")).or_else(|| text(value.get("error"))).or_else(|| {
        value.get("errors")?.as_object()?.values().find_map(|v| match v {
            Value::Array(list) => text(list.first()),
            other => text(Some(other)),
        })
    })
}

#[async_trait]
impl StorefrontApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let response = self.client.post(self.url("login")).json(credentials).send().await?;
        Self::read(response).await
    }

    async fn csrf_cookie(&self) -> Result<(), ApiError> {
        let response = self.client.get(&self.csrf_url).send().await?;
        Self::ensure_success(response).await.map(drop)
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let response = self.client.post(self.url("register")).json(registration).send().await?;
        Self::read(response).await
    }

    async fn list_products(&self, session: &Session) -> Result<Vec<Product>, ApiError> {
        let response = self.authorized(self.client.get(self.url("products")), session).send().await?;
        Self::read(response).await
    }

    async fn create_product(&self, session: &Session, form: &ProductForm) -> Result<Product, ApiError> {
        let request = self.client.post(self.url("products")).multipart(Self::product_form(form)?);
        let response = self.authorized(request, session).send().await?;
        Self::read(response).await
    }

    async fn update_product(&self, session: &Session, id: ProductId, form: &ProductForm) -> Result<Product, ApiError> {
        // The backend takes updates as POST so that multipart bodies survive.
        let request = self.client.post(self.url(&format!("products/{id}"))).multipart(Self::product_form(form)?);
        let response = self.authorized(request, session).send().await?;
        Self::read(response).await
    }

    async fn delete_product(&self, session: &Session, id: ProductId) -> Result<(), ApiError> {
        let response = self.authorized(self.client.delete(self.url(&format!("products/{id}"))), session).send().await?;
        Self::ensure_success(response).await.map(drop)
    }

    async fn place_order(&self, session: &Session, order: &OrderRequest) -> Result<PlacedOrder, ApiError> {
        let response = self.authorized(self.client.post(self.url("orders")).json(order), session).send().await?;
        Self::read::<PlaceOrderResponse>(response).await.map(|r| r.order)
    }
}
