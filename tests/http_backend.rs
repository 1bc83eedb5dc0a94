//! End-to-end runs of the client against an in-process fake backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use testresult::TestResult;

use storefront_client::admin::{AdminProductEditor, ImageUpload};
use storefront_client::catalog::CatalogError;
use storefront_client::domain::aggregates::{Cart, CheckoutPhase, CheckoutWizard, ShippingDetails};
use storefront_client::domain::value_objects::Role;
use storefront_client::session::{Credentials, MemorySessionStore, Registration, User};
use storefront_client::{FileSessionStore, HttpApi, ProductCatalog, Session, SessionManager, StorefrontConfig};

const ADMIN_TOKEN: &str = "admin-token";
const CUSTOMER_TOKEN: &str = "customer-token";

#[derive(Clone, Default)]
struct Backend {
    calls: Arc<Mutex<Vec<String>>>,
    products: Arc<Mutex<Vec<Value>>>,
    uploads: Arc<Mutex<Vec<HashMap<String, String>>>>,
    orders: Arc<Mutex<Vec<Value>>>,
}

impl Backend {
    fn seeded() -> Self {
        let backend = Self::default();
        *backend.products.lock().unwrap() = vec![
            json!({
                "id": 1, "barcode": "8801", "description": "Desk Lamp", "price": "25.50", "quantity": 3,
                "category": "Home & Kitchen", "image_url": null
            }),
            json!({
                "id": 2, "barcode": "9780", "description": "Mystery Novel", "price": 20.0, "quantity": 0,
                "category": "Books"
            }),
        ];
        backend
    }

    fn record(&self, call: &str) { self.calls.lock().unwrap().push(call.to_string()); }
    fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn require_role(headers: &HeaderMap, token: &str) -> Result<(), Response> {
    match bearer(headers) {
        Some(t) if t == token => Ok(()),
        Some(ADMIN_TOKEN | CUSTOMER_TOKEN) => Err(reject(StatusCode::FORBIDDEN, "Forbidden")),
        _ => Err(reject(StatusCode::UNAUTHORIZED, "Unauthenticated.")),
    }
}

fn any_user(headers: &HeaderMap) -> Result<(), Response> {
    require_role(headers, ADMIN_TOKEN).or_else(|_| require_role(headers, CUSTOMER_TOKEN))
}

async fn csrf(State(backend): State<Backend>) -> impl IntoResponse {
    backend.record("csrf");
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, "XSRF-TOKEN=abc123; Path=/")])
}

async fn login(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.record("login");
    let (email, password) = (body["email"].as_str().unwrap_or_default(), body["password"].as_str().unwrap_or_default());
    match (email, password) {
        ("admin@example.com", "secret123") => {
            let user = json!({"id": 1, "name": "Ada", "email": email, "role": "admin"});
            Json(json!({"token": ADMIN_TOKEN, "user": user})).into_response()
        }
        ("casey@example.com", "secret123") => {
            let user = json!({"id": 2, "name": "Casey", "email": email, "role": "customer"});
            Json(json!({"token": CUSTOMER_TOKEN, "user": user})).into_response()
        }
        _ => reject(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn register(State(backend): State<Backend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    backend.record("register");
    let has_cookie =
        headers.get(header::COOKIE).and_then(|v| v.to_str().ok()).is_some_and(|c| c.contains("XSRF-TOKEN=abc123"));
    if !has_cookie {
        return reject(StatusCode::from_u16(419).unwrap(), "CSRF token mismatch.");
    }
    if body["email"] == "taken@example.com" {
        let body = json!({"message": null, "errors": {"email": ["The email has already been taken."]}});
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
    }
    let user = json!({"id": 9, "name": body["name"], "email": body["email"], "role": body["role"]});
    (StatusCode::CREATED, Json(json!({"token": CUSTOMER_TOKEN, "user": user}))).into_response()
}

async fn list_products(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = any_user(&headers) {
        return rejection;
    }
    Json(backend.products.lock().unwrap().clone()).into_response()
}

async fn read_form(mut multipart: Multipart) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            fields.insert("image_name".into(), field.file_name().unwrap_or_default().to_string());
            fields.insert("image_type".into(), field.content_type().unwrap_or_default().to_string());
            fields.insert("image_size".into(), field.bytes().await.unwrap().len().to_string());
        } else {
            fields.insert(name, field.text().await.unwrap());
        }
    }
    fields
}

fn product_json(id: u64, fields: &HashMap<String, String>) -> Value {
    json!({
        "id": id,
        "barcode": fields["barcode"],
        "description": fields["description"],
        "price": fields["price"].parse::<f64>().unwrap(),
        "quantity": fields["quantity"].parse::<u32>().unwrap(),
        "category": fields["category"],
        "image_url": fields.get("image_name").map(|n| format!("products/{n}")),
    })
}

async fn create_product(State(backend): State<Backend>, headers: HeaderMap, multipart: Multipart) -> Response {
    if let Err(rejection) = require_role(&headers, ADMIN_TOKEN) {
        return rejection;
    }
    let fields = read_form(multipart).await;
    let mut products = backend.products.lock().unwrap();
    if products.iter().any(|p| p["barcode"] == fields["barcode"].as_str()) {
        return reject(StatusCode::UNPROCESSABLE_ENTITY, "The barcode has already been taken.");
    }
    let id = products.iter().filter_map(|p| p["id"].as_u64()).max().unwrap_or(0) + 1;
    let product = product_json(id, &fields);
    products.push(product.clone());
    backend.uploads.lock().unwrap().push(fields);
    (StatusCode::CREATED, Json(product)).into_response()
}

async fn update_product(
    State(backend): State<Backend>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if let Err(rejection) = require_role(&headers, ADMIN_TOKEN) {
        return rejection;
    }
    let fields = read_form(multipart).await;
    let mut products = backend.products.lock().unwrap();
    let Some(slot) = products.iter_mut().find(|p| p["id"] == id) else {
        return reject(StatusCode::NOT_FOUND, "Product not found");
    };
    *slot = product_json(id, &fields);
    Json(slot.clone()).into_response()
}

async fn delete_product(State(backend): State<Backend>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    if let Err(rejection) = require_role(&headers, ADMIN_TOKEN) {
        return rejection;
    }
    let mut products = backend.products.lock().unwrap();
    let before = products.len();
    products.retain(|p| p["id"] != id);
    if products.len() == before {
        return reject(StatusCode::NOT_FOUND, "Product not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn place_order(State(backend): State<Backend>, headers: HeaderMap, Json(order): Json<Value>) -> Response {
    if let Err(rejection) = require_role(&headers, CUSTOMER_TOKEN) {
        return rejection;
    }
    let products = backend.products.lock().unwrap();
    for line in order["items"].as_array().into_iter().flatten() {
        let stock = products.iter().find(|p| p["id"] == line["id"]).and_then(|p| p["quantity"].as_u64()).unwrap_or(0);
        if line["quantity"].as_u64().unwrap_or(0) > stock {
            return reject(StatusCode::UNPROCESSABLE_ENTITY, "Insufficient stock");
        }
    }
    let mut orders = backend.orders.lock().unwrap();
    orders.push(order);
    (StatusCode::CREATED, Json(json!({"order": {"id": 41 + orders.len()}}))).into_response()
}

async fn serve(backend: Backend) -> StorefrontConfig {
    let app = Router::new()
        .route("/sanctum/csrf-cookie", get(csrf))
        .route("/api/login", post(login))
        .route("/api/register", post(register))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/:id", post(update_product).delete(delete_product))
        .route("/api/orders", post(place_order))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    StorefrontConfig::from_lookup(|key| match key {
        "STOREFRONT_API_URL" => Some(format!("http://{addr}/api")),
        "STOREFRONT_CSRF_URL" => Some(format!("http://{addr}/sanctum/csrf-cookie")),
        _ => None,
    })
    .unwrap()
}

async fn signed_in(api: &HttpApi, email: &str) -> Session {
    let mut sessions = SessionManager::restore(MemorySessionStore::default());
    sessions.login(api, &Credentials::new(email, "secret123")).await.unwrap().clone()
}

fn shipping() -> ShippingDetails {
    ShippingDetails {
        full_name: "Casey Jones".into(),
        address: "1 Main St".into(),
        city: "Springfield".into(),
        postal_code: "12345".into(),
        phone: "555-0100".into(),
    }
}

#[tokio::test]
async fn test_login_persists_and_restores_session() -> TestResult {
    let config = serve(Backend::seeded()).await;
    let api = HttpApi::new(&config)?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.json");

    let mut sessions = SessionManager::restore(FileSessionStore::new(&path));
    let session = sessions.login(&api, &Credentials::new("admin@example.com", "secret123")).await?;
    assert_eq!(session.role(), Role::Admin);

    let restored = SessionManager::restore(FileSessionStore::new(&path));
    assert!(restored.is_authenticated());
    assert_eq!(restored.current().map(|s| s.user().name.clone()), Some("Ada".to_string()));

    let mut catalog = ProductCatalog::new();
    catalog.refresh(restored.current().unwrap(), &api).await?;
    assert_eq!(catalog.products().len(), 2);

    sessions.logout();
    assert!(!path.exists());
    assert!(!SessionManager::restore(FileSessionStore::new(&path)).is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_bad_password_shows_server_message() -> TestResult {
    let config = serve(Backend::seeded()).await;
    let api = HttpApi::new(&config)?;
    let mut sessions = SessionManager::restore(MemorySessionStore::default());
    let err = sessions.login(&api, &Credentials::new("admin@example.com", "wrong")).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(sessions.current().is_none());
    Ok(())
}

#[tokio::test]
async fn test_register_sends_cookie_from_csrf_call() -> TestResult {
    let backend = Backend::seeded();
    let config = serve(backend.clone()).await;
    let api = HttpApi::new(&config)?;
    let registration = Registration {
        name: "Robin".into(),
        email: "robin@example.com".into(),
        password: "correct horse".into(),
        password_confirmation: "correct horse".into(),
        role: Role::Customer,
    };

    let mut sessions = SessionManager::restore(MemorySessionStore::default());
    let session = sessions.register(&api, &registration).await?;
    assert_eq!(session.user().id, Some(9));
    assert_eq!(session.role(), Role::Customer);
    assert_eq!(backend.calls(), vec!["csrf", "register"]);

    let taken = Registration { email: "taken@example.com".into(), ..registration };
    let err = sessions.register(&api, &taken).await.unwrap_err();
    assert_eq!(err.to_string(), "The email has already been taken.");
    Ok(())
}

#[tokio::test]
async fn test_stale_token_asks_for_login() -> TestResult {
    let config = serve(Backend::seeded()).await;
    let api = HttpApi::new(&config)?;
    let user = User { id: Some(2), name: "Casey".into(), email: "casey@example.com".into(), role: Role::Customer };
    let stale = Session::new("expired", user);

    let mut catalog = ProductCatalog::new();
    let err = catalog.refresh(&stale, &api).await.unwrap_err();
    assert!(matches!(err, CatalogError::LoginRequired(_)));
    Ok(())
}

#[tokio::test]
async fn test_admin_manages_products() -> TestResult {
    let backend = Backend::seeded();
    let config = serve(backend.clone()).await;
    let api = HttpApi::new(&config)?;
    let admin = signed_in(&api, "admin@example.com").await;

    let mut editor = AdminProductEditor::new();
    editor.refresh(&admin, &api).await?;
    editor.open_create();
    {
        let form = editor.form_mut();
        form.barcode = "5550".into();
        form.description = "Yoga Mat".into();
        form.price = "30.00".into();
        form.quantity = "12".into();
        form.category = "Sports".into();
    }
    editor.select_image(ImageUpload::new("mat.png", "image/png", vec![7u8; 2048]))?;
    let created = editor.submit(&admin, &api).await?;
    assert_eq!(created.id, 3);
    assert_eq!(created.image_url.as_deref(), Some("products/mat.png"));
    assert_eq!(editor.catalog().products().len(), 3);

    let upload = backend.uploads.lock().unwrap()[0].clone();
    assert_eq!(upload["category"], "Sports");
    assert_eq!(upload["image_type"], "image/png");
    assert_eq!(upload["image_size"], "2048");

    editor.open_edit(&created);
    editor.form_mut().price = "27.5".into();
    let updated = editor.submit(&admin, &api).await?;
    assert_eq!(updated.price.to_string(), "$27.50");

    editor.request_delete(1);
    assert_eq!(editor.confirm_delete(&admin, &api).await?, 1);
    assert!(editor.catalog().find(1).is_none());

    editor.request_delete(1);
    let err = editor.confirm_delete(&admin, &api).await.unwrap_err();
    assert_eq!(err.to_string(), "Product not found");
    Ok(())
}

#[tokio::test]
async fn test_customer_cannot_create_products() -> TestResult {
    let config = serve(Backend::seeded()).await;
    let api = HttpApi::new(&config)?;
    let customer = signed_in(&api, "casey@example.com").await;

    let mut editor = AdminProductEditor::new();
    editor.open_create();
    let form = editor.form_mut();
    form.barcode = "1".into();
    form.description = "Sneaky".into();
    form.price = "1".into();
    form.quantity = "1".into();
    form.category = "Toys".into();
    let err = editor.submit(&customer, &api).await.unwrap_err();
    assert_eq!(err.to_string(), "Forbidden");
    Ok(())
}

#[tokio::test]
async fn test_checkout_places_order_and_clears_cart() -> TestResult {
    let backend = Backend::seeded();
    let config = serve(backend.clone()).await;
    let api = HttpApi::new(&config)?;
    let customer = signed_in(&api, "casey@example.com").await;

    let mut catalog = ProductCatalog::new();
    catalog.refresh(&customer, &api).await?;
    let lamp = catalog.find(1).cloned().unwrap();
    let mut cart = Cart::new();
    cart.add_to_cart(&lamp);
    cart.add_to_cart(&lamp);

    let mut wizard = CheckoutWizard::new();
    wizard.open();
    wizard.set_shipping(shipping());
    wizard.next()?;
    wizard.next()?;
    assert_eq!(wizard.phase(), CheckoutPhase::Review);

    let placed = wizard.submit_order(&mut cart, &customer, &api).await?;
    assert_eq!(placed.id, "42");
    assert!(cart.is_empty());
    assert!(!wizard.is_open());
    assert_eq!(wizard.take_events()[0].notification().message, "Order placed successfully! Your order ID is: #42");

    let order = backend.orders.lock().unwrap()[0].clone();
    assert_eq!(order["totalAmount"], 51.0);
    assert_eq!(order["paymentMethod"], "cod");
    assert_eq!(order["shippingDetails"]["postalCode"], "12345");
    assert_eq!(order["items"][0], json!({"id": 1, "quantity": 2, "price": 25.5}));
    Ok(())
}

#[tokio::test]
async fn test_rejected_order_keeps_cart() -> TestResult {
    let config = serve(Backend::seeded()).await;
    let api = HttpApi::new(&config)?;
    let customer = signed_in(&api, "casey@example.com").await;

    let mut catalog = ProductCatalog::new();
    catalog.refresh(&customer, &api).await?;
    let mut cart = Cart::new();
    cart.add_to_cart(catalog.find(1).unwrap());
    cart.update_quantity(1, 5);

    let mut wizard = CheckoutWizard::new();
    wizard.open();
    wizard.set_shipping(shipping());
    wizard.next()?;
    wizard.next()?;

    let err = wizard.submit_order(&mut cart, &customer, &api).await.unwrap_err();
    assert_eq!(err.to_string(), "Insufficient stock");
    assert_eq!(wizard.last_error(), Some("Insufficient stock"));
    assert_eq!(wizard.phase(), CheckoutPhase::Review);
    assert_eq!(cart.item_count(), 5);
    Ok(())
}
