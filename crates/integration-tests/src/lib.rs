//! Integration test support for Cartwheel.
//!
//! Provides [`FakeCartServer`], an in-process stand-in for the remote cart
//! service, served by axum on an ephemeral localhost port.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```
//!
//! # Behaviour
//!
//! - `GET /api/cart` - 404 `{"error": "Cart not found"}` until the first add
//! - `POST /api/cart/add` - merges quantities per product
//! - `DELETE /api/cart/delete` - subtracts `quantity` (whole line when absent);
//!   404 for a product the cart does not hold
//! - Every route requires `Authorization: Bearer <token>`; anything else is 401
//! - [`FakeCartServer::fail_with`] makes every route answer with a fixed status

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use cartwheel_storefront::config::RemoteCartConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;

/// Token the fake server accepts unless told otherwise.
pub const TEST_TOKEN: &str = "test-shopper-token";

/// A request the fake server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: &'static str,
    pub product_id: Option<u64>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone)]
struct FakeProduct {
    id: u64,
    name: String,
    price: Decimal,
}

#[derive(Debug, Clone)]
struct FakeItem {
    product_id: u64,
    quantity: i64,
}

#[derive(Debug)]
struct FakeState {
    token: String,
    products: Vec<FakeProduct>,
    /// `None` until the shopper's first add, like the real service.
    cart: Option<Vec<FakeItem>>,
    fail_with: Option<StatusCode>,
    echo_cart: bool,
    delay: Option<Duration>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process fake of the remote cart service.
///
/// The server task is aborted when the value is dropped.
pub struct FakeCartServer {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeCartServer {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            token: TEST_TOKEN.to_string(),
            products: Vec::new(),
            cart: None,
            fail_with: None,
            echo_cart: false,
            delay: None,
            requests: Vec::new(),
        }));

        let app = Router::new()
            .route("/api/cart", get(get_cart))
            .route("/api/cart/add", post(add_to_cart))
            .route("/api/cart/delete", delete(remove_from_cart))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake cart server");
        let addr = listener.local_addr().expect("fake cart server address");

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake cart server stopped");
            }
        });

        Self { addr, state, task }
    }

    /// Base URL including the `/api` prefix.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Remote configuration pointing at this server.
    ///
    /// # Panics
    ///
    /// Panics if the base URL does not parse, which cannot happen for a
    /// bound socket address.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn config(&self) -> RemoteCartConfig {
        let mut config = RemoteCartConfig::new(&self.base_url()).expect("valid fake base url");
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// Register catalog details returned with cart lines.
    pub fn with_product(&self, id: u64, name: &str, price: Decimal) -> &Self {
        lock(&self.state).products.push(FakeProduct {
            id,
            name: name.to_string(),
            price,
        });
        self
    }

    /// Replace the server cart directly.
    pub fn set_cart(&self, items: &[(u64, i64)]) {
        lock(&self.state).cart = Some(
            items
                .iter()
                .map(|&(product_id, quantity)| FakeItem {
                    product_id,
                    quantity,
                })
                .collect(),
        );
    }

    /// Answer every request with `status` (or behave normally for `None`).
    pub fn fail_with(&self, status: Option<StatusCode>) {
        lock(&self.state).fail_with = status;
    }

    /// Echo the full cart in add/delete responses.
    pub fn echo_cart(&self, echo: bool) {
        lock(&self.state).echo_cart = echo;
    }

    /// Delay every response.
    pub fn delay(&self, delay: Option<Duration>) {
        lock(&self.state).delay = delay;
    }

    /// Server-side quantity of a product.
    #[must_use]
    pub fn quantity_of(&self, product_id: u64) -> i64 {
        lock(&self.state)
            .cart
            .as_ref()
            .and_then(|items| items.iter().find(|i| i.product_id == product_id))
            .map_or(0, |item| item.quantity)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }
}

impl Drop for FakeCartServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct ItemInput {
    product_id: u64,
    #[serde(default)]
    quantity: Option<i64>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Shared prelude: record, delay, injected failure, bearer check.
async fn admit(
    state: &Shared,
    headers: &HeaderMap,
    request: RecordedRequest,
) -> Result<(), Response> {
    let (delay, fail_with, token) = {
        let mut guard = lock(state);
        guard.requests.push(request);
        (guard.delay, guard.fail_with, guard.token.clone())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = fail_with {
        return Err(error(status, "injected failure"));
    }

    let expected = format!("Bearer {token}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if authorized {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

fn cart_json(state: &FakeState) -> serde_json::Value {
    let items: Vec<_> = state
        .cart
        .iter()
        .flatten()
        .map(|item| {
            let product = state
                .products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| json!({ "id": p.id, "name": p.name, "price": p.price }));
            json!({
                "product_id": item.product_id,
                "quantity": item.quantity,
                "Product": product,
            })
        })
        .collect();
    json!({ "items": items })
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let request = RecordedRequest {
        method: "GET",
        path: "/api/cart",
        product_id: None,
        quantity: None,
    };
    if let Err(response) = admit(&state, &headers, request).await {
        return response;
    }

    let guard = lock(&state);
    if guard.cart.is_none() {
        return error(StatusCode::NOT_FOUND, "Cart not found");
    }
    Json(cart_json(&guard)).into_response()
}

async fn add_to_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(input): Json<ItemInput>,
) -> Response {
    let request = RecordedRequest {
        method: "POST",
        path: "/api/cart/add",
        product_id: Some(input.product_id),
        quantity: input.quantity,
    };
    if let Err(response) = admit(&state, &headers, request).await {
        return response;
    }

    let quantity = match input.quantity {
        Some(q) if q >= 1 => q,
        _ => return error(StatusCode::BAD_REQUEST, "quantity must be at least 1"),
    };

    let mut guard = lock(&state);
    let items = guard.cart.get_or_insert_with(Vec::new);
    match items.iter_mut().find(|i| i.product_id == input.product_id) {
        Some(item) => item.quantity += quantity,
        None => items.push(FakeItem {
            product_id: input.product_id,
            quantity,
        }),
    }

    if guard.echo_cart {
        Json(cart_json(&guard)).into_response()
    } else {
        Json(json!({ "message": "Item added to cart" })).into_response()
    }
}

async fn remove_from_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(input): Json<ItemInput>,
) -> Response {
    let request = RecordedRequest {
        method: "DELETE",
        path: "/api/cart/delete",
        product_id: Some(input.product_id),
        quantity: input.quantity,
    };
    if let Err(response) = admit(&state, &headers, request).await {
        return response;
    }

    let mut guard = lock(&state);
    let Some(items) = guard.cart.as_mut() else {
        return error(StatusCode::NOT_FOUND, "Cart not found");
    };
    let Some(pos) = items.iter().position(|i| i.product_id == input.product_id) else {
        return error(StatusCode::NOT_FOUND, "Item not found in cart");
    };

    let remaining = items
        .get(pos)
        .map_or(0, |item| item.quantity - input.quantity.unwrap_or(item.quantity));
    if remaining > 0 {
        if let Some(item) = items.get_mut(pos) {
            item.quantity = remaining;
        }
    } else {
        items.remove(pos);
    }

    if guard.echo_cart {
        Json(cart_json(&guard)).into_response()
    } else {
        Json(json!({ "message": "Item removed" })).into_response()
    }
}
