//! HTTP client for the remote cart service.

use std::sync::Arc;

use cartwheel_core::ProductKey;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use super::RemoteSyncError;
use super::types::{
    AddItemRequest, DeleteItemRequest, ErrorBody, RemoteCartPayload, WireProductId,
    parse_echoed_cart,
};
use crate::config::RemoteCartConfig;

const CART_PATH: &str = "cart";
const ADD_PATH: &str = "cart/add";
const DELETE_PATH: &str = "cart/delete";

/// Client for the remote cart endpoints.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RemoteCartClient {
    inner: Arc<RemoteCartClientInner>,
}

struct RemoteCartClientInner {
    client: reqwest::Client,
    base_url: Url,
}

/// Which call is being classified; decides how 404 is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Fetch,
    Add,
    Delete,
}

impl RemoteCartClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError::Network` if the HTTP client cannot be built.
    pub fn new(config: &RemoteCartConfig) -> Result<Self, RemoteSyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteSyncError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RemoteCartClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Fetch the server's cart.
    ///
    /// A 404 (no cart yet for this shopper) reads as an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` on transport, auth, server or decode failure.
    #[instrument(skip(self, token))]
    pub async fn fetch_cart(&self, token: &SecretString) -> Result<RemoteCartPayload, RemoteSyncError> {
        let body = self
            .send(Call::Fetch, Method::GET, CART_PATH, token, None::<&()>)
            .await?;

        let Some(body) = body else {
            return Ok(RemoteCartPayload::default());
        };

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse remote cart response"
            );
            RemoteSyncError::Decode(e.to_string())
        })
    }

    /// Add `quantity` units of a product to the server cart.
    ///
    /// Returns the cart if the service echoed one.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` on transport, auth or server failure.
    #[instrument(skip(self, token, product_key), fields(product_key = %product_key))]
    pub async fn add_item(
        &self,
        token: &SecretString,
        product_key: &ProductKey,
        quantity: u32,
    ) -> Result<Option<RemoteCartPayload>, RemoteSyncError> {
        let request = AddItemRequest {
            product_id: WireProductId::from(product_key),
            quantity,
        };
        let body = self
            .send(Call::Add, Method::POST, ADD_PATH, token, Some(&request))
            .await?;
        Ok(body.as_deref().and_then(parse_echoed_cart))
    }

    /// Remove `quantity` units of a product from the server cart.
    ///
    /// A 404 means the server has nothing to delete and counts as success.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` on transport, auth or server failure.
    #[instrument(skip(self, token, product_key), fields(product_key = %product_key))]
    pub async fn delete_item(
        &self,
        token: &SecretString,
        product_key: &ProductKey,
        quantity: u32,
    ) -> Result<Option<RemoteCartPayload>, RemoteSyncError> {
        let request = DeleteItemRequest {
            product_id: WireProductId::from(product_key),
            quantity,
        };
        let body = self
            .send(Call::Delete, Method::DELETE, DELETE_PATH, token, Some(&request))
            .await?;
        Ok(body.as_deref().and_then(parse_echoed_cart))
    }

    /// Send a request and classify the response.
    ///
    /// Returns `None` for a 404 the call treats as benign.
    async fn send<B: Serialize + ?Sized>(
        &self,
        call: Call,
        method: Method,
        path: &str,
        token: &SecretString,
        body: Option<&B>,
    ) -> Result<Option<String>, RemoteSyncError> {
        let url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| RemoteSyncError::Network(format!("invalid endpoint {path}: {e}")))?;

        let mut request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        debug!(status = %status, ?call, "Remote cart response");
        classify(call, status, text)
    }
}

fn transport_error(e: reqwest::Error) -> RemoteSyncError {
    if e.is_timeout() {
        RemoteSyncError::Timeout
    } else {
        RemoteSyncError::Network(e.to_string())
    }
}

fn classify(
    call: Call,
    status: StatusCode,
    body: String,
) -> Result<Option<String>, RemoteSyncError> {
    if status.is_success() {
        return Ok(Some(body));
    }

    let code = status.as_u16();
    match status {
        StatusCode::NOT_FOUND if matches!(call, Call::Fetch | Call::Delete) => Ok(None),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(RemoteSyncError::AuthRejected { status: code })
        }
        s if s.is_server_error() => {
            tracing::error!(
                status = %s,
                body = %body.chars().take(500).collect::<String>(),
                "Remote cart service returned server error"
            );
            Err(RemoteSyncError::Server {
                status: code,
                message: ErrorBody::message_from(&body),
            })
        }
        _ => Err(RemoteSyncError::Rejected {
            status: code,
            message: ErrorBody::message_from(&body),
        }),
    }
}
