//! REST client for the venue's order API.
//!
//! Every request carries the current bearer token from the
//! [`TokenProvider`]. A 401 runs the provider's forced-logout path and fails
//! with [`ApiError::AuthExpired`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{AssetId, OrderId, PartyId, Side};
use crate::error::{ApiError, Result};
use crate::port::TokenProvider;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub action: Side,
    pub price: Decimal,
    pub product: String,
    pub monthyear: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub action: Side,
    pub price: Decimal,
    pub asset: AssetId,
    pub amount: Decimal,
    #[serde(default)]
    pub remaining: Option<Decimal>,
    #[serde(default)]
    pub matched: bool,
    pub status: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<PartyId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub asset: AssetId,
    pub price: Decimal,
    pub amount: Decimal,
    pub buyer_order_id: OrderId,
    pub seller_order_id: OrderId,
    #[serde(default)]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Resting bids and offers for one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDepth {
    pub asset: AssetId,
    #[serde(default)]
    pub bids: Vec<OrderRecord>,
    #[serde(default)]
    pub offers: Vec<OrderRecord>,
}

impl MarketDepth {
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|o| o.price).max()
    }

    #[must_use]
    pub fn best_offer(&self) -> Option<Decimal> {
        self.offers.iter().map(|o| o.price).min()
    }
}

#[derive(Deserialize)]
struct OrderEnvelope {
    order: OrderRecord,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketEnvelope {
    market_data: Vec<MarketDepth>,
}

#[derive(Deserialize)]
struct TradesEnvelope {
    trades: Vec<TradeRecord>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

/// HTTP client for the order API.
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, url = %url, "API request");
        let builder = self.http.request(method, url);
        match self.tokens.valid_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("API rejected credential");
            self.tokens.handle_auth_error();
            return Err(ApiError::AuthExpired.into());
        }
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            let message = body
                .error
                .or(body.detail)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(response.json::<T>().await?)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] for rejected requests and transport errors otherwise.
    pub async fn create_order(&self, order: &NewOrder) -> Result<OrderRecord> {
        let envelope: OrderEnvelope = self
            .execute(self.request(Method::POST, "/orders").json(order))
            .await?;
        Ok(envelope.order)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] for rejected requests and transport errors otherwise.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<String> {
        let envelope: MessageEnvelope = self
            .execute(self.request(Method::DELETE, &format!("/orders/{order_id}")))
            .await?;
        Ok(envelope.message)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] for rejected requests and transport errors otherwise.
    pub async fn update_order(
        &self,
        order_id: &OrderId,
        update: &OrderUpdate,
    ) -> Result<OrderRecord> {
        let path = format!("/orders/{order_id}");
        let envelope: OrderEnvelope = self
            .execute(self.request(Method::PUT, &path).json(update))
            .await?;
        Ok(envelope.order)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] for rejected requests and transport errors otherwise.
    pub async fn market_data(&self) -> Result<Vec<MarketDepth>> {
        let envelope: MarketEnvelope = self.execute(self.request(Method::GET, "/market")).await?;
        Ok(envelope.market_data)
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] for rejected requests and transport errors otherwise.
    pub async fn trades(&self) -> Result<Vec<TradeRecord>> {
        let envelope: TradesEnvelope = self.execute(self.request(Method::GET, "/trades")).await?;
        Ok(envelope.trades)
    }
}
