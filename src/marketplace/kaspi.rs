use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::traits::{CompetitorPriceSource, MarketplaceConnector};
use crate::config::MarketplaceConfig;
use crate::models::{CompetitorPrice, Credential};
use crate::utils::error::AppError;
use crate::Result;

/// Upper bound on how much of an error body ends up in logs.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<CompetitorPrice>,
}

#[derive(Debug, Serialize)]
struct PriceUpdateRequest {
    price: Decimal,
}

/// Kaspi merchant API client for one merchant.
#[derive(Clone)]
pub struct KaspiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    merchant_id: String,
}

impl KaspiClient {
    pub fn new(http: Client, base_url: Url, credential: &Credential) -> Self {
        Self {
            http,
            base_url,
            api_key: credential.api_key.clone(),
            merchant_id: credential.merchant_id.clone(),
        }
    }

    /// Ids are appended as single path segments, so `/` or `?` inside an id
    /// is percent-encoded instead of changing the resource.
    fn product_url(&self, external_id: &str, suffix: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Validation(format!("unusable marketplace base URL {}", self.base_url))
            })?
            .pop_if_empty()
            .extend([
                "merchants",
                self.merchant_id.as_str(),
                "products",
                external_id,
                suffix,
            ]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.api_key)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(AppError::Marketplace {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body
            },
        })
    }
}

#[async_trait]
impl CompetitorPriceSource for KaspiClient {
    async fn competitor_prices(&self, external_id: &str) -> Result<Vec<CompetitorPrice>> {
        let url = self.product_url(external_id, "offers")?;
        let response = self.authorize(self.http.get(url)).send().await?;

        // A product nobody else sells has no offers resource.
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(external_id, "No competitor offers found");
            return Ok(Vec::new());
        }

        let response = Self::ensure_success(response).await?;
        let offers: OffersResponse = response.json().await?;
        Ok(offers.data)
    }

    async fn publish_price(&self, external_id: &str, new_price: Decimal) -> Result<()> {
        let url = self.product_url(external_id, "price")?;
        let response = self
            .authorize(self.http.put(url))
            .json(&PriceUpdateRequest { price: new_price })
            .send()
            .await?;

        Self::ensure_success(response).await?;
        tracing::debug!(external_id, %new_price, merchant_id = %self.merchant_id, "Price published");
        Ok(())
    }
}

/// Hands out [`KaspiClient`]s that share one connection pool.
pub struct KaspiConnector {
    http: Client,
    base_url: Url,
}

impl KaspiConnector {
    pub fn new(config: &MarketplaceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AppError::Validation(format!("invalid marketplace base URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "marketplace base URL {} cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self { http, base_url })
    }
}

impl MarketplaceConnector for KaspiConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn CompetitorPriceSource>> {
        if credential.api_key.trim().is_empty() {
            return Err(AppError::Credential(format!(
                "empty API key for user {}",
                credential.user_id
            )));
        }
        if credential.merchant_id.trim().is_empty() {
            return Err(AppError::Credential(format!(
                "empty merchant id for user {}",
                credential.user_id
            )));
        }

        Ok(Arc::new(KaspiClient::new(
            self.http.clone(),
            self.base_url.clone(),
            credential,
        )))
    }
}
