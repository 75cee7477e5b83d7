use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::models::{CompetitorPrice, Credential};
use crate::Result;

/// Marketplace API bound to a single seller's credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompetitorPriceSource: Send + Sync {
    /// Current competing offers for a product. May be empty; prices are
    /// never negative.
    async fn competitor_prices(&self, external_id: &str) -> Result<Vec<CompetitorPrice>>;

    /// Publish a new price for the seller's own offer.
    async fn publish_price(&self, external_id: &str, new_price: Decimal) -> Result<()>;
}

/// Builds a [`CompetitorPriceSource`] for a credential.
#[cfg_attr(test, mockall::automock)]
pub trait MarketplaceConnector: Send + Sync {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn CompetitorPriceSource>>;
}
