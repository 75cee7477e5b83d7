use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One competing offer for a product, as reported by the marketplace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitorPrice {
    pub seller_name: String,
    pub price: Decimal,
}

impl CompetitorPrice {
    pub fn new(seller_name: impl Into<String>, price: Decimal) -> Self {
        Self {
            seller_name: seller_name.into(),
            price,
        }
    }
}

/// Cheapest offer among `prices`. Negative prices are not valid offers and
/// are left out; `None` when no valid offer remains.
pub fn min_competitor_price(prices: &[CompetitorPrice]) -> Option<Decimal> {
    prices
        .iter()
        .map(|p| p.price)
        .filter(|price| !price.is_sign_negative())
        .min()
}
