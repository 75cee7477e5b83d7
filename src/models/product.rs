use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::models::generate_id;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub user_id: String,
    pub external_id: String, // Marketplace product id
    pub sku: String,
    pub name: String,

    // Pricing
    pub price: Decimal,
    /// Minimum acceptable price. Zero means no floor.
    pub floor_price: Decimal,
    pub competitor_min_price: Option<Decimal>,
    pub currency: String,
    pub last_price_check_at: Option<DateTime<Utc>>,

    // Repricing gate
    pub repricing_enabled: bool,
    pub current_stock: i64,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage shape of [`Product`]. Prices are kept as decimal text so they
/// round-trip without binary float error.
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: String,
    pub user_id: String,
    pub external_id: String,
    pub sku: String,
    pub name: String,
    pub price: String,
    pub floor_price: String,
    pub competitor_min_price: Option<String>,
    pub currency: String,
    pub last_price_check_at: Option<DateTime<Utc>>,
    pub repricing_enabled: bool,
    pub current_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub user_id: String,
    pub external_id: String,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub currency: Option<String>,
    pub current_stock: i64,
}

impl Product {
    pub fn new(new_product: NewProduct) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            user_id: new_product.user_id,
            external_id: new_product.external_id,
            sku: new_product.sku,
            name: new_product.name,
            price: new_product.price,
            floor_price: Decimal::ZERO,
            competitor_min_price: None,
            currency: new_product.currency.unwrap_or_else(|| "KZT".to_string()),
            last_price_check_at: None,
            repricing_enabled: false,
            current_stock: new_product.current_stock,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_floor(&self) -> bool {
        self.floor_price > Decimal::ZERO
    }

    /// Whether a repricing cycle should consider this product at all.
    pub fn is_repricing_eligible(&self) -> bool {
        self.repricing_enabled && self.current_stock > 0
    }
}

fn parse_price(field: &str, value: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(value)
        .map_err(|e| AppError::Internal(format!("Corrupt {} value {:?}: {}", field, value, e)))
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let competitor_min_price = row
            .competitor_min_price
            .as_deref()
            .map(|value| parse_price("competitor_min_price", value))
            .transpose()?;

        Ok(Self {
            price: parse_price("price", &row.price)?,
            floor_price: parse_price("floor_price", &row.floor_price)?,
            competitor_min_price,
            id: row.id,
            user_id: row.user_id,
            external_id: row.external_id,
            sku: row.sku,
            name: row.name,
            currency: row.currency,
            last_price_check_at: row.last_price_check_at,
            repricing_enabled: row.repricing_enabled,
            current_stock: row.current_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
