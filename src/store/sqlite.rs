use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use super::traits::{CredentialSource, ProductStore};
use crate::models::{Credential, MarketplaceKey, Product, ProductRow};
use crate::utils::error::AppError;
use crate::Result;

const PRODUCT_COLUMNS: &str = "id, user_id, external_id, sku, name, price, floor_price, \
     competitor_min_price, currency, last_price_check_at, repricing_enabled, current_stock, \
     created_at, updated_at";

#[derive(Clone)]
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a product, replacing an existing row for the same
    /// `(user_id, external_id)`.
    pub async fn upsert(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, user_id, external_id, sku, name, price, floor_price, \
                                   competitor_min_price, currency, last_price_check_at, \
                                   repricing_enabled, current_stock, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (user_id, external_id) DO UPDATE SET \
                sku = excluded.sku, \
                name = excluded.name, \
                price = excluded.price, \
                currency = excluded.currency, \
                current_stock = excluded.current_stock, \
                updated_at = excluded.updated_at",
        )
        .bind(&product.id)
        .bind(&product.user_id)
        .bind(&product.external_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(product.floor_price.to_string())
        .bind(product.competitor_min_price.map(|p| p.to_string()))
        .bind(&product.currency)
        .bind(product.last_price_check_at)
        .bind(product.repricing_enabled)
        .bind(product.current_stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn list_repricing_eligible(&self, user_id: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products \
             WHERE user_id = ? AND repricing_enabled = 1 AND current_stock > 0 \
             ORDER BY created_at, id",
            PRODUCT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn update_price(&self, product_id: &str, new_price: Decimal, competitor_min: Decimal) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products \
             SET price = ?, competitor_min_price = ?, last_price_check_at = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(new_price.to_string())
        .bind(competitor_min.to_string())
        .bind(now)
        .bind(now)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("product {}", product_id),
            });
        }
        Ok(())
    }

    async fn get_by_id(&self, product_id: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = ?",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products \
             SET sku = ?, name = ?, price = ?, floor_price = ?, competitor_min_price = ?, \
                 currency = ?, last_price_check_at = ?, repricing_enabled = ?, \
                 current_stock = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(product.floor_price.to_string())
        .bind(product.competitor_min_price.map(|p| p.to_string()))
        .bind(&product.currency)
        .bind(product.last_price_check_at)
        .bind(product.repricing_enabled)
        .bind(product.current_stock)
        .bind(Utc::now())
        .bind(&product.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("product {}", product.id),
            });
        }
        Ok(())
    }

    async fn set_repricing(
        &self,
        product_id: &str,
        enabled: bool,
        floor_price: Option<Decimal>,
    ) -> Result<Option<Product>> {
        let result = sqlx::query(
            "UPDATE products \
             SET repricing_enabled = ?, floor_price = COALESCE(?, floor_price), updated_at = ? \
             WHERE id = ?",
        )
        .bind(enabled)
        .bind(floor_price.map(|p| p.to_string()))
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(product_id).await
    }
}

#[derive(Clone)]
pub struct SqliteCredentialSource {
    pool: SqlitePool,
}

impl SqliteCredentialSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a seller's key, replacing the previous one for that user.
    pub async fn save_key(&self, key: &MarketplaceKey) -> Result<()> {
        sqlx::query(
            "INSERT INTO marketplace_keys (id, user_id, api_key, merchant_id, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET \
                api_key = excluded.api_key, \
                merchant_id = excluded.merchant_id, \
                is_active = excluded.is_active, \
                updated_at = excluded.updated_at",
        )
        .bind(&key.id)
        .bind(&key.user_id)
        .bind(&key.api_key)
        .bind(&key.merchant_id)
        .bind(key.is_active)
        .bind(key.created_at)
        .bind(key.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_active(&self, user_id: &str, is_active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE marketplace_keys SET is_active = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(is_active)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("marketplace key for user {}", user_id),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialSource for SqliteCredentialSource {
    async fn list_active_credentials(&self) -> Result<Vec<Credential>> {
        let keys = sqlx::query_as::<_, MarketplaceKey>(
            "SELECT id, user_id, api_key, merchant_id, is_active, created_at, updated_at \
             FROM marketplace_keys WHERE is_active = 1 ORDER BY created_at, user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(keys.iter().map(MarketplaceKey::to_credential).collect())
    }

    async fn credential_for_user(&self, user_id: &str) -> Result<Option<Credential>> {
        let key = sqlx::query_as::<_, MarketplaceKey>(
            "SELECT id, user_id, api_key, merchant_id, is_active, created_at, updated_at \
             FROM marketplace_keys WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key.as_ref().map(MarketplaceKey::to_credential))
    }
}
