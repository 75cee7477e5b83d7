use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{Credential, Product};
use crate::Result;

/// System of record for products. Each write is atomic per product.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Products of `user_id` with repricing enabled and stock above zero.
    async fn list_repricing_eligible(&self, user_id: &str) -> Result<Vec<Product>>;

    /// Sets price and competitor minimum, and bumps the last-checked timestamp.
    async fn update_price(&self, product_id: &str, new_price: Decimal, competitor_min: Decimal) -> Result<()>;

    async fn get_by_id(&self, product_id: &str) -> Result<Option<Product>>;

    async fn update(&self, product: &Product) -> Result<()>;

    /// Sets only the repricing flag and, when given, the floor. Price,
    /// competitor data and stock are left as they are. Returns the product
    /// after the change, or `None` when it does not exist.
    async fn set_repricing(
        &self,
        product_id: &str,
        enabled: bool,
        floor_price: Option<Decimal>,
    ) -> Result<Option<Product>>;
}

/// Resolves sellers' decrypted marketplace credentials.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn list_active_credentials(&self) -> Result<Vec<Credential>>;

    async fn credential_for_user(&self, user_id: &str) -> Result<Option<Credential>>;
}
