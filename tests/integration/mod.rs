// Shared fixtures for the integration suite: an in-memory database,
// a config pointing at a wiremock server, and Kaspi endpoint mocks.

pub mod repricing_cycle_tests;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seller_repricer::config::{
    DatabaseConfig, LoggingConfig, MarketplaceConfig, MetricsConfig, RepricingConfig,
    SchedulerConfig,
};
use seller_repricer::marketplace::KaspiConnector;
use seller_repricer::models::{MarketplaceKey, NewProduct, Product};
use seller_repricer::store::{self, SqliteCredentialSource, SqliteProductStore};
use seller_repricer::{AppConfig, Repricer};

/// Test configuration for integration tests
pub fn get_test_config(marketplace_url: &str) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 10,
        },
        marketplace: MarketplaceConfig {
            base_url: marketplace_url.to_string(),
            user_agent: "SellerRepricer-Test/1.0".to_string(),
            request_timeout: 5,
        },
        repricing: RepricingConfig {
            margin: Decimal::ONE,
            request_timeout_secs: 2,
            max_concurrent_products: 2,
        },
        scheduler: SchedulerConfig {
            interval_secs: 3600,
            run_on_startup: false,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            directory: None,
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
        },
    }
}

pub async fn create_test_db(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let pool = store::connect(&config.database).await?;
    store::migrate(&pool).await?;
    Ok(pool)
}

pub fn build_repricer(config: &AppConfig, pool: &SqlitePool) -> anyhow::Result<Repricer> {
    Ok(Repricer::from_config(
        Arc::new(SqliteCredentialSource::new(pool.clone())),
        Arc::new(SqliteProductStore::new(pool.clone())),
        Arc::new(KaspiConnector::new(&config.marketplace)?),
        &config.repricing,
    ))
}

pub fn api_key_for(user_id: &str) -> String {
    format!("token-{}", user_id)
}

pub fn merchant_for(user_id: &str) -> String {
    format!("M-{}", user_id)
}

pub async fn seed_user(pool: &SqlitePool, user_id: &str) -> anyhow::Result<()> {
    let key = MarketplaceKey::new(user_id.to_string(), api_key_for(user_id), merchant_for(user_id));
    SqliteCredentialSource::new(pool.clone()).save_key(&key).await?;
    Ok(())
}

pub async fn seed_product(
    pool: &SqlitePool,
    user_id: &str,
    external_id: &str,
    price: i64,
    floor: i64,
) -> anyhow::Result<Product> {
    let mut product = Product::new(NewProduct {
        user_id: user_id.to_string(),
        external_id: external_id.to_string(),
        sku: format!("SKU-{}", external_id),
        name: format!("Listing {}", external_id),
        price: Decimal::from(price),
        currency: None,
        current_stock: 10,
    });
    product.floor_price = Decimal::from(floor);
    product.repricing_enabled = true;

    SqliteProductStore::new(pool.clone()).upsert(&product).await?;
    Ok(product)
}

pub async fn load_product(pool: &SqlitePool, product_id: &str) -> anyhow::Result<Product> {
    use seller_repricer::store::ProductStore;

    SqliteProductStore::new(pool.clone())
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {} vanished", product_id))
}

fn product_path(user_id: &str, external_id: &str, suffix: &str) -> String {
    format!(
        "/merchants/{}/products/{}/{}",
        merchant_for(user_id),
        external_id,
        suffix
    )
}

pub async fn mount_offers(server: &MockServer, user_id: &str, external_id: &str, prices: &[i64]) {
    let data: Vec<_> = prices
        .iter()
        .enumerate()
        .map(|(i, price)| json!({ "seller_name": format!("Rival {}", i + 1), "price": price }))
        .collect();

    Mock::given(method("GET"))
        .and(path(product_path(user_id, external_id, "offers")))
        .and(header("authorization", format!("Bearer {}", api_key_for(user_id)).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

pub async fn mount_offers_failure(server: &MockServer, user_id: &str, external_id: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(product_path(user_id, external_id, "offers")))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream exploded"))
        .mount(server)
        .await;
}

/// Expects exactly `times` publishes of `price` for the listing.
pub async fn mount_publish(
    server: &MockServer,
    user_id: &str,
    external_id: &str,
    price: i64,
    times: u64,
) {
    Mock::given(method("PUT"))
        .and(path(product_path(user_id, external_id, "price")))
        .and(body_json(json!({ "price": price as f64 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(times)
        .mount(server)
        .await;
}

/// Fails the test (on server drop) if the listing is published at all.
pub async fn forbid_publish(server: &MockServer, user_id: &str, external_id: &str) {
    Mock::given(method("PUT"))
        .and(path(product_path(user_id, external_id, "price")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}
