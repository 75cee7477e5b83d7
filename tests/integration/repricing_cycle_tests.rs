use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use wiremock::MockServer;

use seller_repricer::models::RepricingOutcome;
use seller_repricer::store::{ProductStore, SqliteCredentialSource};
use seller_repricer::AppError;

use super::*;

#[tokio::test]
async fn test_cycle_undercuts_cheapest_competitor() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 15500, 0).await?;
    mount_offers(&server, "alice", "1001", &[15000, 16200]).await;
    mount_publish(&server, "alice", "1001", 14999, 1).await;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;

    assert_eq!(report.users_processed, 1);
    assert_eq!(report.counts.updated, 1);

    let stored = load_product(&pool, &product.id).await?;
    assert_eq!(stored.price, Decimal::from(14999));
    assert_eq!(stored.competitor_min_price, Some(Decimal::from(15000)));
    assert!(stored.last_price_check_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_cycle_respects_floor() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 10800, 10000).await?;
    mount_offers(&server, "alice", "1001", &[10000]).await;
    forbid_publish(&server, "alice", "1001").await;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;
    assert_eq!(report.counts.skipped_floor_guard, 1);

    let stored = load_product(&pool, &product.id).await?;
    assert_eq!(stored.price, Decimal::from(10800));
    assert_eq!(stored.competitor_min_price, Some(Decimal::from(10000)));
    assert!(stored.last_price_check_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_cycle_without_competitors_leaves_product_untouched() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 9000, 5000).await?;
    mount_offers(&server, "alice", "1001", &[]).await;
    forbid_publish(&server, "alice", "1001").await;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;
    assert_eq!(report.counts.skipped_no_competitors, 1);

    let stored = load_product(&pool, &product.id).await?;
    assert_eq!(stored.price, product.price);
    assert_eq!(stored.competitor_min_price, None);
    assert!(stored.last_price_check_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_cycle_already_optimal() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 17999, 0).await?;
    mount_offers(&server, "alice", "1001", &[20000, 18000]).await;
    forbid_publish(&server, "alice", "1001").await;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;
    assert_eq!(report.counts.skipped_already_optimal, 1);

    let stored = load_product(&pool, &product.id).await?;
    assert_eq!(stored.price, Decimal::from(17999));
    assert_eq!(stored.competitor_min_price, Some(Decimal::from(18000)));
    Ok(())
}

#[tokio::test]
async fn test_failures_do_not_spread_across_products_or_users() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    seed_user(&pool, "bob").await?;

    let broken = seed_product(&pool, "alice", "A", 500, 0).await?;
    let healthy = seed_product(&pool, "alice", "B", 500, 0).await?;
    let other_user = seed_product(&pool, "bob", "C", 800, 0).await?;

    mount_offers_failure(&server, "alice", "A", 500).await;
    forbid_publish(&server, "alice", "A").await;
    mount_offers(&server, "alice", "B", &[450]).await;
    mount_publish(&server, "alice", "B", 449, 1).await;
    mount_offers(&server, "bob", "C", &[700]).await;
    mount_publish(&server, "bob", "C", 699, 1).await;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;

    assert_eq!(report.users_processed, 2);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.updated, 2);

    let alice = report.users.iter().find(|u| u.user_id == "alice").unwrap();
    assert_eq!(alice.outcome_for(&broken.id), Some(RepricingOutcome::Failed));
    assert_eq!(alice.outcome_for(&healthy.id), Some(RepricingOutcome::Updated));

    assert_eq!(load_product(&pool, &broken.id).await?.price, Decimal::from(500));
    assert_eq!(load_product(&pool, &healthy.id).await?.price, Decimal::from(449));
    assert_eq!(load_product(&pool, &other_user.id).await?.price, Decimal::from(699));
    Ok(())
}

#[tokio::test]
async fn test_rejected_publish_keeps_stored_price() -> anyhow::Result<()> {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 15500, 0).await?;
    mount_offers(&server, "alice", "1001", &[15000]).await;
    Mock::given(method("PUT"))
        .and(path("/merchants/M-alice/products/1001/price"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;
    assert_eq!(report.counts.failed, 1);

    let stored = load_product(&pool, &product.id).await?;
    assert_eq!(stored.price, Decimal::from(15500));
    assert_eq!(stored.competitor_min_price, None);
    assert!(stored.last_price_check_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_inactive_keys_are_not_processed() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    seed_product(&pool, "alice", "1001", 15500, 0).await?;
    SqliteCredentialSource::new(pool.clone())
        .set_active("alice", false)
        .await?;

    let report = build_repricer(&config, &pool)?.run_cycle().await?;

    assert_eq!(report.users_total, 0);
    assert_eq!(report.counts.total(), 0);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_enable_then_run_for_user() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 15500, 0).await?;

    let repricer = build_repricer(&config, &pool)?;
    repricer.disable_repricing(&product.id).await?;

    // Disabled products are not listed.
    let report = repricer.run_for_user("alice").await?;
    assert_eq!(report.counts.total(), 0);

    mount_offers(&server, "alice", "1001", &[12000]).await;
    mount_publish(&server, "alice", "1001", 11999, 1).await;

    let enabled = repricer
        .enable_repricing(&product.id, Decimal::from(11000))
        .await?;
    assert!(enabled.repricing_enabled);

    let report = repricer.run_for_user(&enabled.user_id).await?;
    assert_eq!(report.outcome_for(&product.id), Some(RepricingOutcome::Updated));

    let stored = load_product(&pool, &product.id).await?;
    assert_eq!(stored.price, Decimal::from(11999));
    assert_eq!(stored.floor_price, Decimal::from(11000));
    Ok(())
}

#[tokio::test]
async fn test_run_for_unknown_user() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    let result = build_repricer(&config, &pool)?.run_for_user("nobody").await;

    assert!(matches!(result, Err(AppError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_enable_rejects_negative_floor() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 15500, 0).await?;

    let result = build_repricer(&config, &pool)?
        .enable_repricing(&product.id, Decimal::from(-5))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(load_product(&pool, &product.id).await?.floor_price, Decimal::ZERO);
    Ok(())
}

/// Lands a cycle's price write in the middle of the first toggle call,
/// after any read the toggle makes and before its own write.
struct CycleWritesDuringToggle {
    inner: SqliteProductStore,
    product_id: String,
    written: AtomicBool,
}

impl CycleWritesDuringToggle {
    async fn cycle_write(&self) -> seller_repricer::Result<()> {
        if !self.written.swap(true, Ordering::SeqCst) {
            self.inner
                .update_price(&self.product_id, Decimal::from(14999), Decimal::from(15000))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for CycleWritesDuringToggle {
    async fn list_repricing_eligible(&self, user_id: &str) -> seller_repricer::Result<Vec<Product>> {
        self.inner.list_repricing_eligible(user_id).await
    }

    async fn update_price(
        &self,
        product_id: &str,
        new_price: Decimal,
        competitor_min: Decimal,
    ) -> seller_repricer::Result<()> {
        self.inner.update_price(product_id, new_price, competitor_min).await
    }

    async fn get_by_id(&self, product_id: &str) -> seller_repricer::Result<Option<Product>> {
        let product = self.inner.get_by_id(product_id).await?;
        self.cycle_write().await?;
        Ok(product)
    }

    async fn update(&self, product: &Product) -> seller_repricer::Result<()> {
        self.inner.update(product).await
    }

    async fn set_repricing(
        &self,
        product_id: &str,
        enabled: bool,
        floor_price: Option<Decimal>,
    ) -> seller_repricer::Result<Option<Product>> {
        self.cycle_write().await?;
        self.inner.set_repricing(product_id, enabled, floor_price).await
    }
}

#[tokio::test]
async fn test_toggle_keeps_price_published_meanwhile() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let config = get_test_config(&server.uri());
    let pool = create_test_db(&config).await?;

    seed_user(&pool, "alice").await?;
    let product = seed_product(&pool, "alice", "1001", 15500, 0).await?;

    for enable in [true, false] {
        let products = CycleWritesDuringToggle {
            inner: SqliteProductStore::new(pool.clone()),
            product_id: product.id.clone(),
            written: AtomicBool::new(false),
        };
        let repricer = Repricer::from_config(
            Arc::new(SqliteCredentialSource::new(pool.clone())),
            Arc::new(products),
            Arc::new(KaspiConnector::new(&config.marketplace)?),
            &config.repricing,
        );

        let returned = if enable {
            repricer.enable_repricing(&product.id, Decimal::from(100)).await?
        } else {
            repricer.disable_repricing(&product.id).await?
        };
        assert_eq!(returned.repricing_enabled, enable);
        assert_eq!(returned.price, Decimal::from(14999));

        let stored = load_product(&pool, &product.id).await?;
        assert_eq!(stored.price, Decimal::from(14999));
        assert_eq!(stored.competitor_min_price, Some(Decimal::from(15000)));
        assert_eq!(stored.floor_price, Decimal::from(100));
        assert_eq!(stored.current_stock, 10);
        assert_eq!(stored.repricing_enabled, enable);
    }
    Ok(())
}
