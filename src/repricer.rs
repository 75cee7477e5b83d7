use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use validator::{Validate, ValidationError};

use crate::config::RepricingConfig;
use crate::marketplace::{CompetitorPriceSource, MarketplaceConnector};
use crate::models::{
    CycleReport, Credential, Product, ProductOutcome, RepricingOutcome, UserReport,
};
use crate::repricing::{Decision, RepricingEngine};
use crate::store::{CredentialSource, ProductStore};
use crate::utils::error::AppError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepricerSettings {
    /// Bound on each competitor fetch and each price publish.
    pub request_timeout: Duration,
    pub max_concurrent_products: usize,
}

impl Default for RepricerSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            max_concurrent_products: 4,
        }
    }
}

impl From<&RepricingConfig> for RepricerSettings {
    fn from(config: &RepricingConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_concurrent_products: config.max_concurrent_products.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnableRepricingRequest {
    #[validate(length(min = 1, message = "product id must not be empty"))]
    pub product_id: String,
    #[validate(custom(function = "validate_floor_price"))]
    pub floor_price: Decimal,
}

fn validate_floor_price(floor_price: &Decimal) -> std::result::Result<(), ValidationError> {
    if *floor_price < Decimal::ZERO {
        return Err(ValidationError::new("negative_floor_price"));
    }
    Ok(())
}

/// Walks every seller's eligible products, undercuts the cheapest competitor
/// and keeps the product store in step with what was published.
pub struct Repricer {
    credentials: Arc<dyn CredentialSource>,
    products: Arc<dyn ProductStore>,
    connector: Arc<dyn MarketplaceConnector>,
    engine: RepricingEngine,
    settings: RepricerSettings,
    // Held for the whole of a cycle or an on-demand run.
    cycle_lock: Mutex<()>,
    shutdown: watch::Receiver<bool>,
}

impl Repricer {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        products: Arc<dyn ProductStore>,
        connector: Arc<dyn MarketplaceConnector>,
        engine: RepricingEngine,
        settings: RepricerSettings,
    ) -> Self {
        // The sender is dropped right away, so the flag stays `false`
        // until `with_shutdown` installs a real one.
        let (_, shutdown) = watch::channel(false);

        Self {
            credentials,
            products,
            connector,
            engine,
            settings,
            cycle_lock: Mutex::new(()),
            shutdown,
        }
    }

    pub fn from_config(
        credentials: Arc<dyn CredentialSource>,
        products: Arc<dyn ProductStore>,
        connector: Arc<dyn MarketplaceConnector>,
        config: &RepricingConfig,
    ) -> Self {
        Self::new(
            credentials,
            products,
            connector,
            RepricingEngine::new(config.margin),
            RepricerSettings::from(config),
        )
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn settings(&self) -> RepricerSettings {
        self.settings
    }

    /// Resolves once no cycle or on-demand run holds the lock.
    pub async fn wait_idle(&self) {
        let _guard = self.cycle_lock.lock().await;
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs one full cycle over every active credential, waiting for any
    /// cycle already in progress. Only a failure to enumerate credentials
    /// is returned as an error.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        self.run_cycle_locked().await
    }

    /// Like [`Repricer::run_cycle`], but returns `None` instead of waiting
    /// when another cycle holds the lock.
    pub async fn try_run_cycle(&self) -> Option<Result<CycleReport>> {
        let _guard = self.cycle_lock.try_lock().ok()?;
        Some(self.run_cycle_locked().await)
    }

    /// On-demand run for one seller.
    pub async fn run_for_user(&self, user_id: &str) -> Result<UserReport> {
        let credential = self
            .credentials
            .credential_for_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("active marketplace key for user {}", user_id),
            })?;

        let _guard = self.cycle_lock.lock().await;
        self.process_credential(&credential).await
    }

    pub async fn run_for_credential(&self, credential: &Credential) -> Result<UserReport> {
        let _guard = self.cycle_lock.lock().await;
        self.process_credential(credential).await
    }

    async fn run_cycle_locked(&self) -> Result<CycleReport> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let credentials = match self.credentials.list_active_credentials().await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list marketplace credentials, aborting cycle");
                counter!("repricer_cycles_total", "status" => "failed").increment(1);
                return Err(e);
            }
        };

        tracing::info!(users = credentials.len(), "Starting repricing cycle");
        let mut report = CycleReport::new(started_at, credentials.len());

        for credential in &credentials {
            if self.is_shutting_down() {
                tracing::info!("Shutdown requested, not starting further users");
                report.cancelled = true;
                break;
            }

            match self.process_credential(credential).await {
                Ok(user_report) => report.add_user(user_report),
                Err(e) => {
                    tracing::error!(
                        user_id = %credential.user_id,
                        error = %e,
                        "Skipping user for this cycle"
                    );
                    report.add_failed_user();
                }
            }
        }

        report.finished_at = Utc::now();
        histogram!("repricer_cycle_duration_seconds").record(timer.elapsed().as_secs_f64());
        let status = if report.cancelled { "cancelled" } else { "completed" };
        counter!("repricer_cycles_total", "status" => status).increment(1);

        tracing::info!(
            users_processed = report.users_processed,
            users_failed = report.users_failed,
            updated = report.counts.updated,
            skipped = report.counts.skipped(),
            failed = report.counts.failed,
            duration_secs = report.duration_secs(),
            "Repricing cycle finished"
        );

        Ok(report)
    }

    /// Client construction and product listing failures are fatal to the
    /// user; everything after that is contained per product.
    async fn process_credential(&self, credential: &Credential) -> Result<UserReport> {
        let user_id = credential.user_id.as_str();
        let source = self.connector.connect(credential)?;
        let products = self.products.list_repricing_eligible(user_id).await?;

        let mut seen = HashSet::new();
        let products: Vec<Product> = products
            .into_iter()
            .filter(|p| p.is_repricing_eligible() && seen.insert(p.id.clone()))
            .collect();

        tracing::debug!(user_id, products = products.len(), "Repricing user");

        let source = source.as_ref();
        let results: Vec<Option<ProductOutcome>> = stream::iter(products)
            .map(|product| async move {
                // Products already in flight finish; no new ones start.
                if self.is_shutting_down() {
                    return None;
                }
                Some(self.process_product(source, product).await)
            })
            .buffer_unordered(self.settings.max_concurrent_products.max(1))
            .collect()
            .await;

        let mut report = UserReport::new(user_id);
        for result in results {
            match result {
                Some(outcome) => report.push(outcome),
                None => report.cancelled = true,
            }
        }

        tracing::info!(
            user_id,
            updated = report.counts.updated,
            skipped = report.counts.skipped(),
            failed = report.counts.failed,
            "User repricing finished"
        );

        Ok(report)
    }

    async fn process_product(
        &self,
        source: &dyn CompetitorPriceSource,
        product: Product,
    ) -> ProductOutcome {
        let outcome = match self.reprice(source, &product).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    user_id = %product.user_id,
                    product_id = %product.id,
                    external_id = %product.external_id,
                    error = %e,
                    upstream = e.is_upstream(),
                    "Failed to reprice product"
                );
                ProductOutcome {
                    product_id: product.id.clone(),
                    external_id: product.external_id.clone(),
                    outcome: RepricingOutcome::Failed,
                    old_price: product.price,
                    new_price: None,
                    competitor_min_price: None,
                    error: Some(e.to_string()),
                }
            }
        };

        counter!("repricer_products_total", "outcome" => outcome.outcome.as_str()).increment(1);
        outcome
    }

    async fn reprice(
        &self,
        source: &dyn CompetitorPriceSource,
        product: &Product,
    ) -> Result<ProductOutcome> {
        let observations = self
            .bounded("competitor price fetch", source.competitor_prices(&product.external_id))
            .await?;

        for observation in observations.iter().filter(|o| o.price.is_sign_negative()) {
            tracing::warn!(
                product_id = %product.id,
                seller = %observation.seller_name,
                price = %observation.price,
                "Ignoring negative competitor price"
            );
        }

        let decision = self
            .engine
            .decide(product.price, product.floor_price, &observations);

        let new_price = match decision {
            Decision::Update {
                new_price,
                competitor_min,
            } => {
                self.bounded(
                    "price publish",
                    source.publish_price(&product.external_id, new_price),
                )
                .await?;

                if let Err(e) = self
                    .products
                    .update_price(&product.id, new_price, competitor_min)
                    .await
                {
                    tracing::error!(
                        product_id = %product.id,
                        %new_price,
                        error = %e,
                        "Price published but not stored"
                    );
                    return Err(e);
                }

                tracing::info!(
                    user_id = %product.user_id,
                    product_id = %product.id,
                    old_price = %product.price,
                    %new_price,
                    %competitor_min,
                    "Price updated"
                );
                Some(new_price)
            }
            Decision::SkipFloorGuard { competitor_min, .. }
            | Decision::SkipAlreadyOptimal { competitor_min } => {
                self.products
                    .update_price(&product.id, product.price, competitor_min)
                    .await?;
                None
            }
            Decision::SkipNoCompetitors => None,
        };

        if decision.outcome().is_skip() {
            tracing::debug!(
                product_id = %product.id,
                outcome = decision.outcome().as_str(),
                "Product left unchanged"
            );
        }

        Ok(ProductOutcome {
            product_id: product.id.clone(),
            external_id: product.external_id.clone(),
            outcome: decision.outcome(),
            old_price: product.price,
            new_price,
            competitor_min_price: decision.competitor_min(),
            error: None,
        })
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout {
                operation: operation.to_string(),
                seconds: self.settings.request_timeout.as_secs_f64(),
            }),
        }
    }

    /// Turns repricing on for a product with the given floor (zero for none).
    pub async fn enable_repricing(&self, product_id: &str, floor_price: Decimal) -> Result<Product> {
        let request = EnableRepricingRequest {
            product_id: product_id.to_string(),
            floor_price,
        };
        request.validate()?;

        let product = self
            .set_repricing(product_id, true, Some(request.floor_price))
            .await?;

        tracing::info!(
            product_id,
            %floor_price,
            has_floor = product.has_floor(),
            "Repricing enabled"
        );
        Ok(product)
    }

    /// Turns repricing off. The floor is kept for when it is re-enabled.
    pub async fn disable_repricing(&self, product_id: &str) -> Result<Product> {
        let product = self.set_repricing(product_id, false, None).await?;

        tracing::info!(product_id, "Repricing disabled");
        Ok(product)
    }

    // Touches only the flag and floor, so prices written by a running cycle
    // and stock from inventory sync survive the toggle.
    async fn set_repricing(
        &self,
        product_id: &str,
        enabled: bool,
        floor_price: Option<Decimal>,
    ) -> Result<Product> {
        self.products
            .set_repricing(product_id, enabled, floor_price)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("product {}", product_id),
            })
    }
}
