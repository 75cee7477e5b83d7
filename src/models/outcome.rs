use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Terminal state of one product within one cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RepricingOutcome {
    Updated,
    SkippedAlreadyOptimal,
    SkippedFloorGuard,
    SkippedNoCompetitors,
    Failed,
}

impl RepricingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepricingOutcome::Updated => "updated",
            RepricingOutcome::SkippedAlreadyOptimal => "skipped_already_optimal",
            RepricingOutcome::SkippedFloorGuard => "skipped_floor_guard",
            RepricingOutcome::SkippedNoCompetitors => "skipped_no_competitors",
            RepricingOutcome::Failed => "failed",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            RepricingOutcome::SkippedAlreadyOptimal
                | RepricingOutcome::SkippedFloorGuard
                | RepricingOutcome::SkippedNoCompetitors
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductOutcome {
    pub product_id: String,
    pub external_id: String,
    pub outcome: RepricingOutcome,
    pub old_price: Decimal,
    pub new_price: Option<Decimal>,
    pub competitor_min_price: Option<Decimal>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub updated: u64,
    pub skipped_already_optimal: u64,
    pub skipped_floor_guard: u64,
    pub skipped_no_competitors: u64,
    pub failed: u64,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: RepricingOutcome) {
        match outcome {
            RepricingOutcome::Updated => self.updated += 1,
            RepricingOutcome::SkippedAlreadyOptimal => self.skipped_already_optimal += 1,
            RepricingOutcome::SkippedFloorGuard => self.skipped_floor_guard += 1,
            RepricingOutcome::SkippedNoCompetitors => self.skipped_no_competitors += 1,
            RepricingOutcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &OutcomeCounts) {
        self.updated += other.updated;
        self.skipped_already_optimal += other.skipped_already_optimal;
        self.skipped_floor_guard += other.skipped_floor_guard;
        self.skipped_no_competitors += other.skipped_no_competitors;
        self.failed += other.failed;
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_already_optimal + self.skipped_floor_guard + self.skipped_no_competitors
    }

    pub fn total(&self) -> u64 {
        self.updated + self.skipped() + self.failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserReport {
    pub user_id: String,
    pub counts: OutcomeCounts,
    pub products: Vec<ProductOutcome>,
    /// Set when shutdown stopped the run before every product was visited.
    pub cancelled: bool,
}

impl UserReport {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            counts: OutcomeCounts::default(),
            products: Vec::new(),
            cancelled: false,
        }
    }

    pub fn push(&mut self, outcome: ProductOutcome) {
        self.counts.record(outcome.outcome);
        self.products.push(outcome);
    }

    pub fn outcome_for(&self, product_id: &str) -> Option<RepricingOutcome> {
        self.products
            .iter()
            .find(|p| p.product_id == product_id)
            .map(|p| p.outcome)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub users_total: usize,
    pub users_processed: usize,
    pub users_failed: usize,
    pub counts: OutcomeCounts,
    pub users: Vec<UserReport>,
    pub cancelled: bool,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>, users_total: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            users_total,
            users_processed: 0,
            users_failed: 0,
            counts: OutcomeCounts::default(),
            users: Vec::new(),
            cancelled: false,
        }
    }

    pub fn add_user(&mut self, report: UserReport) {
        self.users_processed += 1;
        self.counts.merge(&report.counts);
        self.cancelled |= report.cancelled;
        self.users.push(report);
    }

    pub fn add_failed_user(&mut self) {
        self.users_failed += 1;
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}
