use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{min_competitor_price, CompetitorPrice, RepricingOutcome};

/// Undercut applied when nothing else is configured: one currency unit.
pub const DEFAULT_MARGIN: Decimal = Decimal::ONE;

/// What the engine wants done with one product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Update {
        new_price: Decimal,
        competitor_min: Decimal,
    },
    SkipNoCompetitors,
    SkipFloorGuard {
        candidate: Decimal,
        competitor_min: Decimal,
    },
    SkipAlreadyOptimal {
        competitor_min: Decimal,
    },
}

impl Decision {
    /// Minimum competitor price observed, when there was one. Callers persist
    /// it for every variant except `SkipNoCompetitors`.
    pub fn competitor_min(&self) -> Option<Decimal> {
        match self {
            Decision::Update { competitor_min, .. }
            | Decision::SkipFloorGuard { competitor_min, .. }
            | Decision::SkipAlreadyOptimal { competitor_min } => Some(*competitor_min),
            Decision::SkipNoCompetitors => None,
        }
    }

    pub fn outcome(&self) -> RepricingOutcome {
        match self {
            Decision::Update { .. } => RepricingOutcome::Updated,
            Decision::SkipNoCompetitors => RepricingOutcome::SkippedNoCompetitors,
            Decision::SkipFloorGuard { .. } => RepricingOutcome::SkippedFloorGuard,
            Decision::SkipAlreadyOptimal { .. } => RepricingOutcome::SkippedAlreadyOptimal,
        }
    }
}

/// Pure pricing rule: undercut the cheapest competitor by `margin`, never
/// going below the seller's floor or below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepricingEngine {
    margin: Decimal,
}

impl Default for RepricingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

impl RepricingEngine {
    /// Negative margins are treated as zero.
    pub fn new(margin: Decimal) -> Self {
        Self {
            margin: margin.max(Decimal::ZERO),
        }
    }

    pub fn margin(&self) -> Decimal {
        self.margin
    }

    /// `floor_price` of zero (or less) means the seller set no floor.
    /// Observations with a negative price are ignored.
    pub fn decide(
        &self,
        current_price: Decimal,
        floor_price: Decimal,
        observations: &[CompetitorPrice],
    ) -> Decision {
        let Some(competitor_min) = min_competitor_price(observations) else {
            return Decision::SkipNoCompetitors;
        };

        let candidate = (competitor_min - self.margin).max(Decimal::ZERO);

        if floor_price > Decimal::ZERO && candidate < floor_price {
            return Decision::SkipFloorGuard {
                candidate,
                competitor_min,
            };
        }

        if candidate == current_price {
            return Decision::SkipAlreadyOptimal { competitor_min };
        }

        Decision::Update {
            new_price: candidate,
            competitor_min,
        }
    }
}
