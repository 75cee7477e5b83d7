pub mod kaspi;
pub mod traits;

pub use kaspi::{KaspiClient, KaspiConnector};
pub use traits::{CompetitorPriceSource, MarketplaceConnector};
