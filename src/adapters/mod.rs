//! Platform adapters: fetch + schema translation only, no matching logic.
//! Every call carries an enforced timeout and maps failures to errors tagged
//! with the platform and endpoint — a Market is either complete or absent.

pub mod kalshi;
pub mod polymarket;

pub use kalshi::KalshiAdapter;
pub use polymarket::PolymarketAdapter;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Category, Market, Orderbook, PlatformId};

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> PlatformId;

    /// Fetch active listings, optionally restricted to one category,
    /// normalized into the common Market schema.
    async fn fetch_markets(&self, category: Option<Category>) -> Result<Vec<Market>>;

    /// Fetch the live order book for a previously fetched market.
    async fn fetch_orderbook(&self, market: &Market) -> Result<Orderbook>;
}
