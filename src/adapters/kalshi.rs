//! Kalshi adapter: public trade-api v2 REST endpoints. Prices arrive in
//! cents and are normalized to 0–1 probabilities.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Config, ADAPTER_TIMEOUT_SECS, ORDERBOOK_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::matcher::normalize::{extract_entities, normalize};
use crate::types::{Category, Market, Orderbook, PlatformId, PriceLevel};

use super::PlatformAdapter;

pub struct KalshiAdapter {
    client: reqwest::Client,
    base_url: String,
    max_markets: usize,
}

impl KalshiAdapter {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ADAPTER_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.kalshi_api_url.clone(),
            max_markets: cfg.max_markets_per_platform,
        })
    }

    fn map_error(&self, endpoint: &str, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::AdapterTimeout {
                platform: PlatformId::Kalshi,
                endpoint: endpoint.to_string(),
            }
        } else {
            AppError::AdapterUnavailable {
                platform: PlatformId::Kalshi,
                endpoint: endpoint.to_string(),
                detail: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for KalshiAdapter {
    fn platform(&self) -> PlatformId {
        PlatformId::Kalshi
    }

    async fn fetch_markets(&self, category: Option<Category>) -> Result<Vec<Market>> {
        let url = format!(
            "{}/markets?status=open&limit={}",
            self.base_url,
            self.max_markets.min(1000),
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error("/markets", e))?;
        if !resp.status().is_success() {
            return Err(AppError::AdapterUnavailable {
                platform: PlatformId::Kalshi,
                endpoint: "/markets".to_string(),
                detail: format!("HTTP {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| self.map_error("/markets", e))?;
        let items = body
            .get("markets")
            .and_then(|m| m.as_array())
            .ok_or_else(|| AppError::AdapterUnavailable {
                platform: PlatformId::Kalshi,
                endpoint: "/markets".to_string(),
                detail: "response missing markets array".to_string(),
            })?;

        let mut markets = Vec::new();
        let mut skipped = 0usize;
        for item in items {
            match parse_kalshi_market(item) {
                Some(market) => {
                    if category.map_or(true, |c| market.category == c) {
                        markets.push(market);
                    }
                }
                None => skipped += 1,
            }
            if markets.len() >= self.max_markets {
                break;
            }
        }
        debug!(fetched = markets.len(), skipped, "kalshi listings parsed");
        Ok(markets)
    }

    // Per-pair failures map to OrderbookFetch, never to the platform-level
    // adapter errors that would read as a whole-cycle problem.
    async fn fetch_orderbook(&self, market: &Market) -> Result<Orderbook> {
        let url = format!("{}/markets/{}/orderbook", self.base_url, market.book_id);
        let book_error = |detail: String| AppError::OrderbookFetch {
            platform: PlatformId::Kalshi,
            external_id: market.external_id.clone(),
            detail,
        };

        let resp = tokio::time::timeout(
            Duration::from_secs(ORDERBOOK_TIMEOUT_SECS),
            self.client.get(&url).send(),
        )
        .await
        .map_err(|_| book_error(format!("timed out after {ORDERBOOK_TIMEOUT_SECS}s")))?
        .map_err(|e| book_error(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(book_error(format!("HTTP {}", resp.status())));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| book_error(e.to_string()))?;
        Ok(parse_kalshi_book(&body))
    }
}

/// Parse one Kalshi market object into the common schema. Markets without a
/// ticker or title are unusable and skipped.
fn parse_kalshi_market(v: &serde_json::Value) -> Option<Market> {
    let ticker = v.get("ticker")?.as_str()?.to_string();
    let raw_title = v.get("title")?.as_str()?.to_string();
    if raw_title.is_empty() {
        return None;
    }

    let cents = |key: &str| v.get(key).and_then(|x| x.as_f64()).unwrap_or(0.0) / 100.0;
    let yes_bid = cents("yes_bid");
    let yes_ask = cents("yes_ask");
    let last = cents("last_price");
    let yes_price = if last > 0.0 {
        last
    } else if yes_bid > 0.0 && yes_ask > 0.0 {
        (yes_bid + yes_ask) / 2.0
    } else {
        yes_ask.max(yes_bid)
    };
    let no_price = if yes_price > 0.0 { 1.0 - yes_price } else { 0.0 };

    let category = v
        .get("category")
        .and_then(|c| c.as_str())
        .map(Category::parse)
        .unwrap_or(Category::Other);

    let volume = v.get("volume").and_then(|x| x.as_f64()).unwrap_or(0.0);
    let liquidity = v.get("liquidity").and_then(|x| x.as_f64()).unwrap_or(0.0) / 100.0;

    Some(Market {
        platform: PlatformId::Kalshi,
        external_id: ticker.clone(),
        normalized_title: normalize(&raw_title),
        entities: extract_entities(&raw_title),
        raw_title,
        category,
        yes_price,
        no_price,
        volume,
        liquidity,
        url: format!("https://kalshi.com/markets/{ticker}"),
        book_id: ticker,
    })
}

/// Kalshi books list resting YES and NO bids as `[price_cents, count]`
/// pairs. YES bids map directly; a resting NO bid at `p` is equivalent to a
/// YES ask at `100 - p`.
fn parse_kalshi_book(body: &serde_json::Value) -> Orderbook {
    let side = |key: &str| -> Vec<(f64, f64)> {
        body.get("orderbook")
            .and_then(|ob| ob.get(key))
            .and_then(|a| a.as_array())
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|level| {
                        let pair = level.as_array()?;
                        let price = pair.first()?.as_f64()?;
                        let size = pair.get(1)?.as_f64()?;
                        Some((price, size))
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    let bids = side("yes")
        .into_iter()
        .map(|(price, size)| PriceLevel {
            price: price / 100.0,
            size,
        })
        .collect();
    let asks = side("no")
        .into_iter()
        .map(|(price, size)| PriceLevel {
            price: (100.0 - price) / 100.0,
            size,
        })
        .collect();

    Orderbook { bids, asks }
}
