//! Polymarket adapter: Gamma REST API for listings, CLOB REST API for
//! order books.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Config, ADAPTER_TIMEOUT_SECS, ORDERBOOK_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::matcher::normalize::{extract_entities, normalize};
use crate::types::{Category, Market, Orderbook, PlatformId, PriceLevel};

use super::PlatformAdapter;

pub struct PolymarketAdapter {
    client: reqwest::Client,
    gamma_url: String,
    clob_url: String,
    max_markets: usize,
}

impl PolymarketAdapter {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ADAPTER_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            gamma_url: cfg.gamma_api_url.clone(),
            clob_url: cfg.clob_api_url.clone(),
            max_markets: cfg.max_markets_per_platform,
        })
    }

    fn map_error(&self, endpoint: &str, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::AdapterTimeout {
                platform: PlatformId::Polymarket,
                endpoint: endpoint.to_string(),
            }
        } else {
            AppError::AdapterUnavailable {
                platform: PlatformId::Polymarket,
                endpoint: endpoint.to_string(),
                detail: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for PolymarketAdapter {
    fn platform(&self) -> PlatformId {
        PlatformId::Polymarket
    }

    async fn fetch_markets(&self, category: Option<Category>) -> Result<Vec<Market>> {
        let url = format!(
            "{}/markets?active=true&closed=false&limit={}&order=volume24hr&ascending=false",
            self.gamma_url, self.max_markets,
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error("/markets", e))?;
        if !resp.status().is_success() {
            return Err(AppError::AdapterUnavailable {
                platform: PlatformId::Polymarket,
                endpoint: "/markets".to_string(),
                detail: format!("HTTP {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| self.map_error("/markets", e))?;
        let items = body.as_array().ok_or_else(|| AppError::AdapterUnavailable {
            platform: PlatformId::Polymarket,
            endpoint: "/markets".to_string(),
            detail: "response was not an array".to_string(),
        })?;

        let mut markets = Vec::new();
        let mut skipped = 0usize;
        for item in items {
            match parse_gamma_market(item) {
                Some(market) => {
                    if category.map_or(true, |c| market.category == c) {
                        markets.push(market);
                    }
                }
                None => skipped += 1,
            }
        }
        debug!(
            fetched = markets.len(),
            skipped, "polymarket listings parsed"
        );
        Ok(markets)
    }

    // Order-book failures are per-pair and non-fatal upstream, so they all
    // map to OrderbookFetch tagged with the market rather than the
    // platform-level adapter errors.
    async fn fetch_orderbook(&self, market: &Market) -> Result<Orderbook> {
        let url = format!("{}/book?token_id={}", self.clob_url, market.book_id);
        let book_error = |detail: String| AppError::OrderbookFetch {
            platform: PlatformId::Polymarket,
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
        Ok(parse_clob_book(&body))
    }
}

/// Parse one Gamma market object into the common schema. Returns None when
/// the listing is structurally unusable (missing ids, tokens, or outcomes) —
/// a partial Market is never produced.
fn parse_gamma_market(v: &serde_json::Value) -> Option<Market> {
    let external_id = v.get("conditionId")?.as_str()?.to_string();

    // Gamma double-encodes these as JSON strings inside JSON.
    let token_ids: Vec<String> = serde_json::from_str(v.get("clobTokenIds")?.as_str()?).ok()?;
    let outcomes: Vec<String> = serde_json::from_str(v.get("outcomes")?.as_str()?).ok()?;
    if token_ids.len() < 2 || outcomes.len() < 2 {
        return None;
    }

    let yes_idx = outcomes
        .iter()
        .position(|o| o.eq_ignore_ascii_case("Yes") || o.eq_ignore_ascii_case("Up"));
    let yes_idx = match yes_idx {
        Some(y) => y,
        None if outcomes.len() == 2 => 0,
        None => return None,
    };
    let yes_token_id = token_ids.get(yes_idx)?.clone();

    let raw_title = v.get("question")?.as_str()?.to_string();
    if raw_title.is_empty() {
        return None;
    }

    let prices: Vec<f64> = v
        .get("outcomePrices")
        .and_then(|p| p.as_str())
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .map(|v| v.iter().filter_map(|s| s.parse().ok()).collect())
        .unwrap_or_default();
    let yes_price = prices.get(yes_idx).copied().unwrap_or(0.0);
    let no_price = if yes_price > 0.0 { 1.0 - yes_price } else { 0.0 };

    let category = v
        .get("events")
        .and_then(|e| e.as_array())
        .and_then(|a| a.first())
        .and_then(|e| e.get("category"))
        .and_then(|c| c.as_str())
        .map(Category::parse)
        .unwrap_or(Category::Other);

    let volume = json_f64(v.get("volume24hr")).unwrap_or(0.0);
    let liquidity = json_f64(v.get("liquidityNum")).unwrap_or(0.0);

    let url = v
        .get("slug")
        .and_then(|s| s.as_str())
        .map(|slug| format!("https://polymarket.com/event/{slug}"))
        .unwrap_or_default();

    Some(Market {
        platform: PlatformId::Polymarket,
        external_id,
        normalized_title: normalize(&raw_title),
        entities: extract_entities(&raw_title),
        raw_title,
        category,
        yes_price,
        no_price,
        volume,
        liquidity,
        url,
        book_id: yes_token_id,
    })
}

/// Numbers arrive either as JSON numbers or stringified floats.
fn json_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// CLOB `/book` levels are `{"price": "0.55", "size": "120"}` string pairs.
fn parse_clob_book(body: &serde_json::Value) -> Orderbook {
    let parse_side = |key: &str| -> Vec<PriceLevel> {
        body.get(key)
            .and_then(|a| a.as_array())
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|level| {
                        let price = level.get("price")?.as_str()?.parse().ok()?;
                        let size = level.get("size")?.as_str()?.parse().ok()?;
                        Some(PriceLevel { price, size })
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    Orderbook {
        bids: parse_side("bids"),
        asks: parse_side("asks"),
    }
}
