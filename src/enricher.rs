//! Order-book enrichment for passed candidates: both sides fetched
//! concurrently per pair, pairs fanned out under a fixed concurrency cap.
//! A failed fetch drops only its own pair — the batch always returns
//! whatever succeeded.

use std::sync::Arc;

use futures_util::{stream, StreamExt};
use tracing::debug;

use crate::adapters::PlatformAdapter;
use crate::config::ORDERBOOK_CONCURRENCY;
use crate::types::{MatchCandidate, Orderbook, OrderbookError, PlatformId};

/// A passed candidate with both live order books attached.
#[derive(Debug, Clone)]
pub struct EnrichedPair {
    pub candidate: MatchCandidate,
    pub polymarket_book: Orderbook,
    pub kalshi_book: Orderbook,
}

/// Fetch order books for every candidate with bounded concurrency. Returns
/// the successfully enriched pairs plus one error record per failed side.
pub async fn enrich_candidates(
    polymarket: Arc<dyn PlatformAdapter>,
    kalshi: Arc<dyn PlatformAdapter>,
    candidates: Vec<MatchCandidate>,
) -> (Vec<EnrichedPair>, Vec<OrderbookError>) {
    let results: Vec<(Option<EnrichedPair>, Vec<OrderbookError>)> = stream::iter(candidates)
        .map(|candidate| {
            let polymarket = Arc::clone(&polymarket);
            let kalshi = Arc::clone(&kalshi);
            async move {
                let (poly_book, kalshi_book) = tokio::join!(
                    polymarket.fetch_orderbook(&candidate.polymarket),
                    kalshi.fetch_orderbook(&candidate.kalshi),
                );

                let mut errors = Vec::new();
                if let Err(e) = &poly_book {
                    errors.push(OrderbookError {
                        platform: PlatformId::Polymarket,
                        external_id: candidate.polymarket.external_id.clone(),
                        error: e.to_string(),
                    });
                }
                if let Err(e) = &kalshi_book {
                    errors.push(OrderbookError {
                        platform: PlatformId::Kalshi,
                        external_id: candidate.kalshi.external_id.clone(),
                        error: e.to_string(),
                    });
                }

                match (poly_book, kalshi_book) {
                    (Ok(polymarket_book), Ok(kalshi_book)) => (
                        Some(EnrichedPair {
                            candidate,
                            polymarket_book,
                            kalshi_book,
                        }),
                        errors,
                    ),
                    _ => (None, errors),
                }
            }
        })
        .buffer_unordered(ORDERBOOK_CONCURRENCY)
        .collect()
        .await;

    let mut pairs = Vec::new();
    let mut errors = Vec::new();
    for (pair, errs) in results {
        if let Some(pair) = pair {
            pairs.push(pair);
        }
        errors.extend(errs);
    }

    if !errors.is_empty() {
        debug!(
            enriched = pairs.len(),
            failed = errors.len(),
            "orderbook enrichment completed with partial failures"
        );
    }

    (pairs, errors)
}
