//! Spread computation over enriched candidates. Pure given its inputs —
//! all I/O happened upstream in the enricher.

use sha2::{Digest, Sha256};

use crate::enricher::EnrichedPair;
use crate::types::{ArbOpportunity, Category, PlatformId};

/// Compute buy/sell spreads for enriched pairs, filter, sort descending by
/// spread, and cap the result count.
///
/// The buy side is the platform with the lower best ask; the sell side is
/// the other platform's best bid. Pairs with a missing side, non-positive
/// buy price, or negative spread are dropped, not stored.
pub fn compute_opportunities(
    pairs: &[EnrichedPair],
    min_spread_percent: f64,
    category: Option<Category>,
    limit: usize,
    discovered_at: i64,
) -> Vec<ArbOpportunity> {
    let mut opportunities: Vec<ArbOpportunity> = pairs
        .iter()
        .filter_map(|pair| evaluate_pair(pair, discovered_at))
        .filter(|opp| opp.spread_percent >= min_spread_percent)
        .filter(|opp| category.map_or(true, |c| opp.category == c))
        .collect();

    opportunities.sort_by(|a, b| {
        b.spread_percent
            .partial_cmp(&a.spread_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    opportunities.truncate(limit);
    opportunities
}

fn evaluate_pair(pair: &EnrichedPair, discovered_at: i64) -> Option<ArbOpportunity> {
    // Only three quotes matter: both asks to pick the cheaper buy side, and
    // the other side's bid to sell into. The buy side's own bid is unused,
    // so a thin one-sided buy book must not drop the pair.
    let poly_ask = pair.polymarket_book.best_ask()?;
    let kalshi_ask = pair.kalshi_book.best_ask()?;

    let (buy_platform, buy_price, sell_platform, sell_price) = if poly_ask <= kalshi_ask {
        (
            PlatformId::Polymarket,
            poly_ask,
            PlatformId::Kalshi,
            pair.kalshi_book.best_bid()?,
        )
    } else {
        (
            PlatformId::Kalshi,
            kalshi_ask,
            PlatformId::Polymarket,
            pair.polymarket_book.best_bid()?,
        )
    };

    if buy_price <= 0.0 {
        return None;
    }

    let spread_percent = (sell_price - buy_price) / buy_price * 100.0;
    if spread_percent < 0.0 {
        return None;
    }

    let candidate = &pair.candidate;
    Some(ArbOpportunity {
        id: opportunity_id(
            &candidate.polymarket.external_id,
            &candidate.kalshi.external_id,
        ),
        title: candidate.polymarket.raw_title.clone(),
        buy_platform,
        buy_price,
        sell_platform,
        sell_price,
        spread_percent,
        match_score: candidate.score,
        category: candidate.polymarket.category,
        polymarket_id: candidate.polymarket.external_id.clone(),
        kalshi_id: candidate.kalshi.external_id.clone(),
        discovered_at,
    })
}

/// Deterministic id for a cross-platform pairing, stable across cycles and
/// restarts so alert history can correlate repeated sightings.
pub fn opportunity_id(polymarket_id: &str, kalshi_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(polymarket_id.as_bytes());
    hasher.update(b"::");
    hasher.update(kalshi_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
