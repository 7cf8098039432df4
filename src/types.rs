use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Polymarket,
    Kalshi,
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlatformId::Polymarket => "polymarket",
            PlatformId::Kalshi => "kalshi",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sports,
    Weather,
    Crypto,
    Politics,
    Economics,
    Other,
}

impl Category {
    pub fn parse(s: &str) -> Category {
        match s.to_lowercase().as_str() {
            "sports" => Category::Sports,
            "weather" | "climate" => Category::Weather,
            "crypto" | "cryptocurrency" => Category::Crypto,
            "politics" | "elections" => Category::Politics,
            "economics" | "financials" => Category::Economics,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Sports => "sports",
            Category::Weather => "weather",
            Category::Crypto => "crypto",
            Category::Politics => "politics",
            Category::Economics => "economics",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Market — one listed contract on one platform, snapshot per scan cycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub platform: PlatformId,
    pub external_id: String,
    pub raw_title: String,
    pub normalized_title: String,
    /// Extracted comparable tokens, lowercased, deduplicated, source order.
    pub entities: Vec<String>,
    pub category: Category,
    pub yes_price: f64,
    pub no_price: f64,
    pub volume: f64,
    pub liquidity: f64,
    pub url: String,
    /// Platform-specific order-book lookup handle: CLOB token id on
    /// Polymarket, market ticker on Kalshi.
    pub book_id: String,
}

// ---------------------------------------------------------------------------
// Orderbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Orderbook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl Orderbook {
    /// Lowest ask with positive size, if any.
    pub fn best_ask(&self) -> Option<f64> {
        self.asks
            .iter()
            .filter(|l| l.size > 0.0 && l.price > 0.0)
            .map(|l| l.price)
            .fold(None, |best, p| match best {
                Some(b) if b <= p => Some(b),
                _ => Some(p),
            })
    }

    /// Highest bid with positive size, if any.
    pub fn best_bid(&self) -> Option<f64> {
        self.bids
            .iter()
            .filter(|l| l.size > 0.0 && l.price > 0.0)
            .map(|l| l.price)
            .fold(None, |best, p| match best {
                Some(b) if b >= p => Some(b),
                _ => Some(p),
            })
    }
}

// ---------------------------------------------------------------------------
// MatchCandidate — a proposed cross-platform pairing, cycle-scoped
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub polymarket: Market,
    pub kalshi: Market,
    /// 0–100 similarity over normalized titles (100 = identical).
    pub score: f64,
    /// Entities present on one side but absent from the other, when both
    /// sides have extractable entities.
    pub entity_mismatch: Vec<String>,
    pub passed: bool,
    pub rationale: String,
}

/// Bounded diagnostic view of a scored pairing, kept for the debug trace.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub polymarket_title: String,
    pub kalshi_title: String,
    pub score: f64,
    pub passed: bool,
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// ArbOpportunity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ArbOpportunity {
    /// Deterministic hash of the two external ids — stable across cycles so
    /// alerts can correlate the same underlying pairing.
    pub id: String,
    pub title: String,
    pub buy_platform: PlatformId,
    pub buy_price: f64,
    pub sell_platform: PlatformId,
    pub sell_price: f64,
    /// (sell - buy) / buy * 100, always >= 0 for surfaced opportunities.
    pub spread_percent: f64,
    /// Title-similarity score of the underlying match, for read-time filters.
    pub match_score: f64,
    pub category: Category,
    pub polymarket_id: String,
    pub kalshi_id: String,
    /// Unix milliseconds.
    pub discovered_at: i64,
}

// ---------------------------------------------------------------------------
// Scan output — published atomically by the scheduler each cycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub polymarket_count: usize,
    pub kalshi_count: usize,
    pub comparison_attempts: u64,
    pub matched_pairs: usize,
    pub opportunities_found: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderbookError {
    pub platform: PlatformId,
    pub external_id: String,
    pub error: String,
}

/// Diagnostic extras, kept apart from the production stats so production
/// responses never carry them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugTrace {
    pub sample_polymarket_titles: Vec<String>,
    pub sample_kalshi_titles: Vec<String>,
    pub top_matches: Vec<MatchSummary>,
    pub orderbook_errors: Vec<OrderbookError>,
}

/// Immutable result of one scan cycle. Replaced wholesale on publish —
/// subscribers never observe a mix of two cycles.
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    pub opportunities: Vec<ArbOpportunity>,
    pub stats: ScanStats,
    pub warnings: Vec<String>,
    pub debug: DebugTrace,
    /// True when both platform fetches failed and the cycle produced nothing.
    pub cycle_failed: bool,
    /// Unix milliseconds of cycle completion; 0 before the first cycle.
    pub completed_at: i64,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    /// Fires when the observed spread crosses up through the target.
    Above,
    /// Fires when the observed spread crosses down through the target.
    Below,
}

impl AlertDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertDirection::Above => "above",
            AlertDirection::Below => "below",
        }
    }

    pub fn parse(s: &str) -> Option<AlertDirection> {
        match s {
            "above" => Some(AlertDirection::Above),
            "below" => Some(AlertDirection::Below),
            _ => None,
        }
    }
}

/// What an alert watches: one concrete market, or a whole category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum MarketRef {
    Market {
        platform: PlatformId,
        external_id: String,
    },
    Category {
        category: Category,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: i64,
    pub owner_id: String,
    pub market_ref: MarketRef,
    pub direction: AlertDirection,
    pub target_spread_percent: f64,
    pub is_active: bool,
    /// Unix milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggeredAlert {
    pub id: i64,
    pub alert_id: i64,
    /// Unix milliseconds.
    pub triggered_at: i64,
    pub observed_spread: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
