//! Scan scheduler: one background loop runs the fetch -> match -> enrich ->
//! compute pipeline and publishes each finished cycle as an immutable
//! snapshot on a watch channel. Cycles never overlap — manual refresh
//! requests queue on a channel and any that arrive mid-scan are drained
//! after it, so a burst collapses into at most one extra cycle.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::adapters::PlatformAdapter;
use crate::alerts::AlertEvaluator;
use crate::error::AppError;
use crate::config::{Config, DEBUG_TITLE_SAMPLE, REFRESH_CHANNEL_CAPACITY};
use crate::enricher::enrich_candidates;
use crate::matcher::{match_markets, SimilarityScorer};
use crate::opportunity::compute_opportunities;
use crate::types::{DebugTrace, Market, ScanSnapshot, ScanStats};

/// Shared access to the scheduler from the API layer.
#[derive(Clone)]
pub struct SchedulerHandle {
    refresh_tx: mpsc::Sender<()>,
    snapshot_rx: watch::Receiver<Arc<ScanSnapshot>>,
}

impl SchedulerHandle {
    /// Latest published snapshot. Before the first cycle completes this is
    /// the empty default with `completed_at == 0`.
    pub fn snapshot(&self) -> Arc<ScanSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Request an out-of-band scan. Returns false when the request queue is
    /// full, in which case a scan is already pending anyway.
    pub fn request_refresh(&self) -> bool {
        self.refresh_tx.try_send(()).is_ok()
    }
}

pub struct ScanScheduler {
    polymarket: Arc<dyn PlatformAdapter>,
    kalshi: Arc<dyn PlatformAdapter>,
    scorer: Box<dyn SimilarityScorer>,
    evaluator: Arc<AlertEvaluator>,
    config: Config,
    snapshot_tx: watch::Sender<Arc<ScanSnapshot>>,
    refresh_rx: mpsc::Receiver<()>,
}

impl ScanScheduler {
    pub fn new(
        polymarket: Arc<dyn PlatformAdapter>,
        kalshi: Arc<dyn PlatformAdapter>,
        scorer: Box<dyn SimilarityScorer>,
        evaluator: Arc<AlertEvaluator>,
        config: Config,
    ) -> (Self, SchedulerHandle) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(ScanSnapshot::default()));
        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);

        let scheduler = Self {
            polymarket,
            kalshi,
            scorer,
            evaluator,
            config,
            snapshot_tx,
            refresh_rx,
        };
        let handle = SchedulerHandle {
            refresh_tx,
            snapshot_rx,
        };
        (scheduler, handle)
    }

    /// Drive scan cycles until `shutdown` flips. Consumes the scheduler —
    /// there is exactly one loop per process.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.config.scan_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(()) = self.refresh_rx.recv() => {
                    info!("manual refresh requested");
                }
                _ = shutdown.changed() => {
                    info!("scan scheduler shutting down");
                    return;
                }
            }

            // Racing the cycle against shutdown drops in-flight fetches
            // instead of letting them run to completion; partial work from
            // an aborted cycle is discarded, never published.
            let snapshot = tokio::select! {
                snapshot = self.run_cycle() => Arc::new(snapshot),
                _ = shutdown.changed() => {
                    warn!(error = %AppError::ScanAborted, "cycle cancelled, partial results discarded");
                    return;
                }
            };
            if snapshot.cycle_failed {
                error!("scan cycle failed on both platforms");
            } else {
                info!(
                    polymarket = snapshot.stats.polymarket_count,
                    kalshi = snapshot.stats.kalshi_count,
                    matched = snapshot.stats.matched_pairs,
                    opportunities = snapshot.stats.opportunities_found,
                    "scan cycle complete"
                );
            }
            let fired = self.evaluator.evaluate(&snapshot).await;
            if fired > 0 {
                info!(fired, "alerts triggered this cycle");
            }
            let _ = self.snapshot_tx.send(snapshot);

            // Refreshes that queued while scanning are satisfied by the scan
            // that just finished.
            while self.refresh_rx.try_recv().is_ok() {}
        }
    }

    /// One full scan cycle. Platform failures degrade to warnings — the
    /// cycle is marked failed only when neither platform produced listings.
    pub async fn run_cycle(&self) -> ScanSnapshot {
        let (poly_result, kalshi_result) = tokio::join!(
            self.polymarket.fetch_markets(None),
            self.kalshi.fetch_markets(None),
        );

        let mut warnings = Vec::new();
        let polymarket = unwrap_listings(poly_result, &mut warnings);
        let kalshi = unwrap_listings(kalshi_result, &mut warnings);

        if polymarket.is_empty() && kalshi.is_empty() && warnings.len() == 2 {
            return ScanSnapshot {
                warnings,
                cycle_failed: true,
                completed_at: now_millis(),
                ..ScanSnapshot::default()
            };
        }

        let outcome = match_markets(
            &polymarket,
            &kalshi,
            self.config.min_similarity,
            self.scorer.as_ref(),
        );
        let matched_pairs = outcome.candidates.len();

        let (enriched, orderbook_errors) = enrich_candidates(
            Arc::clone(&self.polymarket),
            Arc::clone(&self.kalshi),
            outcome.candidates,
        )
        .await;
        if !orderbook_errors.is_empty() {
            warnings.push(format!(
                "{} orderbook fetches failed this cycle",
                orderbook_errors.len(),
            ));
        }

        let completed_at = now_millis();
        let opportunities = compute_opportunities(
            &enriched,
            self.config.min_spread_percent,
            None,
            self.config.result_limit,
            completed_at,
        );

        let stats = ScanStats {
            polymarket_count: polymarket.len(),
            kalshi_count: kalshi.len(),
            comparison_attempts: outcome.comparison_attempts,
            matched_pairs,
            opportunities_found: opportunities.len(),
        };
        let debug = DebugTrace {
            sample_polymarket_titles: sample_titles(&polymarket),
            sample_kalshi_titles: sample_titles(&kalshi),
            top_matches: outcome.top_matches,
            orderbook_errors,
        };

        ScanSnapshot {
            opportunities,
            stats,
            warnings,
            debug,
            cycle_failed: false,
            completed_at,
        }
    }
}

fn unwrap_listings(
    result: crate::error::Result<Vec<Market>>,
    warnings: &mut Vec<String>,
) -> Vec<Market> {
    match result {
        Ok(markets) => markets,
        Err(e) => {
            warn!(error = %e, "platform listing fetch failed");
            warnings.push(e.to_string());
            Vec::new()
        }
    }
}

fn sample_titles(markets: &[Market]) -> Vec<String> {
    markets
        .iter()
        .take(DEBUG_TITLE_SAMPLE)
        .map(|m| m.raw_title.clone())
        .collect()
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sqlx::SqlitePool;

    use crate::alerts::AlertStore;
    use crate::error::{AppError, Result};
    use crate::matcher::normalize;
    use crate::matcher::TokenOverlapScorer;
    use crate::types::{Category, Orderbook, PlatformId, PriceLevel};

    struct StubAdapter {
        platform: PlatformId,
        markets: Vec<Market>,
        fail_listings: bool,
        book: Orderbook,
    }

    #[async_trait]
    impl PlatformAdapter for StubAdapter {
        fn platform(&self) -> PlatformId {
            self.platform
        }

        async fn fetch_markets(&self, _category: Option<Category>) -> Result<Vec<Market>> {
            if self.fail_listings {
                return Err(AppError::AdapterUnavailable {
                    platform: self.platform,
                    endpoint: "/markets".to_string(),
                    detail: "connection refused".to_string(),
                });
            }
            Ok(self.markets.clone())
        }

        async fn fetch_orderbook(&self, _market: &Market) -> Result<Orderbook> {
            Ok(self.book.clone())
        }
    }

    fn market(platform: PlatformId, id: &str, title: &str) -> Market {
        Market {
            platform,
            external_id: id.to_string(),
            raw_title: title.to_string(),
            normalized_title: normalize::normalize(title),
            entities: normalize::extract_entities(title),
            category: Category::Crypto,
            yes_price: 0.5,
            no_price: 0.5,
            volume: 1000.0,
            liquidity: 500.0,
            url: String::new(),
            book_id: id.to_string(),
        }
    }

    fn book(bid: f64, ask: f64) -> Orderbook {
        Orderbook {
            bids: vec![PriceLevel { price: bid, size: 100.0 }],
            asks: vec![PriceLevel { price: ask, size: 100.0 }],
        }
    }

    async fn test_evaluator() -> Arc<AlertEvaluator> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        Arc::new(AlertEvaluator::new(AlertStore::new(pool)))
    }

    fn test_config() -> Config {
        Config {
            gamma_api_url: String::new(),
            clob_api_url: String::new(),
            kalshi_api_url: String::new(),
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            scan_interval_secs: 30,
            min_similarity: 65.0,
            min_spread_percent: 0.0,
            result_limit: 50,
            max_markets_per_platform: 200,
        }
    }

    async fn scheduler(
        poly: StubAdapter,
        kalshi: StubAdapter,
    ) -> (ScanScheduler, SchedulerHandle) {
        ScanScheduler::new(
            Arc::new(poly),
            Arc::new(kalshi),
            Box::new(TokenOverlapScorer::new()),
            test_evaluator().await,
            test_config(),
        )
    }

    #[tokio::test]
    async fn full_cycle_produces_consistent_snapshot() {
        let poly = StubAdapter {
            platform: PlatformId::Polymarket,
            markets: vec![market(PlatformId::Polymarket, "p1", "bitcoin above 100k by march")],
            fail_listings: false,
            book: book(0.49, 0.50),
        };
        let kalshi = StubAdapter {
            platform: PlatformId::Kalshi,
            markets: vec![market(PlatformId::Kalshi, "k1", "bitcoin above 100k by march")],
            fail_listings: false,
            book: book(0.55, 0.56),
        };

        let (scheduler, _) = scheduler(poly, kalshi).await;
        let snap = scheduler.run_cycle().await;

        assert!(!snap.cycle_failed);
        assert_eq!(snap.stats.polymarket_count, 1);
        assert_eq!(snap.stats.kalshi_count, 1);
        assert_eq!(snap.stats.comparison_attempts, 1);
        assert_eq!(snap.stats.matched_pairs, 1);
        assert_eq!(snap.stats.opportunities_found, 1);
        assert_eq!(snap.opportunities.len(), snap.stats.opportunities_found);
        assert!(snap.completed_at > 0);
        // Buy the cheap Polymarket ask, sell into the Kalshi bid.
        assert_eq!(snap.opportunities[0].buy_platform, PlatformId::Polymarket);
    }

    #[tokio::test]
    async fn one_unreachable_platform_degrades_without_panicking() {
        let poly = StubAdapter {
            platform: PlatformId::Polymarket,
            markets: vec![],
            fail_listings: true,
            book: Orderbook::default(),
        };
        let markets: Vec<Market> = (0..50)
            .map(|i| {
                market(
                    PlatformId::Kalshi,
                    &format!("k{i}"),
                    &format!("bitcoin above {i}k by march"),
                )
            })
            .collect();
        let kalshi = StubAdapter {
            platform: PlatformId::Kalshi,
            markets,
            fail_listings: false,
            book: book(0.55, 0.56),
        };

        let (scheduler, _) = scheduler(poly, kalshi).await;
        let snap = scheduler.run_cycle().await;

        assert!(!snap.cycle_failed);
        assert_eq!(snap.stats.polymarket_count, 0);
        assert_eq!(snap.stats.kalshi_count, 50);
        assert_eq!(snap.stats.matched_pairs, 0);
        assert!(snap.opportunities.is_empty());
        assert_eq!(snap.warnings.len(), 1);
        assert!(snap.warnings[0].contains("unavailable"));
    }

    #[tokio::test]
    async fn both_platforms_down_marks_cycle_failed() {
        let poly = StubAdapter {
            platform: PlatformId::Polymarket,
            markets: vec![],
            fail_listings: true,
            book: Orderbook::default(),
        };
        let kalshi = StubAdapter {
            platform: PlatformId::Kalshi,
            markets: vec![],
            fail_listings: true,
            book: Orderbook::default(),
        };

        let (scheduler, _) = scheduler(poly, kalshi).await;
        let snap = scheduler.run_cycle().await;

        assert!(snap.cycle_failed);
        assert_eq!(snap.warnings.len(), 2);
        assert!(snap.opportunities.is_empty());
    }

    #[tokio::test]
    async fn handle_serves_default_snapshot_before_first_cycle() {
        let poly = StubAdapter {
            platform: PlatformId::Polymarket,
            markets: vec![],
            fail_listings: false,
            book: Orderbook::default(),
        };
        let kalshi = StubAdapter {
            platform: PlatformId::Kalshi,
            markets: vec![],
            fail_listings: false,
            book: Orderbook::default(),
        };

        let (_scheduler, handle) = scheduler(poly, kalshi).await;
        let snap = handle.snapshot();
        assert_eq!(snap.completed_at, 0);
        assert!(snap.opportunities.is_empty());
    }

    struct SlowCountingAdapter {
        platform: PlatformId,
        calls: Arc<std::sync::atomic::AtomicUsize>,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl PlatformAdapter for SlowCountingAdapter {
        fn platform(&self) -> PlatformId {
            self.platform
        }

        async fn fetch_markets(&self, _category: Option<Category>) -> Result<Vec<Market>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }

        async fn fetch_orderbook(&self, _market: &Market) -> Result<Orderbook> {
            Ok(Orderbook::default())
        }
    }

    // Runs on the real clock: SQLite work and `completed_at` use real
    // threads/wall time, which a paused tokio clock auto-advances past.
    #[tokio::test]
    async fn mid_scan_refreshes_coalesce_into_the_running_cycle() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let calls = Arc::new(AtomicUsize::new(0));
        let poly = SlowCountingAdapter {
            platform: PlatformId::Polymarket,
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(500),
        };
        let kalshi = SlowCountingAdapter {
            platform: PlatformId::Kalshi,
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_millis(500),
        };

        let mut cfg = test_config();
        // Keep the timer out of the way so only the first immediate tick
        // and explicit refreshes can start cycles.
        cfg.scan_interval_secs = 3600;
        let (scan_scheduler, handle) = ScanScheduler::new(
            Arc::new(poly),
            Arc::new(kalshi),
            Box::new(TokenOverlapScorer::new()),
            test_evaluator().await,
            cfg,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(scan_scheduler.run(shutdown_rx));

        // Wait for the first cycle (immediate tick) to start.
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Burst of refreshes while the scan is in flight.
        for _ in 0..4 {
            assert!(handle.request_refresh());
        }

        // Let the in-flight cycle finish and the loop drain its queue.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(handle.snapshot().completed_at > 0);

        // Plenty of time for a second cycle to have run if the burst had
        // been queued instead of coalesced.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "mid-scan refreshes must be satisfied by the in-flight cycle"
        );

        // A refresh arriving after the scan starts exactly one new cycle.
        assert!(handle.request_refresh());
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let _ = shutdown_tx.send(true);
        let _ = task.await;
    }

    #[tokio::test]
    async fn refresh_requests_coalesce_when_queue_fills() {
        let poly = StubAdapter {
            platform: PlatformId::Polymarket,
            markets: vec![],
            fail_listings: false,
            book: Orderbook::default(),
        };
        let kalshi = StubAdapter {
            platform: PlatformId::Kalshi,
            markets: vec![],
            fail_listings: false,
            book: Orderbook::default(),
        };

        let (_scheduler, handle) = scheduler(poly, kalshi).await;
        // Nothing consumes the channel here, so beyond capacity the request
        // reports as already pending rather than blocking.
        for _ in 0..REFRESH_CHANNEL_CAPACITY {
            assert!(handle.request_refresh());
        }
        assert!(!handle.request_refresh());
    }
}
