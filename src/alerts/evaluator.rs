//! Edge-triggered alert evaluation. Each published snapshot is checked
//! against every active alert; a trigger is recorded only on the transition
//! from condition-false to condition-true, so a spread that stays over the
//! target for many cycles produces one trigger, not one per cycle.
//!
//! Edge state is in-memory and resets to condition-false on restart. Alert
//! definitions and trigger history are the store's job.

use dashmap::DashMap;
use tracing::{error, info};

use crate::alerts::store::AlertStore;
use crate::types::{Alert, AlertDirection, ArbOpportunity, MarketRef, PlatformId, ScanSnapshot};

pub struct AlertEvaluator {
    store: AlertStore,
    /// alert id -> condition held on the previous evaluation.
    last_condition: DashMap<i64, bool>,
}

impl AlertEvaluator {
    pub fn new(store: AlertStore) -> Self {
        Self {
            store,
            last_condition: DashMap::new(),
        }
    }

    /// Evaluate all active alerts against one snapshot, persisting a trigger
    /// for every false -> true edge. Returns the number of triggers fired.
    ///
    /// A failed cycle carries no market data, so it is skipped outright:
    /// treating its empty opportunity list as "condition cleared" would
    /// re-arm every alert and re-fire on the next healthy cycle even though
    /// the spread never actually crossed back.
    pub async fn evaluate(&self, snapshot: &ScanSnapshot) -> usize {
        if snapshot.cycle_failed {
            return 0;
        }

        let alerts = match self.store.active_alerts().await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(error = %e, "failed to load active alerts, skipping evaluation");
                return 0;
            }
        };

        let mut fired = 0usize;
        for alert in &alerts {
            let observed = observed_spread(alert, &snapshot.opportunities);
            let condition = match observed {
                Some(spread) => match alert.direction {
                    AlertDirection::Above => spread >= alert.target_spread_percent,
                    AlertDirection::Below => spread <= alert.target_spread_percent,
                },
                // Nothing matched this cycle: the condition does not hold,
                // and a later match re-arms the edge.
                None => false,
            };

            let was = self
                .last_condition
                .insert(alert.id, condition)
                .unwrap_or(false);

            if condition && !was {
                let spread = observed.unwrap_or(alert.target_spread_percent);
                match self
                    .store
                    .insert_trigger(alert.id, snapshot.completed_at, spread)
                    .await
                {
                    Ok(_) => {
                        fired += 1;
                        info!(
                            alert_id = alert.id,
                            owner = %alert.owner_id,
                            observed_spread = spread,
                            "alert triggered"
                        );
                    }
                    Err(e) => {
                        error!(alert_id = alert.id, error = %e, "failed to persist trigger");
                        // Re-arm so the next cycle retries the edge.
                        self.last_condition.insert(alert.id, false);
                    }
                }
            }
        }
        fired
    }

    /// Drop in-memory edge state for a deleted alert.
    pub fn clear_state(&self, alert_id: i64) {
        self.last_condition.remove(&alert_id);
    }
}

/// The spread this alert observes in a set of opportunities: the extreme in
/// the watched direction across all matching opportunities, or None when
/// nothing matches.
fn observed_spread(alert: &Alert, opportunities: &[ArbOpportunity]) -> Option<f64> {
    let spreads = opportunities
        .iter()
        .filter(|opp| alert_matches(&alert.market_ref, opp))
        .map(|opp| opp.spread_percent);

    match alert.direction {
        AlertDirection::Above => spreads.fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |a| a.max(s)))
        }),
        AlertDirection::Below => spreads.fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |a| a.min(s)))
        }),
    }
}

fn alert_matches(market_ref: &MarketRef, opp: &ArbOpportunity) -> bool {
    match market_ref {
        MarketRef::Market {
            platform,
            external_id,
        } => match platform {
            PlatformId::Polymarket => opp.polymarket_id == *external_id,
            PlatformId::Kalshi => opp.kalshi_id == *external_id,
        },
        MarketRef::Category { category } => opp.category == *category,
    }
}
