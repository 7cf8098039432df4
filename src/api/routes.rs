//! Request handlers. Scan reads filter the latest snapshot at request time,
//! so stricter-than-scan thresholds work without waiting for a new cycle.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::alerts::NewAlert;
use crate::error::{AppError, Result};
use crate::profit::{compute_profit, ProfitProjection};
use crate::scheduler::now_millis;
use crate::types::{
    Alert, AlertDirection, ArbOpportunity, Category, DebugTrace, MarketRef, ScanSnapshot,
    ScanStats, TriggeredAlert,
};

use super::ApiState;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_scan_at: i64,
    pub cycle_failed: bool,
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let snapshot = state.scheduler.snapshot();
    Json(HealthResponse {
        status: "ok",
        last_scan_at: snapshot.completed_at,
        cycle_failed: snapshot.cycle_failed,
    })
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ScanQuery {
    pub category: Option<String>,
    pub min_spread: Option<f64>,
    pub min_similarity: Option<f64>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub opportunities: Vec<ArbOpportunity>,
    pub stats: ScanStats,
    pub warnings: Vec<String>,
    pub cycle_failed: bool,
    pub last_updated: i64,
}

/// Production response plus the diagnostic trace. Only returned when the
/// request explicitly opts in with `debug=true`.
#[derive(Serialize)]
pub struct ScanDebugResponse {
    #[serde(flatten)]
    pub base: ScanResponse,
    pub debug: DebugTrace,
}

pub async fn list_opportunities(
    State(state): State<ApiState>,
    Query(query): Query<ScanQuery>,
) -> Result<Response> {
    let category = query.category.as_deref().map(parse_category).transpose()?;
    if let Some(s) = query.min_spread {
        if !s.is_finite() || s < 0.0 {
            return Err(AppError::InvalidRequest(
                "min_spread must be a non-negative number".to_string(),
            ));
        }
    }
    if let Some(s) = query.min_similarity {
        if !s.is_finite() || !(0.0..=100.0).contains(&s) {
            return Err(AppError::InvalidRequest(
                "min_similarity must be between 0 and 100".to_string(),
            ));
        }
    }

    let snapshot = state.scheduler.snapshot();
    let opportunities = filter_opportunities(
        &snapshot,
        category,
        query.min_spread,
        query.min_similarity,
        query.limit.unwrap_or(state.config.result_limit),
    );

    let base = ScanResponse {
        opportunities,
        stats: snapshot.stats.clone(),
        warnings: snapshot.warnings.clone(),
        cycle_failed: snapshot.cycle_failed,
        last_updated: snapshot.completed_at,
    };

    if query.debug {
        Ok(Json(ScanDebugResponse {
            base,
            debug: snapshot.debug.clone(),
        })
        .into_response())
    } else {
        Ok(Json(base).into_response())
    }
}

/// Read-time view over the published snapshot. Snapshot opportunities are
/// already sorted by spread descending, so filtering preserves order.
fn filter_opportunities(
    snapshot: &ScanSnapshot,
    category: Option<Category>,
    min_spread: Option<f64>,
    min_similarity: Option<f64>,
    limit: usize,
) -> Vec<ArbOpportunity> {
    snapshot
        .opportunities
        .iter()
        .filter(|o| category.map_or(true, |c| o.category == c))
        .filter(|o| min_spread.map_or(true, |s| o.spread_percent >= s))
        .filter(|o| min_similarity.map_or(true, |s| o.match_score >= s))
        .take(limit)
        .cloned()
        .collect()
}

fn parse_category(s: &str) -> Result<Category> {
    match Category::parse(s) {
        Category::Other if !s.eq_ignore_ascii_case("other") => Err(AppError::InvalidRequest(
            format!("unknown category {s:?}"),
        )),
        c => Ok(c),
    }
}

// ---------------------------------------------------------------------------
// Manual refresh
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
}

pub async fn refresh_scan(State(state): State<ApiState>) -> (StatusCode, Json<RefreshResponse>) {
    // A full queue means a scan is already pending, which satisfies the
    // request just as well.
    let status = if state.scheduler.request_refresh() {
        "scheduled"
    } else {
        "already pending"
    };
    (StatusCode::ACCEPTED, Json(RefreshResponse { status }))
}

// ---------------------------------------------------------------------------
// Profit what-if
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ProfitQuery {
    pub buy_price: f64,
    pub sell_price: f64,
    pub stake: f64,
}

pub async fn profit_projection(
    Query(query): Query<ProfitQuery>,
) -> Result<Json<ProfitProjection>> {
    if !query.buy_price.is_finite() || !query.sell_price.is_finite() || !query.stake.is_finite() {
        return Err(AppError::InvalidRequest(
            "prices and stake must be finite numbers".to_string(),
        ));
    }
    Ok(Json(compute_profit(
        query.buy_price,
        query.sell_price,
        query.stake,
    )))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub owner_id: String,
    pub market_ref: MarketRef,
    pub direction: AlertDirection,
    pub target_spread_percent: f64,
}

pub async fn create_alert(
    State(state): State<ApiState>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Alert>)> {
    if req.owner_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("owner_id is required".to_string()));
    }
    if !req.target_spread_percent.is_finite() || req.target_spread_percent < 0.0 {
        return Err(AppError::InvalidRequest(
            "target_spread_percent must be a non-negative number".to_string(),
        ));
    }
    if let MarketRef::Market { external_id, .. } = &req.market_ref {
        if external_id.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "external_id is required for market alerts".to_string(),
            ));
        }
    }

    let alert = state
        .alerts
        .create(
            NewAlert {
                owner_id: req.owner_id,
                market_ref: req.market_ref,
                direction: req.direction,
                target_spread_percent: req.target_spread_percent,
            },
            now_millis(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Alert>>> {
    Ok(Json(state.alerts.list_for_owner(&query.owner_id).await?))
}

pub async fn delete_alert(
    State(state): State<ApiState>,
    Path(alert_id): Path<i64>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode> {
    state.alerts.delete(&query.owner_id, alert_id).await?;
    state.evaluator.clear_state(alert_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_triggers(
    State(state): State<ApiState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<TriggeredAlert>>> {
    Ok(Json(state.alerts.pending_triggers(&query.owner_id).await?))
}

pub async fn dismiss_trigger(
    State(state): State<ApiState>,
    Path(trigger_id): Path<i64>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode> {
    state
        .alerts
        .dismiss_trigger(&query.owner_id, trigger_id, now_millis())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
