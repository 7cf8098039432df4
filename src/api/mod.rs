//! HTTP surface: read-only scan results, manual refresh, what-if profit,
//! and alert management. All handlers read the latest published snapshot —
//! none of them block on a running scan.

pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::alerts::{AlertEvaluator, AlertStore};
use crate::config::Config;
use crate::scheduler::SchedulerHandle;

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: SchedulerHandle,
    pub alerts: AlertStore,
    pub evaluator: Arc<AlertEvaluator>,
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/opportunities", get(routes::list_opportunities))
        .route("/scan/refresh", post(routes::refresh_scan))
        .route("/profit", get(routes::profit_projection))
        .route("/alerts", post(routes::create_alert).get(routes::list_alerts))
        .route("/alerts/:id", delete(routes::delete_alert))
        .route("/alerts/triggered", get(routes::list_triggers))
        .route("/alerts/triggered/:id/dismiss", post(routes::dismiss_trigger))
        .with_state(state)
}
