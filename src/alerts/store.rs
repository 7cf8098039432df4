//! SQLite persistence for alert definitions and trigger history. Alert
//! definitions survive restarts; per-cycle edge state does not and lives in
//! the evaluator instead.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, Result};
use crate::types::{Alert, AlertDirection, Category, MarketRef, PlatformId, TriggeredAlert};

/// Validated input for creating an alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub owner_id: String,
    pub market_ref: MarketRef,
    pub direction: AlertDirection,
    pub target_spread_percent: f64,
}

#[derive(Clone)]
pub struct AlertStore {
    pool: SqlitePool,
}

impl AlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewAlert, created_at: i64) -> Result<Alert> {
        let (platform, external_id, category) = match &new.market_ref {
            MarketRef::Market {
                platform,
                external_id,
            } => (Some(platform.to_string()), Some(external_id.clone()), None),
            MarketRef::Category { category } => (None, None, Some(category.to_string())),
        };

        let id = sqlx::query(
            "INSERT INTO alerts (owner_id, platform, external_id, category, direction, \
             target_spread_percent, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&new.owner_id)
        .bind(&platform)
        .bind(&external_id)
        .bind(&category)
        .bind(new.direction.as_str())
        .bind(new.target_spread_percent)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Alert {
            id,
            owner_id: new.owner_id,
            market_ref: new.market_ref,
            direction: new.direction,
            target_spread_percent: new.target_spread_percent,
            is_active: true,
            created_at,
        })
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, platform, external_id, category, direction, \
             target_spread_percent, is_active, created_at \
             FROM alerts WHERE owner_id = ? ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(alert_from_row).collect()
    }

    /// All active alerts across owners, for snapshot evaluation.
    pub async fn active_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, platform, external_id, category, direction, \
             target_spread_percent, is_active, created_at \
             FROM alerts WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(alert_from_row).collect()
    }

    /// Delete an alert owned by `owner_id`. Trigger history goes with it.
    pub async fn delete(&self, owner_id: &str, alert_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ? AND owner_id = ?")
            .bind(alert_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("alert {alert_id}")));
        }
        Ok(())
    }

    pub async fn insert_trigger(
        &self,
        alert_id: i64,
        triggered_at: i64,
        observed_spread: f64,
    ) -> Result<TriggeredAlert> {
        let id = sqlx::query(
            "INSERT INTO alert_triggers (alert_id, triggered_at, observed_spread) VALUES (?, ?, ?)",
        )
        .bind(alert_id)
        .bind(triggered_at)
        .bind(observed_spread)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(TriggeredAlert {
            id,
            alert_id,
            triggered_at,
            observed_spread,
        })
    }

    /// Undismissed triggers for one owner's alerts, newest first.
    pub async fn pending_triggers(&self, owner_id: &str) -> Result<Vec<TriggeredAlert>> {
        let rows = sqlx::query(
            "SELECT t.id, t.alert_id, t.triggered_at, t.observed_spread \
             FROM alert_triggers t JOIN alerts a ON a.id = t.alert_id \
             WHERE a.owner_id = ? AND t.dismissed_at IS NULL \
             ORDER BY t.triggered_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TriggeredAlert {
                id: row.get("id"),
                alert_id: row.get("alert_id"),
                triggered_at: row.get("triggered_at"),
                observed_spread: row.get("observed_spread"),
            })
            .collect())
    }

    pub async fn dismiss_trigger(
        &self,
        owner_id: &str,
        trigger_id: i64,
        dismissed_at: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE alert_triggers SET dismissed_at = ? \
             WHERE id = ? AND dismissed_at IS NULL \
             AND alert_id IN (SELECT id FROM alerts WHERE owner_id = ?)",
        )
        .bind(dismissed_at)
        .bind(trigger_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("trigger {trigger_id}")));
        }
        Ok(())
    }
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert> {
    let platform: Option<String> = row.get("platform");
    let external_id: Option<String> = row.get("external_id");
    let category: Option<String> = row.get("category");

    let market_ref = match (platform, external_id, category) {
        (Some(p), Some(e), _) => MarketRef::Market {
            platform: parse_platform(&p)?,
            external_id: e,
        },
        (_, _, Some(c)) => MarketRef::Category {
            category: Category::parse(&c),
        },
        _ => {
            return Err(AppError::Database(sqlx::Error::Decode(
                "alert row has neither market nor category reference".into(),
            )))
        }
    };

    let direction: String = row.get("direction");
    let direction = AlertDirection::parse(&direction).ok_or_else(|| {
        AppError::Database(sqlx::Error::Decode(
            format!("unknown alert direction {direction:?}").into(),
        ))
    })?;

    Ok(Alert {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        market_ref,
        direction,
        target_spread_percent: row.get("target_spread_percent"),
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: row.get("created_at"),
    })
}

fn parse_platform(s: &str) -> Result<PlatformId> {
    match s {
        "polymarket" => Ok(PlatformId::Polymarket),
        "kalshi" => Ok(PlatformId::Kalshi),
        other => Err(AppError::Database(sqlx::Error::Decode(
            format!("unknown platform {other:?}").into(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> AlertStore {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        AlertStore::new(pool)
    }

    fn market_alert(owner: &str) -> NewAlert {
        NewAlert {
            owner_id: owner.to_string(),
            market_ref: MarketRef::Market {
                platform: PlatformId::Kalshi,
                external_id: "PRES-24".to_string(),
            },
            direction: AlertDirection::Above,
            target_spread_percent: 5.0,
        }
    }

    #[tokio::test]
    async fn create_then_list_round_trips_market_ref() {
        let store = test_store().await;
        let created = store.create(market_alert("alice"), 1_000).await.unwrap();
        assert!(created.is_active);

        let listed = store.list_for_owner("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].market_ref, created.market_ref);
        assert_eq!(listed[0].direction, AlertDirection::Above);

        assert!(store.list_for_owner("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn category_alerts_round_trip() {
        let store = test_store().await;
        let new = NewAlert {
            owner_id: "alice".to_string(),
            market_ref: MarketRef::Category {
                category: Category::Crypto,
            },
            direction: AlertDirection::Below,
            target_spread_percent: 3.0,
        };
        store.create(new, 1_000).await.unwrap();

        let listed = store.list_for_owner("alice").await.unwrap();
        assert_eq!(
            listed[0].market_ref,
            MarketRef::Category {
                category: Category::Crypto
            }
        );
    }

    #[tokio::test]
    async fn delete_requires_matching_owner() {
        let store = test_store().await;
        let alert = store.create(market_alert("alice"), 1_000).await.unwrap();

        assert!(matches!(
            store.delete("bob", alert.id).await,
            Err(AppError::NotFound(_))
        ));
        store.delete("alice", alert.id).await.unwrap();
        assert!(store.list_for_owner("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn triggers_persist_and_dismiss() {
        let store = test_store().await;
        let alert = store.create(market_alert("alice"), 1_000).await.unwrap();

        let trigger = store.insert_trigger(alert.id, 2_000, 7.5).await.unwrap();
        let pending = store.pending_triggers("alice").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!((pending[0].observed_spread - 7.5).abs() < 1e-9);

        store
            .dismiss_trigger("alice", trigger.id, 3_000)
            .await
            .unwrap();
        assert!(store.pending_triggers("alice").await.unwrap().is_empty());

        // Already dismissed: second dismiss is a NotFound.
        assert!(matches!(
            store.dismiss_trigger("alice", trigger.id, 4_000).await,
            Err(AppError::NotFound(_))
        ));
    }
}
