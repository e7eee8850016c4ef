use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use courtside_db::repositories::{CourtRepository, SqlCourtRepository};
use courtside_db::{ping, DbPool};
use serde::Serialize;

/// What `/health` reports besides the live database probe.
#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub whatsapp_configured: bool,
    pub llm_enabled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: Readiness,
    pub database: String,
    pub courts: Option<usize>,
    pub whatsapp: &'static str,
    pub llm: &'static str,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// 200 only when the database answers; integrations never make the service unready.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database, courts) = match ping(&state.db_pool).await {
        Ok(()) => {
            let courts = SqlCourtRepository::new(state.db_pool.clone())
                .list_all()
                .await
                .map(|courts| courts.len())
                .ok();
            (Readiness::Ready, "reachable".to_string(), courts)
        }
        Err(error) => {
            tracing::warn!(
                event_name = "system.health.degraded",
                error = %error,
                "database ping failed"
            );
            (Readiness::Degraded, format!("unreachable: {error}"), None)
        }
    };

    let payload = HealthResponse {
        status,
        database,
        courts,
        whatsapp: if state.whatsapp_configured { "twilio" } else { "noop" },
        llm: if state.llm_enabled { "enabled" } else { "disabled" },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use courtside_db::{connect_with_settings, migrations, seed_demo_courts, DbPool};

    use crate::health::{health, HealthState, Readiness};

    fn state(db_pool: DbPool) -> HealthState {
        HealthState { db_pool, whatsapp_configured: false, llm_enabled: true }
    }

    #[tokio::test]
    async fn health_reports_catalog_size_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrate");
        seed_demo_courts(&pool).await.expect("seed");

        let (status, Json(payload)) = health(State(state(pool.clone()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, Readiness::Ready);
        assert_eq!(payload.courts, Some(4));
        assert_eq!(payload.whatsapp, "noop");
        assert_eq!(payload.llm, "enabled");

        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_database_is_still_ready() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(payload)) = health(State(state(pool.clone()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.courts, None);

        pool.close().await;
    }

    #[tokio::test]
    async fn closed_pool_is_service_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(state(pool))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, Readiness::Degraded);
        assert!(payload.database.starts_with("unreachable"));
    }
}
