use sqlx::{sqlite::SqliteRow, Row};

use courtside_core::domain::court::CourtId;
use courtside_core::domain::negotiation::{Awaiting, PendingNegotiation};
use courtside_core::domain::user::PhoneNumber;

use super::{
    parse_decimal, parse_timestamp, parse_u32, parse_unix, NegotiationRepository, RepositoryError,
};
use crate::DbPool;

const NEGOTIATION_COLUMNS: &str =
    "sender, court_id, court_name, start_at, duration_hours, hourly_rate, total_price, awaiting, created_at";

pub struct SqlNegotiationRepository {
    pool: DbPool,
}

impl SqlNegotiationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        negotiation: &PendingNegotiation,
        replace: bool,
    ) -> Result<u64, RepositoryError> {
        let conflict_clause = if replace {
            "ON CONFLICT(sender) DO UPDATE SET
                court_id = excluded.court_id,
                court_name = excluded.court_name,
                start_at = excluded.start_at,
                duration_hours = excluded.duration_hours,
                hourly_rate = excluded.hourly_rate,
                total_price = excluded.total_price,
                awaiting = excluded.awaiting,
                created_at = excluded.created_at"
        } else {
            "ON CONFLICT(sender) DO NOTHING"
        };

        let affected = sqlx::query(&format!(
            "INSERT INTO negotiation_state ({NEGOTIATION_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             {conflict_clause}"
        ))
        .bind(negotiation.sender.as_str())
        .bind(&negotiation.court_id.0)
        .bind(&negotiation.court_name)
        .bind(negotiation.start.timestamp())
        .bind(i64::from(negotiation.duration_hours))
        .bind(negotiation.hourly_rate.to_string())
        .bind(negotiation.total_price.to_string())
        .bind(negotiation.awaiting.as_str())
        .bind(negotiation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected)
    }
}

#[async_trait::async_trait]
impl NegotiationRepository for SqlNegotiationRepository {
    async fn find(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<PendingNegotiation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {NEGOTIATION_COLUMNS} FROM negotiation_state WHERE sender = ?"
        ))
        .bind(sender.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(negotiation_from_row).transpose()
    }

    async fn put(&self, negotiation: PendingNegotiation) -> Result<(), RepositoryError> {
        self.insert(&negotiation, true).await.map(|_| ())
    }

    async fn take(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<PendingNegotiation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "DELETE FROM negotiation_state WHERE sender = ? RETURNING {NEGOTIATION_COLUMNS}"
        ))
        .bind(sender.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(negotiation_from_row).transpose()
    }

    async fn clear(&self, sender: &PhoneNumber) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM negotiation_state WHERE sender = ?")
            .bind(sender.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted == 1)
    }

    async fn restore(&self, negotiation: PendingNegotiation) -> Result<bool, RepositoryError> {
        self.insert(&negotiation, false).await.map(|affected| affected == 1)
    }
}

fn negotiation_from_row(row: SqliteRow) -> Result<PendingNegotiation, RepositoryError> {
    let awaiting_raw = row.try_get::<String, _>("awaiting")?;
    let awaiting = match awaiting_raw.as_str() {
        "confirmation" => Awaiting::Confirmation,
        other => {
            return Err(RepositoryError::Decode(format!("unknown negotiation awaiting `{other}`")))
        }
    };

    Ok(PendingNegotiation {
        sender: PhoneNumber(row.try_get("sender")?),
        court_id: CourtId(row.try_get("court_id")?),
        court_name: row.try_get("court_name")?,
        start: parse_unix("start_at", row.try_get("start_at")?)?,
        duration_hours: parse_u32("duration_hours", row.try_get("duration_hours")?)?,
        hourly_rate: parse_decimal("hourly_rate", row.try_get("hourly_rate")?)?,
        total_price: parse_decimal("total_price", row.try_get("total_price")?)?,
        awaiting,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
