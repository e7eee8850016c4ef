use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use courtside_core::availability::hours_of;
use courtside_core::domain::court::CourtId;
use courtside_core::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use courtside_core::domain::user::PhoneNumber;

use super::{
    parse_timestamp, parse_u32, parse_unix, CommitOutcome, RepositoryError, ReservationRepository,
};
use crate::DbPool;

const RESERVATION_COLUMNS: &str =
    "id, user_phone, court_id, start_at, duration_hours, status, created_at";

pub struct SqlReservationRepository {
    pool: DbPool,
}

impl SqlReservationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReservationRepository for SqlReservationRepository {
    async fn commit_if_free(
        &self,
        reservation: Reservation,
    ) -> Result<CommitOutcome, RepositoryError> {
        if reservation.status != ReservationStatus::Confirmed {
            return Err(RepositoryError::Decode(format!(
                "only confirmed reservations can be committed, got `{}`",
                reservation.status.as_str()
            )));
        }

        let start_at = reservation.start.timestamp();
        let end_at = reservation.end().timestamp();

        // SQLite serializes writers, so the guard and the insert see the same snapshot.
        let inserted = sqlx::query(
            "INSERT INTO reservation
                (id, user_phone, court_id, start_at, end_at, duration_hours, status, created_at)
             SELECT ?, ?, ?, ?, ?, ?, 'confirmed', ?
             WHERE NOT EXISTS (
                SELECT 1 FROM reservation
                WHERE court_id = ?
                  AND status = 'confirmed'
                  AND start_at < ?
                  AND end_at > ?
             )",
        )
        .bind(&reservation.id.0)
        .bind(reservation.user_phone.as_str())
        .bind(&reservation.court_id.0)
        .bind(start_at)
        .bind(end_at)
        .bind(i64::from(reservation.duration_hours))
        .bind(reservation.created_at.to_rfc3339())
        .bind(&reservation.court_id.0)
        .bind(end_at)
        .bind(start_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(CommitOutcome::Committed(reservation));
        }

        let holders = self
            .list_confirmed_for_court(&reservation.court_id, reservation.start, reservation.end())
            .await?;
        let hours = hours_of(reservation.start, reservation.duration_hours)
            .into_iter()
            .filter(|hour| holders.iter().any(|holder| holder.overlaps(*hour, 1)))
            .collect();

        Ok(CommitOutcome::Conflict { hours })
    }

    async fn find_by_id(
        &self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RESERVATION_COLUMNS} FROM reservation WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(reservation_from_row).transpose()
    }

    async fn list_for_user(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS}
             FROM reservation
             WHERE user_phone = ? AND status <> 'cancelled'
             ORDER BY start_at ASC"
        ))
        .bind(phone.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(reservation_from_row).collect()
    }

    async fn list_confirmed_for_court(
        &self,
        court_id: &CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS}
             FROM reservation
             WHERE court_id = ? AND status = 'confirmed' AND start_at < ? AND end_at > ?
             ORDER BY start_at ASC"
        ))
        .bind(&court_id.0)
        .bind(to.timestamp())
        .bind(from.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(reservation_from_row).collect()
    }

    async fn cancel(&self, id: &ReservationId) -> Result<bool, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE reservation SET status = 'cancelled' WHERE id = ? AND status = 'confirmed'",
        )
        .bind(&id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }
}

fn reservation_from_row(row: SqliteRow) -> Result<Reservation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = ReservationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown reservation status `{status_raw}`"))
    })?;

    Ok(Reservation {
        id: ReservationId(row.try_get("id")?),
        user_phone: PhoneNumber(row.try_get("user_phone")?),
        court_id: CourtId(row.try_get("court_id")?),
        start: parse_unix("start_at", row.try_get("start_at")?)?,
        duration_hours: parse_u32("duration_hours", row.try_get("duration_hours")?)?,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
