use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use courtside_core::domain::court::{Court, CourtId, SlotModel};

use super::{parse_decimal, parse_u32, parse_unix, CourtRepository, RepositoryError};
use crate::DbPool;

const SLOT_KIND_OPERATING_HOURS: &str = "operating_hours";
const SLOT_KIND_FIXED_SLOTS: &str = "fixed_slots";

pub struct SqlCourtRepository {
    pool: DbPool,
}

impl SqlCourtRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<Court, RepositoryError> {
        let id = CourtId(row.try_get("id")?);
        let slot_kind = row.try_get::<String, _>("slot_kind")?;

        let slots = match slot_kind.as_str() {
            SLOT_KIND_OPERATING_HOURS => {
                let open_hour = row.try_get::<Option<i64>, _>("open_hour")?;
                let close_hour = row.try_get::<Option<i64>, _>("close_hour")?;
                match (open_hour, close_hour) {
                    (Some(open), Some(close)) => SlotModel::OperatingHours {
                        open_hour: parse_u32("open_hour", open)?,
                        close_hour: parse_u32("close_hour", close)?,
                    },
                    _ => {
                        return Err(RepositoryError::Decode(format!(
                            "court `{}` uses operating hours without open/close hours",
                            id.0
                        )))
                    }
                }
            }
            SLOT_KIND_FIXED_SLOTS => {
                let starts = sqlx::query_scalar::<_, i64>(
                    "SELECT slot_start FROM court_slot WHERE court_id = ? ORDER BY slot_start ASC",
                )
                .bind(&id.0)
                .fetch_all(&self.pool)
                .await?;
                let slots = starts
                    .into_iter()
                    .map(|start| parse_unix("slot_start", start))
                    .collect::<Result<Vec<_>, _>>()?;
                SlotModel::FixedSlots { slots }
            }
            other => {
                return Err(RepositoryError::Decode(format!("unknown court slot kind `{other}`")))
            }
        };

        Ok(Court {
            id,
            name: row.try_get("name")?,
            sport: row.try_get("sport")?,
            hourly_rate: parse_decimal("hourly_rate", row.try_get("hourly_rate")?)?,
            slots,
        })
    }
}

#[async_trait::async_trait]
impl CourtRepository for SqlCourtRepository {
    async fn list_all(&self) -> Result<Vec<Court>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, sport, hourly_rate, slot_kind, open_hour, close_hour
             FROM court
             ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut courts = Vec::with_capacity(rows.len());
        for row in rows {
            courts.push(self.hydrate(row).await?);
        }
        Ok(courts)
    }

    async fn find_by_id(&self, id: &CourtId) -> Result<Option<Court>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, sport, hourly_rate, slot_kind, open_hour, close_hour
             FROM court
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, court: Court) -> Result<(), RepositoryError> {
        let (slot_kind, open_hour, close_hour) = match &court.slots {
            SlotModel::OperatingHours { open_hour, close_hour } => {
                (SLOT_KIND_OPERATING_HOURS, Some(i64::from(*open_hour)), Some(i64::from(*close_hour)))
            }
            SlotModel::FixedSlots { .. } => (SLOT_KIND_FIXED_SLOTS, None, None),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO court (id, name, sport, hourly_rate, slot_kind, open_hour, close_hour, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                sport = excluded.sport,
                hourly_rate = excluded.hourly_rate,
                slot_kind = excluded.slot_kind,
                open_hour = excluded.open_hour,
                close_hour = excluded.close_hour",
        )
        .bind(&court.id.0)
        .bind(&court.name)
        .bind(&court.sport)
        .bind(court.hourly_rate.to_string())
        .bind(slot_kind)
        .bind(open_hour)
        .bind(close_hour)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM court_slot WHERE court_id = ?")
            .bind(&court.id.0)
            .execute(&mut *tx)
            .await?;

        if let SlotModel::FixedSlots { slots } = &court.slots {
            for slot in slots {
                sqlx::query(
                    "INSERT INTO court_slot (court_id, slot_start) VALUES (?, ?)
                     ON CONFLICT(court_id, slot_start) DO NOTHING",
                )
                .bind(&court.id.0)
                .bind(slot.timestamp())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
