use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use courtside_core::domain::user::{PhoneNumber, User};

use super::{parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT phone, display_name, created_at FROM app_user WHERE phone = ?")
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn find_or_create(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let candidate = User::new(phone.clone(), now);
        let inserted = sqlx::query(
            "INSERT INTO app_user (phone, display_name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(candidate.phone.as_str())
        .bind(&candidate.display_name)
        .bind(candidate.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            tracing::info!(event_name = "user.registered", sender = %phone, "registered new sender");
            return Ok(candidate);
        }

        self.find_by_phone(phone).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("user `{phone}` vanished after conflicting insert"))
        })
    }

    async fn update_display_name(
        &self,
        phone: &PhoneNumber,
        display_name: &str,
    ) -> Result<bool, RepositoryError> {
        let updated = sqlx::query("UPDATE app_user SET display_name = ? WHERE phone = ?")
            .bind(display_name)
            .bind(phone.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated == 1)
    }
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        phone: PhoneNumber(row.try_get("phone")?),
        display_name: row.try_get("display_name")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
