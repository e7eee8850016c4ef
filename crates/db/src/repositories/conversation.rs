use sqlx::{sqlite::SqliteRow, Row};

use courtside_core::domain::session::{ConversationSession, SessionEntry};
use courtside_core::domain::user::PhoneNumber;

use super::{parse_timestamp, ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn load(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT sender, session_start, last_activity, entries_json
             FROM conversation_session
             WHERE sender = ?",
        )
        .bind(sender.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn save(&self, session: ConversationSession) -> Result<(), RepositoryError> {
        let entries_json = serde_json::to_string(&session.entries).map_err(|error| {
            RepositoryError::Decode(format!("session entries are not serializable: {error}"))
        })?;

        sqlx::query(
            "INSERT INTO conversation_session (sender, session_start, last_activity, entries_json)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(sender) DO UPDATE SET
                session_start = excluded.session_start,
                last_activity = excluded.last_activity,
                entries_json = excluded.entries_json",
        )
        .bind(session.sender.as_str())
        .bind(session.session_start.to_rfc3339())
        .bind(session.last_activity.to_rfc3339())
        .bind(entries_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn session_from_row(row: SqliteRow) -> Result<ConversationSession, RepositoryError> {
    let entries_raw = row.try_get::<String, _>("entries_json")?;
    let entries = serde_json::from_str::<Vec<SessionEntry>>(&entries_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid `entries_json`: {error}")))?;

    Ok(ConversationSession {
        sender: PhoneNumber(row.try_get("sender")?),
        session_start: parse_timestamp("session_start", row.try_get("session_start")?)?,
        last_activity: parse_timestamp("last_activity", row.try_get("last_activity")?)?,
        entries,
    })
}
