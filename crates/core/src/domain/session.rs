use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::PhoneNumber;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub role: TurnRole,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// Result of appending a turn, so callers can log session boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    StartedNewSession,
}

/// Time-windowed transcript for one sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub sender: PhoneNumber,
    pub session_start: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub entries: Vec<SessionEntry>,
}

impl ConversationSession {
    pub fn start(sender: PhoneNumber, now: DateTime<Utc>) -> Self {
        Self { sender, session_start: now, last_activity: now, entries: Vec::new() }
    }

    /// Appends a turn. A gap strictly greater than `timeout` since the last
    /// activity empties the session before recording.
    pub fn append(
        &mut self,
        role: TurnRole,
        text: impl Into<String>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> AppendOutcome {
        let outcome = if now - self.last_activity > timeout {
            self.entries.clear();
            self.session_start = now;
            AppendOutcome::StartedNewSession
        } else {
            AppendOutcome::Appended
        };

        self.entries.push(SessionEntry { role, text: text.into(), recorded_at: now });
        self.last_activity = now;
        outcome
    }

    /// Drops entries older than the retention window. Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let before = self.entries.len();
        self.entries.retain(|entry| entry.recorded_at >= cutoff);
        before - self.entries.len()
    }

    /// The last `max_entries` retained turns as `Role: text`, oldest first.
    pub fn recent_context(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
        max_entries: usize,
    ) -> Vec<String> {
        let cutoff = now - retention;
        let retained =
            self.entries.iter().filter(|entry| entry.recorded_at >= cutoff).collect::<Vec<_>>();
        let skip = retained.len().saturating_sub(max_entries);
        retained
            .into_iter()
            .skip(skip)
            .map(|entry| format!("{}: {}", entry.role.label(), entry.text))
            .collect()
    }
}
