//! Game-session persistence.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sidekick_core::UserId;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A finished stretch of play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    /// Who played.
    pub user: UserId,
    /// What was played.
    pub game: String,
    /// When play started.
    pub started_at: DateTime<Utc>,
    /// How long it lasted.
    pub duration: Duration,
}

/// Storage of finished game sessions.
#[async_trait]
pub trait GameSessionStore: Send + Sync {
    /// Records a finished session.
    async fn record_game_session(&self, session: GameSession) -> Result<(), StoreError>;

    /// Total play time of `user` in sessions started within the last
    /// `since_days` days.
    async fn sum_durations(&self, user: &UserId, since_days: u32) -> Result<Duration, StoreError>;
}

/// Process-local store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryGameSessionStore {
    sessions: Mutex<Vec<GameSession>>,
}

impl InMemoryGameSessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded sessions, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<GameSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl GameSessionStore for InMemoryGameSessionStore {
    async fn record_game_session(&self, session: GameSession) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
        Ok(())
    }

    async fn sum_durations(&self, user: &UserId, since_days: u32) -> Result<Duration, StoreError> {
        let since = chrono::Duration::try_days(i64::from(since_days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| &s.user == user && s.started_at >= since)
            .map(|s| s.duration)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user: &str, days_ago: i64, minutes: u64) -> GameSession {
        GameSession {
            user: UserId::new(user),
            game: "Factorio".to_string(),
            started_at: Utc::now() - chrono::Duration::days(days_ago),
            duration: Duration::from_secs(minutes * 60),
        }
    }

    #[tokio::test]
    async fn sum_durations_filters_by_user_and_window() {
        let store = InMemoryGameSessionStore::new();
        store.record_game_session(session("ada", 1, 30)).await.unwrap();
        store.record_game_session(session("ada", 3, 45)).await.unwrap();
        store.record_game_session(session("ada", 10, 600)).await.unwrap();
        store.record_game_session(session("bob", 1, 90)).await.unwrap();

        let total = store.sum_durations(&UserId::new("ada"), 7).await.unwrap();

        assert_eq!(total, Duration::from_secs(75 * 60));
    }

    #[tokio::test]
    async fn huge_window_covers_everything() {
        let store = InMemoryGameSessionStore::new();
        store.record_game_session(session("ada", 1, 30)).await.unwrap();
        store.record_game_session(session("ada", 4_000, 60)).await.unwrap();

        let total = store.sum_durations(&UserId::new("ada"), u32::MAX).await.unwrap();

        assert_eq!(total, Duration::from_secs(90 * 60));
    }

    #[tokio::test]
    async fn sum_durations_without_sessions_is_zero() {
        let store = InMemoryGameSessionStore::new();
        let total = store.sum_durations(&UserId::new("ada"), 7).await.unwrap();
        assert_eq!(total, Duration::ZERO);
    }
}
