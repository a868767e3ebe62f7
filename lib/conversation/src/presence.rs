//! Game presence tracking.
//!
//! Platforms report presence in bursts (several updates within a second or
//! two when a game starts or stops). Updates are debounced per user and only
//! the settled state is applied. A session that ends after at least the
//! configured minimum is recorded through the [`GameSessionStore`].

use crate::games::{GameSession, GameSessionStore};
use chrono::{DateTime, Utc};
use sidekick_core::UserId;
use sidekick_scheduler::Debouncer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Playing {
    game: String,
    since: DateTime<Utc>,
}

/// Presence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Shortest session worth recording.
    pub min_session: Duration,
    /// Quiet period before an update is applied.
    pub debounce: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            min_session: Duration::from_secs(300),
            debounce: Duration::from_secs(5),
        }
    }
}

/// Turns presence updates into recorded game sessions.
#[derive(Clone)]
pub struct PresenceTracker {
    config: PresenceConfig,
    debouncer: Debouncer<UserId>,
    playing: Arc<Mutex<HashMap<UserId, Playing>>>,
    store: Arc<dyn GameSessionStore>,
}

impl PresenceTracker {
    /// Creates a tracker recording into `store`.
    #[must_use]
    pub fn new(config: PresenceConfig, store: Arc<dyn GameSessionStore>) -> Self {
        Self {
            config,
            debouncer: Debouncer::new(),
            playing: Arc::new(Mutex::new(HashMap::new())),
            store,
        }
    }

    /// Reports what `user` is playing now, `None` if nothing.
    pub fn update(&self, user: UserId, game: Option<String>) {
        self.update_at(user, game, Utc::now());
    }

    /// Reports what `user` was playing as of `observed_at`.
    pub fn update_at(&self, user: UserId, game: Option<String>, observed_at: DateTime<Utc>) {
        let tracker = self.clone();
        let settled_user = user.clone();
        self.debouncer.debounce(user, self.config.debounce, move || async move {
            tracker.apply(settled_user, game, observed_at).await
        });
    }

    /// Users currently marked as playing.
    #[must_use]
    pub fn playing_count(&self) -> usize {
        self.playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn apply(
        &self,
        user: UserId,
        game: Option<String>,
        at: DateTime<Utc>,
    ) -> sidekick_core::Result<()> {
        let finished = {
            let mut playing = self.playing.lock().unwrap_or_else(PoisonError::into_inner);
            match (&game, playing.get(&user)) {
                (Some(next), Some(current)) if current.game == *next => return Ok(()),
                _ => {}
            }
            let finished = playing.remove(&user);
            if let Some(next) = game {
                debug!(user = %user, game = %next, "started playing");
                playing.insert(user.clone(), Playing { game: next, since: at });
            }
            finished
        };

        let Some(finished) = finished else {
            return Ok(());
        };
        let duration = (at - finished.since).to_std().unwrap_or_default();
        if duration < self.config.min_session {
            debug!(user = %user, game = %finished.game, ?duration, "session too short to record");
            return Ok(());
        }

        info!(user = %user, game = %finished.game, ?duration, "recording game session");
        self.store
            .record_game_session(GameSession {
                user,
                game: finished.game,
                started_at: finished.since,
                duration,
            })
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("config", &self.config)
            .field("playing", &self.playing_count())
            .finish_non_exhaustive()
    }
}
