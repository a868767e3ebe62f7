//! Named, cancellable deferred callbacks keyed by conversation.
//!
//! Jobs are grouped under a [`JobKey`]: a purpose tag plus a conversation
//! key. One-time jobs are multi-flight (several reminders may be pending for
//! the same channel and are cancelled together); recurring jobs are
//! single-flight (scheduling one replaces whatever was registered under the
//! same key).
//!
//! A job slot is removed from the map under the lock before its callback
//! runs. Whoever removes the slot first wins: a `cancel` that gets there
//! first prevents the fire, a fire that gets there first completes.

use crate::error::ScheduleError;
use crate::schedule::CronSchedule;
use chrono::Utc;
use futures::future::BoxFuture;
use sidekick_core::{ConversationKey, JobId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Future produced by a job callback.
pub type JobFuture = BoxFuture<'static, sidekick_core::Result<()>>;

/// Callback for a one-time job.
pub type OnceCallback = Box<dyn FnOnce() -> JobFuture + Send>;

/// Callback for a recurring job, invoked once per occurrence.
pub type RecurringCallback = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Identifies a group of jobs: purpose tag plus conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Purpose tag, e.g. `"reminder"`.
    pub tag: String,
    /// Conversation the jobs belong to.
    pub key: ConversationKey,
}

impl JobKey {
    /// Creates a job key.
    #[must_use]
    pub fn new(tag: impl Into<String>, key: ConversationKey) -> Self {
        Self {
            tag: tag.into(),
            key,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.key)
    }
}

#[derive(Debug)]
struct JobSlot {
    wake: CancellationToken,
}

type JobTable = HashMap<JobKey, HashMap<JobId, JobSlot>>;

#[derive(Debug, Default)]
struct Inner {
    jobs: Mutex<JobTable>,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, JobTable> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the slot; returns false if it was already cancelled.
    fn claim(&self, job_key: &JobKey, id: JobId) -> bool {
        let mut table = self.table();
        let Some(slots) = table.get_mut(job_key) else {
            return false;
        };
        let claimed = slots.remove(&id).is_some();
        if slots.is_empty() {
            table.remove(job_key);
        }
        claimed
    }

    fn is_live(&self, job_key: &JobKey, id: JobId) -> bool {
        self.table()
            .get(job_key)
            .is_some_and(|slots| slots.contains_key(&id))
    }
}

/// In-process job scheduler.
///
/// Cloning yields another handle to the same job table. All scheduling
/// methods spawn onto the ambient tokio runtime and return immediately.
#[derive(Debug, Clone, Default)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `callback` once after `delay`, unless cancelled first.
    ///
    /// Existing jobs under the same tag and key are left in place.
    pub fn schedule_once<F>(
        &self,
        tag: impl Into<String>,
        key: ConversationKey,
        delay: Duration,
        callback: F,
    ) -> JobId
    where
        F: FnOnce() -> JobFuture + Send + 'static,
    {
        let job_key = JobKey::new(tag, key);
        let id = JobId::new();
        let wake = CancellationToken::new();

        self.inner
            .table()
            .entry(job_key.clone())
            .or_default()
            .insert(id, JobSlot { wake: wake.clone() });
        debug!(job = %job_key, %id, ?delay, "scheduled one-time job");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = wake.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            if !inner.claim(&job_key, id) {
                return;
            }
            fire(&job_key, id, callback()).await;
        });

        id
    }

    /// Runs `callback` at every occurrence of `schedule` until cancelled.
    ///
    /// Replaces any job already registered under the same tag and key.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule is invalid; nothing is replaced then.
    pub fn schedule_recurring<F>(
        &self,
        tag: impl Into<String>,
        key: ConversationKey,
        schedule: CronSchedule,
        callback: F,
    ) -> Result<JobId, ScheduleError>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        schedule.validate()?;

        let job_key = JobKey::new(tag, key);
        let id = JobId::new();
        let wake = CancellationToken::new();

        {
            let mut table = self.inner.table();
            let slots = table.entry(job_key.clone()).or_default();
            for (_, replaced) in slots.drain() {
                replaced.wake.cancel();
            }
            slots.insert(id, JobSlot { wake: wake.clone() });
        }
        debug!(job = %job_key, %id, cron = %schedule.expression, "scheduled recurring job");

        let inner = Arc::clone(&self.inner);
        let callback: RecurringCallback = Arc::new(callback);
        tokio::spawn(async move {
            // Occurrences come from the wall clock once; waits are then paced
            // on tokio's clock relative to that origin.
            let origin = Utc::now();
            let started = Instant::now();
            let mut after = origin;
            loop {
                let next = match schedule.next_after(after) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(job = %job_key, error = %e, "recurring job has no next occurrence");
                        inner.claim(&job_key, id);
                        return;
                    }
                };
                let offset = (next - origin).to_std().unwrap_or_default();

                tokio::select! {
                    biased;
                    () = wake.cancelled() => return,
                    () = tokio::time::sleep_until(started + offset) => {}
                }
                if !inner.is_live(&job_key, id) {
                    return;
                }
                fire(&job_key, id, callback()).await;
                let elapsed = chrono::Duration::from_std(started.elapsed()).unwrap_or_default();
                after = next.max(origin + elapsed);
            }
        });

        Ok(id)
    }

    /// Cancels every pending job under the tag and key.
    ///
    /// Returns how many jobs were removed. A callback already running is not
    /// interrupted.
    pub fn cancel(&self, tag: &str, key: &ConversationKey) -> usize {
        let job_key = JobKey::new(tag, key.clone());
        let removed = self.inner.table().remove(&job_key).unwrap_or_default();
        for slot in removed.values() {
            slot.wake.cancel();
        }
        if !removed.is_empty() {
            debug!(job = %job_key, count = removed.len(), "cancelled jobs");
        }
        removed.len()
    }

    /// Returns whether any job is pending under the tag and key.
    #[must_use]
    pub fn has(&self, tag: &str, key: &ConversationKey) -> bool {
        self.pending(tag, key) > 0
    }

    /// Returns the number of jobs pending under the tag and key.
    #[must_use]
    pub fn pending(&self, tag: &str, key: &ConversationKey) -> usize {
        self.inner
            .table()
            .get(&JobKey::new(tag, key.clone()))
            .map_or(0, HashMap::len)
    }
}

/// Runs a callback in its own task so a panic is contained and logged.
async fn fire(job_key: &JobKey, id: JobId, job: JobFuture) {
    match tokio::spawn(job).await {
        Ok(Ok(())) => debug!(job = %job_key, %id, "job fired"),
        Ok(Err(e)) => warn!(job = %job_key, %id, error = %e, "job callback failed"),
        Err(e) => error!(job = %job_key, %id, error = %e, "job callback panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(name: &str) -> ConversationKey {
        ConversationKey::new(name)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> JobFuture + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn once_job_fires_after_delay() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_once("reminder", key("c1"), Duration::from_secs(5), counting(&fired));
        assert!(scheduler.has("reminder", &key("c1")));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.has("reminder", &key("c1")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_fire_prevents_callback() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for delay_ms in [0, 1, 10, 1_000] {
            scheduler.schedule_once(
                "reminder",
                key("c1"),
                Duration::from_millis(delay_ms),
                counting(&fired),
            );
            assert_eq!(scheduler.cancel("reminder", &key("c1")), 1);
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn once_jobs_are_multi_flight() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_once("reminder", key("c1"), Duration::from_secs(1), counting(&fired));
        scheduler.schedule_once("reminder", key("c1"), Duration::from_secs(2), counting(&fired));
        assert_eq!(scheduler.pending("reminder", &key("c1")), 2);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_scoped_to_tag_and_key() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_once("reminder", key("c1"), Duration::from_secs(1), counting(&fired));
        scheduler.schedule_once("reminder", key("c2"), Duration::from_secs(1), counting(&fired));
        scheduler.schedule_once("other", key("c1"), Duration::from_secs(1), counting(&fired));

        scheduler.cancel("reminder", &key("c1"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callback_does_not_leak_slot() {
        let scheduler = JobScheduler::new();

        scheduler.schedule_once("reminder", key("c1"), Duration::from_secs(1), || {
            async { Err("gateway unavailable".into()) }.boxed()
        });
        scheduler.schedule_once("reminder", key("c1"), Duration::from_secs(1), || {
            async {
                if true {
                    panic!("handler bug");
                }
                Ok(())
            }
            .boxed()
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!scheduler.has("reminder", &key("c1")));
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_schedule_is_single_flight() {
        let scheduler = JobScheduler::new();
        let schedule = CronSchedule::new("0 8 * * *");

        for _ in 0..2 {
            scheduler
                .schedule_recurring("morning-message", key("c1"), schedule.clone(), || {
                    async { Ok(()) }.boxed()
                })
                .unwrap();
        }

        assert_eq!(scheduler.pending("morning-message", &key("c1")), 1);
        assert_eq!(scheduler.cancel("morning-message", &key("c1")), 1);
        assert!(!scheduler.has("morning-message", &key("c1")));
    }

    #[tokio::test]
    async fn invalid_recurring_schedule_is_rejected() {
        let scheduler = JobScheduler::new();

        let result = scheduler.schedule_recurring(
            "morning-message",
            key("c1"),
            CronSchedule::new("whenever"),
            || async { Ok(()) }.boxed(),
        );

        assert!(result.is_err());
        assert!(!scheduler.has("morning-message", &key("c1")));
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_job_fires_each_occurrence() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&fired);

        scheduler
            .schedule_recurring("tick", key("c1"), CronSchedule::new("* * * * * *"), move || {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(Instant::now());
                    Ok(())
                }
                .boxed()
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        scheduler.cancel("tick", &key("c1"));
        let seen = fired.lock().unwrap().clone();
        assert!((9..=10).contains(&seen.len()), "saw {} fires", seen.len());
        for pair in seen.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(1));
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.lock().unwrap().len(), seen.len());
    }
}
