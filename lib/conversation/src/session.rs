//! Per-conversation session state.
//!
//! A [`SessionStore`] owns every [`Session`], created lazily on first use and
//! never removed. Each session carries two locks with different jobs:
//!
//! - the *turn* lock (async) serializes runs; it is held from message
//!   submission until the run reaches a terminal state, across awaits
//! - the *flags* lock (sync) guards the small mutable state and is only ever
//!   held for a field read or write
//!
//! The store's own map lock is held only for insert-if-absent. No lock is
//! acquired while another is held except the flags lock inside a turn, so
//! the store cannot deadlock.

use sidekick_core::{ConversationKey, ThreadId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SessionFlags {
    thread: Option<ThreadId>,
    awaits_response: bool,
    always_respond: bool,
    cancel: Option<CancellationToken>,
}

/// State of one conversation.
#[derive(Debug)]
pub struct Session {
    key: ConversationKey,
    turn: tokio::sync::Mutex<()>,
    flags: Mutex<SessionFlags>,
}

impl Session {
    fn new(key: ConversationKey) -> Self {
        Self {
            key,
            turn: tokio::sync::Mutex::new(()),
            flags: Mutex::new(SessionFlags::default()),
        }
    }

    fn flags(&self) -> MutexGuard<'_, SessionFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The conversation this session belongs to.
    #[must_use]
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// The remote thread, if one has been created.
    #[must_use]
    pub fn thread(&self) -> Option<ThreadId> {
        self.flags().thread.clone()
    }

    /// Records the remote thread.
    pub fn set_thread(&self, thread: ThreadId) {
        self.flags().thread = Some(thread);
    }

    /// Whether a fired reminder is waiting for the user to answer.
    #[must_use]
    pub fn awaits_response(&self) -> bool {
        self.flags().awaits_response
    }

    /// Whether every message gets a reply, mentioned or not.
    #[must_use]
    pub fn always_respond(&self) -> bool {
        self.flags().always_respond
    }
}

/// Owner of all sessions, keyed by conversation.
///
/// Cloning yields another handle to the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<ConversationKey, Arc<Session>>>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `key`, creating it if absent.
    pub fn get_or_create(&self, key: &ConversationKey) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Session::new(key.clone()))),
        )
    }

    /// Runs `f` while holding the session's turn lock.
    ///
    /// Calls for the same key run one after another; calls for different
    /// keys never wait on each other.
    pub async fn with_lock<F, Fut, T>(&self, key: &ConversationKey, f: F) -> T
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = T>,
    {
        let session = self.get_or_create(key);
        let _turn = session.turn.lock().await;
        f(Arc::clone(&session)).await
    }

    /// Sets the awaiting-response flag.
    pub fn set_awaits_response(&self, key: &ConversationKey, value: bool) {
        self.get_or_create(key).flags().awaits_response = value;
    }

    /// Clears the awaiting-response flag, returning its previous value.
    pub fn take_awaits_response(&self, key: &ConversationKey) -> bool {
        std::mem::take(&mut self.get_or_create(key).flags().awaits_response)
    }

    /// Sets the always-respond flag and returns the new value.
    pub fn set_always_respond(&self, key: &ConversationKey, value: bool) -> bool {
        self.get_or_create(key).flags().always_respond = value;
        value
    }

    /// Flips the always-respond flag and returns the new value.
    pub fn toggle_always_respond(&self, key: &ConversationKey) -> bool {
        let session = self.get_or_create(key);
        let mut flags = session.flags();
        flags.always_respond = !flags.always_respond;
        flags.always_respond
    }

    /// Stores the cancellation handle of the session's background task.
    pub fn set_cancel_handle(&self, key: &ConversationKey, handle: CancellationToken) {
        self.get_or_create(key).flags().cancel = Some(handle);
    }

    /// Returns the stored cancellation handle, if any.
    #[must_use]
    pub fn cancel_handle(&self, key: &ConversationKey) -> Option<CancellationToken> {
        self.get_or_create(key).flags().cancel.clone()
    }

    /// Forgets the remote thread so the next message starts a new one.
    pub fn reset_thread(&self, key: &ConversationKey) {
        self.get_or_create(key).flags().thread = None;
    }

    /// Number of sessions created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no session has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(name: &str) -> ConversationKey {
        ConversationKey::new(name)
    }

    #[test]
    fn unknown_key_is_created_on_access() {
        let store = SessionStore::new();
        assert!(store.is_empty());

        store.set_awaits_response(&key("c1"), true);

        assert_eq!(store.len(), 1);
        assert!(store.get_or_create(&key("c1")).awaits_response());
    }

    #[test]
    fn toggle_always_respond_returns_new_value() {
        let store = SessionStore::new();

        assert!(store.toggle_always_respond(&key("c1")));
        assert!(!store.toggle_always_respond(&key("c1")));
        assert!(store.set_always_respond(&key("c1"), true));
        assert!(store.get_or_create(&key("c1")).always_respond());
    }

    #[test]
    fn take_awaits_response_clears_flag() {
        let store = SessionStore::new();
        store.set_awaits_response(&key("c1"), true);

        assert!(store.take_awaits_response(&key("c1")));
        assert!(!store.take_awaits_response(&key("c1")));
    }

    #[test]
    fn reset_thread_drops_handle() {
        let store = SessionStore::new();
        store
            .get_or_create(&key("c1"))
            .set_thread(ThreadId::new("thread_1"));

        store.reset_thread(&key("c1"));

        assert_eq!(store.get_or_create(&key("c1")).thread(), None);
    }

    #[test]
    fn cancel_handle_is_shared() {
        let store = SessionStore::new();
        let token = CancellationToken::new();
        store.set_cancel_handle(&key("c1"), token.clone());

        store.cancel_handle(&key("c1")).unwrap().cancel();

        assert!(token.is_cancelled());
        assert!(store.cancel_handle(&key("c2")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_turns_never_overlap() {
        let store = SessionStore::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let active = Arc::clone(&active);
                let max_active = Arc::clone(&max_active);
                tokio::spawn(async move {
                    store
                        .with_lock(&key("c1"), |_| async {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_in_parallel() {
        let store = SessionStore::new();
        let started = tokio::time::Instant::now();

        let (first, second) = (key("a"), key("b"));

        let a = store.with_lock(&first, |_| tokio::time::sleep(Duration::from_secs(1)));
        let b = store.with_lock(&second, |_| tokio::time::sleep(Duration::from_secs(1)));
        tokio::join!(a, b);

        assert!(started.elapsed() < Duration::from_millis(1_500));
    }
}
