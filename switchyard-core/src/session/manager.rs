//! Session manager with lazy creation and idle eviction
//!
//! The SessionManager maps external session ids to live [`Session`]s. There
//! is no explicit "create" call: the first lookup of an id creates its
//! session atomically, so concurrent first accesses still share one object.

use std::sync::Arc;
use std::time::Duration;

use scc::hash_map::Entry;

use crate::logging::session_tag;

use super::Session;

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Enable automatic eviction of idle sessions
    pub auto_cleanup: bool,

    /// Interval between cleanup runs
    pub cleanup_interval: Duration,

    /// Sessions untouched for longer than this are destroyed by cleanup
    pub max_idle: Duration,

    /// Log cleanup operations
    pub log_cleanup: bool,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            auto_cleanup: true,
            cleanup_interval: Duration::from_secs(300), // 5 minutes
            max_idle: Duration::from_secs(3600),
            log_cleanup: true,
        }
    }
}

impl SessionManagerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set auto cleanup enabled/disabled
    pub fn with_auto_cleanup(mut self, enabled: bool) -> Self {
        self.auto_cleanup = enabled;
        self
    }

    /// Set cleanup interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the idle time after which a session is evicted
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set whether to log cleanup operations
    pub fn with_log_cleanup(mut self, enabled: bool) -> Self {
        self.log_cleanup = enabled;
        self
    }
}

type SessionMap = scc::HashMap<String, Arc<Session>>;

/// Owner of every live session, keyed by external session id
pub struct SessionManager {
    sessions: Arc<SessionMap>,
    cleanup_task: Option<tokio::task::JoinHandle<()>>,
    config: SessionManagerConfig,
}

impl SessionManager {
    /// Create a new session manager with default configuration
    pub fn new() -> Self {
        Self::with_config(SessionManagerConfig::default())
    }

    /// Create a new session manager with custom configuration.
    ///
    /// Automatic cleanup needs a tokio runtime; outside one it is skipped.
    pub fn with_config(config: SessionManagerConfig) -> Self {
        let sessions = Arc::new(SessionMap::new());

        let cleanup_task = match (config.auto_cleanup, tokio::runtime::Handle::try_current()) {
            (true, Ok(runtime)) => {
                let sessions = Arc::downgrade(&sessions);
                let interval = config.cleanup_interval;
                let max_idle = config.max_idle;
                let log_cleanup = config.log_cleanup;

                Some(runtime.spawn(async move {
                    let mut interval_timer = tokio::time::interval(interval);
                    // first tick completes immediately
                    interval_timer.tick().await;
                    loop {
                        interval_timer.tick().await;
                        let Some(sessions) = sessions.upgrade() else { break };

                        let count = evict_idle(&sessions, max_idle);
                        if count > 0 && log_cleanup {
                            log::info!("Auto-evicted {} idle sessions", count);
                        }
                    }
                }))
            }
            (true, Err(_)) => {
                log::warn!("No tokio runtime available, idle session cleanup disabled");
                None
            }
            (false, _) => None,
        };

        Self { sessions, cleanup_task, config }
    }

    /// Get the manager configuration
    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Fetch the session for `id`, creating it on first access.
    ///
    /// A destroyed session is never handed out again: its entry is replaced by
    /// a brand-new session.
    pub fn session(&self, id: &str) -> Arc<Session> {
        match self.sessions.entry_sync(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_destroyed() {
                    let fresh = Session::new(id);
                    *occupied.get_mut() = Arc::clone(&fresh);
                    log::debug!("Session {} replaced after destroy", session_tag(id));
                    fresh
                } else {
                    let session = Arc::clone(occupied.get());
                    session.touch();
                    session
                }
            }
            Entry::Vacant(vacant) => {
                let fresh = Session::new(id);
                vacant.insert_entry(Arc::clone(&fresh));
                log::debug!("Session {} created", session_tag(id));
                fresh
            }
        }
    }

    /// Fetch a live session without creating one
    pub fn find(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read_sync(id, |_, session| Arc::clone(session))
            .filter(|session| !session.is_destroyed())
    }

    /// Destroy the session for `id` and forget it; returns whether it existed
    pub fn destroy(&self, id: &str) -> bool {
        match self.sessions.remove_sync(id) {
            Some((_, session)) => {
                session.destroy();
                true
            }
            None => false,
        }
    }

    /// Manually trigger a cleanup (in addition to automatic cleanup)
    pub fn cleanup_now(&self) -> usize {
        evict_idle(&self.sessions, self.config.max_idle)
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Check if a live session exists
    pub fn has_session(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Generate a fresh opaque session id (64 hex characters)
    pub fn issue_id() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // Abort the cleanup task when the manager is dropped
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}

fn evict_idle(sessions: &SessionMap, max_idle: Duration) -> usize {
    let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
    let mut evicted = 0;
    sessions.retain_sync(|id, session| {
        // Open streams keep a session alive however long it has been quiet
        let idle = session.idle_for() > max_idle && session.emitter_count() == 0;
        if session.is_destroyed() || idle {
            session.destroy();
            log::debug!("Session {} evicted", session_tag(id));
            evicted += 1;
            false
        } else {
            true
        }
    });
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> SessionManager {
        SessionManager::with_config(SessionManagerConfig::new().with_auto_cleanup(false))
    }

    #[test]
    fn test_first_access_creates_session() {
        let manager = manual();
        assert!(!manager.has_session("a"));

        let first = manager.session("a");
        let second = manager.session("a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_destroyed_session_is_not_revived() {
        let manager = manual();
        let old = manager.session("a");
        old.destroy();

        assert!(manager.find("a").is_none());
        let fresh = manager.session("a");
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(old.is_destroyed());
        assert!(!fresh.is_destroyed());
    }

    #[test]
    fn test_destroy_by_id() {
        let manager = manual();
        let session = manager.session("a");

        assert!(manager.destroy("a"));
        assert!(session.is_destroyed());
        assert!(!manager.destroy("a"));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_manual_cleanup_evicts_idle_sessions() {
        let manager = SessionManager::with_config(
            SessionManagerConfig::new().with_auto_cleanup(false).with_max_idle(Duration::ZERO),
        );
        let session = manager.session("idle");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(manager.cleanup_now(), 1);
        assert!(session.is_destroyed());
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_cleanup_spares_sessions_with_open_streams() {
        let manager = SessionManager::with_config(
            SessionManagerConfig::new().with_auto_cleanup(false).with_max_idle(Duration::ZERO),
        );
        let streaming = manager.session("streaming");
        let (abort, _registration) = futures::future::AbortHandle::new_pair();
        let handle = crate::session::EmitterHandle::new(abort);
        streaming.register_emitter(1, handle.clone()).unwrap();
        let quiet = manager.session("quiet");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(manager.cleanup_now(), 1);
        assert!(quiet.is_destroyed());
        assert!(!streaming.is_destroyed());
        assert!(!handle.is_cancelled());
        assert!(manager.has_session("streaming"));

        streaming.release_emitter(1, handle.token());
        assert_eq!(manager.cleanup_now(), 1);
        assert!(streaming.is_destroyed());
    }

    #[test]
    fn test_issued_ids_are_long_and_unique() {
        let a = SessionManager::issue_id();
        let b = SessionManager::issue_id();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_shares_one_session() {
        let manager = Arc::new(manual());
        let mut handles = vec![];

        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { manager.session("shared") }));
        }

        let mut sessions = vec![];
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_auto_cleanup_runs_in_background() {
        let manager = SessionManager::with_config(
            SessionManagerConfig::new()
                .with_cleanup_interval(Duration::from_millis(20))
                .with_max_idle(Duration::ZERO)
                .with_log_cleanup(false),
        );
        let session = manager.session("idle");

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(session.is_destroyed());
        assert_eq!(manager.session_count(), 0);
    }
}
