//! Session registry mapping upload ids to retrieval pipelines

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::pipeline::RetrievalPipeline;

/// One uploaded document and the pipeline answering questions about it
pub struct Session {
    id: Uuid,
    pipeline: Arc<RetrievalPipeline>,
    filename: String,
    chunk_count: usize,
    created_at: Instant,
    last_accessed: Mutex<Instant>,
    /// Held for the whole of a query so answers on one session never interleave
    query_lock: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pipeline(&self) -> &Arc<RetrievalPipeline> {
        &self.pipeline
    }

    /// Name of the uploaded file
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed(&self) -> Instant {
        *self.last_accessed.lock()
    }

    /// Wait for earlier queries on this session to finish
    pub async fn lock_queries(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.query_lock.lock().await
    }

    fn touch(&self, now: Instant) {
        *self.last_accessed.lock() = now;
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        match ttl {
            Some(ttl) => now.saturating_duration_since(self.last_accessed()) > ttl,
            None => false,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("chunk_count", &self.chunk_count)
            .finish_non_exhaustive()
    }
}

/// Process-wide, in-memory session map
///
/// Unbounded and non-expiring unless `max_sessions` (LRU eviction on create)
/// or `idle_ttl` is set.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<Session>>,
    max_sessions: Option<usize>,
    idle_ttl: Option<Duration>,
    /// Serializes capacity checks in `create`
    create_lock: Mutex<()>,
}

impl SessionRegistry {
    /// Unbounded registry with no expiry
    pub fn new() -> Self {
        Self::with_limits(None, None)
    }

    pub fn with_limits(max_sessions: Option<usize>, idle_ttl: Option<Duration>) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
            idle_ttl,
            create_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::with_limits(
            config.max_sessions,
            config.idle_ttl_secs.map(Duration::from_secs),
        )
    }

    /// Register a pipeline under a fresh id and return the id
    pub fn create(
        &self,
        pipeline: Arc<RetrievalPipeline>,
        filename: impl Into<String>,
        chunk_count: usize,
    ) -> String {
        let _guard = self.create_lock.lock();

        if let Some(max) = self.max_sessions {
            while self.sessions.len() >= max {
                if !self.evict_least_recently_used() {
                    break;
                }
            }
        }

        let id = Uuid::new_v4();
        let now = Instant::now();
        let session = Arc::new(Session {
            id,
            pipeline,
            filename: filename.into(),
            chunk_count,
            created_at: now,
            last_accessed: Mutex::new(now),
            query_lock: tokio::sync::Mutex::new(()),
        });

        let previous = self.sessions.insert(id, session);
        assert!(previous.is_none(), "session id collision: {}", id);

        tracing::info!(
            "Created session {} ({} sessions active)",
            id,
            self.sessions.len()
        );

        id.to_string()
    }

    /// Look up a session, refreshing its last access time
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        let not_found = || Error::SessionNotFound(session_id.to_string());

        let id = Uuid::parse_str(session_id).map_err(|_| not_found())?;
        let session = self
            .sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(not_found)?;

        let now = Instant::now();
        if session.is_expired(self.idle_ttl, now) {
            self.sessions.remove(&id);
            tracing::info!("Session {} expired on access", id);
            return Err(not_found());
        }

        session.touch(now);
        Ok(session)
    }

    /// Remove sessions idle longer than the TTL; returns how many were removed
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub(crate) fn evict_expired_at(&self, now: Instant) -> usize {
        if self.idle_ttl.is_none() {
            return 0;
        }

        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_expired(self.idle_ttl, now));
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            tracing::info!("Evicted {} idle sessions", removed);
        }
        removed
    }

    fn evict_least_recently_used(&self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_accessed())
            .map(|entry| *entry.key());

        match oldest {
            Some(id) => {
                self.sessions.remove(&id);
                tracing::info!("Evicted least recently used session {}", id);
                true
            }
            None => false,
        }
    }

    /// Periodically sweep expired sessions until the registry is dropped
    ///
    /// Returns `None` when no idle TTL is configured or the interval is zero.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
    ) -> Option<tokio::task::JoinHandle<()>> {
        self.idle_ttl?;
        if interval.is_zero() {
            tracing::warn!("Session sweeper not started: sweep interval is zero");
            return None;
        }
        let registry: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.evict_expired();
                    }
                    None => break,
                }
            }
        }))
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::VectorIndex;
    use crate::test_support::{keyword_embedder, ScriptedLlm};

    fn pipeline() -> Arc<RetrievalPipeline> {
        let mut index = VectorIndex::new(keyword_embedder(&["x"]));
        index.insert("x", vec![1.0, 0.1]).unwrap();
        Arc::new(RetrievalPipeline::new(index, Arc::new(ScriptedLlm::new(&["ok"]))))
    }

    #[test]
    fn test_create_and_get() {
        let registry = SessionRegistry::new();
        let id = registry.create(pipeline(), "notes.txt", 3);

        let session = registry.get(&id).unwrap();
        assert_eq!(session.filename(), "notes.txt");
        assert_eq!(session.chunk_count(), 3);
        assert_eq!(session.id().to_string(), id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.create(pipeline(), "a.txt", 1);
        let b = registry.create(pipeline(), "a.txt", 1);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.get(&Uuid::new_v4().to_string()),
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            registry.get("not-a-uuid"),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_lru_eviction() {
        let registry = SessionRegistry::with_limits(Some(2), None);
        let first = registry.create(pipeline(), "first.txt", 1);
        std::thread::sleep(Duration::from_millis(5));
        let second = registry.create(pipeline(), "second.txt", 1);
        std::thread::sleep(Duration::from_millis(5));

        // Touch the older session so the newer one becomes least recently used
        registry.get(&first).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let third = registry.create(pipeline(), "third.txt", 1);

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&first).is_ok());
        assert!(matches!(registry.get(&second), Err(Error::SessionNotFound(_))));
        assert!(registry.get(&third).is_ok());
    }

    #[test]
    fn test_idle_expiry() {
        let registry = SessionRegistry::with_limits(None, Some(Duration::from_secs(60)));
        let id = registry.create(pipeline(), "notes.txt", 1);

        assert_eq!(registry.evict_expired_at(Instant::now()), 0);
        assert_eq!(
            registry.evict_expired_at(Instant::now() + Duration::from_secs(120)),
            1
        );
        assert!(registry.is_empty());
        assert!(matches!(registry.get(&id), Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let registry = SessionRegistry::new();
        registry.create(pipeline(), "notes.txt", 1);
        assert_eq!(
            registry.evict_expired_at(Instant::now() + Duration::from_secs(1_000_000)),
            0
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_query_lock_serializes() {
        let registry = SessionRegistry::new();
        let id = registry.create(pipeline(), "notes.txt", 1);
        let session = registry.get(&id).unwrap();

        let guard = session.lock_queries().await;
        assert!(session.query_lock.try_lock().is_err());
        drop(guard);
        assert!(session.query_lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_sweeper_requires_ttl() {
        let registry = Arc::new(SessionRegistry::new());
        assert!(registry.spawn_sweeper(Duration::from_secs(1)).is_none());

        let registry = Arc::new(SessionRegistry::with_limits(None, Some(Duration::from_secs(1))));
        assert!(registry.spawn_sweeper(Duration::ZERO).is_none());

        let registry = Arc::new(SessionRegistry::with_limits(None, Some(Duration::from_secs(1))));
        let handle = registry.spawn_sweeper(Duration::from_millis(10)).unwrap();
        drop(registry);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
