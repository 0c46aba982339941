//! Draft sessions: one draft store per `(tenant, session)`, opened lazily
//! and dropped again once idle or when the cache is full.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tutera_core::storage::StorageResult;
use tutera_core::{
    Autosave, CourseDraftStore, DraftStorage, FileStorage, MemoryStorage, TenantContext,
    TuteraConfigSnapshot, TuteraError, DEFAULT_AUTOSAVE_DELAY,
};

use super::types::validate_session_id;

/// Storage chosen at runtime: a file under `drafts.dir`, or memory.
#[derive(Debug)]
pub enum SessionStorage {
    Memory(MemoryStorage),
    File(FileStorage),
}

impl DraftStorage for SessionStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        match self {
            SessionStorage::Memory(s) => s.get_item(key),
            SessionStorage::File(s) => s.get_item(key),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        match self {
            SessionStorage::Memory(s) => s.set_item(key, value),
            SessionStorage::File(s) => s.set_item(key, value),
        }
    }

    fn remove_item(&mut self, key: &str) -> StorageResult<()> {
        match self {
            SessionStorage::Memory(s) => s.remove_item(key),
            SessionStorage::File(s) => s.remove_item(key),
        }
    }
}

pub type SessionStore = CourseDraftStore<SessionStorage>;

pub struct DraftSession {
    store: Arc<Mutex<SessionStore>>,
    autosave: Autosave,
}

impl DraftSession {
    fn new(store: SessionStore, delay: Duration) -> Self {
        let store = Arc::new(Mutex::new(store));
        let autosave = Autosave::spawn(Arc::clone(&store), delay);
        Self { store, autosave }
    }

    /// Lock the store after applying any pending autosave, so callers
    /// always see the latest draft.
    pub async fn lock(&self) -> MutexGuard<'_, SessionStore> {
        self.autosave.flush().await;
        self.store.lock().await
    }

    pub fn autosave(&self) -> &Autosave {
        &self.autosave
    }
}

/// Tenant slugs become directory names: `[A-Za-z0-9_-]`, 1-64 chars.
fn validate_tenant_slug(slug: &str) -> Result<(), TuteraError> {
    let ok = !slug.is_empty()
        && slug.len() <= 64
        && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(TuteraError::bad_request(format!("Invalid tenant `{slug}`")))
    }
}

pub const DEFAULT_MAX_SESSIONS: usize = 10_000;
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

type SessionKey = (String, String);

struct CachedSession {
    session: Arc<DraftSession>,
    /// Millis since `DraftSessions::started`.
    last_used: AtomicU64,
}

pub struct DraftSessions {
    dir: Option<PathBuf>,
    autosave_delay: Duration,
    max_sessions: usize,
    idle: Duration,
    started: Instant,
    sessions: RwLock<HashMap<SessionKey, CachedSession>>,
}

impl DraftSessions {
    pub fn new(dir: Option<PathBuf>, autosave_delay: Duration) -> Self {
        Self {
            dir,
            autosave_delay,
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle: DEFAULT_SESSION_IDLE,
            started: Instant::now(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Cap on cached sessions and how long an unused one is kept.
    pub fn with_limits(mut self, max_sessions: usize, idle: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.idle = idle;
        self
    }

    /// `drafts.dir` (unset means memory), `drafts.autosaveMs`,
    /// `drafts.maxSessions` and `drafts.idleSecs`.
    pub fn from_config(cfg: &TuteraConfigSnapshot) -> Self {
        let dir = cfg
            .get_string("drafts.dir")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        let delay = cfg
            .get_u64("drafts.autosaveMs")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_AUTOSAVE_DELAY);
        let max_sessions = cfg
            .get_u64("drafts.maxSessions")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_SESSIONS);
        let idle = cfg
            .get_u64("drafts.idleSecs")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_IDLE);
        Self::new(dir, delay).with_limits(max_sessions, idle)
    }

    /// Sessions currently held in memory.
    pub async fn open_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn now_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn touch(&self, cached: &CachedSession) -> Arc<DraftSession> {
        cached.last_used.store(self.now_millis(), Ordering::Relaxed);
        Arc::clone(&cached.session)
    }

    /// Drops idle sessions, then the least recently used ones until there
    /// is room for one more. Sessions a request still holds are skipped.
    /// Dropping a session flushes its pending autosave.
    fn evict(&self, sessions: &mut HashMap<SessionKey, CachedSession>) {
        let now = self.now_millis();
        let idle = self.idle.as_millis() as u64;
        let unused = |c: &CachedSession| Arc::strong_count(&c.session) == 1;

        let before = sessions.len();
        sessions.retain(|_, c| !(unused(c) && now.saturating_sub(c.last_used.load(Ordering::Relaxed)) >= idle));

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, c)| unused(c))
                .min_by_key(|(_, c)| c.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    sessions.remove(&key);
                }
                None => {
                    tracing::warn!(open = sessions.len(), max = self.max_sessions, "all draft sessions busy, cache over capacity");
                    break;
                }
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, open = sessions.len(), "draft sessions evicted");
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    fn storage_for(&self, tenant: &str, session: &str) -> Result<SessionStorage, TuteraError> {
        match &self.dir {
            None => Ok(SessionStorage::Memory(MemoryStorage::new())),
            Some(dir) => {
                let path = dir.join(tenant).join(format!("{session}.json"));
                let file = FileStorage::open(path)?;
                Ok(SessionStorage::File(file))
            }
        }
    }

    /// The session's store, hydrated from storage on first use.
    pub async fn open(&self, tenant: &TenantContext, session: &str) -> Result<Arc<DraftSession>, TuteraError> {
        validate_tenant_slug(tenant.slug())?;
        validate_session_id(session)?;
        let key = (tenant.slug().to_string(), session.to_string());

        if let Some(found) = self.sessions.read().await.get(&key) {
            return Ok(self.touch(found));
        }

        let mut sessions = self.sessions.write().await;
        if let Some(found) = sessions.get(&key) {
            return Ok(self.touch(found));
        }

        self.evict(&mut sessions);

        let storage = self.storage_for(&key.0, &key.1)?;
        let opened = Arc::new(DraftSession::new(CourseDraftStore::hydrate(storage), self.autosave_delay));
        tracing::debug!(tenant = %key.0, session = %key.1, "draft session opened");
        sessions.insert(
            key,
            CachedSession {
                session: Arc::clone(&opened),
                last_used: AtomicU64::new(self.now_millis()),
            },
        );
        Ok(opened)
    }
}
