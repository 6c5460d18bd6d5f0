use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::PatentError;
use crate::document::{DocumentHandle, DocumentStore};

/// The patent draft currently being worked on.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Session {
    id: String,
    title: String,
    document: DocumentHandle,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}

/// Single-slot holder of the active session.
///
/// Starting a session replaces whatever was there before; the previous
/// document stays on disk. Concurrent `start_new` calls are not serialised,
/// the last one to finish wins.
pub struct SessionRegistry {
    store: Arc<dyn DocumentStore>,
    active: Mutex<Option<Session>>,
    last_id: AtomicI64,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            active: Mutex::new(None),
            last_id: AtomicI64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn start_new(&self, title: &str) -> Result<Session, PatentError> {
        let id = self.next_id();
        let document = self.store.create(&id, title).await?;
        let now = Utc::now();
        let session = Session {
            id,
            title: title.to_string(),
            document,
            created_at: now,
            last_modified: now,
        };
        *self.slot() = Some(session.clone());
        tracing::info!("started patent session {} ({})", session.id, session.title);
        Ok(session)
    }

    pub fn current(&self) -> Option<Session> {
        self.slot().clone()
    }

    pub fn touch(&self) {
        if let Some(session) = self.slot().as_mut() {
            session.last_modified = Utc::now();
        }
    }

    /// Forgets the active session. Its document is left alone.
    pub fn clear(&self) {
        if let Some(session) = self.slot().take() {
            tracing::debug!("cleared patent session {}", session.id);
        }
    }

    // Milliseconds since the epoch, bumped past the previous id when two
    // sessions start within the same millisecond.
    fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = match self.last_id.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(now.max(prev + 1))
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(previous + 1).to_string()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
