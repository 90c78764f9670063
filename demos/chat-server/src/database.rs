use fennec::lifecycle::LifecycleError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// In-memory table store standing in for a real connection pool.
#[derive(Default)]
pub struct Database {
    tables: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    connected: AtomicBool,
    sessions: AtomicUsize,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> Result<(), LifecycleError> {
        tracing::info!("Database: opening connection pool");
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), LifecycleError> {
        let open = self.sessions.load(Ordering::SeqCst);
        if open > 0 {
            tracing::warn!("Database: closing with {} open sessions", open);
        }
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("Database: connection pool closed");
        Ok(())
    }

    /// Check out a session for one request.
    pub fn session(self: &Arc<Self>) -> anyhow::Result<DbSession> {
        if !self.connected.load(Ordering::SeqCst) {
            anyhow::bail!("database is not connected");
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(DbSession {
            db: Arc::clone(self),
        })
    }
}

/// A request-scoped handle, released when the request completes.
pub struct DbSession {
    db: Arc<Database>,
}

impl DbSession {
    pub fn insert(&self, table: &str, id: &str, row: String) {
        self.tables()
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), row);
    }

    pub fn get(&self, table: &str, id: &str) -> Option<String> {
        self.tables().get(table).and_then(|rows| rows.get(id).cloned())
    }

    pub fn remove(&self, table: &str, id: &str) -> Option<String> {
        self.tables().get_mut(table).and_then(|rows| rows.remove(id))
    }

    pub fn scan(&self, table: &str) -> Vec<String> {
        self.tables()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn release(&self) {
        self.db.sessions.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("Database: session released");
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, String>>> {
        self.db.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
