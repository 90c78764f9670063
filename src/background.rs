use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

type Task = BoxFuture<'static, anyhow::Result<()>>;

/// Work scheduled by a handler to run after its response is finalized.
///
/// Tasks run in the order they were added. A failing or panicking task is
/// logged and does not stop the ones after it.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<Vec<(String, Task)>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), Box::pin(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the queue onto a single spawned task.
    pub(crate) fn spawn(&self) -> Option<JoinHandle<()>> {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if tasks.is_empty() {
            return None;
        }
        Some(tokio::spawn(async move {
            for (name, task) in tasks {
                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(())) => tracing::debug!("Background task '{}' finished", name),
                    Ok(Err(e)) => tracing::error!("Background task '{}' failed: {:#}", name, e),
                    Err(_) => tracing::error!("Background task '{}' panicked", name),
                }
            }
        }))
    }
}
