//! Lifecycle Manager
//!
//! Manages the registration and execution of lifespan hooks.

use super::{LifecycleError, OnShutdown, OnStartup, Phase, Result};
use std::sync::Arc;
use std::time::Duration;

struct LifecycleHook<T: ?Sized> {
    hook: Arc<T>,
    name: String,
}

impl<T: ?Sized> Clone for LifecycleHook<T> {
    fn clone(&self) -> Self {
        Self {
            hook: Arc::clone(&self.hook),
            name: self.name.clone(),
        }
    }
}

/// Runs startup and shutdown hooks.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = LifecycleManager::new();
/// manager.register_startup(db.clone(), "Database");
/// manager.register_shutdown(db, "Database");
///
/// manager.call_startup().await?;
/// // ... application runs ...
/// manager.call_shutdown().await;
/// ```
#[derive(Clone)]
pub struct LifecycleManager {
    startup_hooks: Vec<LifecycleHook<dyn OnStartup>>,
    shutdown_hooks: Vec<LifecycleHook<dyn OnShutdown>>,
    timeout: Duration,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            startup_hooks: Vec::new(),
            shutdown_hooks: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Upper bound for each phase as a whole.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register_startup<T>(&mut self, hook: Arc<T>, name: impl Into<String>)
    where
        T: OnStartup,
    {
        self.startup_hooks.push(LifecycleHook {
            hook,
            name: name.into(),
        });
    }

    pub fn register_shutdown<T>(&mut self, hook: Arc<T>, name: impl Into<String>)
    where
        T: OnShutdown,
    {
        self.shutdown_hooks.push(LifecycleHook {
            hook,
            name: name.into(),
        });
    }

    /// Execute all OnStartup hooks
    ///
    /// Hooks are executed in the order they were registered; the first
    /// failure stops startup.
    pub async fn call_startup(&self) -> Result<()> {
        tracing::info!("Calling OnStartup hooks...");

        for entry in &self.startup_hooks {
            tracing::debug!("Starting: {}", entry.name);
            entry.hook.on_startup().await.map_err(|e| {
                tracing::error!("OnStartup failed for {}: {}", entry.name, e);
                LifecycleError::hook_failed(&entry.name, e.to_string())
            })?;
            tracing::debug!("Started: {}", entry.name);
        }

        tracing::info!(
            "OnStartup complete ({} hooks executed)",
            self.startup_hooks.len()
        );
        Ok(())
    }

    pub async fn call_startup_with_timeout(&self) -> Result<()> {
        tokio::time::timeout(self.timeout, self.call_startup())
            .await
            .map_err(|_| LifecycleError::timeout(Phase::Startup, self.timeout))?
    }

    /// Execute all OnShutdown hooks
    ///
    /// Hooks are executed in **reverse order**. A failing hook is logged
    /// and the remaining ones still run.
    pub async fn call_shutdown(&self) -> usize {
        tracing::info!("Calling OnShutdown hooks...");

        let mut failures = 0;
        for entry in self.shutdown_hooks.iter().rev() {
            tracing::debug!("Shutting down: {}", entry.name);
            if let Err(e) = entry.hook.on_shutdown().await {
                tracing::error!("OnShutdown failed for {}: {}", entry.name, e);
                failures += 1;
            }
        }

        tracing::info!(
            "OnShutdown complete ({} hooks executed, {} failed)",
            self.shutdown_hooks.len(),
            failures
        );
        failures
    }

    pub async fn call_shutdown_with_timeout(&self) -> Result<usize> {
        tokio::time::timeout(self.timeout, self.call_shutdown())
            .await
            .map_err(|_| LifecycleError::timeout(Phase::Shutdown, self.timeout))
    }

    pub fn startup_hook_count(&self) -> usize {
        self.startup_hooks.len()
    }

    pub fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.len()
    }
}
