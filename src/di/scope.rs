use super::{Cleanup, Container, DependencyContext, DependencyRegistry, DependencyValue};
use crate::error::{FennecError, Result};
use crate::http::Request;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Per-request resolution state.
///
/// Values of cacheable providers are resolved at most once per scope.
/// Cleanups run in reverse acquisition order, exactly once: on
/// [`DependencyScope::close`], or from `Drop` when the request is
/// cancelled before it gets there.
pub struct DependencyScope {
    registry: Arc<DependencyRegistry>,
    container: Arc<Container>,
    cache: HashMap<String, DependencyValue>,
    cleanups: Vec<(String, Cleanup)>,
}

impl DependencyScope {
    pub fn new(registry: Arc<DependencyRegistry>, container: Arc<Container>) -> Self {
        Self {
            registry,
            container,
            cache: HashMap::new(),
            cleanups: Vec::new(),
        }
    }

    /// Resolve every name, depth-first, in declaration order.
    pub async fn resolve_all(
        &mut self,
        request: &Arc<Request>,
        names: &[String],
    ) -> Result<HashMap<String, DependencyValue>> {
        let mut resolved = HashMap::with_capacity(names.len());
        for name in names {
            let value = self.resolve(request, name).await?;
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    pub async fn resolve(&mut self, request: &Arc<Request>, name: &str) -> Result<DependencyValue> {
        let mut path = Vec::new();
        self.resolve_inner(request, name, &mut path).await
    }

    fn resolve_inner<'a>(
        &'a mut self,
        request: &'a Arc<Request>,
        name: &'a str,
        path: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<DependencyValue>> {
        Box::pin(async move {
            if let Some(start) = path.iter().position(|n| n == name) {
                let mut cycle = path[start..].to_vec();
                cycle.push(name.to_string());
                return Err(FennecError::CircularDependency { cycle });
            }

            let entry = self
                .registry
                .get(name)
                .cloned()
                .ok_or_else(|| FennecError::DependencyNotFound(name.to_string()))?;

            if entry.cacheable {
                if let Some(value) = self.cache.get(name) {
                    return Ok(Arc::clone(value));
                }
            }

            path.push(name.to_string());
            let mut resolved = HashMap::new();
            for dependency in entry.provider.dependencies() {
                let value = self.resolve_inner(request, dependency, path).await?;
                resolved.insert(dependency.clone(), value);
            }
            path.pop();

            let cx = DependencyContext::new(Arc::clone(request), resolved, Arc::clone(&self.container));
            let provision = entry
                .provider
                .provide(cx)
                .await
                .map_err(|source| FennecError::from_provider(name, source))?;

            tracing::debug!("Resolved dependency '{}'", name);
            if let Some(cleanup) = provision.cleanup {
                self.cleanups.push((name.to_string(), cleanup));
            }
            if entry.cacheable {
                self.cache.insert(name.to_string(), Arc::clone(&provision.value));
            }
            Ok(provision.value)
        })
    }

    /// Number of cleanups still pending.
    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }

    /// Run pending cleanups, most recently acquired first.
    pub async fn close(&mut self) {
        while let Some((name, cleanup)) = self.cleanups.pop() {
            if AssertUnwindSafe(cleanup()).catch_unwind().await.is_err() {
                tracing::error!("Cleanup of dependency '{}' panicked", name);
            } else {
                tracing::debug!("Released dependency '{}'", name);
            }
        }
        self.cache.clear();
    }
}

impl Drop for DependencyScope {
    fn drop(&mut self) {
        if self.cleanups.is_empty() {
            return;
        }
        let cleanups = std::mem::take(&mut self.cleanups);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Request dropped early; releasing {} dependencies", cleanups.len());
                handle.spawn(async move {
                    for (name, cleanup) in cleanups.into_iter().rev() {
                        if AssertUnwindSafe(cleanup()).catch_unwind().await.is_err() {
                            tracing::error!("Cleanup of dependency '{}' panicked", name);
                        }
                    }
                });
            }
            Err(_) => tracing::warn!(
                "Dependency scope dropped outside a runtime; {} cleanups skipped",
                cleanups.len()
            ),
        }
    }
}
