use super::Provider;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ProviderEntry {
    pub(crate) provider: Arc<dyn Provider>,
    /// Resolve once per request and reuse the value.
    pub(crate) cacheable: bool,
}

/// Named request-scoped providers, fixed at startup.
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    providers: HashMap<String, ProviderEntry>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider whose value is cached for the request.
    pub fn register(&mut self, name: impl Into<String>, provider: impl Provider) -> &mut Self {
        self.insert(name.into(), Arc::new(provider), true)
    }

    /// Register a provider that runs every time it is requested, even
    /// within one request.
    pub fn register_uncached(
        &mut self,
        name: impl Into<String>,
        provider: impl Provider,
    ) -> &mut Self {
        self.insert(name.into(), Arc::new(provider), false)
    }

    /// Replace a provider, keeping its caching mode. Meant for tests that
    /// swap a real backend for a fake one.
    pub fn override_with(&mut self, name: impl Into<String>, provider: impl Provider) -> &mut Self {
        let name = name.into();
        let cacheable = self.providers.get(&name).is_none_or(|e| e.cacheable);
        if !self.providers.contains_key(&name) {
            tracing::warn!("Overriding unregistered dependency '{}'", name);
        }
        self.insert(name, Arc::new(provider), cacheable)
    }

    fn insert(&mut self, name: String, provider: Arc<dyn Provider>, cacheable: bool) -> &mut Self {
        tracing::debug!("Registered dependency '{}' (cacheable: {})", name, cacheable);
        self.providers.insert(
            name,
            ProviderEntry {
                provider,
                cacheable,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
