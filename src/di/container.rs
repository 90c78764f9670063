use crate::error::{FennecError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

/// Type alias for a function that can cast an `Arc<dyn Any>` to another `Arc<dyn Any>`.
/// The inner value is usually an `Arc<dyn Trait>`.
type CasterFn = Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// Thread-safe container for application-scoped services.
///
/// Services are stored once at startup and shared by every request;
/// handlers reach them through `RequestContext::service`.
pub struct Container {
    services: DashMap<TypeId, ServiceEntry>,
    trait_mappings: DashMap<TypeId, TypeId>,
    casters: DashMap<TypeId, CasterFn>,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            trait_mappings: self.trait_mappings.clone(),
            casters: self.casters.clone(),
        }
    }
}

#[derive(Clone)]
struct ServiceEntry {
    instance: Arc<dyn Any + Send + Sync>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            trait_mappings: DashMap::new(),
            casters: DashMap::new(),
        }
    }

    pub fn register<T: 'static + Send + Sync>(&mut self, instance: T) -> &mut Self {
        self.register_arc(Arc::new(instance))
    }

    /// Register an instance that is already shared elsewhere.
    pub fn register_arc<T: 'static + Send + Sync>(&mut self, instance: Arc<T>) -> &mut Self {
        let entry = ServiceEntry { instance };
        self.services.insert(TypeId::of::<T>(), entry);
        self
    }

    pub fn register_trait<Trait, Impl, F>(&mut self, caster_fn: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        let trait_id = TypeId::of::<Trait>();
        let impl_id = TypeId::of::<Impl>();

        self.trait_mappings.insert(trait_id, impl_id);

        // A failed downcast hands the instance back untouched; `resolve_trait`
        // then reports the mismatch.
        let caster: CasterFn = Arc::new(move |instance: Arc<dyn Any + Send + Sync>| {
            match instance.downcast::<Impl>() {
                Ok(concrete) => {
                    let trait_obj: Arc<Trait> = caster_fn(concrete);
                    // Wrap the Arc<dyn Trait> in an Arc<dyn Any>
                    Arc::new(trait_obj) as Arc<dyn Any + Send + Sync>
                }
                Err(instance) => instance,
            }
        });

        self.casters.insert(trait_id, caster);
        self
    }

    pub fn resolve<T: 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        let requested_type_id = TypeId::of::<T>();
        let entry = self
            .services
            .get(&requested_type_id)
            .ok_or_else(|| FennecError::DependencyNotFound(type_name::<T>().to_string()))?;
        entry
            .instance
            .clone()
            .downcast::<T>()
            .map_err(|_| downcast_failed(type_name::<T>()))
    }

    pub fn resolve_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        let requested_type_id = TypeId::of::<T>();

        let caster = self
            .casters
            .get(&requested_type_id)
            .ok_or_else(|| FennecError::DependencyNotFound(type_name::<T>().to_string()))?;

        let impl_type_id = self.trait_mappings.get(&requested_type_id).ok_or_else(|| {
            FennecError::DependencyNotFound(format!(
                "No implementation mapping found for trait '{}'",
                type_name::<T>()
            ))
        })?;

        let entry = self.services.get(&impl_type_id).ok_or_else(|| {
            FennecError::DependencyNotFound(format!(
                "Implementation for trait '{}' not registered",
                type_name::<T>()
            ))
        })?;

        let cast_result = (caster.value())(entry.instance.clone());

        // The caster returns an Arc<dyn Any> which holds an Arc<T>.
        // We need to downcast to Arc<T>, which is Sized.
        let wrapper = cast_result
            .downcast::<Arc<T>>()
            .map_err(|_| downcast_failed(type_name::<T>()))?;
        // The result of downcast is Arc<Arc<T>>, so we clone the inner Arc.
        Ok(wrapper.as_ref().clone())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.services.contains_key(&type_id) || self.trait_mappings.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast_failed(type_name: &str) -> FennecError {
    FennecError::internal(format!("Registered service is not a {type_name}"))
}
