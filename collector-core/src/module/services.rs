use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{CollectorError, Result};

struct Entry {
    name: &'static str,
    service: Box<dyn Any + Send + Sync>,
}

/// Services one module exposes, keyed by interface type.
///
/// The interface is usually a trait object (`dyn Foo`); the registry stores
/// the `Arc<dyn Foo>` and hands out clones. Each interface holds exactly one
/// implementation: a second registration is a configuration error, never an
/// override.
pub struct ServiceRegistry {
    module: String,
    services: HashMap<TypeId, Entry>,
}

impl ServiceRegistry {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_owned(),
            services: HashMap::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn register<S>(&mut self, service: Arc<S>) -> Result<()>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<S>();
        if self.services.contains_key(&key) {
            return Err(CollectorError::ConfigurationConflict(format!(
                "module {} already provides an implementation of {}",
                self.module,
                type_name::<S>()
            )));
        }
        self.services.insert(
            key,
            Entry {
                name: type_name::<S>(),
                service: Box::new(service),
            },
        );
        Ok(())
    }

    pub fn get<S>(&self) -> Result<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<S>())
            .and_then(|entry| entry.service.downcast_ref::<Arc<S>>())
            .cloned()
            .ok_or_else(|| CollectorError::ServiceNotProvided {
                module: self.module.clone(),
                service: type_name::<S>().to_owned(),
            })
    }

    pub fn contains<S>(&self) -> bool
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.contains_key(&TypeId::of::<S>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.services.values().map(|e| e.name).collect();
        names.sort_unstable();
        f.debug_struct("ServiceRegistry")
            .field("module", &self.module)
            .field("services", &names)
            .finish()
    }
}
