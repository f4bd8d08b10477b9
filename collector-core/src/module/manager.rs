use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{ModuleProvider, ServiceRegistry};
use crate::errors::{CollectorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModuleState {
    Unregistered,
    Prepared,
    Started,
    Ready,
}

/// A module whose provider has been prepared.
#[derive(Debug)]
pub struct LoadedModule {
    name: String,
    provider: String,
    state: ModuleState,
    services: ServiceRegistry,
}

impl LoadedModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn service<S>(&self) -> Result<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.get::<S>()
    }
}

/// Service locator over every loaded module.
///
/// Populated only by [`bootstrap`]; once bootstrap returns it is shared
/// behind an `Arc` and never mutated again.
#[derive(Debug, Default)]
pub struct ModuleManager {
    modules: HashMap<String, LoadedModule>,
    order: Vec<String>,
}

impl ModuleManager {
    /// An absent module provides no services, so it is reported as
    /// `ServiceNotProvided`.
    pub fn find(&self, module: &str) -> Result<&LoadedModule> {
        self.modules
            .get(module)
            .ok_or_else(|| CollectorError::ServiceNotProvided {
                module: module.to_owned(),
                service: "any service".to_owned(),
            })
    }

    /// Looks up a service of a module. An absent module is reported the same
    /// way as a missing service.
    pub fn service<S>(&self, module: &str) -> Result<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        match self.modules.get(module) {
            Some(loaded) => loaded.service::<S>(),
            None => Err(CollectorError::ServiceNotProvided {
                module: module.to_owned(),
                service: std::any::type_name::<S>().to_owned(),
            }),
        }
    }

    pub fn state(&self, module: &str) -> ModuleState {
        self.modules
            .get(module)
            .map(|m| m.state)
            .unwrap_or(ModuleState::Unregistered)
    }

    /// Module names in preparation order.
    pub fn modules(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    fn set_state(&mut self, module: &str, state: ModuleState) {
        if let Some(loaded) = self.modules.get_mut(module) {
            loaded.state = state;
        }
    }
}

/// Outcome of a successful bootstrap. The providers are returned so the
/// caller keeps owning their background tasks.
pub struct RunningModules {
    pub manager: Arc<ModuleManager>,
    pub providers: Vec<Box<dyn ModuleProvider>>,
}

impl fmt::Debug for RunningModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<_> = self
            .providers
            .iter()
            .map(|p| format!("{}/{}", p.module(), p.name()))
            .collect();
        f.debug_struct("RunningModules")
            .field("manager", &self.manager)
            .field("providers", &providers)
            .finish()
    }
}

/// Prepares, starts and notifies every provider.
///
/// Providers are ordered so that each module comes after the modules it
/// requires, independent of the order they are passed in; among unrelated
/// modules the input order is kept. Any error aborts the bootstrap: no
/// partially initialised module graph is returned.
pub async fn bootstrap(providers: Vec<Box<dyn ModuleProvider>>) -> Result<RunningModules> {
    let mut providers = dependency_order(providers)?;
    let mut manager = ModuleManager::default();

    for provider in providers.iter_mut() {
        let module = provider.module().to_owned();
        let mut services = ServiceRegistry::new(&module);
        provider.prepare(&manager, &mut services).await?;
        info!(
            module = %module,
            provider = %provider.name(),
            services = services.len(),
            "module prepared"
        );
        manager.order.push(module.clone());
        manager.modules.insert(
            module.clone(),
            LoadedModule {
                name: module,
                provider: provider.name().to_owned(),
                state: ModuleState::Prepared,
                services,
            },
        );
    }

    for provider in providers.iter_mut() {
        provider.start(&manager).await?;
        manager.set_state(provider.module(), ModuleState::Started);
        info!(module = %provider.module(), provider = %provider.name(), "module started");
    }

    for provider in providers.iter_mut() {
        provider.notify_after_completed(&manager).await?;
        manager.set_state(provider.module(), ModuleState::Ready);
    }
    info!(modules = providers.len(), "all modules ready");

    Ok(RunningModules {
        manager: Arc::new(manager),
        providers,
    })
}

/// Stable topological sort of providers by `required_modules`.
fn dependency_order(
    providers: Vec<Box<dyn ModuleProvider>>,
) -> Result<Vec<Box<dyn ModuleProvider>>> {
    let mut by_module: HashMap<String, usize> = HashMap::new();
    for (idx, provider) in providers.iter().enumerate() {
        if let Some(&other) = by_module.get(provider.module()) {
            return Err(CollectorError::ConfigurationConflict(format!(
                "module {} has two active providers: {} and {}",
                provider.module(),
                providers[other].name(),
                provider.name()
            )));
        }
        by_module.insert(provider.module().to_owned(), idx);
    }

    for provider in &providers {
        for required in provider.required_modules() {
            if !by_module.contains_key(*required) {
                return Err(CollectorError::MissingDependency {
                    module: provider.module().to_owned(),
                    required: (*required).to_owned(),
                });
            }
        }
    }

    let mut placed: HashSet<String> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(providers.len());
    while order.len() < providers.len() {
        let next = providers.iter().enumerate().position(|(idx, p)| {
            !order.contains(&idx)
                && p.required_modules()
                    .iter()
                    .all(|required| placed.contains(*required))
        });
        match next {
            Some(idx) => {
                placed.insert(providers[idx].module().to_owned());
                order.push(idx);
            }
            None => return Err(CollectorError::DependencyCycle(find_cycle(&providers, &placed))),
        }
    }

    let mut slots: Vec<Option<Box<dyn ModuleProvider>>> = providers.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}

/// Follows unplaced requirements until a module repeats.
fn find_cycle(providers: &[Box<dyn ModuleProvider>], placed: &HashSet<String>) -> Vec<String> {
    let requirements: HashMap<&str, Vec<&str>> = providers
        .iter()
        .filter(|p| !placed.contains(p.module()))
        .map(|p| {
            let pending = p
                .required_modules()
                .iter()
                .copied()
                .filter(|r| !placed.contains(*r))
                .collect();
            (p.module(), pending)
        })
        .collect();

    let Some(start) = providers
        .iter()
        .map(|p| p.module())
        .find(|m| requirements.contains_key(m))
    else {
        return Vec::new();
    };

    let mut path: Vec<&str> = vec![start];
    let mut current = start;
    loop {
        let Some(next) = requirements
            .get(current)
            .and_then(|reqs| reqs.first().copied())
        else {
            break;
        };
        if let Some(pos) = path.iter().position(|m| *m == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|m| m.to_string()).collect();
            cycle.push(next.to_owned());
            return cycle;
        }
        path.push(next);
        current = next;
    }
    path.into_iter().map(str::to_owned).collect()
}
