use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};
use vcl_store::{
    ArchiveProvider, HostDirProvider, MemoryProvider, StoreError, StoreInstance, StoreProvider,
    StoreResult,
};
use vcl_types::RootLocator;

use crate::config::RegistryConfig;

/// Process-wide table of opened stores, keyed by root locator.
///
/// At most one [`StoreInstance`] is ever created per locator. Creation is
/// single-flight: the first caller for an absent locator runs the provider's
/// `open` with the table unlocked while later callers for the same locator
/// block until it publishes. Callers for other locators are never held up.
/// A failed open is handed to every waiter and then forgotten, so the next
/// call tries again.
pub struct StoreRegistry {
    providers: RwLock<HashMap<String, Arc<dyn StoreProvider>>>,
    slots: Mutex<HashMap<RootLocator, Slot>>,
    memory: Option<Arc<MemoryProvider>>,
    closed: AtomicBool,
    opens_started: AtomicU64,
    opens_failed: AtomicU64,
}

enum Slot {
    Pending(Arc<Flight>),
    Ready(Arc<StoreInstance>),
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Instances currently live in the registry.
    pub instances: usize,
    /// Provider `open` calls started.
    pub opens_started: u64,
    /// Provider `open` calls that failed or panicked.
    pub opens_failed: u64,
}

/// One in-progress creation. The creator publishes exactly once.
struct Flight {
    outcome: Mutex<Option<StoreResult<Arc<StoreInstance>>>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn publish(&self, outcome: StoreResult<Arc<StoreInstance>>) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.done.notify_all();
    }

    fn wait(&self) -> StoreResult<Arc<StoreInstance>> {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Publishes a failure if the provider unwinds before the creator can.
struct CreationGuard<'a> {
    registry: &'a StoreRegistry,
    locator: &'a RootLocator,
    flight: &'a Flight,
    armed: bool,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("provider panicked while opening {}", self.locator);
        self.registry.opens_failed.fetch_add(1, Ordering::Relaxed);
        self.registry.lock_slots().remove(self.locator);
        self.flight.publish(Err(StoreError::OpenFailure {
            locator: self.locator.clone(),
            reason: "provider panicked".into(),
        }));
    }
}

enum Role {
    Create(Arc<Flight>),
    Wait(Arc<Flight>),
}

impl StoreRegistry {
    /// An empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
            memory: None,
            closed: AtomicBool::new(false),
            opens_started: AtomicU64::new(0),
            opens_failed: AtomicU64::new(0),
        }
    }

    /// A registry with the built-in providers selected by `config`.
    pub fn with_config(config: &RegistryConfig) -> Self {
        let mut registry = Self::new();
        for scheme in &config.archive_schemes {
            let provider = ArchiveProvider::new()
                .with_scheme(scheme.clone())
                .with_mode(config.read_policy)
                .verify_checksums(config.verify_checksums);
            registry.register(Arc::new(provider));
        }
        if config.enable_host_dirs {
            registry.register(Arc::new(HostDirProvider::new()));
        }
        if config.enable_memory {
            let memory = Arc::new(MemoryProvider::new());
            registry.register(memory.clone());
            registry.memory = Some(memory);
        }
        registry
    }

    pub fn with_default_providers() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// The built-in in-memory provider, if the configuration enabled it.
    pub fn memory_provider(&self) -> Option<&Arc<MemoryProvider>> {
        self.memory.as_ref()
    }

    /// Register `provider` under its own scheme.
    pub fn register(&self, provider: Arc<dyn StoreProvider>) {
        let scheme = provider.scheme().to_string();
        self.register_provider(scheme, provider);
    }

    /// Register `provider` under `scheme`. A later registration for the same
    /// scheme replaces the earlier one; instances already open keep theirs.
    pub fn register_provider(&self, scheme: impl Into<String>, provider: Arc<dyn StoreProvider>) {
        let scheme = scheme.into();
        debug!("registered provider for scheme {}", scheme);
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme, provider);
    }

    /// Registered schemes, sorted.
    pub fn providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    fn provider(&self, scheme: &str) -> StoreResult<Arc<dyn StoreProvider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scheme)
            .cloned()
            .ok_or_else(|| StoreError::UnsupportedScheme(scheme.to_string()))
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<RootLocator, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The live instance for `locator`, without creating one.
    pub fn get(&self, locator: &RootLocator) -> Option<Arc<StoreInstance>> {
        match self.lock_slots().get(locator) {
            Some(Slot::Ready(instance)) => Some(Arc::clone(instance)),
            _ => None,
        }
    }

    /// The instance for `locator`, opening it through the scheme's provider
    /// if no instance exists yet.
    pub fn get_or_create(&self, locator: &RootLocator) -> StoreResult<Arc<StoreInstance>> {
        if self.is_closed() {
            return Err(StoreError::StoreClosed(locator.to_string()));
        }
        let provider = self.provider(locator.scheme())?;

        let role = {
            let mut slots = self.lock_slots();
            match slots.get(locator) {
                Some(Slot::Ready(instance)) => return Ok(Arc::clone(instance)),
                Some(Slot::Pending(flight)) => Role::Wait(Arc::clone(flight)),
                None => {
                    if self.is_closed() {
                        return Err(StoreError::StoreClosed(locator.to_string()));
                    }
                    let flight = Arc::new(Flight::new());
                    slots.insert(locator.clone(), Slot::Pending(Arc::clone(&flight)));
                    Role::Create(flight)
                }
            }
        };

        match role {
            Role::Wait(flight) => {
                debug!("waiting for in-progress open of {}", locator);
                flight.wait()
            }
            Role::Create(flight) => self.create(locator, provider.as_ref(), &flight),
        }
    }

    fn create(
        &self,
        locator: &RootLocator,
        provider: &dyn StoreProvider,
        flight: &Flight,
    ) -> StoreResult<Arc<StoreInstance>> {
        debug!("opening {}", locator);
        self.opens_started.fetch_add(1, Ordering::Relaxed);
        let mut guard = CreationGuard {
            registry: self,
            locator,
            flight,
            armed: true,
        };
        let opened = provider.open(locator);
        guard.armed = false;

        let mut slots = self.lock_slots();
        match opened {
            Ok(store) => {
                let instance = Arc::new(StoreInstance::new(locator.clone(), store));
                if self.is_closed() {
                    slots.remove(locator);
                    drop(slots);
                    instance.close();
                    let err = StoreError::StoreClosed(locator.to_string());
                    flight.publish(Err(err.clone()));
                    return Err(err);
                }
                slots.insert(locator.clone(), Slot::Ready(Arc::clone(&instance)));
                drop(slots);
                info!(
                    "created store instance {} ({:?})",
                    locator,
                    instance.read_policy()
                );
                flight.publish(Ok(Arc::clone(&instance)));
                Ok(instance)
            }
            Err(err) => {
                slots.remove(locator);
                drop(slots);
                self.opens_failed.fetch_add(1, Ordering::Relaxed);
                warn!("failed to open {}: {}", locator, err);
                flight.publish(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Close every live instance and refuse further creation.
    ///
    /// Idempotent: only the first call does anything and it returns the
    /// number of instances it closed. An open still in progress finishes on
    /// its creator's thread, which then closes the fresh instance and reports
    /// `StoreClosed`.
    pub fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let ready: Vec<Arc<StoreInstance>> = {
            let mut slots = self.lock_slots();
            let ready = slots
                .values()
                .filter_map(|slot| match slot {
                    Slot::Ready(instance) => Some(Arc::clone(instance)),
                    Slot::Pending(_) => None,
                })
                .collect();
            slots.retain(|_, slot| matches!(slot, Slot::Pending(_)));
            ready
        };
        for instance in &ready {
            instance.close();
        }
        info!("registry shut down, closed {} instances", ready.len());
        ready.len()
    }

    /// Guard that shuts the registry down when dropped.
    pub fn scope(self: &Arc<Self>) -> RegistryScope {
        RegistryScope {
            registry: Arc::clone(self),
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let instances = self
            .lock_slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count();
        RegistryStats {
            instances,
            opens_started: self.opens_started.load(Ordering::Relaxed),
            opens_failed: self.opens_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("providers", &self.providers())
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Shuts its registry down exactly once when dropped, on every exit path.
#[derive(Debug)]
pub struct RegistryScope {
    registry: Arc<StoreRegistry>,
}

impl RegistryScope {
    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }
}

impl Deref for RegistryScope {
    type Target = StoreRegistry;

    fn deref(&self) -> &StoreRegistry {
        &self.registry
    }
}

impl Drop for RegistryScope {
    fn drop(&mut self) {
        self.registry.shutdown();
    }
}
