//! Singleton registry
//!
//! The `SingletonRegistry` is the single entry point collaborators use. It
//! owns one alias index, one singleton cache, one dependency graph and one
//! lifecycle manager, all shared behind `Arc`s so the registry can be cloned
//! cheaply and handed to factory callbacks.
//!
//! Every name passed to the registry is resolved through the alias index
//! first, so an alias and its target always address the same entry.

use crate::alias::AliasIndex;
use crate::cache::SingletonCache;
use crate::config::RegistryConfig;
use crate::graph::DependencyGraph;
use crate::lifecycle::{DestructionReport, LifecycleManager};
use crate::object::{downcast, Injectable, ObjectRef};
use crate::{RegistryError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Concurrent singleton registry with circular-reference tolerance, aliases
/// and dependency-ordered teardown.
///
/// # Examples
///
/// ```rust
/// use singleton_registry::{object_ref, SingletonRegistry};
///
/// struct Database { url: String }
/// struct Repository { db: std::sync::Arc<Database> }
///
/// let registry = SingletonRegistry::new();
/// registry.register_alias("database", "db").unwrap();
///
/// let r = registry.clone();
/// registry
///     .get_or_create("repository", move || {
///         let db = r.get_or_create("db", || {
///             Ok(object_ref(Database { url: "postgres://localhost".into() }))
///         })?;
///         r.add_dependency("db", "repository");
///         let db = db.downcast::<Database>().map_err(|_| {
///             singleton_registry::RegistryError::callback("not a Database")
///         })?;
///         Ok(object_ref(Repository { db }))
///     })
///     .unwrap();
///
/// assert_eq!(registry.dependents_of("database"), vec!["repository"]);
/// let repo = registry.get_typed::<Repository>("repository").unwrap();
/// assert_eq!(repo.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct SingletonRegistry {
    aliases: Arc<AliasIndex>,
    cache: Arc<SingletonCache>,
    graph: Arc<DependencyGraph>,
    lifecycle: Arc<LifecycleManager>,
}

impl SingletonRegistry {
    /// Create a registry with default configuration
    #[inline]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry pre-sized for about `capacity` singletons
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(RegistryConfig::new().capacity(capacity))
    }

    /// Create a registry from an explicit configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "singleton_registry",
            capacity = config.capacity,
            allow_alias_overriding = config.allow_alias_overriding,
            "Creating new singleton registry"
        );

        let aliases = Arc::new(AliasIndex::with_overriding(config.allow_alias_overriding));
        let cache = Arc::new(SingletonCache::with_config(&config));
        let graph = Arc::new(DependencyGraph::new(Arc::clone(&aliases)));
        let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&cache), Arc::clone(&graph)));

        Self {
            aliases,
            cache,
            graph,
            lifecycle,
        }
    }

    // =========================================================================
    // Singletons
    // =========================================================================

    /// Look up `name` (after alias resolution).
    ///
    /// Returns an early reference while `name` is in creation.
    #[inline]
    pub fn get(&self, name: &str) -> Option<ObjectRef> {
        self.cache.get(&self.aliases.canonical_name(name))
    }

    /// Look up `name` and downcast it to `T`.
    ///
    /// Returns `None` if absent or of another type.
    pub fn get_typed<T: Injectable>(&self, name: &str) -> Option<Arc<T>> {
        let object = self.get(name)?;
        let typed = downcast::<T>(object);

        #[cfg(feature = "logging")]
        if typed.is_none() {
            trace!(
                target: "singleton_registry",
                name = name,
                expected = T::type_name_of(),
                "Singleton exists but has a different type"
            );
        }

        typed
    }

    /// Return the singleton for `name` (after alias resolution), running
    /// `factory` to construct it if necessary.
    #[inline]
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Result<ObjectRef>
    where
        F: FnOnce() -> Result<ObjectRef>,
    {
        self.cache
            .get_or_create(&self.aliases.canonical_name(name), factory)
    }

    /// Register an already constructed singleton under the canonical form of `name`
    #[inline]
    pub fn register_finished(&self, name: &str, value: ObjectRef) -> Result<()> {
        self.cache
            .register_finished(&self.aliases.canonical_name(name), value)
    }

    /// Register a factory producing an early reference to `name` while it is
    /// being constructed
    #[inline]
    pub fn register_pending_factory<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: FnOnce() -> ObjectRef + Send + 'static,
    {
        self.cache
            .register_pending_factory(&self.aliases.canonical_name(name), factory)
    }

    /// Drop the cached singleton for `name` without running its destroy callback
    #[inline]
    pub fn remove(&self, name: &str) -> bool {
        self.cache.remove(&self.aliases.canonical_name(name))
    }

    /// Whether a finished singleton exists for `name` (after alias resolution)
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.cache.contains(&self.aliases.canonical_name(name))
    }

    /// Number of finished singletons
    #[inline]
    pub fn count_finished(&self) -> usize {
        self.cache.count_finished()
    }

    /// Names of finished singletons, in registration order
    #[inline]
    pub fn list_finished_names(&self) -> Vec<String> {
        self.cache.list_finished_names()
    }

    /// Record an error a factory handled but that matters if the enclosing
    /// construction fails
    #[inline]
    pub fn record_suppressed(&self, err: RegistryError) {
        self.cache.record_suppressed(err);
    }

    /// Include (`true`) or exclude (`false`) `name` from in-creation tracking
    #[inline]
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        self.cache
            .tracker()
            .set_currently_in_creation(&self.aliases.canonical_name(name), in_creation);
    }

    /// Whether `name` is currently being constructed
    #[inline]
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.cache
            .tracker()
            .is_in_creation(&self.aliases.canonical_name(name))
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    /// Register `alias` for `name`
    #[inline]
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        self.aliases.register_alias(name, alias)
    }

    /// Remove an alias
    #[inline]
    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        self.aliases.remove_alias(alias)
    }

    /// Final target of the alias chain starting at `name`
    #[inline]
    pub fn canonical_name(&self, name: &str) -> String {
        self.aliases.canonical_name(name)
    }

    /// Every alias resolving to `name`
    #[inline]
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        self.aliases.aliases_of(name)
    }

    /// Whether `name` is an alias
    #[inline]
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.is_alias(name)
    }

    // =========================================================================
    // Dependency graph
    // =========================================================================

    /// Record that `dependent` requires `depended_on`
    #[inline]
    pub fn add_dependency(&self, depended_on: &str, dependent: &str) {
        self.graph
            .add_dependency(depended_on, &self.aliases.canonical_name(dependent));
    }

    /// Record that `container` owns `contained`
    #[inline]
    pub fn add_containment(&self, container: &str, contained: &str) {
        self.graph.add_containment(
            &self.aliases.canonical_name(container),
            &self.aliases.canonical_name(contained),
        );
    }

    /// Direct dependents of `name` (after alias resolution)
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.graph.dependents_of(&self.aliases.canonical_name(name))
    }

    /// Direct dependencies of `name` (after alias resolution)
    #[inline]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.graph.dependencies_of(&self.aliases.canonical_name(name))
    }

    /// Whether `candidate` depends on `target`, directly or transitively
    #[inline]
    pub fn is_transitively_dependent(&self, target: &str, candidate: &str) -> bool {
        self.graph
            .is_transitively_dependent(target, &self.aliases.canonical_name(candidate))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register the destroy callback for `name`
    #[inline]
    pub fn register_disposable<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.lifecycle
            .register_disposable(&self.aliases.canonical_name(name), callback)
    }

    /// Destroy `name`, everything that depends on it, and everything it contains
    #[inline]
    pub fn destroy(&self, name: &str) -> DestructionReport {
        self.lifecycle.destroy(&self.aliases.canonical_name(name))
    }

    /// Destroy every singleton and refuse further construction
    #[inline]
    pub fn destroy_all(&self) -> DestructionReport {
        self.lifecycle.destroy_all()
    }

    /// Whether `destroy_all` has run
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.cache.is_shutdown()
    }
}

impl Default for SingletonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("finished", &self.count_finished())
            .field("aliases", &self.aliases.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::object_ref;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, OnceLock};
    use std::thread;

    struct Service {
        name: &'static str,
        peer: OnceLock<ObjectRef>,
    }

    fn service(name: &'static str) -> Arc<Service> {
        Arc::new(Service {
            name,
            peer: OnceLock::new(),
        })
    }

    /// Factory for a service that needs `peer`, exposing itself early first
    fn wire(
        registry: &SingletonRegistry,
        name: &'static str,
        peer: &'static str,
    ) -> Result<ObjectRef> {
        let this = service(name);
        let early: ObjectRef = this.clone();
        registry.register_pending_factory(name, move || early)?;

        let r = registry.clone();
        let other = registry.get(peer).map(Ok).unwrap_or_else(|| {
            registry.get_or_create(peer, || wire(&r, peer, name))
        })?;
        registry.add_dependency(peer, name);
        let _ = this.peer.set(other);
        Ok(this as ObjectRef)
    }

    #[test]
    fn test_circular_pair_resolves() {
        let registry = SingletonRegistry::new();
        let r = registry.clone();

        let a = registry
            .get_or_create("a", || wire(&r, "a", "b"))
            .unwrap();
        let b = registry.get("b").unwrap();

        assert_eq!(registry.count_finished(), 2);
        let a_svc = a.downcast_ref::<Service>().unwrap();
        let b_svc = b.downcast_ref::<Service>().unwrap();
        assert_eq!(a_svc.name, "a");
        assert!(Arc::ptr_eq(a_svc.peer.get().unwrap(), &b));
        assert!(Arc::ptr_eq(b_svc.peer.get().unwrap(), &a));

        assert!(registry.is_transitively_dependent("a", "b"));
        assert!(registry.is_transitively_dependent("b", "a"));
    }

    #[test]
    fn test_concurrent_get_or_create_invokes_factory_once() {
        const THREADS: usize = 16;

        let registry = SingletonRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = registry.clone();
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .get_or_create("n", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(object_ref(0u64))
                        })
                        .unwrap()
                })
            })
            .collect();

        let objects: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(objects.iter().all(|o| Arc::ptr_eq(o, &objects[0])));
    }

    #[test]
    fn test_lookup_through_alias() {
        let registry = SingletonRegistry::new();
        registry.register_alias("c", "b").unwrap();
        registry.register_alias("b", "a").unwrap();
        registry.register_finished("c", object_ref("target")).unwrap();

        assert_eq!(registry.canonical_name("a"), "c");
        assert!(registry.contains("a"));
        assert_eq!(*registry.get_typed::<&str>("a").unwrap(), "target");
        assert!(registry.get_typed::<u32>("a").is_none());

        // Fast path returns the finished object, never builds under the alias
        let same = registry.get_or_create("b", || unreachable!()).unwrap();
        assert!(Arc::ptr_eq(&same, &registry.get("c").unwrap()));

        let err = registry.register_alias("a", "c").unwrap_err();
        assert!(matches!(err, RegistryError::CircularAlias { .. }));
    }

    #[test]
    fn test_destroy_order_follows_dependencies() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["A", "B"] {
            registry.register_finished(name, object_ref(name)).unwrap();
            let log = Arc::clone(&log);
            registry
                .register_disposable(name, move || {
                    log.lock().push(name);
                    Ok(())
                })
                .unwrap();
        }
        // A depends on B
        registry.add_dependency("B", "A");

        let report = registry.destroy("B");
        assert_eq!(*log.lock(), vec!["A", "B"]);
        assert_eq!(report.destroyed, vec!["A", "B"]);
        assert!(registry.dependents_of("B").is_empty());
        assert!(registry.dependencies_of("A").is_empty());
    }

    #[test]
    fn test_destroy_all_twice() {
        let registry = SingletonRegistry::new();
        registry.register_finished("x", object_ref(1u8)).unwrap();
        registry.register_finished("y", object_ref(2u8)).unwrap();
        registry.register_disposable("x", || Ok(())).unwrap();

        assert!(registry.destroy_all().is_clean());
        assert!(registry.destroy_all().is_clean());
        assert_eq!(registry.count_finished(), 0);
        assert!(registry.list_finished_names().is_empty());
        assert!(registry.is_shutdown());

        let err = registry
            .get_or_create("z", || Ok(object_ref(3u8)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ShutdownInProgress { .. }));
    }

    #[test]
    fn test_failed_attempt_then_success() {
        let registry = SingletonRegistry::new();
        let err = registry
            .get_or_create("m", || Err(RegistryError::callback("not yet")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::CreationFailed { .. }));
        assert!(!registry.is_currently_in_creation("m"));

        registry.get_or_create("m", || Ok(object_ref(1u8))).unwrap();
        assert_eq!(registry.list_finished_names(), vec!["m"]);
    }

    #[test]
    fn test_record_suppressed_through_registry() {
        let registry = SingletonRegistry::new();
        let r = registry.clone();
        let err = registry
            .get_or_create("s", || {
                r.record_suppressed(RegistryError::callback("optional dependency missing"));
                Err(RegistryError::callback("required dependency missing"))
            })
            .unwrap_err();
        assert_eq!(err.suppressed().len(), 1);
        assert_eq!(err.suppressed()[0].to_string(), "optional dependency missing");
    }

    #[test]
    fn test_mutations_through_alias_hit_canonical_entry() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_alias("database", "db").unwrap();

        let value = object_ref(1u8);
        registry.register_finished("db", Arc::clone(&value)).unwrap();
        assert!(Arc::ptr_eq(&registry.get("db").unwrap(), &value));
        assert!(Arc::ptr_eq(&registry.get("database").unwrap(), &value));
        assert_eq!(registry.list_finished_names(), vec!["database"]);

        // Same entry, so a different object conflicts
        let err = registry
            .register_finished("database", object_ref(2u8))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { ref name } if name == "database"));

        let l = Arc::clone(&log);
        registry
            .register_disposable("db", move || {
                l.lock().push("database");
                Ok(())
            })
            .unwrap();
        assert!(registry.register_disposable("database", || Ok(())).is_err());

        registry.register_finished("repository", object_ref(3u8)).unwrap();
        registry.register_alias("repository", "repo").unwrap();
        registry.add_dependency("db", "repo");
        assert_eq!(registry.dependencies_of("repo"), vec!["database"]);
        assert!(registry.is_transitively_dependent("db", "repo"));

        let report = registry.destroy("db");
        assert_eq!(report.destroyed, vec!["repository", "database"]);
        assert_eq!(*log.lock(), vec!["database"]);
        assert!(registry.get("db").is_none());
        assert!(!registry.remove("db"));
    }

    #[test]
    fn test_config_disables_alias_overriding() {
        let registry =
            SingletonRegistry::with_config(RegistryConfig::new().allow_alias_overriding(false));
        registry.register_alias("one", "x").unwrap();
        let err = registry.register_alias("two", "x").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAlias { .. }));
        assert_eq!(registry.aliases_of("one"), vec!["x"]);
    }
}
