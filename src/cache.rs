//! Three-tier singleton cache
//!
//! Each name is in at most one tier at a time:
//!
//! - **finished**: fully constructed objects. Lives in a `DashMap`, so the
//!   already-finished case never touches the registry lock.
//! - **early**: partially constructed objects exposed to break a
//!   construction cycle. Only exists while the owning construction runs.
//! - **pending**: deferred callbacks that produce an early reference the first
//!   time somebody asks for one.
//!
//! The early and pending tiers, the registration order, and the whole
//! construction path sit behind one registry-wide reentrant lock. The lock is
//! held across the factory call: nested requests from the constructing thread
//! re-enter it, other threads block until the construction finishes and then
//! see the finished object.

use crate::config::RegistryConfig;
use crate::error::{check_name, RegistryError, Result};
use crate::object::ObjectRef;
use crate::tracker::CreationTracker;
use ahash::RandomState;
use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Deferred constructor for an early reference
pub type EarlyFactory = Box<dyn FnOnce() -> ObjectRef + Send>;

/// State guarded by the registry lock
struct EarlyTiers {
    early: HashMap<String, ObjectRef, RandomState>,
    pending: HashMap<String, EarlyFactory, RandomState>,
    /// Names ever registered as finished or pending, in registration order
    registered: IndexSet<String, RandomState>,
}

/// Concurrent cache of lazily constructed singletons with circular-reference
/// tolerance.
///
/// # Examples
///
/// ```rust
/// use singleton_registry::{object_ref, SingletonCache};
///
/// let cache = SingletonCache::new();
/// let first = cache.get_or_create("config", || Ok(object_ref(42u32))).unwrap();
/// let second = cache.get_or_create("config", || unreachable!()).unwrap();
///
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// ```
pub struct SingletonCache {
    finished: DashMap<String, ObjectRef, RandomState>,
    lock: ReentrantMutex<RefCell<EarlyTiers>>,
    tracker: CreationTracker,
    in_destruction: AtomicBool,
}

impl SingletonCache {
    /// Create an empty cache with default sizing
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// Create an empty cache sized from `config`
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            finished: DashMap::with_capacity_and_hasher_and_shard_amount(
                config.capacity,
                RandomState::new(),
                config.shard_amount(),
            ),
            lock: ReentrantMutex::new(RefCell::new(EarlyTiers {
                early: HashMap::with_capacity_and_hasher(16, RandomState::new()),
                pending: HashMap::with_capacity_and_hasher(16, RandomState::new()),
                registered: IndexSet::with_capacity_and_hasher(config.capacity, RandomState::new()),
            })),
            tracker: CreationTracker::new(),
            in_destruction: AtomicBool::new(false),
        }
    }

    /// The creation tracker backing this cache
    #[inline]
    pub fn tracker(&self) -> &CreationTracker {
        &self.tracker
    }

    /// Record a suppressed error for the construction in progress.
    ///
    /// Takes the registry lock, so a call from a thread with no construction
    /// of its own waits for the running one to end and is then dropped.
    pub fn record_suppressed(&self, err: RegistryError) {
        let _guard = self.lock.lock();
        self.tracker.record_suppressed(err);
    }

    /// Register a fully constructed object under `name`.
    ///
    /// Registering the identical object again is a no-op; a different object
    /// fails with `AlreadyRegistered`.
    pub fn register_finished(&self, name: &str, value: ObjectRef) -> Result<()> {
        check_name(name)?;
        let guard = self.lock.lock();

        if let Some(existing) = self.finished_value(name) {
            if Arc::ptr_eq(&existing, &value) {
                return Ok(());
            }
            return Err(RegistryError::already_registered(name));
        }

        self.add_finished(&guard, name, value);

        #[cfg(feature = "logging")]
        debug!(
            target: "singleton_registry",
            name = name,
            count = self.finished.len(),
            "Registered finished singleton"
        );

        Ok(())
    }

    /// Look up `name`.
    ///
    /// Returns the finished object if there is one. Otherwise, while `name`
    /// is in creation, returns its early reference, producing it from the
    /// pending factory on first request.
    pub fn get(&self, name: &str) -> Option<ObjectRef> {
        if let Some(value) = self.finished_value(name) {
            return Some(value);
        }
        if !self.tracker.is_in_creation(name) {
            return None;
        }

        let guard = self.lock.lock();
        self.early_reference(&guard, name)
    }

    /// Return the finished object for `name`, constructing it with `factory`
    /// if necessary.
    ///
    /// `factory` runs at most once per successful construction. If it fails
    /// the name is left untouched and a later call may try again.
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Result<ObjectRef>
    where
        F: FnOnce() -> Result<ObjectRef>,
    {
        check_name(name)?;

        if let Some(value) = self.finished_value(name) {
            #[cfg(feature = "logging")]
            trace!(
                target: "singleton_registry",
                name = name,
                location = "finished",
                "Singleton resolved without locking"
            );
            return Ok(value);
        }

        let guard = self.lock.lock();

        if let Some(value) = self.finished_value(name) {
            return Ok(value);
        }

        if self.in_destruction.load(Ordering::Acquire) {
            return Err(RegistryError::shutdown(name));
        }

        if self.tracker.is_in_creation(name) {
            if let Some(early) = self.early_reference(&guard, name) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "singleton_registry",
                    name = name,
                    location = "early",
                    "Returning early reference to singleton still in creation"
                );
                return Ok(early);
            }
        }

        let creation = InCreation::begin(self, &guard, name)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "singleton_registry",
            name = name,
            "Creating shared instance of singleton"
        );

        match factory() {
            Ok(value) => {
                self.add_finished(&guard, name, Arc::clone(&value));
                creation.finish();
                Ok(value)
            }
            Err(err) => {
                let suppressed = creation.fail();

                #[cfg(feature = "logging")]
                debug!(
                    target: "singleton_registry",
                    name = name,
                    error = %err,
                    suppressed = suppressed.len(),
                    "Singleton creation failed"
                );

                Err(RegistryError::creation_failed(name, err, suppressed))
            }
        }
    }

    /// Register a deferred early-reference factory for a name in creation.
    ///
    /// No-op if `name` is already finished; `NotInCreation` if it is not
    /// currently being constructed.
    pub fn register_pending_factory<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: FnOnce() -> ObjectRef + Send + 'static,
    {
        check_name(name)?;
        let guard = self.lock.lock();

        if self.finished.contains_key(name) {
            return Ok(());
        }
        if !self.tracker.is_in_creation(name) {
            return Err(RegistryError::NotInCreation {
                name: name.to_owned(),
            });
        }

        let mut tiers = guard.borrow_mut();
        tiers.pending.insert(name.to_owned(), Box::new(factory));
        tiers.early.remove(name);
        tiers.registered.insert(name.to_owned());

        #[cfg(feature = "logging")]
        trace!(
            target: "singleton_registry",
            name = name,
            "Registered early reference factory"
        );

        Ok(())
    }

    /// Purge every tier for `name`.
    ///
    /// Returns `true` if a finished object was removed.
    pub fn remove(&self, name: &str) -> bool {
        let guard = self.lock.lock();
        let removed = self.finished.remove(name).is_some();

        let mut tiers = guard.borrow_mut();
        tiers.early.remove(name);
        tiers.pending.remove(name);
        tiers.registered.shift_remove(name);

        removed
    }

    /// Whether a finished object exists for `name`
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.finished.contains_key(name)
    }

    /// Number of finished objects
    #[inline]
    pub fn count_finished(&self) -> usize {
        self.finished.len()
    }

    /// Names of finished objects, in registration order
    pub fn list_finished_names(&self) -> Vec<String> {
        let guard = self.lock.lock();
        let tiers = guard.borrow();
        tiers
            .registered
            .iter()
            .filter(|name| self.finished.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Refuse any further construction.
    ///
    /// Waits for an in-flight construction on another thread to finish.
    pub fn begin_shutdown(&self) {
        let _guard = self.lock.lock();
        self.in_destruction.store(true, Ordering::Release);
    }

    /// Whether construction has been shut down
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.in_destruction.load(Ordering::Acquire)
    }

    /// Drop all tiers
    pub fn clear(&self) {
        let guard = self.lock.lock();
        self.finished.clear();

        let mut tiers = guard.borrow_mut();
        tiers.early.clear();
        tiers.pending.clear();
        tiers.registered.clear();
    }

    #[inline]
    fn finished_value(&self, name: &str) -> Option<ObjectRef> {
        self.finished.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Promote to finished, dropping the early and pending tiers. Caller holds the lock.
    fn add_finished(&self, tiers: &RefCell<EarlyTiers>, name: &str, value: ObjectRef) {
        self.finished.insert(name.to_owned(), value);

        let mut tiers = tiers.borrow_mut();
        tiers.early.remove(name);
        tiers.pending.remove(name);
        tiers.registered.insert(name.to_owned());
    }

    /// Resolve an early reference. Caller holds the lock.
    fn early_reference(&self, tiers: &RefCell<EarlyTiers>, name: &str) -> Option<ObjectRef> {
        if let Some(value) = self.finished_value(name) {
            return Some(value);
        }

        let factory = {
            let mut tiers = tiers.borrow_mut();
            if let Some(early) = tiers.early.get(name) {
                return Some(Arc::clone(early));
            }
            tiers.pending.remove(name)?
        };

        // No borrow is held here: the factory may call back into the cache.
        let early = factory();

        #[cfg(feature = "logging")]
        trace!(
            target: "singleton_registry",
            name = name,
            "Exposed early reference to break a circular reference"
        );

        tiers
            .borrow_mut()
            .early
            .insert(name.to_owned(), Arc::clone(&early));
        Some(early)
    }
}

impl Default for SingletonCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SingletonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonCache")
            .field("finished", &self.finished.len())
            .field("in_creation", &self.tracker.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// In-creation mark for one name, released on drop so a panicking factory
/// does not leave the name stuck. Lives inside the registry lock.
struct InCreation<'a> {
    cache: &'a SingletonCache,
    tiers: &'a RefCell<EarlyTiers>,
    name: &'a str,
    owns_window: bool,
    released: bool,
}

impl<'a> InCreation<'a> {
    fn begin(
        cache: &'a SingletonCache,
        tiers: &'a RefCell<EarlyTiers>,
        name: &'a str,
    ) -> Result<Self> {
        cache.tracker.begin(name)?;
        Ok(Self {
            cache,
            tiers,
            name,
            owns_window: cache.tracker.open_suppression_window(),
            released: false,
        })
    }

    /// Unmark the name and return the errors suppressed during construction.
    ///
    /// Only the outermost construction owns the window; nested ones get nothing.
    fn finish(mut self) -> Vec<RegistryError> {
        self.release()
    }

    /// Like `finish`, but first drops the early and pending entries the
    /// failed attempt left behind
    fn fail(mut self) -> Vec<RegistryError> {
        self.discard_partial();
        self.release()
    }

    fn release(&mut self) -> Vec<RegistryError> {
        self.released = true;
        let suppressed = if self.owns_window {
            self.cache.tracker.close_suppression_window()
        } else {
            Vec::new()
        };
        self.cache.tracker.end(self.name);
        suppressed
    }

    fn discard_partial(&self) {
        let Ok(mut tiers) = self.tiers.try_borrow_mut() else {
            return;
        };
        tiers.early.remove(self.name);
        tiers.pending.remove(self.name);
        if !self.cache.finished.contains_key(self.name) {
            tiers.registered.shift_remove(self.name);
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "singleton_registry",
            name = self.name,
            "Discarded early state of failed construction"
        );
    }
}

impl Drop for InCreation<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.discard_partial();
        self.release();
    }
}
