//! Creation tracking
//!
//! Records which names are inside their construction call. The set is
//! registry-global rather than per-thread: another thread that sees a name
//! in creation waits on the registry lock instead of failing. Only true
//! self-recursion on the constructing thread is reported as a cycle.

use crate::error::{RegistryError, Result};
use ahash::RandomState;
use dashmap::DashSet;
use parking_lot::Mutex;

/// Tracks names currently under construction and collects errors suppressed
/// while a construction is in progress.
pub struct CreationTracker {
    in_creation: DashSet<String, RandomState>,
    /// Names excluded from in-creation checks
    exclusions: DashSet<String, RandomState>,
    /// Open suppression window, owned by the outermost construction
    suppressed: Mutex<Option<Vec<RegistryError>>>,
}

impl CreationTracker {
    /// Create a tracker with nothing in creation
    pub fn new() -> Self {
        Self {
            in_creation: DashSet::with_capacity_and_hasher(16, RandomState::new()),
            exclusions: DashSet::with_capacity_and_hasher(16, RandomState::new()),
            suppressed: Mutex::new(None),
        }
    }

    /// Mark `name` as in creation.
    ///
    /// Fails with `CyclicCreation` if it is already marked and not excluded.
    pub fn begin(&self, name: &str) -> Result<()> {
        if self.exclusions.contains(name) {
            return Ok(());
        }
        if !self.in_creation.insert(name.to_owned()) {
            return Err(RegistryError::cyclic(name));
        }
        Ok(())
    }

    /// Clear the in-creation mark for `name`
    pub fn end(&self, name: &str) {
        if self.exclusions.contains(name) {
            return;
        }
        self.in_creation.remove(name);
    }

    /// Whether `name` is in creation and not excluded from tracking
    pub fn is_in_creation(&self, name: &str) -> bool {
        !self.exclusions.contains(name) && self.is_actually_in_creation(name)
    }

    /// Whether `name` is in creation, ignoring exclusions
    pub fn is_actually_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }

    /// Include (`true`) or exclude (`false`) `name` from in-creation checks
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        if in_creation {
            self.exclusions.remove(name);
        } else {
            self.exclusions.insert(name.to_owned());
        }
    }

    /// Open a suppression window if none is open.
    ///
    /// Returns `true` if this call opened it and therefore owns it.
    pub fn open_suppression_window(&self) -> bool {
        let mut window = self.suppressed.lock();
        if window.is_some() {
            return false;
        }
        *window = Some(Vec::new());
        true
    }

    /// Close the window and return what was recorded in it
    pub fn close_suppression_window(&self) -> Vec<RegistryError> {
        self.suppressed.lock().take().unwrap_or_default()
    }

    /// Record an error that was handled but is relevant if the enclosing
    /// construction later fails. Dropped if no construction is in progress.
    ///
    /// Does not serialize against constructions on other threads; use
    /// [`SingletonCache::record_suppressed`](crate::SingletonCache::record_suppressed),
    /// which holds the registry lock.
    pub fn record_suppressed(&self, err: RegistryError) {
        if let Some(window) = self.suppressed.lock().as_mut() {
            window.push(err);
        }
    }

    /// Number of names currently in creation
    pub fn len(&self) -> usize {
        self.in_creation.len()
    }

    /// Whether nothing is in creation
    pub fn is_empty(&self) -> bool {
        self.in_creation.is_empty()
    }
}

impl Default for CreationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CreationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationTracker")
            .field("in_creation", &self.in_creation.len())
            .field("exclusions", &self.exclusions.len())
            .finish()
    }
}
