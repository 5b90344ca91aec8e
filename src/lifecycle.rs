//! Ordered teardown
//!
//! Destroying a name first destroys everything that depends on it, then runs
//! its own destroy callback, then destroys everything it contains, and
//! finally drops it from the dependency graph. The traversal uses an explicit
//! stack, so arbitrarily deep dependency chains do not grow the native stack.
//!
//! Destruction is best-effort: a failing or panicking callback is logged and
//! collected in the [`DestructionReport`], and teardown carries on.

use crate::cache::SingletonCache;
use crate::error::{check_name, RegistryError, Result};
use crate::graph::DependencyGraph;
use ahash::RandomState;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, error, info};

/// Destroy callback registered for a name
pub type DisposeFn = Box<dyn FnOnce() -> Result<()> + Send>;

/// Outcome of a destroy run
#[derive(Debug, Default)]
pub struct DestructionReport {
    /// Names torn down, in the order their destroy step ran
    pub destroyed: Vec<String>,
    /// Destroy callbacks that failed, with the error they raised
    pub failures: Vec<(String, RegistryError)>,
}

impl DestructionReport {
    /// Whether every callback succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Step {
    /// Claim the name and schedule its dependents
    Enter(String),
    /// Run the destroy callback
    Dispose {
        name: String,
        callback: Option<DisposeFn>,
        claimed: bool,
    },
    /// Schedule the entities the name contains
    Contained(String),
    /// Drop the name from the graph
    Forget(String),
}

/// Holds destroy callbacks and runs dependency-ordered teardown.
pub struct LifecycleManager {
    cache: Arc<SingletonCache>,
    graph: Arc<DependencyGraph>,
    /// name -> callback, in registration order
    disposables: Mutex<IndexMap<String, DisposeFn, RandomState>>,
}

impl LifecycleManager {
    /// Create a manager tearing down entries of `cache` along `graph`
    pub fn new(cache: Arc<SingletonCache>, graph: Arc<DependencyGraph>) -> Self {
        Self {
            cache,
            graph,
            disposables: Mutex::new(IndexMap::with_hasher(RandomState::new())),
        }
    }

    /// Register the destroy callback for `name`.
    ///
    /// Each name gets at most one callback; a second registration fails with
    /// `DisposableAlreadyRegistered` and keeps the first.
    pub fn register_disposable<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        check_name(name)?;
        let mut disposables = self.disposables.lock();
        if disposables.contains_key(name) {
            return Err(RegistryError::DisposableAlreadyRegistered {
                name: name.to_owned(),
            });
        }
        disposables.insert(name.to_owned(), Box::new(callback));
        Ok(())
    }

    /// Whether a destroy callback is registered for `name`
    pub fn has_disposable(&self, name: &str) -> bool {
        self.disposables.lock().contains_key(name)
    }

    /// Names with a destroy callback, in registration order
    pub fn disposable_names(&self) -> Vec<String> {
        self.disposables.lock().keys().cloned().collect()
    }

    /// Destroy `name`, its dependents and its contained entities
    pub fn destroy(&self, name: &str) -> DestructionReport {
        let mut report = DestructionReport::default();
        self.destroy_into(name, &mut report);
        report
    }

    /// Destroy everything.
    ///
    /// Shuts construction down first, then destroys names with callbacks in
    /// reverse registration order, then clears all remaining state. Calling
    /// it again is harmless.
    pub fn destroy_all(&self) -> DestructionReport {
        #[cfg(feature = "logging")]
        info!(
            target: "singleton_registry",
            singletons = self.cache.count_finished(),
            "Destroying singletons"
        );

        self.cache.begin_shutdown();

        let names = self.disposable_names();
        let mut report = DestructionReport::default();
        for name in names.iter().rev() {
            self.destroy_into(name, &mut report);
        }

        self.disposables.lock().clear();
        self.graph.clear();
        self.cache.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "singleton_registry",
            destroyed = report.destroyed.len(),
            failures = report.failures.len(),
            "All singletons destroyed"
        );

        report
    }

    fn destroy_into(&self, root: &str, report: &mut DestructionReport) {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![Step::Enter(root.to_owned())];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(name) => {
                    if !visited.insert(name.clone()) {
                        continue;
                    }

                    let removed = self.cache.remove(&name);
                    let callback = self.disposables.lock().shift_remove(&name);
                    let dependents = self.graph.take_dependents(&name);

                    #[cfg(feature = "logging")]
                    if !dependents.is_empty() {
                        debug!(
                            target: "singleton_registry",
                            name = name.as_str(),
                            dependents = ?dependents,
                            "Destroying dependents first"
                        );
                    }

                    let claimed = removed || callback.is_some();
                    stack.push(Step::Forget(name.clone()));
                    stack.push(Step::Contained(name.clone()));
                    stack.push(Step::Dispose {
                        name,
                        callback,
                        claimed,
                    });
                    stack.extend(dependents.into_iter().rev().map(Step::Enter));
                }
                Step::Dispose {
                    name,
                    callback,
                    claimed,
                } => {
                    if let Some(callback) = callback {
                        if let Err(err) = run_callback(callback) {
                            #[cfg(feature = "logging")]
                            error!(
                                target: "singleton_registry",
                                name = name.as_str(),
                                error = %err,
                                "Destroy callback threw an error"
                            );
                            report.failures.push((name.clone(), err));
                        }
                    }
                    if claimed {
                        report.destroyed.push(name);
                    }
                }
                Step::Contained(name) => {
                    let contained = self.graph.take_contained(&name);
                    stack.extend(contained.into_iter().rev().map(Step::Enter));
                }
                Step::Forget(name) => self.graph.forget(&name),
            }
        }
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("disposables", &self.disposables.lock().len())
            .finish()
    }
}

fn run_callback(callback: DisposeFn) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(result) => result,
        Err(payload) => Err(RegistryError::callback(format!(
            "destroy callback panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
