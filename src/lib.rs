//! # Singleton Registry - Named Singletons with Circular-Reference Tolerance
//!
//! A concurrent registry of named, lazily constructed singletons. Objects are
//! stored as type-erased `Arc`s and looked up by name or alias.
//!
//! ## Features
//!
//! - 🔁 **Circular references** - A singleton under construction can expose an
//!   early reference so a peer that needs it can finish first
//! - 🧵 **Thread-safe** - Concurrent requests for one name run its factory once;
//!   finished lookups never take the registry lock
//! - 🏷️ **Aliases** - Chains of aliases resolve to one canonical name, with
//!   cycle detection on registration
//! - 🧹 **Ordered teardown** - Dependents are destroyed before what they depend
//!   on, containers before what they contain
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use singleton_registry::{object_ref, SingletonRegistry};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let registry = SingletonRegistry::new();
//!
//! // Constructed once, on first request
//! registry
//!     .get_or_create("database", || {
//!         Ok(object_ref(Database { url: "postgres://localhost".into() }))
//!     })
//!     .unwrap();
//!
//! registry.register_alias("database", "db").unwrap();
//! let db = registry.get_typed::<Database>("db").unwrap();
//! assert_eq!(db.url, "postgres://localhost");
//! ```
//!
//! ## Circular References
//!
//! ```rust
//! use singleton_registry::{object_ref, ObjectRef, SingletonRegistry};
//! use std::sync::{Arc, OnceLock};
//!
//! struct Node { peer: OnceLock<ObjectRef> }
//!
//! let registry = SingletonRegistry::new();
//! let r = registry.clone();
//!
//! let a = registry
//!     .get_or_create("a", || {
//!         let a = Arc::new(Node { peer: OnceLock::new() });
//!         let early: ObjectRef = a.clone();
//!         r.register_pending_factory("a", move || early)?;
//!
//!         // "b" sees the early reference to "a"
//!         let b = r.get_or_create("b", || {
//!             let b = Node { peer: OnceLock::new() };
//!             let _ = b.peer.set(r.get("a").expect("early reference"));
//!             Ok(object_ref(b))
//!         })?;
//!
//!         let _ = a.peer.set(b);
//!         Ok(a as ObjectRef)
//!     })
//!     .unwrap();
//!
//! let b = registry.get_typed::<Node>("b").unwrap();
//! assert!(Arc::ptr_eq(b.peer.get().unwrap(), &a));
//! ```
//!
//! ## Teardown
//!
//! ```rust
//! use singleton_registry::{object_ref, SingletonRegistry};
//!
//! let registry = SingletonRegistry::new();
//! registry.register_finished("pool", object_ref(())).unwrap();
//! registry.register_finished("repository", object_ref(())).unwrap();
//! registry.register_disposable("pool", || Ok(())).unwrap();
//! registry.register_disposable("repository", || Ok(())).unwrap();
//! registry.add_dependency("pool", "repository");
//!
//! // "repository" goes first because it depends on "pool"
//! let report = registry.destroy("pool");
//! assert_eq!(report.destroyed, vec!["repository", "pool"]);
//! ```

mod alias;
mod cache;
mod config;
mod error;
mod graph;
mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod object;
mod registry;
mod tracker;

pub use alias::*;
pub use cache::*;
pub use config::*;
pub use error::*;
pub use graph::*;
pub use lifecycle::*;
pub use object::*;
pub use registry::*;
pub use tracker::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        DestructionReport, Injectable, ObjectRef, RegistryConfig, RegistryError, Result,
        SingletonRegistry, object_ref,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::OnceLock;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct DataSource {
        url: String,
    }

    struct Repository {
        source: Arc<DataSource>,
    }

    struct Peer {
        other: OnceLock<ObjectRef>,
    }

    #[test]
    fn test_lazy_singleton_through_alias() {
        static CREATED: AtomicU32 = AtomicU32::new(0);

        let registry = SingletonRegistry::new();
        registry.register_alias("dataSource", "ds").unwrap();

        let make = || {
            CREATED.fetch_add(1, Ordering::SeqCst);
            Ok(object_ref(DataSource { url: "jdbc:h2:mem".into() }))
        };
        let first = registry.get_or_create("ds", make).unwrap();
        let second = registry.get_or_create("dataSource", make).unwrap();

        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
        assert!(same_object(&first, &second));
        assert_eq!(registry.list_finished_names(), vec!["dataSource"]);
        assert_eq!(registry.get_typed::<DataSource>("ds").unwrap().url, "jdbc:h2:mem");
    }

    #[test]
    fn test_nested_creation_records_dependency() {
        let registry = SingletonRegistry::new();
        let r = registry.clone();

        registry
            .get_or_create("repository", || {
                let source = r.get_or_create("dataSource", || {
                    Ok(object_ref(DataSource { url: "mem".into() }))
                })?;
                r.add_dependency("dataSource", "repository");
                let source = downcast::<DataSource>(source)
                    .ok_or_else(|| RegistryError::callback("wrong type"))?;
                Ok(object_ref(Repository { source }))
            })
            .unwrap();

        let repo = registry.get_typed::<Repository>("repository").unwrap();
        assert_eq!(repo.source.url, "mem");
        assert_eq!(registry.list_finished_names(), vec!["dataSource", "repository"]);
        assert_eq!(registry.dependents_of("dataSource"), vec!["repository"]);
        assert_eq!(registry.dependencies_of("repository"), vec!["dataSource"]);
    }

    #[test]
    fn test_circular_pair_then_teardown() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = registry.clone();

        registry
            .get_or_create("a", || {
                let a = Arc::new(Peer { other: OnceLock::new() });
                let early: ObjectRef = a.clone();
                r.register_pending_factory("a", move || early)?;

                let b = r.get_or_create("b", || {
                    let b = Peer { other: OnceLock::new() };
                    let a = r
                        .get("a")
                        .ok_or_else(|| RegistryError::callback("a not exposed"))?;
                    let _ = b.other.set(a);
                    r.add_dependency("a", "b");
                    Ok(object_ref(b))
                })?;
                r.add_dependency("b", "a");

                let _ = a.other.set(b);
                Ok(a as ObjectRef)
            })
            .unwrap();

        for name in ["a", "b"] {
            let log = Arc::clone(&log);
            registry
                .register_disposable(name, move || {
                    log.lock().push(name);
                    Ok(())
                })
                .unwrap();
        }

        // destroy_all walks callbacks in reverse registration order: "b" first,
        // which takes its dependent "a" down before itself
        let report = registry.destroy_all();
        assert!(report.is_clean());
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(registry.count_finished(), 0);
        assert!(registry.dependents_of("a").is_empty());
    }

    #[test]
    fn test_destroy_cascades_through_containment() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["engine", "car", "garage"] {
            registry.register_finished(name, object_ref(name)).unwrap();
            let log = Arc::clone(&log);
            registry
                .register_disposable(name, move || {
                    log.lock().push(name);
                    Ok(())
                })
                .unwrap();
        }
        registry.add_containment("car", "engine");
        registry.add_dependency("car", "garage");

        let report = registry.destroy("engine");

        assert_eq!(*log.lock(), vec!["garage", "car", "engine"]);
        assert_eq!(report.destroyed.len(), 3);
        assert!(!registry.contains("car"));
    }

    #[test]
    fn test_shutdown_blocks_construction_inside_callbacks() {
        let registry = SingletonRegistry::new();
        let r = registry.clone();
        let refused = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&refused);

        registry.register_finished("svc", object_ref(1u8)).unwrap();
        registry
            .register_disposable("svc", move || {
                let attempt = r.get_or_create("late", || Ok(object_ref(2u8)));
                *flag.lock() = matches!(attempt, Err(RegistryError::ShutdownInProgress { .. }));
                Ok(())
            })
            .unwrap();

        registry.destroy_all();
        assert!(*refused.lock());
        assert!(!registry.contains("late"));
    }

    #[test]
    fn test_prelude_exports() {
        use crate::prelude::*;

        let registry: SingletonRegistry =
            SingletonRegistry::with_config(RegistryConfig::new().capacity(8));
        let value: ObjectRef = object_ref(7u16);
        registry.register_finished("seven", value).unwrap();
        let report: DestructionReport = registry.destroy("seven");
        assert_eq!(report.destroyed, vec!["seven"]);
    }
}
