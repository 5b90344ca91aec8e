#![no_main]

//! Fuzz target for dependency-ordered teardown
//!
//! Builds random dependency and containment graphs (cycles included) and
//! checks that every registered destroy callback runs exactly once.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use singleton_registry::{object_ref, SingletonRegistry};
use std::sync::{Arc, Mutex};

const NAMES: [&str; 8] = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7"];

fn name(index: u8) -> &'static str {
    NAMES[index as usize % NAMES.len()]
}

#[derive(Debug, Arbitrary)]
enum LifecycleOp {
    Register(u8),
    Depend { on: u8, dependent: u8 },
    Contain { container: u8, contained: u8 },
    Alias { name: u8, alias: u8 },
    Destroy(u8),
    DestroyAll,
}

fuzz_target!(|ops: Vec<LifecycleOp>| {
    let registry = SingletonRegistry::new();
    let log: Arc<Mutex<Vec<(&'static str, usize)>>> = Arc::default();
    let mut registrations = 0usize;

    for op in ops.into_iter().take(100) {
        match op {
            LifecycleOp::Register(n) => {
                let n = name(n);
                if registry.register_finished(n, object_ref(n)).is_ok() {
                    let log = Arc::clone(&log);
                    let generation = registrations;
                    let registered = registry.register_disposable(n, move || {
                        if let Ok(mut log) = log.lock() {
                            log.push((n, generation));
                        }
                        Ok(())
                    });
                    if registered.is_ok() {
                        registrations += 1;
                    }
                }
            }
            LifecycleOp::Depend { on, dependent } => {
                registry.add_dependency(name(on), name(dependent));
            }
            LifecycleOp::Contain {
                container,
                contained,
            } => {
                registry.add_containment(name(container), name(contained));
            }
            LifecycleOp::Alias { name: n, alias } => {
                let _ = registry.register_alias(name(n), name(alias));
            }
            LifecycleOp::Destroy(n) => {
                let report = registry.destroy(name(n));
                assert!(report.is_clean());
            }
            LifecycleOp::DestroyAll => {
                assert!(registry.destroy_all().is_clean());
                assert_eq!(registry.count_finished(), 0);
            }
        }
    }

    registry.destroy_all();

    let log = log.lock().map(|log| log.clone()).unwrap_or_default();
    let mut seen = std::collections::HashSet::new();
    for (n, generation) in &log {
        assert!(seen.insert(*generation), "{n} destroyed twice");
    }
    assert_eq!(seen.len(), registrations);
});
