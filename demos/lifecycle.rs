//! Demo of circular references and ordered teardown
//!
//! Run with pretty logging:
//! ```bash
//! cargo run --example lifecycle --features logging-pretty
//! ```
//!
//! Run with JSON logging:
//! ```bash
//! cargo run --example lifecycle --features logging-json
//! ```

use singleton_registry::{ObjectRef, RegistryError, SingletonRegistry, object_ref};
use std::sync::{Arc, OnceLock};

#[allow(dead_code)]
struct ConnectionPool {
    url: String,
}

/// Holds its peer loosely so the two can be built in either order
struct OrderService {
    inventory: OnceLock<ObjectRef>,
}

struct InventoryService {
    orders: ObjectRef,
}

fn main() {
    #[cfg(feature = "logging")]
    {
        singleton_registry::logging::init();
    }

    println!("=== Singleton Registry Lifecycle Demo ===\n");

    let registry = SingletonRegistry::new();
    registry.register_alias("connectionPool", "pool").unwrap();

    // Plain lazy singleton, requested through its alias
    registry
        .get_or_create("pool", || {
            println!("  [App] Opening connection pool...");
            Ok(object_ref(ConnectionPool {
                url: "postgres://localhost/shop".into(),
            }))
        })
        .unwrap();

    // orders <-> inventory: orders exposes itself early so inventory can finish
    let r = registry.clone();
    registry
        .get_or_create("orders", || {
            let orders = Arc::new(OrderService {
                inventory: OnceLock::new(),
            });
            let early: ObjectRef = orders.clone();
            r.register_pending_factory("orders", move || early)?;

            let inventory = r.get_or_create("inventory", || {
                let orders = r
                    .get("orders")
                    .ok_or_else(|| RegistryError::callback("orders not exposed"))?;
                r.add_dependency("orders", "inventory");
                r.add_dependency("pool", "inventory");
                Ok(object_ref(InventoryService { orders }))
            })?;
            r.add_dependency("inventory", "orders");
            r.add_dependency("pool", "orders");

            let _ = orders.inventory.set(inventory);
            Ok(orders as ObjectRef)
        })
        .unwrap();

    let inventory = registry.get_typed::<InventoryService>("inventory").unwrap();
    let orders = registry.get("orders").unwrap();
    println!(
        "  [App] inventory sees the finished orders object: {}",
        Arc::ptr_eq(&inventory.orders, &orders)
    );
    println!("  [App] finished: {:?}", registry.list_finished_names());
    println!("  [App] depends on pool: {:?}", registry.dependents_of("pool"));

    for name in registry.list_finished_names() {
        let label = name.clone();
        registry
            .register_disposable(&name, move || {
                println!("  [App] Destroying {label}");
                Ok(())
            })
            .unwrap();
    }

    // Everything depending on the pool goes first
    let report = registry.destroy("pool");
    println!("\n  [App] destroyed in order: {:?}", report.destroyed);

    let report = registry.destroy_all();
    assert!(report.is_clean());
    println!("  [App] remaining: {}", registry.count_finished());

    println!("\n=== Demo Complete ===");
}
