//! Benchmarks for the singleton registry

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use singleton_registry::{ObjectRef, SingletonRegistry, object_ref};
use std::hint::black_box;
use std::sync::{Arc, OnceLock};

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

struct Peer {
    other: OnceLock<ObjectRef>,
}

fn populated(count: usize) -> SingletonRegistry {
    let registry = SingletonRegistry::with_capacity(count);
    for i in 0..count {
        registry
            .register_finished(&format!("service{i}"), object_ref(SmallService { value: i as i32 }))
            .unwrap();
    }
    registry
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("register_finished", |b| {
        b.iter(|| {
            let registry = SingletonRegistry::new();
            registry
                .register_finished("service", object_ref(SmallService { value: 42 }))
                .unwrap();
            black_box(registry)
        })
    });

    group.bench_function("get_or_create_fresh", |b| {
        b.iter(|| {
            let registry = SingletonRegistry::new();
            let obj = registry
                .get_or_create("service", || Ok(object_ref(SmallService { value: 42 })))
                .unwrap();
            black_box(obj)
        })
    });

    group.bench_function("circular_pair", |b| {
        b.iter(|| {
            let registry = SingletonRegistry::new();
            let r = registry.clone();
            let a = registry
                .get_or_create("a", || {
                    let a = Arc::new(Peer { other: OnceLock::new() });
                    let early: ObjectRef = a.clone();
                    r.register_pending_factory("a", move || early)?;
                    let b = r.get_or_create("b", || {
                        let b = Peer { other: OnceLock::new() };
                        if let Some(a) = r.get("a") {
                            let _ = b.other.set(a);
                        }
                        Ok(object_ref(b))
                    })?;
                    let _ = a.other.set(b);
                    Ok(a as ObjectRef)
                })
                .unwrap();
            black_box(a)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let registry = populated(100);
    registry.register_alias("service50", "alias1").unwrap();
    registry.register_alias("alias1", "alias2").unwrap();

    group.bench_function("get_finished", |b| {
        b.iter(|| black_box(registry.get("service50")))
    });

    group.bench_function("get_typed", |b| {
        b.iter(|| black_box(registry.get_typed::<SmallService>("service50")))
    });

    group.bench_function("get_through_alias_chain", |b| {
        b.iter(|| black_box(registry.get("alias2")))
    });

    group.bench_function("get_or_create_hit", |b| {
        b.iter(|| black_box(registry.get_or_create("service50", || unreachable!())))
    });

    group.bench_function("get_missing", |b| {
        b.iter(|| black_box(registry.get("missing")))
    });

    group.finish();
}

fn bench_teardown(c: &mut Criterion) {
    let mut group = c.benchmark_group("teardown");

    for size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("destroy_chain_{size}"), |b| {
            b.iter_batched(
                || {
                    let registry = populated(size);
                    for i in 1..size {
                        registry.add_dependency(&format!("service{}", i - 1), &format!("service{i}"));
                    }
                    registry
                },
                |registry| black_box(registry.destroy("service0")),
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("destroy_all_{size}"), |b| {
            b.iter_batched(
                || {
                    let registry = populated(size);
                    for i in 0..size {
                        registry
                            .register_disposable(&format!("service{i}"), || Ok(()))
                            .unwrap();
                    }
                    registry
                },
                |registry| black_box(registry.destroy_all()),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let registry = populated(16);

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let r = registry.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = r.get("service7").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.bench_function("contended_get_or_create_4", |b| {
        b.iter(|| {
            let registry = SingletonRegistry::new();
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let r = registry.clone();
                    thread::spawn(move || {
                        r.get_or_create("shared", || Ok(object_ref(SmallService { value: 1 })))
                            .unwrap()
                    })
                })
                .collect();

            for h in handles {
                black_box(h.join().unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_teardown,
    bench_concurrent,
);

criterion_main!(benches);
