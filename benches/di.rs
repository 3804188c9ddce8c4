use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resolvit::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let mut builder = ContainerBuilder::new();
    builder.instance("answer", Arc::new(42u64));
    let container = builder.build();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = container.get_as::<u64>("answer").unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let mut builder = ContainerBuilder::new();
                builder.singleton_factory("Expensive", |_| {
                    Ok(Arc::new(ExpensiveToCreate {
                        data: (0..1000).collect(),
                    }))
                });
                builder.build()
            },
            |container| {
                let v = container.get_as::<ExpensiveToCreate>("Expensive").unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_prototype_cache(c: &mut Criterion) {
    #[derive(Default)]
    struct Transport;
    struct Mailer {
        _transport: Arc<Transport>,
        _retries: u32,
    }

    let mut builder = ContainerBuilder::new();
    builder.class(ClassBuilder::<Transport>::with_default("Transport"));
    builder.class(
        ClassBuilder::<Mailer>::new("Mailer")
            .param(Param::service("transport", "Transport"))
            .param(Param::new("retries").default(3))
            .constructor(|args| {
                Ok(Mailer {
                    _transport: args.service("transport")?,
                    _retries: args.value("retries")?,
                })
            }),
    );
    let container = builder.build();

    let mut group = c.benchmark_group("prototype_cache");

    container.get("Mailer").unwrap();
    group.bench_function("autowire_warm", |b| {
        b.iter(|| {
            let v = container.get("Mailer").unwrap();
            black_box(v);
        })
    });

    group.bench_function("autowire_cold", |b| {
        b.iter(|| {
            container.clear_prototypes();
            let v = container.get("Mailer").unwrap();
            black_box(v);
        })
    });

    group.finish();
}

fn bench_scoped_vs_transient(c: &mut Criterion) {
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("scoped_vs_transient");

    // Scoped service
    let mut scoped = ContainerBuilder::new();
    scoped.scoped_factory("Service", |_| Ok(Arc::new(Service { data: [0; 64] })));
    let scoped = scoped.build();
    let scope = scoped.scope();

    group.bench_function("scoped_hit", |b| {
        b.iter(|| {
            let v = scope.get_as::<Service>("Service").unwrap();
            black_box(&v.data);
        })
    });

    // Transient service
    let mut transient = ContainerBuilder::new();
    transient.bind_factory("Service", |_| Ok(Arc::new(Service { data: [0; 64] })));
    let transient = transient.build();

    group.bench_function("transient", |b| {
        b.iter(|| {
            let v = transient.get_as::<Service>("Service").unwrap();
            black_box(&v.data);
        })
    });

    group.finish();
}

fn bench_concrete_vs_trait(c: &mut Criterion) {
    trait MyTrait: Send + Sync {
        fn value(&self) -> u64;
    }

    struct ConcreteImpl {
        val: u64,
    }

    impl MyTrait for ConcreteImpl {
        fn value(&self) -> u64 {
            self.val
        }
    }

    let mut group = c.benchmark_group("concrete_vs_trait");

    let mut builder = ContainerBuilder::new();
    builder.instance("Concrete", Arc::new(ConcreteImpl { val: 42 }));
    builder.instance_trait::<dyn MyTrait>("Trait", Arc::new(ConcreteImpl { val: 42 }));
    let container = builder.build();

    group.bench_function("concrete", |b| {
        b.iter(|| {
            let v = container.get_as::<ConcreteImpl>("Concrete").unwrap();
            black_box(v.val);
        })
    });

    group.bench_function("trait_single", |b| {
        b.iter(|| {
            let v = container.get_trait::<dyn MyTrait>("Trait").unwrap();
            black_box(v.value());
        })
    });

    group.finish();
}

fn bench_tagged_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("tagged");

    for &count in &[1usize, 4, 16, 64] {
        let mut builder = ContainerBuilder::new();
        for i in 0..count {
            builder
                .singleton_factory(format!("handler.{}", i), move |_| Ok(Arc::new(i)))
                .tag("handlers");
        }
        let container = builder.build();

        group.bench_with_input(BenchmarkId::new("tagged", count), &count, |b, _| {
            b.iter(|| {
                let handlers = container.tagged("handlers").unwrap();
                black_box(handlers.len());
            })
        });
    }

    group.finish();
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    struct ScopedService {
        data: Vec<u8>,
    }

    let mut group = c.benchmark_group("scope_lifecycle");

    let empty = ContainerBuilder::new().build();
    group.bench_function("empty_scope_begin_end", |b| {
        b.iter(|| {
            let scope = empty.scope();
            black_box(scope.depth());
        })
    });

    let mut builder = ContainerBuilder::new();
    builder.scoped_factory("ScopedService", |_| {
        Ok(Arc::new(ScopedService { data: vec![0; 1024] }))
    });
    let container = builder.build();

    group.bench_function("scope_with_service", |b| {
        b.iter(|| {
            let scope = container.scope();
            let service = scope.get_as::<ScopedService>("ScopedService").unwrap();
            black_box(service.data.len());
        })
    });

    group.bench_function("fork_and_scope", |b| {
        b.iter(|| {
            let request = container.fork();
            let scope = request.scope();
            let service = scope.get_as::<ScopedService>("ScopedService").unwrap();
            black_box(service.data.len());
        })
    });

    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_chain");

    // Transient chain of depth 8, every link checked for cycles
    let mut builder = ContainerBuilder::new();
    builder.bind_factory("Link0", |_| Ok(Arc::new(0usize)));
    for i in 1..8usize {
        let previous = format!("Link{}", i - 1);
        builder.bind_factory(format!("Link{}", i), move |ctx| {
            let below = ctx.get_as::<usize>(&previous)?;
            Ok(Arc::new(*below + 1))
        });
    }
    let container = builder.build();

    group.bench_function("chain_depth_8", |b| {
        b.iter(|| {
            let top = container.get_as::<usize>("Link7").unwrap();
            black_box(*top);
        })
    });

    group.finish();
}

fn bench_make_with_overrides(c: &mut Criterion) {
    struct Report {
        _title: String,
        _limit: u32,
    }

    let mut builder = ContainerBuilder::new();
    builder.class(
        ClassBuilder::<Report>::new("Report")
            .param(Param::new("title").default("Monthly"))
            .param(Param::new("limit").default(10))
            .constructor(|args| {
                Ok(Report {
                    _title: args.value("title")?,
                    _limit: args.value("limit")?,
                })
            }),
    );
    let container = builder.build();
    let overrides = Parameters::new().value("limit", 50);

    c.bench_function("make_with_overrides", |b| {
        b.iter(|| {
            let v = container.make("Report", &overrides).unwrap();
            black_box(v);
        })
    });
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");

    let mut builder = ContainerBuilder::new();
    builder.instance("answer", Arc::new(42u64));
    let container = builder.build();

    for &thread_count in &[1u64, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("singleton_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    std::thread::scope(|s| {
                        for _ in 0..threads {
                            let container = &container;
                            s.spawn(move || {
                                for _ in 0..iters / threads {
                                    let v = container.get_as::<u64>("answer").unwrap();
                                    black_box(v);
                                }
                            });
                        }
                    });
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

// ===== Macro Benchmarks =====

fn bench_large_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_registry");

    for &service_count in &[10usize, 100, 1000] {
        let mut builder = ContainerBuilder::new();
        builder.instance("answer", Arc::new(42u64));
        for i in 0..service_count {
            builder.singleton_factory(format!("service.{}", i), move |_| Ok(Arc::new(i)));
        }
        let container = builder.build();

        group.bench_with_input(
            BenchmarkId::new("resolve_from_large_registry", service_count),
            &service_count,
            |b, _| {
                b.iter(|| {
                    let v = container.get_as::<u64>("answer").unwrap();
                    black_box(v);
                })
            },
        );
    }

    group.finish();
}

fn bench_mixed_workload(c: &mut Criterion) {
    // 70% singleton hits, 20% scoped hits, 10% transient
    struct SingletonService(u64);
    struct ScopedService(u64);
    struct TransientService(u64);

    let mut builder = ContainerBuilder::new();
    builder.instance("Singleton", Arc::new(SingletonService(1)));
    builder.scoped_factory("Scoped", |_| Ok(Arc::new(ScopedService(2))));
    builder.bind_factory("Transient", |_| Ok(Arc::new(TransientService(3))));
    let container = builder.build();
    let scope = container.scope();

    let _ = scope.get("Scoped").unwrap();

    c.bench_function("mixed_workload_realistic", |b| {
        b.iter(|| {
            for _ in 0..7 {
                let v = scope.get_as::<SingletonService>("Singleton").unwrap();
                black_box(v.0);
            }
            for _ in 0..2 {
                let v = scope.get_as::<ScopedService>("Scoped").unwrap();
                black_box(v.0);
            }
            let v = scope.get_as::<TransientService>("Transient").unwrap();
            black_box(v.0);
        })
    });
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_prototype_cache,
    bench_scoped_vs_transient,
    bench_concrete_vs_trait,
    bench_tagged_scaling,
    bench_scope_lifecycle,
    bench_dependency_chain,
    bench_make_with_overrides,
    bench_contention
);

criterion_group!(macro_benches, bench_large_registry, bench_mixed_workload);

criterion_main!(micro_benches, macro_benches);
