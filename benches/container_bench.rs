//! Benchmarks for the resolution engine

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use dependency_resolver::Collector;
use dependency_resolver::prelude::*;
use std::hint::black_box;

#[allow(dead_code)]
struct Engine {
    cylinders: i64,
}

#[allow(dead_code)]
struct Wheel {
    size: i64,
}

#[allow(dead_code)]
struct Car {
    engine: Arc<Engine>,
    wheel: Arc<Wheel>,
    name: String,
}

fn reflector() -> Arc<Reflector> {
    let reflector = Reflector::new();
    reflector
        .register_type(
            TypeDescriptor::builder::<Engine>("Engine")
                .constructor(
                    vec![Parameter::new("cylinders").default_value(Value::new(4i64))],
                    |args| {
                        Ok(Engine {
                            cylinders: args.cloned(0)?,
                        })
                    },
                )
                .build(),
        )
        .unwrap();
    reflector
        .register_type(
            TypeDescriptor::builder::<Wheel>("Wheel")
                .constructor(
                    vec![Parameter::new("size").default_value(Value::new(17i64))],
                    |args| Ok(Wheel { size: args.cloned(0)? }),
                )
                .build(),
        )
        .unwrap();
    reflector
        .register_type(
            TypeDescriptor::builder::<Car>("Car")
                .constructor(
                    vec![
                        Parameter::new("engine").of_type("Engine"),
                        Parameter::new("wheel").of_type("Wheel"),
                        Parameter::new("name").default_value(Value::new(String::from("sedan"))),
                    ],
                    |args| {
                        Ok(Car {
                            engine: args.shared(0)?,
                            wheel: args.shared(1)?,
                            name: args.cloned(2)?,
                        })
                    },
                )
                .build(),
        )
        .unwrap();
    Arc::new(reflector)
}

fn sum() -> Callable {
    Callable::new(vec![Parameter::new("values").variadic()], |args| {
        let mut total = 0i64;
        for value in args.rest(0) {
            total += value.expect_cloned::<i64>("values")?;
        }
        Ok(Value::new(total))
    })
}

fn bench_definition(c: &mut Criterion) {
    let mut group = c.benchmark_group("definition");
    let reflector = reflector();

    group.bench_function("define_cold", |b| {
        b.iter(|| {
            let container = Container::new(Arc::clone(&reflector));
            container.define("car", "Car").unwrap();
            black_box(container)
        })
    });

    let collector = Arc::new(Collector::new(Arc::clone(&reflector)));
    collector.get("Car").unwrap();
    group.bench_function("define_memoized", |b| {
        b.iter(|| {
            let container = Container::with_collector(Arc::clone(&collector));
            container.define("car", "Car").unwrap();
            black_box(container)
        })
    });

    group.bench_function("define_batch_3", |b| {
        b.iter(|| {
            let container = Container::with_collector(Arc::clone(&collector));
            container
                .define_many(BatchPolicy::Fail)
                .define("engine", "Engine")
                .define("wheel", "Wheel")
                .define("car", "Car")
                .done()
                .unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = Container::new(reflector());
    container.get("Car").unwrap();

    group.bench_function("get_shared_hit", |b| {
        b.iter(|| black_box(container.get("Car").unwrap()))
    });

    group.bench_function("has", |b| b.iter(|| black_box(container.has("Car"))));

    group.bench_function("make_defaults", |b| {
        b.iter(|| black_box(container.make("Engine").unwrap()))
    });

    group.bench_function("make_with_shared_dependencies", |b| {
        b.iter(|| black_box(container.make("Car").unwrap()))
    });

    let nested = arguments! {
        "name" => "coupe",
        "$engine" => arguments! { "cylinders" => 8i64 },
    };
    group.bench_function("make_with_nested_bag", |b| {
        b.iter(|| black_box(container.make_with("Car", &nested).unwrap()))
    });

    group.bench_function("not_found", |b| {
        b.iter(|| black_box(container.get("Missing").is_err()))
    });

    group.finish();
}

fn bench_callables(c: &mut Criterion) {
    let mut group = c.benchmark_group("callables");
    let container = Container::new(reflector());
    let callable = sum();
    let arguments = arguments! { [0] => 1i64, [1] => 2i64, [2] => 3i64, [3] => 4i64 };

    group.bench_function("resolve_closure_variadic", |b| {
        b.iter(|| black_box(container.resolve_closure(&callable, &arguments).unwrap()))
    });

    let wrapped = container.closure(sum());
    group.bench_function("closure_wrapper", |b| {
        b.iter(|| black_box(wrapped(&arguments).unwrap()))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    let container = Container::new(reflector());
    container.get("Car").unwrap();

    group.bench_function("get_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..100 {
                            black_box(container.get("Car").unwrap());
                        }
                    });
                }
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_definition,
    bench_resolution,
    bench_callables,
    bench_concurrent
);
criterion_main!(benches);
