//! # Dependency Resolver - runtime dependency resolution for Rust
//!
//! Give the container an identifier and, optionally, a few arguments; it
//! works out everything else the target needs, builds it recursively and
//! invokes it.
//!
//! ## Features
//!
//! - **Declarative** - describe constructors, injectable properties and methods once
//! - **Shared or fresh** - `get` caches one instance per identifier, `make` always builds
//! - **Argument bags** - override any parameter by name or position, or steer a nested dependency
//! - **Causal errors** - failures report the full resolution path, e.g. `Car > Engine > Piston`
//! - **Concurrent** - `DashMap`-backed registries, shareable introspection caches
//! - **Observable** - optional `tracing` integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use dependency_resolver::prelude::*;
//!
//! struct Engine {
//!     cylinders: i64,
//! }
//!
//! struct Car {
//!     engine: Arc<Engine>,
//! }
//!
//! let reflector = Reflector::new();
//! reflector
//!     .register_type(
//!         TypeDescriptor::builder::<Engine>("Engine")
//!             .constructor(
//!                 vec![Parameter::new("cylinders").default_value(Value::new(4i64))],
//!                 |args| Ok(Engine { cylinders: args.cloned(0)? }),
//!             )
//!             .build(),
//!     )
//!     .unwrap();
//! reflector
//!     .register_type(
//!         TypeDescriptor::builder::<Car>("Car")
//!             .constructor(vec![Parameter::new("engine").of_type("Engine")], |args| {
//!                 Ok(Car { engine: args.shared(0)? })
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let container = Container::new(Arc::new(reflector));
//!
//! // The engine is resolved and shared automatically
//! let car = container.get_as::<Car>("Car").unwrap();
//! assert_eq!(car.engine.cylinders, 4);
//!
//! // Steer the nested dependency with its own argument bag
//! let sports = container
//!     .make_with("Car", &arguments! { "$engine" => arguments! { "cylinders" => 8i64 } })
//!     .unwrap();
//! assert_eq!(sports.downcast::<Car>().unwrap().engine.cylinders, 8);
//! ```
//!
//! ## Resolution order
//!
//! For every parameter the first match wins: an argument by name, by
//! position (a trailing variadic collects the contiguous run), an empty list
//! for an unfilled variadic, a non-null default, null when nullable, then
//! the declared types through the container.
//!
//! ## Failures
//!
//! ```rust
//! use dependency_resolver::{Container, DiError, Parameter, Reflector, TypeDescriptor};
//! use std::sync::Arc;
//!
//! struct Car;
//!
//! let reflector = Reflector::new();
//! reflector
//!     .register_type(
//!         TypeDescriptor::builder::<Car>("Car")
//!             .constructor(vec![Parameter::new("engine").of_type("Engine")], |_| Ok(Car))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let container = Container::new(Arc::new(reflector));
//! let err = container.get("Car").unwrap_err();
//! assert!(matches!(err, DiError::NotFound { .. }));
//! assert_eq!(err.path(), Some("Car > Engine"));
//! ```

mod collector;
mod container;
mod definition;
mod descriptor;
mod error;
mod foundry;
#[cfg(feature = "logging")]
pub mod logging;
mod parameter;
mod property;
mod reflector;
mod storage;
#[cfg(test)]
mod testing;
mod value;

pub use collector::*;
pub use container::*;
pub use definition::*;
pub use descriptor::*;
pub use error::*;
pub use foundry::*;
pub use parameter::*;
pub use property::*;
pub use reflector::*;
pub use value::*;

#[cfg(feature = "derive")]
pub use dependency_resolver_derive::Describe;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Arguments, BatchPolicy, Callable, Container, ContainerRef, Describe, DiError, Foundry,
        FunctionDescriptor, Injectable, Parameter, Property, Reflector, Resolver, Result, TypeDescriptor,
        Value, Visibility, arguments,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Engine;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Logger {
        lines: std::sync::Mutex<Vec<String>>,
    }

    struct Service {
        logger: Arc<Logger>,
        tags: Vec<String>,
    }

    fn reflector() -> Arc<Reflector> {
        let reflector = Reflector::new();
        reflector.describe::<Engine>().unwrap();
        reflector
            .register_type(
                TypeDescriptor::builder::<Logger>("Logger")
                    .blank(|| Logger {
                        lines: std::sync::Mutex::new(Vec::new()),
                    })
                    .build(),
            )
            .unwrap();
        reflector
            .register_type(
                TypeDescriptor::builder::<Service>("Service")
                    .constructor(
                        vec![
                            Parameter::new("logger").of_type("Logger"),
                            Parameter::new("tags").variadic(),
                        ],
                        |args| {
                            let tags = args
                                .rest(1)
                                .iter()
                                .map(|tag| tag.expect_cloned::<String>("tag"))
                                .collect::<std::result::Result<_, _>>()?;
                            Ok(Service {
                                logger: args.shared(0)?,
                                tags,
                            })
                        },
                    )
                    .build(),
            )
            .unwrap();
        reflector
            .register_function(FunctionDescriptor::new(
                "log",
                vec![
                    Parameter::new("logger").of_type("Logger"),
                    Parameter::new("line"),
                ],
                |args| {
                    let logger = args.shared::<Logger>(0)?;
                    let line = args.cloned::<String>(1)?;
                    let mut lines = logger.lines.lock().map_err(|_| "poisoned")?;
                    lines.push(line);
                    Ok(Value::new(lines.len()))
                },
            ))
            .unwrap();
        Arc::new(reflector)
    }

    #[test]
    fn test_shared_dependency_across_graph() {
        let container = Container::new(reflector());
        let service = container
            .make_with("Service", &arguments! { [1] => "a", [2] => "b" })
            .unwrap();
        let service = service.downcast::<Service>().unwrap();

        assert_eq!(service.tags, vec!["a".to_string(), "b".to_string()]);
        assert!(Arc::ptr_eq(
            &service.logger,
            &container.get_as::<Logger>("Logger").unwrap()
        ));
    }

    #[test]
    fn test_function_identifier() {
        let container = Container::new(reflector());
        container.define("write", "log").unwrap();

        let count = container
            .make_with("write", &arguments! { "line" => "first" })
            .unwrap();
        assert_eq!(*count.downcast::<usize>().unwrap(), 1);
        let count = container.make_with("log", &arguments! { [1] => "second" }).unwrap();
        assert_eq!(*count.downcast::<usize>().unwrap(), 2);
    }

    #[test]
    fn test_containers_share_definitions_not_instances() {
        let collector = Arc::new(Collector::new(reflector()));
        let first = Container::with_collector(Arc::clone(&collector));
        let second = Container::with_collector(collector);

        let a = first.get("Engine").unwrap();
        let b = second.get("Engine").unwrap();
        assert!(!Value::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_get_shares_one_instance() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        struct Counted;

        let reflector = Reflector::new();
        reflector
            .register_type(
                TypeDescriptor::builder::<Counted>("Counted")
                    .constructor(vec![], |_| {
                        BUILT.fetch_add(1, Ordering::SeqCst);
                        Ok(Counted)
                    })
                    .build(),
            )
            .unwrap();
        let container = Container::new(Arc::new(reflector));

        let values: Vec<Value> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| container.get("Counted").unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert!(values.windows(2).all(|pair| Value::ptr_eq(&pair[0], &pair[1])));
        assert!(BUILT.load(Ordering::SeqCst) >= 1);
    }
}
