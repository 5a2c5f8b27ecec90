//! Resolving a small object graph by identifier
//!
//! Run with:
//!   cargo run --example engine

use dependency_resolver::ReflectionError;
use dependency_resolver::prelude::*;
use std::error::Error;

struct Engine {
    cylinders: i64,
}

struct Car {
    engine: Arc<Engine>,
    owner: String,
}

impl Car {
    fn honk(&self, times: i64) -> String {
        format!("{} honks {} times with {} cylinders", self.owner, times, self.engine.cylinders)
    }
}

fn reflector() -> std::result::Result<Reflector, ReflectionError> {
    let reflector = Reflector::new();
    reflector.register_type(
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
    )?;
    reflector.register_type(
        TypeDescriptor::builder::<Car>("Car")
            .constructor(
                vec![
                    Parameter::new("engine").of_type("Engine"),
                    Parameter::new("owner").default_value(Value::new(String::from("nobody"))),
                ],
                |args| {
                    Ok(Car {
                        engine: args.shared(0)?,
                        owner: args.cloned(1)?,
                    })
                },
            )
            .method("honk", vec![Parameter::new("times")], |car: &Car, args| {
                Ok(Value::new(car.honk(args.cloned(0)?)))
            })
            .build(),
    )?;
    // Requires a wheel nobody describes
    reflector.register_type(
        TypeDescriptor::builder::<()>("Bike")
            .constructor(vec![Parameter::new("wheel").of_type("Wheel")], |_| Ok(()))
            .build(),
    )?;
    Ok(reflector)
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("=== Dependency Resolver Engine Demo ===\n");

    let container = Container::new(Arc::new(reflector()?));

    let car = container.get_as::<Car>("Car")?;
    println!("Shared car: {} cylinders, owned by {}", car.engine.cylinders, car.owner);

    let sports = container.make_with(
        "Car",
        &arguments! {
            "owner" => "alice",
            "$engine" => arguments! { "cylinders" => 8i64 },
        },
    )?;
    let sports = sports.downcast::<Car>().ok_or("not a Car")?;
    println!("Fresh car: {} cylinders, owned by {}", sports.engine.cylinders, sports.owner);

    // Methods resolve their receiver through the container
    container.define("honk", "Car::honk")?;
    let honk = container.make_with("honk", &arguments! { "times" => 3i64 })?;
    println!("{}", honk.downcast::<String>().ok_or("not a String")?);

    // Failures carry the resolution path
    match container.get("Bike") {
        Ok(_) => println!("unexpected bike"),
        Err(err) => println!("\nFailed as expected: {}\n  path: {}", err, err.path().unwrap_or("-")),
    }

    println!("\nKnown identifiers: {:?}", container.identifiers());
    Ok(())
}
