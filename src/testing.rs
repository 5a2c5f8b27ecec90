//! Shared fixtures for unit tests

use crate::container::Container;
use crate::descriptor::{Describe, Parameter, TypeDescriptor};
use crate::reflector::Reflector;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    pub cylinders: i64,
}

impl Describe for Engine {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Engine>("Engine")
            .extends("Part")
            .constructor(
                vec![Parameter::new("cylinders").default_value(Value::new(4i64))],
                |args| {
                    Ok(Engine {
                        cylinders: args.cloned(0)?,
                    })
                },
            )
            .method("describe", vec![], |engine: &Engine, _| {
                Ok(Value::new(format!("{} cylinders", engine.cylinders)))
            })
            .method("boost", vec![Parameter::new("by")], |engine: &Engine, args| {
                Ok(Value::new(engine.cylinders + args.cloned::<i64>(0)?))
            })
            .static_method("standard", vec![], |_| Ok(Value::new(8i64)))
            .build()
    }
}

/// Holds a name and the container that built it
pub struct Garage {
    pub name: String,
    pub container: Container,
}

fn garage() -> TypeDescriptor {
    TypeDescriptor::builder::<Garage>("Garage")
        .constructor(
            vec![
                Parameter::new("name"),
                Parameter::new("container").of_type(Container::CONTRACT_ID),
            ],
            |args| {
                Ok(Garage {
                    name: args.cloned(0)?,
                    container: args.container(1)?,
                })
            },
        )
        .build()
}

/// `Engine`, `Garage` and the abstract `Vehicle`, registered in a fresh container
pub fn container() -> Container {
    let reflector = Reflector::new();
    reflector.describe::<Engine>().expect("Engine");
    reflector.register_type(garage()).expect("Garage");
    reflector
        .register_type(TypeDescriptor::abstract_type("Vehicle"))
        .expect("Vehicle");
    Container::new(Arc::new(reflector))
}
