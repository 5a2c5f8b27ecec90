//! Member proxy
//!
//! A [`Foundry`] binds one instance to a container and routes method calls
//! on it through the container's method resolution, so callers only pass the
//! arguments they want to override.

use crate::collector::MEMBER_SEPARATOR;
use crate::container::Container;
use crate::error::Result;
use crate::value::{Arguments, Value};

/// Instance-bound method proxy
///
/// ```rust
/// use dependency_resolver::{Arguments, Container, Reflector, TypeDescriptor, Value};
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// let reflector = Reflector::new();
/// reflector
///     .register_type(
///         TypeDescriptor::builder::<Greeter>("Greeter")
///             .method("hello", vec![], |_: &Greeter, _| Ok(Value::new("hi".to_string())))
///             .build(),
///     )
///     .unwrap();
///
/// let container = Container::new(Arc::new(reflector));
/// let greeter = container.foundry(Value::new(Greeter));
/// let said = greeter.call("hello", &Arguments::new()).unwrap();
/// assert_eq!(*said.downcast::<String>().unwrap(), "hi");
/// ```
#[derive(Clone, Debug)]
pub struct Foundry {
    container: Container,
    instance: Value,
}

impl Foundry {
    pub(crate) fn new(container: Container, instance: Value) -> Self {
        Self { container, instance }
    }

    #[inline]
    pub fn instance(&self) -> &Value {
        &self.instance
    }

    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Call `method` on the bound instance.
    ///
    /// `Type::method` stays on the resolution path for the duration of the
    /// call; errors propagate unchanged.
    pub fn call(&self, method: &str, arguments: &Arguments) -> Result<Value> {
        let type_name = self.container.type_name_of(&self.instance, method)?;
        let id = format!("{}{}{}", type_name, MEMBER_SEPARATOR, method);

        let _guard = self.container.enter(&id)?;
        self.container.invoke_method(&self.instance, &type_name, method, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiError, ResolveError};
    use crate::testing::{self, Engine};

    #[test]
    fn test_call_uses_bound_instance() {
        let container = testing::container();
        let foundry = container.foundry(Value::new(Engine { cylinders: 5 }));

        let described = foundry.call("describe", &Arguments::new()).unwrap();
        assert_eq!(*described.downcast::<String>().unwrap(), "5 cylinders");
    }

    #[test]
    fn test_call_pushes_member_onto_path() {
        let container = testing::container();
        let foundry = container.foundry(Value::new(Engine { cylinders: 5 }));

        let err = foundry.call("boost", &Arguments::new()).unwrap_err();
        match err {
            DiError::Container { path, source } => {
                assert_eq!(path, "Engine::boost");
                assert!(matches!(source, ResolveError::ValueNotProvided { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let boosted = foundry
            .call("boost", &Arguments::new().with("by", 3i64))
            .unwrap();
        assert_eq!(*boosted.downcast::<i64>().unwrap(), 8);
    }

    #[test]
    fn test_unknown_method_is_not_found() {
        let container = testing::container();
        let foundry = container.foundry(Value::new(Engine { cylinders: 5 }));

        let err = foundry.call("fly", &Arguments::new()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.path(), Some("Engine::fly"));
    }
}
