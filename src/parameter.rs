//! Parameter resolution
//!
//! A [`ParameterDefinition`] is the normalized form of one declared
//! [`Parameter`](crate::Parameter): it knows its position and the scope that
//! declares it, and decides its own value from an [`Arguments`] bag, falling
//! back to the container.

use crate::container::Container;
use crate::error::{ResolveError, Result};
use crate::value::{Arguments, Value};

#[cfg(feature = "logging")]
use tracing::trace;

/// A normalized parameter of a constructor, method or function.
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub(crate) name: String,
    pub(crate) position: usize,
    pub(crate) types: Vec<String>,
    pub(crate) nullable: bool,
    pub(crate) variadic: bool,
    pub(crate) default: Option<Value>,
    pub(crate) declaring: String,
}

impl ParameterDefinition {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Declared type names, with `self` / `parent` already resolved
    #[inline]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// First declared type name
    #[inline]
    pub fn type_name(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    #[inline]
    pub fn allows_null(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Declared default; `Some(Value::Null)` is a present-but-null default
    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Scope label used in diagnostics, e.g. `Car::new`
    #[inline]
    pub fn declaring(&self) -> &str {
        &self.declaring
    }

    /// Resolve this parameter's value.
    ///
    /// First match wins: by name, by position (collecting the contiguous
    /// positional run for a variadic parameter), empty list for an unfilled
    /// variadic, non-null default, null when nullable, then the declared
    /// types through the container. Anything else has no value.
    pub fn resolve(&self, container: &Container, arguments: &Arguments) -> Result<Value> {
        if let Some(value) = arguments.get_named(&self.name) {
            return Ok(value.clone());
        }

        if let Some(value) = arguments.get_position(self.position) {
            if !self.variadic {
                return Ok(value.clone());
            }

            let mut values = vec![value.clone()];
            let mut position = self.position + 1;
            while let Some(value) = arguments.get_position(position) {
                values.push(value.clone());
                position += 1;
            }
            return Ok(Value::List(values));
        }

        if self.variadic {
            return Ok(Value::List(Vec::new()));
        }

        if let Some(default) = self.default.as_ref().filter(|default| !default.is_null()) {
            return Ok(default.clone());
        }

        if self.nullable {
            return Ok(Value::Null);
        }

        if self.types.is_empty() {
            return Err(ResolveError::ValueNotProvided {
                parameter: self.name.clone(),
                declaring: self.declaring.clone(),
            }
            .into());
        }

        self.resolve_typed(container, arguments)
    }

    /// Resolve through the declared types, honoring a `$name` companion bag
    fn resolve_typed(&self, container: &Container, arguments: &Arguments) -> Result<Value> {
        let companion = arguments.get_companion(&self.name).and_then(Value::as_arguments);

        let Some(nested) = companion else {
            return container.get(&self.types[0]);
        };

        for type_name in &self.types {
            if let Some(own) = nested.get_named(type_name).and_then(Value::as_arguments) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "dependency_resolver",
                    parameter = %self.name,
                    declaring = %self.declaring,
                    dependency = %type_name,
                    "Resolving parameter with its type-keyed argument bag"
                );
                return container.make_with(type_name, own);
            }
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            parameter = %self.name,
            declaring = %self.declaring,
            dependency = %self.types[0],
            "Resolving parameter with its companion argument bag"
        );

        container.make_with(&self.types[0], nested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Engine};
    use crate::DiError;

    fn parameter(name: &str, position: usize) -> ParameterDefinition {
        ParameterDefinition {
            name: name.into(),
            position,
            types: Vec::new(),
            nullable: false,
            variadic: false,
            default: None,
            declaring: "Test::new".into(),
        }
    }

    fn int(value: &Value) -> i64 {
        *value.downcast::<i64>().unwrap()
    }

    #[test]
    fn test_name_beats_position() {
        let container = testing::container();
        let definition = parameter("size", 0);

        for (by_name, by_position) in [(1i64, 2i64), (7, 7), (-3, 40)] {
            let arguments = Arguments::new()
                .with("size", by_name)
                .with_position(0, by_position);
            let value = definition.resolve(&container, &arguments).unwrap();
            assert_eq!(int(&value), by_name);
        }
    }

    #[test]
    fn test_position_used_verbatim() {
        let container = testing::container();
        let definition = parameter("size", 1);
        let arguments = Arguments::new().with_position(1, Value::Null);

        assert!(definition.resolve(&container, &arguments).unwrap().is_null());
    }

    #[test]
    fn test_variadic_collects_contiguous_run() {
        let container = testing::container();
        let mut definition = parameter("rest", 1);
        definition.variadic = true;

        let arguments = Arguments::new()
            .with_position(0, 0i64)
            .with_position(1, 1i64)
            .with_position(2, 2i64)
            .with_position(4, 4i64);

        let value = definition.resolve(&container, &arguments).unwrap();
        let items: Vec<i64> = value.as_list().unwrap().iter().map(int).collect();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_variadic_without_values_is_empty() {
        let container = testing::container();
        let mut definition = parameter("rest", 0);
        definition.variadic = true;
        definition.types = vec!["Engine".into()];

        let value = definition.resolve(&container, &Arguments::new()).unwrap();
        assert!(value.as_list().unwrap().is_empty());
    }

    #[test]
    fn test_default_then_nullable() {
        let container = testing::container();

        let mut with_default = parameter("cylinders", 0);
        with_default.default = Some(Value::new(4i64));
        with_default.nullable = true;
        assert_eq!(int(&with_default.resolve(&container, &Arguments::new()).unwrap()), 4);

        // a present-but-null default falls through to nullability
        let mut null_default = parameter("cylinders", 0);
        null_default.default = Some(Value::Null);
        null_default.nullable = true;
        assert!(null_default.resolve(&container, &Arguments::new()).unwrap().is_null());
    }

    #[test]
    fn test_nullable_beats_type() {
        let container = testing::container();
        let mut definition = parameter("engine", 0);
        definition.types = vec!["Engine".into()];
        definition.nullable = true;

        assert!(definition.resolve(&container, &Arguments::new()).unwrap().is_null());
    }

    #[test]
    fn test_type_resolves_shared_instance() {
        let container = testing::container();
        let mut definition = parameter("engine", 0);
        definition.types = vec!["Engine".into()];

        let first = definition.resolve(&container, &Arguments::new()).unwrap();
        let second = definition.resolve(&container, &Arguments::new()).unwrap();
        assert!(Value::ptr_eq(&first, &second));
        assert_eq!(first.downcast::<Engine>().unwrap().cylinders, 4);
    }

    #[test]
    fn test_companion_bag_makes_fresh_instance() {
        let container = testing::container();
        let mut definition = parameter("engine", 0);
        definition.types = vec!["Engine".into()];

        let arguments = Arguments::new().nest("engine", Arguments::new().with("cylinders", 12i64));
        let value = definition.resolve(&container, &arguments).unwrap();
        assert_eq!(value.downcast::<Engine>().unwrap().cylinders, 12);

        let shared = container.get("Engine").unwrap();
        assert!(!Value::ptr_eq(&value, &shared));
    }

    #[test]
    fn test_companion_bag_keyed_by_type() {
        let container = testing::container();
        let mut definition = parameter("power", 0);
        definition.types = vec!["Battery".into(), "Engine".into()];

        let arguments = Arguments::new().nest(
            "power",
            Arguments::new().with("Engine", Arguments::new().with("cylinders", 10i64)),
        );
        let value = definition.resolve(&container, &arguments).unwrap();
        assert_eq!(value.downcast::<Engine>().unwrap().cylinders, 10);
    }

    #[test]
    fn test_missing_value_fails() {
        let container = testing::container();
        let err = parameter("size", 0).resolve(&container, &Arguments::new()).unwrap_err();

        match err {
            DiError::Resolve(ResolveError::ValueNotProvided { parameter, declaring }) => {
                assert_eq!(parameter, "size");
                assert_eq!(declaring, "Test::new");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
