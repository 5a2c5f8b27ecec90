//! Property injection
//!
//! Properties marked injectable are resolved right after construction. They
//! have no position and are never variadic; callers address them with a
//! `$`-prefixed name in the argument bag.

use crate::container::Container;
use crate::descriptor::SetterFn;
use crate::error::{DiError, ResolveError, Result};
use crate::value::{Arguments, Value};
use std::any::Any;
use std::fmt;

/// A normalized injectable property.
#[derive(Clone)]
pub struct PropertyDefinition {
    pub(crate) name: String,
    pub(crate) types: Vec<String>,
    pub(crate) nullable: bool,
    pub(crate) default: Option<Value>,
    pub(crate) declaring: String,
    pub(crate) setter: SetterFn,
}

impl PropertyDefinition {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key addressing this property in an argument bag
    #[inline]
    pub fn key(&self) -> String {
        format!("${}", self.name)
    }

    #[inline]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Diagnostic label, e.g. `Car::$radio`
    #[inline]
    pub fn declaring(&self) -> &str {
        &self.declaring
    }

    /// Resolve this property's value: `$name` entry, non-null default,
    /// null when nullable, then the first declared type through the container.
    pub fn resolve(&self, container: &Container, arguments: &Arguments) -> Result<Value> {
        if let Some(value) = arguments.get_companion(&self.name) {
            return Ok(value.clone());
        }

        if let Some(default) = self.default.as_ref().filter(|default| !default.is_null()) {
            return Ok(default.clone());
        }

        if self.nullable {
            return Ok(Value::Null);
        }

        match self.types.first() {
            Some(type_name) => container.get(type_name),
            None => Err(ResolveError::PropertyNotProvided {
                declaring: self.declaring.clone(),
            }
            .into()),
        }
    }

    /// Resolve and write the value onto a freshly built instance
    pub(crate) fn inject(
        &self,
        container: &Container,
        arguments: &Arguments,
        instance: &mut (dyn Any + Send + Sync),
    ) -> Result<()> {
        let value = self.resolve(container, arguments)?;
        (self.setter)(instance, value).map_err(|err| {
            DiError::from(ResolveError::PropertyRejected {
                declaring: self.declaring.clone(),
                reason: err.to_string(),
            })
        })
    }
}

impl fmt::Debug for PropertyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDefinition")
            .field("name", &self.name)
            .field("types", &self.types)
            .field("nullable", &self.nullable)
            .field("declaring", &self.declaring)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Engine};
    use crate::value::InvokeResult;
    use std::sync::Arc;

    fn accept(_: &mut (dyn Any + Send + Sync), _: Value) -> InvokeResult<()> {
        Ok(())
    }

    fn reject(_: &mut (dyn Any + Send + Sync), _: Value) -> InvokeResult<()> {
        Err("wrong type".into())
    }

    fn property(types: &[&str]) -> PropertyDefinition {
        PropertyDefinition {
            name: "engine".into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            nullable: false,
            default: None,
            declaring: "Garage::$engine".into(),
            setter: Arc::new(accept),
        }
    }

    #[test]
    fn test_dollar_key_wins() {
        let container = testing::container();
        let arguments = Arguments::new()
            .with("$engine", Value::new(Engine { cylinders: 2 }))
            .with("engine", Value::Null);

        let value = property(&["Engine"]).resolve(&container, &arguments).unwrap();
        assert_eq!(value.downcast::<Engine>().unwrap().cylinders, 2);
    }

    #[test]
    fn test_default_nullable_and_type() {
        let container = testing::container();

        let mut with_default = property(&["Engine"]);
        with_default.default = Some(Value::new(Engine { cylinders: 1 }));
        let value = with_default.resolve(&container, &Arguments::new()).unwrap();
        assert_eq!(value.downcast::<Engine>().unwrap().cylinders, 1);

        let mut nullable = property(&["Engine"]);
        nullable.nullable = true;
        assert!(nullable.resolve(&container, &Arguments::new()).unwrap().is_null());

        let typed = property(&["Engine"]).resolve(&container, &Arguments::new()).unwrap();
        assert!(Value::ptr_eq(&typed, &container.get("Engine").unwrap()));
    }

    #[test]
    fn test_untyped_without_value_fails() {
        let container = testing::container();
        let err = property(&[]).resolve(&container, &Arguments::new()).unwrap_err();
        assert!(matches!(
            err,
            DiError::Resolve(ResolveError::PropertyNotProvided { ref declaring }) if declaring == "Garage::$engine"
        ));
    }

    #[test]
    fn test_rejected_value_is_reported() {
        let container = testing::container();
        let mut definition = property(&[]);
        definition.setter = Arc::new(reject);

        let mut instance: Box<dyn Any + Send + Sync> = Box::new(0u8);
        let arguments = Arguments::new().with("$engine", 1u8);
        let err = definition.inject(&container, &arguments, &mut *instance).unwrap_err();
        assert!(err.to_string().contains("wrong type"));
    }
}
