//! Callable definitions
//!
//! A [`Definition`] is the cached, introspected description of how to build
//! or invoke one identifier's target. The three variants share one dependency
//! resolution routine and differ only in the final invocation step.

use crate::container::Container;
use crate::descriptor::{BlankFn, ConstructorDescriptor, FunctionDescriptor, MethodDescriptor, share};
use crate::error::{DiError, ResolveError, Result};
use crate::property::PropertyDefinition;
use crate::reflector::Signature;
use crate::value::{Args, Arguments, InvokeError, Value};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Builds an instance of a concrete type
pub struct ClassDefinition {
    pub(crate) type_name: String,
    pub(crate) constructor: Option<(ConstructorDescriptor, Arc<Signature>)>,
    pub(crate) blank: Option<BlankFn>,
    pub(crate) properties: Arc<[PropertyDefinition]>,
}

/// Invokes one named member of a type
pub struct MethodDefinition {
    pub(crate) type_name: String,
    pub(crate) method: String,
    pub(crate) descriptor: MethodDescriptor,
    pub(crate) signature: Arc<Signature>,
}

/// Invokes a free function or an anonymous callable
pub struct FunctionDefinition {
    pub(crate) descriptor: Arc<FunctionDescriptor>,
    pub(crate) signature: Arc<Signature>,
}

/// A resolvable definition.
///
/// Cloning is cheap; definitions are read-only once built and can be shared
/// by any number of containers.
#[derive(Clone)]
pub enum Definition {
    Class(Arc<ClassDefinition>),
    Method(Arc<MethodDefinition>),
    Function(Arc<FunctionDefinition>),
}

impl Definition {
    /// Resolve the dependencies and invoke the target
    #[inline]
    pub fn resolve(&self, container: &Container, arguments: &Arguments) -> Result<Value> {
        match self {
            Definition::Class(class) => class.resolve(container, arguments),
            Definition::Method(method) => method.resolve_with_instance(container, None, arguments),
            Definition::Function(function) => function.resolve(container, arguments),
        }
    }

    /// Diagnostic name of the target
    pub fn declaring(&self) -> &str {
        match self {
            Definition::Class(class) => &class.type_name,
            Definition::Method(method) => method.signature.declaring(),
            Definition::Function(function) => function.signature.declaring(),
        }
    }

    /// Normalized signature; `None` for a class without a constructor
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Definition::Class(class) => class.constructor.as_ref().map(|(_, signature)| signature.as_ref()),
            Definition::Method(method) => Some(&method.signature),
            Definition::Function(function) => Some(&function.signature),
        }
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self, Definition::Class(_))
    }

    #[inline]
    pub fn is_method(&self) -> bool {
        matches!(self, Definition::Method(_))
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self, Definition::Function(_))
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Definition::Class(_) => "Class",
            Definition::Method(_) => "Method",
            Definition::Function(_) => "Function",
        };
        f.debug_tuple(kind).field(&self.declaring()).finish()
    }
}

/// Resolve every parameter in order, splicing a trailing variadic list into the tail
pub(crate) fn resolve_dependencies(
    signature: &Signature,
    container: &Container,
    arguments: &Arguments,
) -> Result<Vec<Value>> {
    let mut dependencies = Vec::with_capacity(signature.len());

    for parameter in signature.parameters() {
        let value = parameter.resolve(container, arguments)?;
        match value {
            Value::List(items) if parameter.is_variadic() => dependencies.extend(items),
            value => dependencies.push(value),
        }
    }

    Ok(dependencies)
}

fn invocation_failed(declaring: &str, err: InvokeError) -> ResolveError {
    ResolveError::InvocationFailed {
        declaring: declaring.to_owned(),
        reason: err.to_string(),
    }
}

impl ClassDefinition {
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn resolve(&self, container: &Container, arguments: &Arguments) -> Result<Value> {
        let Some((constructor, signature)) = &self.constructor else {
            // no constructor: blank instance, no injection
            let blank = self.blank.as_ref().ok_or_else(|| ResolveError::InternalImmutableType {
                declaring: self.type_name.clone(),
            })?;
            return Ok(share(blank()));
        };

        let dependencies = resolve_dependencies(signature, container, arguments)?;

        if !constructor.visibility.is_public() {
            return Err(ResolveError::ConstructorNotPublic {
                declaring: self.type_name.clone(),
            }
            .into());
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            declaring = %signature.declaring(),
            dependencies = dependencies.len(),
            properties = self.properties.len(),
            "Constructing instance"
        );

        let mut instance = (constructor.build)(Args::new(dependencies))
            .map_err(|err| invocation_failed(signature.declaring(), err))?;

        for property in self.properties.iter() {
            property.inject(container, arguments, &mut *instance)?;
        }

        Ok(share(instance))
    }
}

impl MethodDefinition {
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.descriptor.is_static
    }

    /// Invoke with an explicitly bound receiver.
    ///
    /// Static methods ignore `instance`; instance methods without one fetch
    /// the shared instance of the declaring type from the container.
    pub fn resolve_with_instance(
        &self,
        container: &Container,
        instance: Option<&Value>,
        arguments: &Arguments,
    ) -> Result<Value> {
        let dependencies = resolve_dependencies(&self.signature, container, arguments)?;

        let receiver = match (self.descriptor.is_static, instance) {
            (true, _) => None,
            (false, Some(instance)) => Some(instance.clone()),
            (false, None) => Some(container.get(&self.type_name)?),
        };

        if !self.descriptor.visibility.is_public() {
            return Err(ResolveError::MethodNotPublic {
                declaring: self.signature.declaring().to_owned(),
            }
            .into());
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            declaring = %self.signature.declaring(),
            is_static = self.descriptor.is_static,
            dependencies = dependencies.len(),
            "Invoking method"
        );

        (self.descriptor.invoke)(receiver.as_ref(), Args::new(dependencies))
            .map_err(|err| DiError::from(invocation_failed(self.signature.declaring(), err)))
    }
}

impl FunctionDefinition {
    #[inline]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn resolve(&self, container: &Container, arguments: &Arguments) -> Result<Value> {
        let dependencies = resolve_dependencies(&self.signature, container, arguments)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            declaring = %self.signature.declaring(),
            dependencies = dependencies.len(),
            "Invoking function"
        );

        (self.descriptor.invoke)(Args::new(dependencies))
            .map_err(|err| DiError::from(invocation_failed(self.signature.declaring(), err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Callable, Parameter, TypeDescriptor, Visibility};
    use crate::{Container, Reflector};

    struct Sealed;

    fn container() -> Container {
        let reflector = Reflector::new();
        reflector
            .register_type(
                TypeDescriptor::builder::<Sealed>("Sealed")
                    .constructor_with_visibility(Visibility::Private, vec![], |_| Ok(Sealed))
                    .build(),
            )
            .unwrap();
        reflector
            .register_type(TypeDescriptor::builder::<u32>("Opaque").build())
            .unwrap();
        Container::new(Arc::new(reflector))
    }

    fn sum() -> Callable {
        Callable::new(
            vec![Parameter::new("first"), Parameter::new("rest").variadic()],
            |args| {
                let mut total = args.cloned::<i64>(0)?;
                for value in args.rest(1) {
                    total += value.expect_cloned::<i64>("rest")?;
                }
                Ok(Value::new(total))
            },
        )
    }

    #[test]
    fn test_variadic_tail_is_flattened() {
        let container = container();
        let definition = container.collector().callable(&sum()).unwrap();

        let arguments = Arguments::from(vec![Value::new(1i64), Value::new(2i64), Value::new(3i64)]);
        let total = definition.resolve(&container, &arguments).unwrap();
        assert_eq!(*total.downcast::<i64>().unwrap(), 6);

        let only_first = Arguments::new().with("first", 10i64);
        let total = definition.resolve(&container, &only_first).unwrap();
        assert_eq!(*total.downcast::<i64>().unwrap(), 10);
    }

    #[test]
    fn test_private_constructor_is_rejected() {
        let container = container();
        let definition = container.collector().get("Sealed").unwrap();
        let err = definition.resolve(&container, &Arguments::new()).unwrap_err();
        assert!(matches!(err, DiError::Resolve(ResolveError::ConstructorNotPublic { .. })));
    }

    #[test]
    fn test_missing_constructor_and_blank() {
        let container = container();
        let definition = container.collector().get("Opaque").unwrap();
        assert!(definition.signature().is_none());

        let err = definition.resolve(&container, &Arguments::new()).unwrap_err();
        assert!(matches!(err, DiError::Resolve(ResolveError::InternalImmutableType { .. })));
    }

    #[test]
    fn test_invocation_error_names_declaring() {
        let container = container();
        let failing = Callable::new(vec![], |_| Err("boom".into()));
        let definition = container.collector().callable(&failing).unwrap();

        match definition.resolve(&container, &Arguments::new()).unwrap_err() {
            DiError::Resolve(ResolveError::InvocationFailed { declaring, reason }) => {
                assert_eq!(declaring, "{closure}");
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
