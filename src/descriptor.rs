//! Host-provided type, member and function descriptions
//!
//! Rust has no runtime reflection, so the shapes the resolver works with are
//! declared up front: a [`TypeDescriptor`] lists a type's constructor,
//! injectable properties and methods, a [`FunctionDescriptor`] describes a
//! free function, and a [`Callable`] is an anonymous function that is never
//! cached. Descriptions are registered once with a
//! [`Reflector`](crate::Reflector), either by hand through [`TypeDescriptor::builder`]
//! or via `#[derive(Describe)]` with the `derive` feature.
//!
//! # Example
//!
//! ```rust
//! use dependency_resolver::{Parameter, TypeDescriptor, Value};
//!
//! struct Engine {
//!     cylinders: i64,
//! }
//!
//! let engine = TypeDescriptor::builder::<Engine>("Engine")
//!     .constructor(
//!         vec![Parameter::new("cylinders").default_value(Value::new(4i64))],
//!         |args| Ok(Engine { cylinders: args.cloned::<i64>(0)? }),
//!     )
//!     .method("cylinders", vec![], |engine: &Engine, _args| Ok(Value::new(engine.cylinders)))
//!     .build();
//!
//! assert_eq!(engine.name(), "Engine");
//! assert!(engine.has_method("cylinders"));
//! ```

use crate::value::{AnyArc, Args, InvokeError, InvokeResult, Injectable, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds an instance from its resolved constructor arguments
pub(crate) type BuildFn = Arc<dyn Fn(Args) -> InvokeResult<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Builds an instance without running its constructor
pub(crate) type BlankFn = Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Writes an injected value onto a freshly built instance
pub(crate) type SetterFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Value) -> InvokeResult<()> + Send + Sync>;

/// Invokes a method, with the receiver for instance methods
pub(crate) type MethodFn = Arc<dyn Fn(Option<&Value>, Args) -> InvokeResult<Value> + Send + Sync>;

/// Invokes a free function or closure
pub(crate) type FunctionFn = Arc<dyn Fn(Args) -> InvokeResult<Value> + Send + Sync>;

/// Declared type name standing for the declaring type itself
pub const SELF_TYPE: &str = "self";

/// Declared type name standing for the declaring type's parent
pub const PARENT_TYPE: &str = "parent";

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    #[inline]
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

/// A parameter as declared by the host.
///
/// Position and declaring scope are assigned when the signature is normalized.
#[derive(Debug, Clone, Default)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) types: Vec<String>,
    pub(crate) nullable: bool,
    pub(crate) variadic: bool,
    pub(crate) default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a declared type name (identifiers are tried in declaration order)
    pub fn of_type(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Declare a default value; `Value::Null` is a present-but-null default
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An injectable property as declared by the host
#[derive(Debug, Clone, Default)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) types: Vec<String>,
    pub(crate) nullable: bool,
    pub(crate) default: Option<Value>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn of_type(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone)]
pub(crate) struct ConstructorDescriptor {
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) visibility: Visibility,
    pub(crate) build: BuildFn,
}

#[derive(Clone)]
pub(crate) struct InjectableProperty {
    pub(crate) property: Property,
    pub(crate) setter: SetterFn,
}

/// A method of a described type
#[derive(Clone)]
pub struct MethodDescriptor {
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) is_static: bool,
    pub(crate) visibility: Visibility,
    pub(crate) invoke: MethodFn,
}

impl MethodDescriptor {
    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("parameters", &self.parameters)
            .field("is_static", &self.is_static)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// Structural description of one type
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) type_id: Option<TypeId>,
    pub(crate) parent: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) constructor: Option<ConstructorDescriptor>,
    pub(crate) blank: Option<BlankFn>,
    pub(crate) properties: Vec<InjectableProperty>,
    pub(crate) methods: HashMap<String, MethodDescriptor>,
}

impl TypeDescriptor {
    /// Start describing the concrete type `T` under `name`
    pub fn builder<T: Injectable>(name: impl Into<String>) -> TypeBuilder<T> {
        TypeBuilder {
            descriptor: TypeDescriptor {
                name: name.into(),
                type_id: Some(TypeId::of::<T>()),
                parent: None,
                is_abstract: false,
                constructor: None,
                blank: None,
                properties: Vec::new(),
                methods: HashMap::new(),
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Describe an abstract type (a trait or interface-like name).
    ///
    /// Abstract types can be introspected but never defined.
    pub fn abstract_type(name: impl Into<String>) -> Self {
        TypeDescriptor {
            name: name.into(),
            type_id: None,
            parent: None,
            is_abstract: true,
            constructor: None,
            blank: None,
            properties: Vec::new(),
            methods: HashMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    #[inline]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    #[inline]
    pub fn method(&self, method: &str) -> Option<&MethodDescriptor> {
        self.methods.get(method)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("is_abstract", &self.is_abstract)
            .field("has_constructor", &self.constructor.is_some())
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Typed builder for a [`TypeDescriptor`]
pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Injectable> TypeBuilder<T> {
    /// Declare the parent type, used to resolve `parent` in declared types
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.descriptor.parent = Some(parent.into());
        self
    }

    /// Declare a public constructor
    pub fn constructor<F>(self, parameters: Vec<Parameter>, build: F) -> Self
    where
        F: Fn(Args) -> InvokeResult<T> + Send + Sync + 'static,
    {
        self.constructor_with_visibility(Visibility::Public, parameters, build)
    }

    pub fn constructor_with_visibility<F>(
        mut self,
        visibility: Visibility,
        parameters: Vec<Parameter>,
        build: F,
    ) -> Self
    where
        F: Fn(Args) -> InvokeResult<T> + Send + Sync + 'static,
    {
        self.descriptor.constructor = Some(ConstructorDescriptor {
            parameters,
            visibility,
            build: Arc::new(move |args| Ok(Box::new(build(args)?) as Box<dyn Any + Send + Sync>)),
        });
        self
    }

    /// Instantiate without a constructor (and without any injection)
    pub fn blank<F>(mut self, blank: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.descriptor.blank = Some(Arc::new(move || Box::new(blank()) as Box<dyn Any + Send + Sync>));
        self
    }

    /// Mark a property for injection right after construction
    pub fn inject<F>(mut self, property: Property, setter: F) -> Self
    where
        F: Fn(&mut T, Value) -> InvokeResult<()> + Send + Sync + 'static,
    {
        let name = property.name.clone();
        self.descriptor.properties.push(InjectableProperty {
            property,
            setter: Arc::new(move |instance, value| {
                let instance = instance
                    .downcast_mut::<T>()
                    .ok_or_else(|| InvokeError::from(format!("instance is not the owner of property [{}]", name)))?;
                setter(instance, value)
            }),
        });
        self
    }

    /// Declare a public instance method
    pub fn method<F>(self, name: impl Into<String>, parameters: Vec<Parameter>, invoke: F) -> Self
    where
        F: Fn(&T, Args) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        self.method_with_visibility(name, Visibility::Public, parameters, invoke)
    }

    pub fn method_with_visibility<F>(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        parameters: Vec<Parameter>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&T, Args) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let receiver = format!("{}::{}", self.descriptor.name, name);
        let invoke: MethodFn = Arc::new(move |instance, args| {
            let instance = instance
                .and_then(Value::downcast::<T>)
                .ok_or_else(|| InvokeError::from(format!("no valid receiver for [{}]", receiver)))?;
            invoke(&instance, args)
        });
        self.descriptor.methods.insert(
            name,
            MethodDescriptor {
                parameters,
                is_static: false,
                visibility,
                invoke,
            },
        );
        self
    }

    /// Declare a public static method
    pub fn static_method<F>(mut self, name: impl Into<String>, parameters: Vec<Parameter>, invoke: F) -> Self
    where
        F: Fn(Args) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        self.descriptor.methods.insert(
            name.into(),
            MethodDescriptor {
                parameters,
                is_static: true,
                visibility: Visibility::Public,
                invoke: Arc::new(move |_, args| invoke(args)),
            },
        );
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

/// A named free function
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub(crate) name: String,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) invoke: FunctionFn,
}

impl FunctionDescriptor {
    pub fn new<F>(name: impl Into<String>, parameters: Vec<Parameter>, invoke: F) -> Self
    where
        F: Fn(Args) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters,
            invoke: Arc::new(invoke),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Label used for anonymous callables in diagnostics
pub const CLOSURE_NAME: &str = "{closure}";

/// An anonymous callable.
///
/// Every `Callable` is structurally distinct: definitions built from it are
/// never cached.
#[derive(Clone)]
pub struct Callable(pub(crate) Arc<FunctionDescriptor>);

impl Callable {
    pub fn new<F>(parameters: Vec<Parameter>, invoke: F) -> Self
    where
        F: Fn(Args) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        Callable(Arc::new(FunctionDescriptor::new(CLOSURE_NAME, parameters, invoke)))
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.0.parameters
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callable").field(&self.0.parameters.len()).finish()
    }
}

/// Types that can describe themselves; implemented by `#[derive(Describe)]`.
pub trait Describe: Injectable + Sized {
    fn describe() -> TypeDescriptor;
}

/// Wrap a freshly built boxed instance into a shared value
#[inline]
pub(crate) fn share(instance: Box<dyn Any + Send + Sync>) -> Value {
    Value::Shared(AnyArc::from(instance))
}
