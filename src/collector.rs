//! Definition collector
//!
//! Turns an identifier into the matching [`Definition`] variant and memoizes
//! the result per kind. An identifier containing `::` names a method, a
//! registered function name names a function, and anything else is a type.
//! Anonymous [`Callable`]s always get a fresh, uncached definition.

use crate::definition::{ClassDefinition, Definition, FunctionDefinition, MethodDefinition};
use crate::descriptor::Callable;
use crate::error::DefinitionError;
use crate::reflector::Reflector;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Separator between a type name and a member name
pub const MEMBER_SEPARATOR: &str = "::";

/// What a container identifier is bound to
#[derive(Debug, Clone)]
pub enum Source {
    /// A type name, `Type::method`, or a registered function name
    Identifier(String),
    /// An anonymous callable
    Callable(Callable),
}

impl From<&str> for Source {
    fn from(identifier: &str) -> Self {
        Source::Identifier(identifier.to_owned())
    }
}

impl From<String> for Source {
    fn from(identifier: String) -> Self {
        Source::Identifier(identifier)
    }
}

impl From<Callable> for Source {
    fn from(callable: Callable) -> Self {
        Source::Callable(callable)
    }
}

type Memo<T = Definition> = DashMap<String, T, RandomState>;

fn memo<T>() -> Memo<T> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

/// Memoizing factory for [`Definition`]s, shareable between containers.
pub struct Collector {
    reflector: Arc<Reflector>,
    classes: Memo,
    methods: Memo<Arc<MethodDefinition>>,
    functions: Memo,
}

impl Collector {
    pub fn new(reflector: Arc<Reflector>) -> Self {
        Self {
            reflector,
            classes: memo(),
            methods: memo(),
            functions: memo(),
        }
    }

    #[inline]
    pub fn reflector(&self) -> &Arc<Reflector> {
        &self.reflector
    }

    /// Definition for any binding source
    pub fn make(&self, source: &Source) -> Result<Definition, DefinitionError> {
        match source {
            Source::Identifier(identifier) => self.get(identifier),
            Source::Callable(callable) => self.callable(callable),
        }
    }

    /// Definition for a string identifier
    pub fn get(&self, identifier: &str) -> Result<Definition, DefinitionError> {
        if let Some((type_name, method)) = identifier.split_once(MEMBER_SEPARATOR) {
            return self.method(type_name, method);
        }
        if self.reflector.has_function(identifier) {
            return self.function(identifier);
        }
        self.class(identifier)
    }

    /// Definition building a concrete type
    pub fn class(&self, type_name: &str) -> Result<Definition, DefinitionError> {
        if let Some(definition) = self.classes.get(type_name) {
            return Ok(definition.value().clone());
        }

        let descriptor = self.reflector.type_descriptor(type_name)?;
        if descriptor.is_abstract() {
            return Err(DefinitionError::Abstract(type_name.to_owned()));
        }

        let constructor = descriptor
            .constructor
            .clone()
            .zip(self.reflector.constructor(type_name)?);

        let definition = Definition::Class(Arc::new(ClassDefinition {
            type_name: descriptor.name().to_owned(),
            constructor,
            blank: descriptor.blank.clone(),
            properties: self.reflector.properties(type_name)?,
        }));

        Ok(self.remember(&self.classes, type_name, definition.declaring(), definition.clone()))
    }

    /// Definition invoking `type_name::method`
    #[inline]
    pub fn method(&self, type_name: &str, method: &str) -> Result<Definition, DefinitionError> {
        self.method_definition(type_name, method).map(Definition::Method)
    }

    pub(crate) fn method_definition(
        &self,
        type_name: &str,
        method: &str,
    ) -> Result<Arc<MethodDefinition>, DefinitionError> {
        let key = format!("{}{}{}", type_name, MEMBER_SEPARATOR, method);
        if let Some(definition) = self.methods.get(&key) {
            return Ok(Arc::clone(definition.value()));
        }

        let (descriptor, signature) = self.reflector.method(type_name, method)?;
        let definition = Arc::new(MethodDefinition {
            type_name: type_name.to_owned(),
            method: method.to_owned(),
            descriptor,
            signature,
        });

        Ok(self.remember(&self.methods, &key, definition.signature.declaring(), Arc::clone(&definition)))
    }

    /// Definition invoking a registered free function
    pub fn function(&self, name: &str) -> Result<Definition, DefinitionError> {
        if let Some(definition) = self.functions.get(name) {
            return Ok(definition.value().clone());
        }

        let (descriptor, signature) = self.reflector.function(name)?;
        let definition = Definition::Function(Arc::new(FunctionDefinition { descriptor, signature }));

        Ok(self.remember(&self.functions, name, definition.declaring(), definition.clone()))
    }

    /// Fresh definition for an anonymous callable (never memoized)
    pub fn callable(&self, callable: &Callable) -> Result<Definition, DefinitionError> {
        let signature = self.reflector.callable(callable)?;
        Ok(Definition::Function(Arc::new(FunctionDefinition {
            descriptor: Arc::clone(&callable.0),
            signature: Arc::new(signature),
        })))
    }

    /// Insert unless another thread won the race; return the stored value
    fn remember<T: Clone>(&self, memo: &Memo<T>, key: &str, _declaring: &str, value: T) -> T {
        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            key = %key,
            declaring = %_declaring,
            "Memoized definition"
        );

        memo.entry(key.to_owned()).or_insert(value).value().clone()
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("classes", &self.classes.len())
            .field("methods", &self.methods.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}
