//! Introspection cache
//!
//! The [`Reflector`] owns every registered description and memoizes the
//! normalized signatures derived from them: parameter positions, `self` and
//! `parent` resolved to concrete type names, and declaring labels for
//! diagnostics. Shapes cannot change once registered, so memoized entries are
//! never evicted.
//!
//! It is a plain service object rather than global state; share one between
//! containers with an `Arc`.

use crate::descriptor::{
    Callable, Describe, FunctionDescriptor, MethodDescriptor, PARENT_TYPE, Parameter, SELF_TYPE,
    TypeDescriptor,
};
use crate::error::ReflectionError;
use crate::parameter::ParameterDefinition;
use crate::property::PropertyDefinition;
use crate::value::Value;
use ahash::{HashSet, HashSetExt, RandomState};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::TypeId;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// The normalized parameter list of one constructor, method or function.
#[derive(Debug, Clone)]
pub struct Signature {
    declaring: String,
    parameters: Vec<ParameterDefinition>,
}

impl Signature {
    /// Label of the declaring scope, e.g. `Car::new` or `{closure}`
    #[inline]
    pub fn declaring(&self) -> &str {
        &self.declaring
    }

    #[inline]
    pub fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Whether the trailing parameter is variadic
    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.parameters.last().is_some_and(ParameterDefinition::is_variadic)
    }
}

type Map<K, V> = DashMap<K, V, RandomState>;

fn map<K: Eq + std::hash::Hash, V>() -> Map<K, V> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

/// Registry of descriptions plus the memoized signatures derived from them.
pub struct Reflector {
    types: Map<String, Arc<TypeDescriptor>>,
    type_names: Map<TypeId, String>,
    functions: Map<String, Arc<FunctionDescriptor>>,
    constructors: Map<String, Option<Arc<Signature>>>,
    methods: Map<(String, String), Arc<Signature>>,
    properties: Map<String, Arc<[PropertyDefinition]>>,
    function_signatures: Map<String, Arc<Signature>>,
}

impl Reflector {
    pub fn new() -> Self {
        Self {
            types: map(),
            type_names: map(),
            functions: map(),
            constructors: map(),
            methods: map(),
            properties: map(),
            function_signatures: map(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a type description. Names are unique.
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<(), ReflectionError> {
        match self.types.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(ReflectionError::AlreadyDescribed(descriptor.name)),
            Entry::Vacant(vacant) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "dependency_resolver",
                    type_name = %descriptor.name,
                    is_abstract = descriptor.is_abstract,
                    methods = descriptor.methods.len(),
                    properties = descriptor.properties.len(),
                    "Registering type description"
                );

                if let Some(type_id) = descriptor.type_id {
                    self.type_names.insert(type_id, descriptor.name.clone());
                }
                vacant.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    /// Register a self-describing type
    #[inline]
    pub fn describe<T: Describe>(&self) -> Result<(), ReflectionError> {
        self.register_type(T::describe())
    }

    /// Register a free function. Names are unique.
    pub fn register_function(&self, descriptor: FunctionDescriptor) -> Result<(), ReflectionError> {
        match self.functions.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(ReflectionError::AlreadyDescribed(descriptor.name)),
            Entry::Vacant(vacant) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "dependency_resolver",
                    function = %descriptor.name,
                    parameters = descriptor.parameters.len(),
                    "Registering function description"
                );

                vacant.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[inline]
    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    #[inline]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn type_descriptor(&self, name: &str) -> Result<Arc<TypeDescriptor>, ReflectionError> {
        self.types
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ReflectionError::TypeNotFound(name.to_owned()))
    }

    pub fn function_descriptor(&self, name: &str) -> Result<Arc<FunctionDescriptor>, ReflectionError> {
        self.functions
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ReflectionError::FunctionNotFound(name.to_owned()))
    }

    /// Registered type name of a shared instance's concrete type
    pub fn type_name_of(&self, value: &Value) -> Result<String, ReflectionError> {
        value
            .instance_type_id()
            .and_then(|type_id| self.type_names.get(&type_id).map(|entry| entry.value().clone()))
            .ok_or(ReflectionError::UnknownInstance)
    }

    // =========================================================================
    // Memoized signatures
    // =========================================================================

    /// Constructor signature of a type; `None` when it has no constructor
    pub fn constructor(&self, type_name: &str) -> Result<Option<Arc<Signature>>, ReflectionError> {
        if let Some(signature) = self.constructors.get(type_name) {
            return Ok(signature.value().clone());
        }

        let descriptor = self.type_descriptor(type_name)?;
        let signature = match &descriptor.constructor {
            Some(constructor) => Some(Arc::new(normalize(
                format!("{}::new", descriptor.name),
                Some(&descriptor),
                &constructor.parameters,
            )?)),
            None => None,
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            type_name = %type_name,
            has_constructor = signature.is_some(),
            "Memoized constructor signature"
        );

        self.constructors.insert(type_name.to_owned(), signature.clone());
        Ok(signature)
    }

    /// Method description and normalized signature
    pub fn method(
        &self,
        type_name: &str,
        method: &str,
    ) -> Result<(MethodDescriptor, Arc<Signature>), ReflectionError> {
        let descriptor = self.type_descriptor(type_name)?;
        let member = descriptor
            .method(method)
            .cloned()
            .ok_or_else(|| ReflectionError::MethodNotFound {
                type_name: type_name.to_owned(),
                method: method.to_owned(),
            })?;

        let key = (type_name.to_owned(), method.to_owned());
        if let Some(signature) = self.methods.get(&key) {
            return Ok((member, Arc::clone(signature.value())));
        }

        let signature = Arc::new(normalize(
            format!("{}::{}", descriptor.name, method),
            Some(&descriptor),
            &member.parameters,
        )?);

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            declaring = %signature.declaring,
            parameters = signature.len(),
            "Memoized method signature"
        );

        self.methods.insert(key, Arc::clone(&signature));
        Ok((member, signature))
    }

    /// Injectable properties of a type, in declaration order
    pub fn properties(&self, type_name: &str) -> Result<Arc<[PropertyDefinition]>, ReflectionError> {
        if let Some(properties) = self.properties.get(type_name) {
            return Ok(Arc::clone(properties.value()));
        }

        let descriptor = self.type_descriptor(type_name)?;
        let properties: Arc<[PropertyDefinition]> = descriptor
            .properties
            .iter()
            .map(|injectable| {
                let property = &injectable.property;
                PropertyDefinition {
                    name: property.name.clone(),
                    types: property
                        .types
                        .iter()
                        .map(|declared| relative_type(declared, Some(&descriptor)))
                        .collect(),
                    nullable: property.nullable,
                    default: property.default.clone(),
                    declaring: format!("{}::${}", descriptor.name, property.name),
                    setter: Arc::clone(&injectable.setter),
                }
            })
            .collect();

        self.properties.insert(type_name.to_owned(), Arc::clone(&properties));
        Ok(properties)
    }

    /// Signature of a registered free function
    pub fn function(&self, name: &str) -> Result<(Arc<FunctionDescriptor>, Arc<Signature>), ReflectionError> {
        let descriptor = self.function_descriptor(name)?;
        if let Some(signature) = self.function_signatures.get(name) {
            return Ok((descriptor, Arc::clone(signature.value())));
        }

        let signature = Arc::new(normalize(descriptor.name.clone(), None, &descriptor.parameters)?);
        self.function_signatures.insert(name.to_owned(), Arc::clone(&signature));
        Ok((descriptor, signature))
    }

    /// Signature of an anonymous callable (never memoized)
    pub fn callable(&self, callable: &Callable) -> Result<Signature, ReflectionError> {
        normalize(callable.0.name.clone(), None, &callable.0.parameters)
    }

    /// Number of registered type descriptions
    #[inline]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

impl Default for Reflector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reflector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reflector")
            .field("types", &self.types.len())
            .field("functions", &self.functions.len())
            .field("memoized_methods", &self.methods.len())
            .finish()
    }
}

/// Resolve `self` / `parent` against the declaring type
fn relative_type(declared: &str, owner: Option<&TypeDescriptor>) -> String {
    match owner {
        Some(owner) if declared == SELF_TYPE => owner.name.clone(),
        Some(owner) if declared == PARENT_TYPE => owner.parent.clone().unwrap_or_else(|| declared.to_owned()),
        _ => declared.to_owned(),
    }
}

fn normalize(
    declaring: String,
    owner: Option<&TypeDescriptor>,
    parameters: &[Parameter],
) -> Result<Signature, ReflectionError> {
    let malformed = |reason: String| ReflectionError::Malformed {
        declaring: declaring.clone(),
        reason,
    };

    let mut seen = HashSet::with_capacity(parameters.len());
    let last = parameters.len().saturating_sub(1);
    let mut normalized = Vec::with_capacity(parameters.len());

    for (position, parameter) in parameters.iter().enumerate() {
        if parameter.name.is_empty() {
            return Err(malformed(format!("parameter #{} has no name", position)));
        }
        if !seen.insert(parameter.name.as_str()) {
            return Err(malformed(format!("duplicate parameter [{}]", parameter.name)));
        }
        if parameter.variadic && position != last {
            return Err(malformed(format!("variadic parameter [{}] must be last", parameter.name)));
        }

        normalized.push(ParameterDefinition {
            name: parameter.name.clone(),
            position,
            types: parameter
                .types
                .iter()
                .map(|declared| relative_type(declared, owner))
                .collect(),
            nullable: parameter.nullable,
            variadic: parameter.variadic,
            // variadic parameters never carry a default
            default: if parameter.variadic { None } else { parameter.default.clone() },
            declaring: declaring.clone(),
        });
    }

    Ok(Signature {
        declaring,
        parameters: normalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Property;
    use crate::value::Value;

    struct Node;

    fn reflector() -> Reflector {
        let reflector = Reflector::new();
        reflector
            .register_type(
                TypeDescriptor::builder::<Node>("Node")
                    .extends("Tree")
                    .constructor(
                        vec![
                            Parameter::new("next").of_type("self").nullable(),
                            Parameter::new("root").of_type("parent").nullable(),
                            Parameter::new("labels").variadic().default_value(Value::new(1i32)),
                        ],
                        |_| Ok(Node),
                    )
                    .inject(Property::new("sibling").of_type("self"), |_, _| Ok(()))
                    .method("walk", vec![Parameter::new("depth")], |_, _| Ok(Value::Null))
                    .build(),
            )
            .unwrap();
        reflector
    }

    #[test]
    fn test_constructor_signature_is_normalized() {
        let reflector = reflector();
        let signature = reflector.constructor("Node").unwrap().unwrap();

        assert_eq!(signature.declaring(), "Node::new");
        assert_eq!(signature.len(), 3);
        assert_eq!(signature.parameters()[0].types(), ["Node".to_string()]);
        assert_eq!(signature.parameters()[1].types(), ["Tree".to_string()]);
        assert_eq!(signature.parameters()[2].position(), 2);
        assert!(signature.parameters()[2].default_value().is_none());
        assert!(signature.is_variadic());
    }

    #[test]
    fn test_signatures_are_memoized() {
        let reflector = reflector();
        let first = reflector.constructor("Node").unwrap().unwrap();
        let second = reflector.constructor("Node").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let (_, walk) = reflector.method("Node", "walk").unwrap();
        let (_, again) = reflector.method("Node", "walk").unwrap();
        assert!(Arc::ptr_eq(&walk, &again));
        assert_eq!(walk.declaring(), "Node::walk");
    }

    #[test]
    fn test_properties_resolve_self() {
        let reflector = reflector();
        let properties = reflector.properties("Node").unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].types(), ["Node".to_string()]);
        assert_eq!(properties[0].declaring(), "Node::$sibling");
    }

    #[test]
    fn test_missing_shapes() {
        let reflector = reflector();
        assert_eq!(
            reflector.constructor("Ghost").unwrap_err(),
            ReflectionError::TypeNotFound("Ghost".into())
        );
        assert!(matches!(
            reflector.method("Node", "fly").unwrap_err(),
            ReflectionError::MethodNotFound { .. }
        ));
        assert_eq!(
            reflector.function("nope").unwrap_err(),
            ReflectionError::FunctionNotFound("nope".into())
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let reflector = reflector();
        let err = reflector
            .register_type(TypeDescriptor::abstract_type("Node"))
            .unwrap_err();
        assert_eq!(err, ReflectionError::AlreadyDescribed("Node".into()));
    }

    #[test]
    fn test_malformed_signatures() {
        let reflector = Reflector::new();
        reflector
            .register_function(FunctionDescriptor::new(
                "bad_variadic",
                vec![Parameter::new("items").variadic(), Parameter::new("tail")],
                |_| Ok(Value::Null),
            ))
            .unwrap();
        reflector
            .register_function(FunctionDescriptor::new(
                "duplicated",
                vec![Parameter::new("a"), Parameter::new("a")],
                |_| Ok(Value::Null),
            ))
            .unwrap();

        assert!(matches!(
            reflector.function("bad_variadic").unwrap_err(),
            ReflectionError::Malformed { ref reason, .. } if reason.contains("must be last")
        ));
        assert!(matches!(
            reflector.function("duplicated").unwrap_err(),
            ReflectionError::Malformed { ref reason, .. } if reason.contains("duplicate")
        ));
    }

    #[test]
    fn test_type_name_of_instance() {
        let reflector = reflector();
        assert_eq!(reflector.type_name_of(&Value::new(Node)).unwrap(), "Node");
        assert_eq!(
            reflector.type_name_of(&Value::new(5u8)).unwrap_err(),
            ReflectionError::UnknownInstance
        );
    }
}
