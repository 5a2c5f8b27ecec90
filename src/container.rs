//! The resolving container
//!
//! The `Container` owns shared instances and bound definitions, and drives
//! every `get`/`make` request. While a request is in flight its identifier
//! sits on a per-thread resolution path, so a failure deep in the object
//! graph reports the whole chain that led to it (`A > B > C`).

use crate::collector::{Collector, MEMBER_SEPARATOR, Source};
use crate::definition::Definition;
use crate::descriptor::{CLOSURE_NAME, Callable};
use crate::error::{DefinitionError, DiError, ResolveError, Result};
use crate::foundry::Foundry;
use crate::reflector::Reflector;
use crate::storage::RegistryStorage;
use crate::value::{Arguments, Injectable, IntoValue, Value};
use ahash::HashMap;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Default separator used to render the resolution path in errors
pub const DEFAULT_SEPARATOR: &str = " > ";

/// Default limit on the resolution path length
pub const DEFAULT_MAX_DEPTH: usize = 128;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Identifiers currently being made, per container
    static RESOLVING: RefCell<HashMap<u64, Vec<String>>> = RefCell::new(HashMap::default());
}

/// Pops its identifier off the resolution path when dropped.
///
/// Errors render the path when they are created, so the failing identifier is
/// still on it at that moment.
pub(crate) struct PathGuard {
    container: u64,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown
        let _ = RESOLVING.try_with(|paths| {
            let mut paths = paths.borrow_mut();
            if let Some(path) = paths.get_mut(&self.container) {
                path.pop();
                if path.is_empty() {
                    paths.remove(&self.container);
                }
            }
        });
    }
}

/// The public contract of a container, for code that only needs to resolve.
pub trait Resolver: Send + Sync {
    /// Shared instance for `id`, built on first request
    fn get(&self, id: &str) -> Result<Value>;

    /// Fresh result for `id` using `arguments`
    fn make_with(&self, id: &str, arguments: &Arguments) -> Result<Value>;

    /// Whether `id` has a shared instance or a usable definition
    fn has(&self, id: &str) -> bool;

    /// Render the active resolution path
    fn resolving(&self, separator: &str) -> String;
}

/// A weak handle to a container.
///
/// This is what the container shares under its own identifiers, so that it
/// does not keep itself alive. Constructors receive it as an argument and
/// upgrade it through [`Args::container`](crate::Args::container).
#[derive(Clone)]
pub struct ContainerRef(Weak<Inner>);

impl ContainerRef {
    #[inline]
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerRef").field(&self.0.strong_count()).finish()
    }
}

struct Inner {
    id: u64,
    storage: RegistryStorage,
    collector: Arc<Collector>,
    separator: String,
    max_depth: usize,
}

/// Dependency-resolving container.
///
/// Cloning is cheap and yields a handle to the same registry.
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Arguments, Container, Parameter, Reflector, TypeDescriptor, Value};
/// use std::sync::Arc;
///
/// struct Engine {
///     cylinders: i64,
/// }
///
/// let reflector = Reflector::new();
/// reflector
///     .register_type(
///         TypeDescriptor::builder::<Engine>("Engine")
///             .constructor(
///                 vec![Parameter::new("cylinders").default_value(Value::new(4i64))],
///                 |args| Ok(Engine { cylinders: args.cloned(0)? }),
///             )
///             .build(),
///     )
///     .unwrap();
///
/// let container = Container::new(Arc::new(reflector));
/// let engine = container.make_as::<Engine>("Engine").unwrap();
/// assert_eq!(engine.cylinders, 4);
///
/// let bigger = container
///     .make_with("Engine", &Arguments::new().with("cylinders", 6i64))
///     .unwrap();
/// assert_eq!(bigger.downcast::<Engine>().unwrap().cylinders, 6);
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Identifier the container is shared under
    pub const ID: &'static str = "dependency_resolver::Container";

    /// Identifier of the public contract ([`Resolver`])
    pub const CONTRACT_ID: &'static str = "dependency_resolver::Resolver";

    /// Create a container over `reflector`
    #[inline]
    pub fn new(reflector: Arc<Reflector>) -> Self {
        Self::builder().reflector(reflector).build()
    }

    /// Create a container sharing an existing definition collector
    #[inline]
    pub fn with_collector(collector: Arc<Collector>) -> Self {
        Self::builder().collector(collector).build()
    }

    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    fn from_parts(storage: RegistryStorage, collector: Arc<Collector>, separator: String, max_depth: usize) -> Self {
        let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            container = id,
            max_depth = max_depth,
            "Creating container"
        );

        let container = Self {
            inner: Arc::new(Inner {
                id,
                storage,
                collector,
                separator,
                max_depth,
            }),
        };

        let handle = Value::new(container.downgrade());
        container.inner.storage.insert_entry(Self::ID, handle.clone());
        container.inner.storage.insert_entry(Self::CONTRACT_ID, handle);
        container
    }

    /// Weak handle to this container
    #[inline]
    pub fn downgrade(&self) -> ContainerRef {
        ContainerRef(Arc::downgrade(&self.inner))
    }

    #[inline]
    pub fn collector(&self) -> &Arc<Collector> {
        &self.inner.collector
    }

    #[inline]
    pub fn reflector(&self) -> &Arc<Reflector> {
        self.inner.collector.reflector()
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Bind `id` to the definition derived from `source`.
    ///
    /// Drops any instance already shared under `id`.
    ///
    /// # Errors
    ///
    /// [`DiError::Definition`] if `source` cannot be introspected or is abstract.
    pub fn define(&self, id: impl Into<String>, source: impl Into<Source>) -> Result<()> {
        let id = id.into();
        let definition = self.inner.collector.make(&source.into())?;

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            id = %id,
            declaring = %definition.declaring(),
            "Defining entry"
        );

        self.inner.storage.remove_entry(&id);
        self.inner.storage.insert_definition(id, Ok(definition));
        Ok(())
    }

    /// Bind many identifiers at once.
    ///
    /// Returns how many were bound. With [`BatchPolicy::Fail`] the first
    /// failure stops the batch; pairs before it stay bound.
    pub fn define_batch<I, K, S>(&self, sources: I, policy: BatchPolicy) -> Result<usize>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Source>,
    {
        let mut defined = 0;
        for (id, source) in sources {
            let id = id.into();
            match self.define(id.as_str(), source) {
                Ok(()) => defined += 1,
                Err(_err) if policy == BatchPolicy::Skip => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "dependency_resolver",
                        id = %id,
                        error = %_err,
                        "Skipping batch definition"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(defined)
    }

    /// Start a fluent batch of definitions
    #[inline]
    pub fn define_many(&self, policy: BatchPolicy) -> DefineBatch<'_> {
        DefineBatch {
            container: self,
            policy,
            defined: 0,
            error: None,
        }
    }

    /// Remove the definition bound to `id` (shared instances stay)
    pub fn remove_definition(&self, id: &str) -> bool {
        self.inner.storage.remove_definition(id)
    }

    /// Remove every definition, including cached failures
    pub fn clear_definitions(&self) {
        self.inner.storage.clear_definitions();
    }

    /// Share `value` under `id`, bypassing definitions
    pub fn set(&self, id: impl Into<String>, value: impl IntoValue) {
        self.inner.storage.insert_entry(id, value.into_value());
    }

    /// Forget the instance shared under `id`
    pub fn unset(&self, id: &str) -> bool {
        self.inner.storage.remove_entry(id)
    }

    /// Forget every shared instance, including the container's own handles
    pub fn unset_all(&self) {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            container = self.inner.id,
            entries = self.inner.storage.entry_count(),
            "Clearing shared instances"
        );

        self.inner.storage.clear_entries();
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Shared instance for `id`, made and cached on first request.
    ///
    /// # Errors
    ///
    /// [`DiError::NotFound`] when nothing can be derived for `id`,
    /// [`DiError::Container`] when building it fails.
    pub fn get(&self, id: &str) -> Result<Value> {
        if let Some(value) = self.inner.storage.entry(id) {
            #[cfg(feature = "logging")]
            trace!(target: "dependency_resolver", id = %id, "Shared instance hit");
            return Ok(value);
        }

        let value = self.make(id)?;
        Ok(self.inner.storage.share(id, value))
    }

    /// Fresh result for `id` with no caller arguments
    #[inline]
    pub fn make(&self, id: &str) -> Result<Value> {
        self.make_with(id, &Arguments::new())
    }

    /// Fresh result for `id`; never reads or fills the shared instances
    pub fn make_with(&self, id: &str, arguments: &Arguments) -> Result<Value> {
        let _guard = self.enter(id)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            id = %id,
            depth = self.depth(),
            arguments = arguments.len(),
            "Making entry"
        );

        let definition = self.definition(id).map_err(|source| self.not_found(id, source))?;
        definition.resolve(self, arguments).map_err(|err| self.annotate(err))
    }

    /// Shared instance downcast to `T`
    pub fn get_as<T: Injectable>(&self, id: &str) -> Result<Arc<T>> {
        let value = self.get(id)?;
        Self::downcast(id, &value)
    }

    /// Fresh instance downcast to `T`
    pub fn make_as<T: Injectable>(&self, id: &str) -> Result<Arc<T>> {
        let value = self.make(id)?;
        Self::downcast(id, &value)
    }

    fn downcast<T: Injectable>(id: &str, value: &Value) -> Result<Arc<T>> {
        value.downcast::<T>().ok_or_else(|| {
            DiError::from(ResolveError::UnexpectedType {
                id: id.to_owned(),
                expected: std::any::type_name::<T>(),
            })
        })
    }

    /// Whether `id` has a shared instance or a usable definition
    pub fn has(&self, id: &str) -> bool {
        self.inner.storage.contains_entry(id) || self.definition(id).is_ok()
    }

    /// Render the active resolution path on this thread
    pub fn resolving(&self, separator: &str) -> String {
        RESOLVING.with(|paths| {
            paths
                .borrow()
                .get(&self.inner.id)
                .map(|path| path.join(separator))
                .unwrap_or_default()
        })
    }

    /// Current length of the resolution path on this thread
    pub fn depth(&self) -> usize {
        RESOLVING.with(|paths| paths.borrow().get(&self.inner.id).map_or(0, Vec::len))
    }

    // =========================================================================
    // Methods and closures
    // =========================================================================

    /// Invoke `method` on `instance`, resolving its parameters
    pub fn resolve_method(&self, instance: &Value, method: &str, arguments: &Arguments) -> Result<Value> {
        let type_name = self.type_name_of(instance, method)?;
        self.invoke_method(instance, &type_name, method, arguments)
    }

    /// Invoke an anonymous callable, resolving its parameters
    pub fn resolve_closure(&self, callable: &Callable, arguments: &Arguments) -> Result<Value> {
        let definition = self
            .inner
            .collector
            .callable(callable)
            .map_err(|source| self.not_found(CLOSURE_NAME, source))?;
        definition.resolve(self, arguments).map_err(|err| self.annotate(err))
    }

    /// Bind `method` of `instance` into a reusable function
    pub fn method(&self, instance: Value, method: &str) -> impl Fn(&Arguments) -> Result<Value> + use<> {
        let container = self.clone();
        let method = method.to_owned();
        move |arguments| container.resolve_method(&instance, &method, arguments)
    }

    /// Wrap `callable` into a reusable function
    pub fn closure(&self, callable: Callable) -> impl Fn(&Arguments) -> Result<Value> + use<> {
        let container = self.clone();
        move |arguments| container.resolve_closure(&callable, arguments)
    }

    /// Proxy routing method calls on `instance` through this container
    #[inline]
    pub fn foundry(&self, instance: Value) -> Foundry {
        Foundry::new(self.clone(), instance)
    }

    pub(crate) fn type_name_of(&self, instance: &Value, method: &str) -> Result<String> {
        self.reflector().type_name_of(instance).map_err(|source| {
            self.not_found(&format!("{{instance}}{}{}", MEMBER_SEPARATOR, method), source.into())
        })
    }

    pub(crate) fn invoke_method(
        &self,
        instance: &Value,
        type_name: &str,
        method: &str,
        arguments: &Arguments,
    ) -> Result<Value> {
        let member = self.inner.collector.method_definition(type_name, method).map_err(|source| {
            self.not_found(&format!("{}{}{}", type_name, MEMBER_SEPARATOR, method), source)
        })?;

        member
            .resolve_with_instance(self, Some(instance), arguments)
            .map_err(|err| self.annotate(err))
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of identifiers with a shared instance or a usable definition
    #[inline]
    pub fn len(&self) -> usize {
        self.identifiers().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted identifiers with a shared instance or a usable definition
    #[inline]
    pub fn identifiers(&self) -> Vec<String> {
        self.inner.storage.identifiers()
    }

    #[inline]
    pub fn separator(&self) -> &str {
        &self.inner.separator
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.inner.max_depth
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Bound definition for `id`, deriving and caching it (or its failure)
    fn definition(&self, id: &str) -> std::result::Result<Definition, DefinitionError> {
        if let Some(slot) = self.inner.storage.definition(id) {
            return slot;
        }
        let slot = self.inner.collector.get(id);
        self.inner.storage.remember_definition(id, slot)
    }

    /// Push `id` onto the path, failing once the depth limit is reached
    pub(crate) fn enter(&self, id: &str) -> Result<PathGuard> {
        let container = self.inner.id;
        let max_depth = self.inner.max_depth;

        RESOLVING.with(|paths| {
            let mut paths = paths.borrow_mut();
            let depth = paths.get(&container).map_or(0, Vec::len);

            if depth >= max_depth {
                let mut rendered = paths
                    .get(&container)
                    .map(|path| path.join(&self.inner.separator))
                    .unwrap_or_default();
                if !rendered.is_empty() {
                    rendered.push_str(&self.inner.separator);
                }
                rendered.push_str(id);

                #[cfg(feature = "logging")]
                debug!(
                    target: "dependency_resolver",
                    id = %id,
                    limit = max_depth,
                    "Resolution depth limit exceeded"
                );

                return Err(DiError::DepthExceeded {
                    limit: max_depth,
                    path: rendered,
                });
            }

            paths.entry(container).or_default().push(id.to_owned());
            Ok(PathGuard { container })
        })
    }

    fn render_path(&self) -> String {
        self.resolving(&self.inner.separator)
    }

    fn not_found(&self, id: &str, source: DefinitionError) -> DiError {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            id = %id,
            error = %source,
            "No entry found"
        );

        DiError::NotFound {
            id: id.to_owned(),
            path: self.render_path(),
            source,
        }
    }

    /// Attach the current path to a bare resolve error; annotated errors pass through
    fn annotate(&self, err: DiError) -> DiError {
        match err {
            DiError::Resolve(source) => DiError::Container {
                path: self.render_path(),
                source,
            },
            other => other,
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Resolver for Container {
    #[inline]
    fn get(&self, id: &str) -> Result<Value> {
        Container::get(self, id)
    }

    #[inline]
    fn make_with(&self, id: &str, arguments: &Arguments) -> Result<Value> {
        Container::make_with(self, id, arguments)
    }

    #[inline]
    fn has(&self, id: &str) -> bool {
        Container::has(self, id)
    }

    #[inline]
    fn resolving(&self, separator: &str) -> String {
        Container::resolving(self, separator)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("entries", &self.inner.storage.entry_count())
            .field("definitions", &self.inner.storage.definition_count())
            .field("separator", &self.inner.separator)
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Builder for a [`Container`].
///
/// ```rust
/// use dependency_resolver::Container;
///
/// let container = Container::builder().separator(" -> ").max_depth(32).build();
/// assert_eq!(container.separator(), " -> ");
/// assert!(container.has(Container::ID));
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    reflector: Option<Arc<Reflector>>,
    collector: Option<Arc<Collector>>,
    separator: Option<String>,
    max_depth: Option<usize>,
    capacity: usize,
}

impl ContainerBuilder {
    /// Introspection cache to use; ignored when a collector is given
    pub fn reflector(mut self, reflector: Arc<Reflector>) -> Self {
        self.reflector = Some(reflector);
        self
    }

    /// Definition collector to share with other containers
    pub fn collector(mut self, collector: Arc<Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Separator used when rendering the resolution path
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Longest resolution path before a request fails with [`DiError::DepthExceeded`]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Expected number of identifiers
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> Container {
        let collector = self.collector.unwrap_or_else(|| {
            Arc::new(Collector::new(self.reflector.unwrap_or_default()))
        });
        Container::from_parts(
            RegistryStorage::with_capacity(self.capacity),
            collector,
            self.separator.unwrap_or_else(|| DEFAULT_SEPARATOR.to_owned()),
            self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        )
    }
}

// =============================================================================
// Batch definitions
// =============================================================================

/// What a batch does with a source that cannot be defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Skip it and keep going
    #[default]
    Skip,
    /// Stop and report it
    Fail,
}

/// Fluent batch of definitions.
///
/// ```rust
/// use dependency_resolver::{BatchPolicy, Container};
///
/// let container = Container::default();
/// let defined = container
///     .define_many(BatchPolicy::Skip)
///     .define("missing", "NotDescribed")
///     .done()
///     .unwrap();
/// assert_eq!(defined, 0);
/// ```
pub struct DefineBatch<'a> {
    container: &'a Container,
    policy: BatchPolicy,
    defined: usize,
    error: Option<DiError>,
}

impl DefineBatch<'_> {
    /// Define and continue the chain; after a failure under `Fail` this is a no-op
    pub fn define(mut self, id: impl Into<String>, source: impl Into<Source>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.container.define(id, source) {
            Ok(()) => self.defined += 1,
            Err(err) if self.policy == BatchPolicy::Fail => self.error = Some(err),
            Err(_) => {}
        }
        self
    }

    /// Finish the batch, returning how many identifiers were bound
    pub fn done(self) -> Result<usize> {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            defined = self.defined,
            failed = self.error.is_some(),
            "Batch definition completed"
        );

        match self.error {
            Some(err) => Err(err),
            None => Ok(self.defined),
        }
    }
}
