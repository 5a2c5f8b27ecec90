//! Dynamic values flowing through resolution
//!
//! Everything the container builds, shares or receives from a caller is a
//! [`Value`]. Caller-supplied partial input is an [`Arguments`] bag keyed by
//! parameter name or position, and the final positional list handed to a
//! constructor, method or function is an [`Args`].

use ahash::RandomState;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Marker trait for types that can be stored in a [`Value`].
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Type-erased shared instance
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Error returned by host constructors, methods, functions and setters
pub type InvokeError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for host invokers
pub type InvokeResult<T> = std::result::Result<T, InvokeError>;

/// A resolved or caller-supplied value.
#[derive(Clone, Default)]
pub enum Value {
    /// Explicit null (distinct from "absent")
    #[default]
    Null,
    /// A shared, type-erased instance
    Shared(AnyArc),
    /// An ordered list, produced for variadic parameters
    List(Vec<Value>),
    /// A nested argument bag used to drive a dependency's own resolution
    Arguments(Arguments),
}

static NULL: Value = Value::Null;

impl Value {
    /// Wrap an instance
    #[inline]
    pub fn new<T: Injectable>(instance: T) -> Self {
        Value::Shared(Arc::new(instance))
    }

    /// Wrap an existing `Arc`
    #[inline]
    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Value::Shared(instance as AnyArc)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Downcast a shared instance to `Arc<T>`
    #[inline]
    pub fn downcast<T: Injectable>(&self) -> Option<Arc<T>> {
        match self {
            Value::Shared(any) => Arc::clone(any).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Check whether a shared instance is of type `T`
    #[inline]
    pub fn is<T: Injectable>(&self) -> bool {
        self.instance_type_id() == Some(TypeId::of::<T>())
    }

    /// `TypeId` of the concrete shared instance
    pub fn instance_type_id(&self) -> Option<TypeId> {
        match self {
            Value::Shared(any) => Some(Any::type_id(&**any)),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_arguments(&self) -> Option<&Arguments> {
        match self {
            Value::Arguments(args) => Some(args),
            _ => None,
        }
    }

    /// Identity comparison for shared instances
    pub fn ptr_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Shared(x), Value::Shared(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Extract a required shared instance, naming `slot` on mismatch
    pub fn expect_shared<T: Injectable>(&self, slot: &str) -> InvokeResult<Arc<T>> {
        self.downcast::<T>().ok_or_else(|| self.mismatch::<T>(slot))
    }

    /// Extract an optional shared instance (`Null` maps to `None`)
    pub fn expect_optional<T: Injectable>(&self, slot: &str) -> InvokeResult<Option<Arc<T>>> {
        if self.is_null() {
            return Ok(None);
        }
        self.expect_shared::<T>(slot).map(Some)
    }

    /// Extract a clone of a shared instance
    pub fn expect_cloned<T: Injectable + Clone>(&self, slot: &str) -> InvokeResult<T> {
        self.expect_shared::<T>(slot).map(|arc| (*arc).clone())
    }

    fn mismatch<T>(&self, slot: &str) -> InvokeError {
        let found = match self {
            Value::Null => "null",
            Value::Shared(_) => "a value of another type",
            Value::List(_) => "a list",
            Value::Arguments(_) => "an argument bag",
        };
        format!(
            "expected {} for {}, found {}",
            std::any::type_name::<T>(),
            slot,
            found
        )
        .into()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Shared(_) => f.write_str("Shared(..)"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Arguments(args) => f.debug_tuple("Arguments").field(args).finish(),
        }
    }
}

/// Conversion into a [`Value`], used by [`Arguments`] builders and [`arguments!`](crate::arguments).
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    #[inline]
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for Arguments {
    #[inline]
    fn into_value(self) -> Value {
        Value::Arguments(self)
    }
}

impl IntoValue for Vec<Value> {
    #[inline]
    fn into_value(self) -> Value {
        Value::List(self)
    }
}

impl<T: Injectable> IntoValue for Arc<T> {
    #[inline]
    fn into_value(self) -> Value {
        Value::from_arc(self)
    }
}

impl IntoValue for &str {
    #[inline]
    fn into_value(self) -> Value {
        Value::new(self.to_owned())
    }
}

macro_rules! scalar_into_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                #[inline]
                fn into_value(self) -> Value {
                    Value::new(self)
                }
            }
        )*
    };
}

scalar_into_value!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String);

/// Key of an [`Arguments`] entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Parameter name, or a `$`-prefixed property / companion name
    Name(String),
    /// Zero-based parameter position
    Position(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Position(position) => write!(f, "#{}", position),
        }
    }
}

/// Caller-supplied partial resolution input (the argument bag).
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Arguments, Value};
///
/// let args = Arguments::new()
///     .with("cylinders", 6i64)
///     .with_position(1, "diesel")
///     .nest("engine", Arguments::new().with("cylinders", 8i64));
///
/// assert!(args.get_named("cylinders").is_some());
/// assert!(args.get_position(1).is_some());
/// assert!(args.get_named("$engine").and_then(Value::as_arguments).is_some());
/// ```
#[derive(Clone, Default)]
pub struct Arguments {
    names: HashMap<String, Value, RandomState>,
    // `$`-prefixed entries, stored without the prefix
    companions: HashMap<String, Value, RandomState>,
    positions: HashMap<usize, Value, RandomState>,
}

impl Arguments {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a by-name entry and continue the chain
    pub fn with(mut self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.insert_named(name, value);
        self
    }

    /// Add a by-position entry and continue the chain
    pub fn with_position(mut self, position: usize, value: impl IntoValue) -> Self {
        self.insert_position(position, value);
        self
    }

    /// Add a nested bag under the `$`-prefixed companion name of `name`
    pub fn nest(mut self, name: &str, nested: Arguments) -> Self {
        self.companions.insert(name.to_owned(), nested.into_value());
        self
    }

    /// Insert by name; a leading `$` makes it a companion entry
    pub fn insert_named(&mut self, name: impl Into<String>, value: impl IntoValue) {
        let name = name.into();
        let value = value.into_value();
        match name.strip_prefix('$') {
            Some(companion) => {
                self.companions.insert(companion.to_owned(), value);
            }
            None => {
                self.names.insert(name, value);
            }
        }
    }

    pub fn insert_position(&mut self, position: usize, value: impl IntoValue) {
        self.positions.insert(position, value.into_value());
    }

    pub fn insert(&mut self, key: Key, value: Value) {
        match key {
            Key::Name(name) => self.insert_named(name, value),
            Key::Position(position) => self.insert_position(position, value),
        }
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        match key {
            Key::Name(name) => self.get_named(name),
            Key::Position(position) => self.get_position(*position),
        }
    }

    /// Entry by name; `"$name"` reads the companion entry of `name`
    #[inline]
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        match name.strip_prefix('$') {
            Some(companion) => self.companions.get(companion),
            None => self.names.get(name),
        }
    }

    /// Companion entry of `name`, i.e. the one keyed `"$name"`
    #[inline]
    pub fn get_companion(&self, name: &str) -> Option<&Value> {
        self.companions.get(name)
    }

    #[inline]
    pub fn get_position(&self, position: usize) -> Option<&Value> {
        self.positions.get(&position)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len() + self.companions.len() + self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries().map(|(key, _)| key)
    }

    fn entries(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        let names = self.names.iter().map(|(name, value)| (Key::Name(name.clone()), value));
        let companions = self
            .companions
            .iter()
            .map(|(name, value)| (Key::Name(format!("${}", name)), value));
        let positions = self
            .positions
            .iter()
            .map(|(position, value)| (Key::Position(*position), value));
        names.chain(companions).chain(positions)
    }
}

impl From<Vec<Value>> for Arguments {
    /// Positional bag: element `i` is keyed by position `i`
    fn from(values: Vec<Value>) -> Self {
        let mut args = Arguments::new();
        for (position, value) in values.into_iter().enumerate() {
            args.insert(Key::Position(position), value);
        }
        args
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

/// Build an [`Arguments`] bag.
///
/// String keys are parameter names, `[n]` keys are positions.
///
/// ```rust
/// use dependency_resolver::arguments;
///
/// let args = arguments! { "cylinders" => 6i64, [1] => "diesel" };
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! arguments {
    (@insert $args:ident;) => {};
    (@insert $args:ident; [$position:expr] => $value:expr $(, $($rest:tt)*)?) => {
        $args.insert_position($position, $crate::IntoValue::into_value($value));
        $( $crate::arguments!(@insert $args; $($rest)*); )?
    };
    (@insert $args:ident; $name:expr => $value:expr $(, $($rest:tt)*)?) => {
        $args.insert_named($name, $crate::IntoValue::into_value($value));
        $( $crate::arguments!(@insert $args; $($rest)*); )?
    };
    ($($body:tt)*) => {{
        #[allow(unused_mut)]
        let mut args = $crate::Arguments::new();
        $crate::arguments!(@insert args; $($body)*);
        args
    }};
}

/// The resolved, positional dependency list passed to an invoker.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Value>);

impl Args {
    #[inline]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Value at `index`, or `Null` when out of range
    #[inline]
    pub fn value(&self, index: usize) -> &Value {
        self.0.get(index).unwrap_or(&NULL)
    }

    pub fn shared<T: Injectable>(&self, index: usize) -> InvokeResult<Arc<T>> {
        self.value(index).expect_shared(&Self::slot(index))
    }

    pub fn optional<T: Injectable>(&self, index: usize) -> InvokeResult<Option<Arc<T>>> {
        self.value(index).expect_optional(&Self::slot(index))
    }

    pub fn cloned<T: Injectable + Clone>(&self, index: usize) -> InvokeResult<T> {
        self.value(index).expect_cloned(&Self::slot(index))
    }

    /// Trailing values from `index` on (the flattened variadic tail)
    pub fn rest(&self, index: usize) -> &[Value] {
        self.0.get(index..).unwrap_or(&[])
    }

    /// The resolving container, when the argument is a [`ContainerRef`](crate::ContainerRef)
    pub fn container(&self, index: usize) -> InvokeResult<crate::Container> {
        self.shared::<crate::ContainerRef>(index)?
            .upgrade()
            .ok_or_else(|| InvokeError::from("container has been dropped"))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }

    fn slot(index: usize) -> String {
        format!("argument #{}", index)
    }
}
