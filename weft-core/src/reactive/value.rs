//! Values
//!
//! State is a tree of dynamic values. Scalars are compared by content,
//! containers and opaque handles by identity. This matches what the change
//! detection needs: a container may be mutated in place without becoming a
//! different value.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::array::Array;
use super::object::Object;
use super::observer::Observer;

/// A dynamically typed state value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Array),
    Object(Object),
    /// A foreign handle, such as a rendered output node. Never made reactive.
    Opaque(Opaque),
}

/// Identity-compared handle to a host value.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

/// A property key. Objects use names; arrays use indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The key as an array index, if it is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Name(name) => name.parse().ok(),
        }
    }

    /// The key as an object property name.
    pub fn to_name(&self) -> String {
        match self {
            Self::Index(index) => index.to_string(),
            Self::Name(name) => name.clone(),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Identity comparison used for change detection.
///
/// Containers compare by reference, scalars by content, and `NaN` is equal
/// to itself so that writing `NaN` over `NaN` is a no-op.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
        (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
        _ => false,
    }
}

impl PartialEq for Value {
    /// Same as [`same_value`].
    fn eq(&self, other: &Self) -> bool {
        same_value(self, other)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for containers and opaque handles, whose contents may change
    /// without their identity changing.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_) | Self::Opaque(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The reactive wrapper attached to this value, if any.
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Self::Array(array) => array.observer(),
            Self::Object(object) => object.observer(),
            _ => None,
        }
    }

    /// Build a value tree from JSON. The result is plain, not yet reactive.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.into()),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Untracked JSON snapshot. Cycles and opaque handles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, path: &mut HashSet<*const ()>) -> serde_json::Value {
        match self {
            Self::Null | Self::Opaque(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(array) => {
                if !path.insert(array.as_ptr()) {
                    return serde_json::Value::Null;
                }
                let items = array
                    .to_vec()
                    .iter()
                    .map(|item| item.to_json_inner(path))
                    .collect();
                path.remove(&array.as_ptr());
                serde_json::Value::Array(items)
            }
            Self::Object(object) => {
                if !path.insert(object.as_ptr()) {
                    return serde_json::Value::Null;
                }
                let mut map = serde_json::Map::new();
                for key in object.keys() {
                    let value = object.peek(&key).unwrap_or_default();
                    map.insert(key, value.to_json_inner(path));
                }
                path.remove(&object.as_ptr());
                serde_json::Value::Object(map)
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    // Whole numbers within the exact integer range print without a fraction.
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Self::Array(array)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Self::Opaque(opaque)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Array::from(items))
    }
}
