//! Scalar and model values.
//!
//! [`Scalar`] is the primitive carried by view events. [`Value`] is anything a
//! model property can hold: a scalar, a shared object, or one of the
//! container shapes (list, set, fixed array, map).

use std::fmt;

use crate::model::object::{ListRef, MapRef, ObjectRef, SetRef};
use crate::util::datetime::format_datetime;

/// Kinds of scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    /// Microseconds since the Unix epoch (UTC).
    Date,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Date => "date",
        };
        f.write_str(s)
    }
}

/// A primitive value as it appears in VALUE, META and DISCRIMINATOR events.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Microseconds since the Unix epoch (UTC).
    Date(i64),
}

impl Scalar {
    /// Returns the kind of this scalar, or `None` for null.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(ScalarKind::Bool),
            Scalar::Int(_) => Some(ScalarKind::Int),
            Scalar::Float(_) => Some(ScalarKind::Float),
            Scalar::String(_) => Some(ScalarKind::String),
            Scalar::Date(_) => Some(ScalarKind::Date),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::String(v) => f.write_str(v),
            Scalar::Date(v) => f.write_str(&format_datetime(*v)),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

/// Declared data type of a model property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// A scalar of the given kind.
    Scalar(ScalarKind),
    /// A single associated object.
    Object,
    /// An ordered, shared, growable collection.
    List,
    /// An unordered collection without duplicates.
    Set,
    /// A fixed-length ordered collection stored by value.
    Array,
    /// A keyed collection whose keys have the given kind.
    Map(ScalarKind),
    /// Undeclared; shape is only known at runtime.
    Any,
}

impl DataType {
    /// Returns true for container shapes that can back an array node.
    pub fn is_collection(self) -> bool {
        matches!(self, DataType::List | DataType::Set | DataType::Array)
    }

    pub fn scalar_kind(self) -> Option<ScalarKind> {
        match self {
            DataType::Scalar(kind) => Some(kind),
            _ => None,
        }
    }
}

/// A value held by a model property.
///
/// Objects, lists, sets and maps are shared handles: cloning a `Value` clones
/// the handle, not the contents. Equality is structural (deep); identity is
/// available through [`Value::is_same`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Object(ObjectRef),
    List(ListRef),
    Set(SetRef),
    Array(Vec<Value>),
    Map(MapRef),
}

impl Value {
    pub const NULL: Value = Value::Scalar(Scalar::Null);

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Short name of the value's shape, used in diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Scalar(Scalar::Null) => "null",
            Value::Scalar(_) => "scalar",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Identity comparison: shared handles compare by pointer, scalars and
    /// arrays by value.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_same(y))
            }
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NULL
    }
}

macro_rules! value_from_scalar {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Scalar(Scalar::from(v))
            }
        })*
    };
}

value_from_scalar!(bool, i64, i32, f64, &str, String);

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ListRef> for Value {
    fn from(v: ListRef) -> Self {
        Value::List(v)
    }
}

impl From<SetRef> for Value {
    fn from(v: SetRef) -> Self {
        Value::Set(v)
    }
}

impl From<MapRef> for Value {
    fn from(v: MapRef) -> Self {
        Value::Map(v)
    }
}
