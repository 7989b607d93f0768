//! Accessors that wrap another accessor and translate its values.

use std::fmt;
use std::sync::Arc;

use crate::access::{AccessModes, Accessor, AccessorRef};
use crate::convert::ConverterRef;
use crate::error::{AccessError, ConversionError};
use crate::model::{DataType, Value};

/// Applies a [`ValueConverter`](crate::convert::ValueConverter) on every read
/// and write of a scalar property.
#[derive(Clone)]
pub struct ConvertingAccessor {
    delegate: AccessorRef,
    converter: ConverterRef,
}

impl ConvertingAccessor {
    pub fn new(delegate: AccessorRef, converter: ConverterRef) -> Self {
        Self { delegate, converter }
    }
}

impl fmt::Debug for ConvertingAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertingAccessor")
            .field("delegate", &self.delegate)
            .finish_non_exhaustive()
    }
}

impl Accessor for ConvertingAccessor {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn data_type(&self) -> DataType {
        self.delegate.data_type()
    }

    fn modes(&self) -> AccessModes {
        self.delegate.modes()
    }

    fn get(&self, source: &Value) -> Result<Value, AccessError> {
        match self.delegate.get(source)? {
            Value::Scalar(s) if !s.is_null() => Ok(Value::Scalar(self.converter.to_view(&s)?)),
            other => Ok(other),
        }
    }

    fn set(&self, target: &Value, value: Value) -> Result<(), AccessError> {
        let value = match value {
            Value::Scalar(s) if !s.is_null() => Value::Scalar(self.converter.to_model(&s)?),
            other => other,
        };
        self.delegate.set(target, value)
    }
}

/// Translates a collection-like value to and from a plain array.
pub trait Coercion: Send + Sync + fmt::Debug {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn to_array(&self, value: &Value) -> Result<Vec<Value>, ConversionError>;

    fn from_array(&self, values: Vec<Value>) -> Result<Value, ConversionError>;
}

/// Presents a property of some collection-like type as an array, so that an
/// [`ArrayAccessor`](crate::access::ArrayAccessor) can drive it.
#[derive(Debug, Clone)]
pub struct CoercingAccessor {
    delegate: AccessorRef,
    coercion: Arc<dyn Coercion>,
}

impl CoercingAccessor {
    pub fn new(delegate: AccessorRef, coercion: Arc<dyn Coercion>) -> Self {
        Self { delegate, coercion }
    }
}

impl Accessor for CoercingAccessor {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn data_type(&self) -> DataType {
        DataType::Array
    }

    fn modes(&self) -> AccessModes {
        self.delegate.modes()
    }

    fn get(&self, source: &Value) -> Result<Value, AccessError> {
        let value = self.delegate.get(source)?;
        if value.is_null() {
            return Ok(Value::NULL);
        }
        Ok(Value::Array(self.coercion.to_array(&value)?))
    }

    fn set(&self, target: &Value, value: Value) -> Result<(), AccessError> {
        let coerced = match value {
            Value::Array(values) => self.coercion.from_array(values)?,
            v if v.is_null() => Value::NULL,
            other => {
                return Err(ConversionError::Coercion {
                    coercion: self.coercion.name(),
                    found: other.shape_name(),
                }
                .into());
            }
        };
        self.delegate.set(target, coerced)
    }
}

/// Treats a delimited string such as `"red,green"` as an array of strings.
#[derive(Debug, Clone)]
pub struct DelimitedCoercion {
    separator: char,
}

impl DelimitedCoercion {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }
}

impl Coercion for DelimitedCoercion {
    fn name(&self) -> &'static str {
        "delimited"
    }

    fn to_array(&self, value: &Value) -> Result<Vec<Value>, ConversionError> {
        let Some(s) = value.as_scalar().and_then(|s| s.as_str()) else {
            return Err(ConversionError::Coercion {
                coercion: self.name(),
                found: value.shape_name(),
            });
        };
        if s.is_empty() {
            return Ok(Vec::new());
        }
        Ok(s.split(self.separator).map(Value::from).collect())
    }

    fn from_array(&self, values: Vec<Value>) -> Result<Value, ConversionError> {
        let mut parts = Vec::with_capacity(values.len());
        for value in &values {
            match value.as_scalar() {
                Some(s) if !s.is_null() => parts.push(s.to_string()),
                _ => {
                    return Err(ConversionError::Coercion {
                        coercion: self.name(),
                        found: value.shape_name(),
                    });
                }
            }
        }
        Ok(Value::from(parts.join(&self.separator.to_string())))
    }
}
