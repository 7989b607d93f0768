//! Value converters and default scalar coercion.
//!
//! A [`ValueConverter`] maps between the scalar stored in the model and the
//! scalar carried by the view. Converters are attached to template nodes or
//! registered on a [`ViewContext`](crate::ViewContext); when none applies,
//! [`coerce`] bridges the common scalar kinds.

use std::fmt;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::model::{Scalar, ScalarKind};
use crate::util::datetime::{format_datetime, parse_datetime};

/// Bidirectional conversion between model and view scalars.
pub trait ValueConverter: Send + Sync {
    /// Returns true if this converter handles model values of `kind`.
    fn supports(&self, kind: ScalarKind) -> bool;

    /// Model scalar to view scalar.
    fn to_view(&self, value: &Scalar) -> Result<Scalar, ConversionError>;

    /// View scalar to model scalar.
    fn to_model(&self, value: &Scalar) -> Result<Scalar, ConversionError>;
}

/// Shared converter handle.
pub type ConverterRef = Arc<dyn ValueConverter>;

/// Renders dates as RFC 3339 strings and parses them back.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl ValueConverter for DateTimeConverter {
    fn supports(&self, kind: ScalarKind) -> bool {
        kind == ScalarKind::Date
    }

    fn to_view(&self, value: &Scalar) -> Result<Scalar, ConversionError> {
        match value {
            Scalar::Date(micros) => Ok(Scalar::String(format_datetime(*micros))),
            other => Ok(other.clone()),
        }
    }

    fn to_model(&self, value: &Scalar) -> Result<Scalar, ConversionError> {
        match value {
            Scalar::String(s) => Ok(Scalar::Date(parse_datetime(s)?)),
            other => Ok(other.clone()),
        }
    }
}

type ConvertFn = Arc<dyn Fn(&Scalar) -> Result<Scalar, ConversionError> + Send + Sync>;

/// Converter built from a pair of closures.
#[derive(Clone)]
pub struct FnConverter {
    kind: Option<ScalarKind>,
    to_view: ConvertFn,
    to_model: ConvertFn,
}

impl FnConverter {
    /// Creates a converter for model values of `kind`, or for every kind if
    /// `kind` is `None`.
    pub fn new<V, M>(kind: Option<ScalarKind>, to_view: V, to_model: M) -> Self
    where
        V: Fn(&Scalar) -> Result<Scalar, ConversionError> + Send + Sync + 'static,
        M: Fn(&Scalar) -> Result<Scalar, ConversionError> + Send + Sync + 'static,
    {
        Self {
            kind,
            to_view: Arc::new(to_view),
            to_model: Arc::new(to_model),
        }
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter").field("kind", &self.kind).finish()
    }
}

impl ValueConverter for FnConverter {
    fn supports(&self, kind: ScalarKind) -> bool {
        self.kind.is_none_or(|k| k == kind)
    }

    fn to_view(&self, value: &Scalar) -> Result<Scalar, ConversionError> {
        (self.to_view)(value)
    }

    fn to_model(&self, value: &Scalar) -> Result<Scalar, ConversionError> {
        (self.to_model)(value)
    }
}

/// Floats that convert to `i64` without saturating: `[-2^63, 2^63)`.
const INT_RANGE: std::ops::Range<f64> = -9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0;

fn unconvertible(value: &Scalar, target: ScalarKind) -> ConversionError {
    ConversionError::Unconvertible {
        value: value.to_string(),
        target,
    }
}

/// Coerces `value` to `target` using the default rules.
///
/// Null passes through. Numbers convert between int and float (floats only
/// when integral), strings parse into any kind, and any scalar renders as a
/// string.
pub fn coerce(value: Scalar, target: ScalarKind) -> Result<Scalar, ConversionError> {
    if value.kind().is_none_or(|k| k == target) {
        return Ok(value);
    }
    let out = match (&value, target) {
        (Scalar::Int(v), ScalarKind::Float) => Scalar::Float(*v as f64),
        (Scalar::Float(v), ScalarKind::Int) if v.fract() == 0.0 && INT_RANGE.contains(v) => {
            Scalar::Int(*v as i64)
        }
        (Scalar::Date(v), ScalarKind::Int) => Scalar::Int(*v),
        (Scalar::Int(v), ScalarKind::Date) => Scalar::Date(*v),
        (Scalar::String(s), ScalarKind::Int) => {
            Scalar::Int(s.trim().parse().map_err(|_| unconvertible(&value, target))?)
        }
        (Scalar::String(s), ScalarKind::Float) => {
            Scalar::Float(s.trim().parse().map_err(|_| unconvertible(&value, target))?)
        }
        (Scalar::String(s), ScalarKind::Bool) => match s.trim() {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => return Err(unconvertible(&value, target)),
        },
        (Scalar::String(s), ScalarKind::Date) => Scalar::Date(parse_datetime(s)?),
        (other, ScalarKind::String) => Scalar::String(other.to_string()),
        _ => return Err(unconvertible(&value, target)),
    };
    Ok(out)
}

/// Applies `converter` toward the view, or returns the value unchanged.
pub(crate) fn to_view(converter: Option<&ConverterRef>, value: Scalar) -> Result<Scalar, ConversionError> {
    match converter {
        Some(c) if !value.is_null() => c.to_view(&value),
        _ => Ok(value),
    }
}

/// Applies `converter` toward the model, then coerces to `target` if given.
pub(crate) fn to_model(
    converter: Option<&ConverterRef>,
    value: Scalar,
    target: Option<ScalarKind>,
) -> Result<Scalar, ConversionError> {
    let value = match converter {
        Some(c) if !value.is_null() => c.to_model(&value)?,
        _ => value,
    };
    match target {
        Some(kind) => coerce(value, kind),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce(Scalar::Int(2), ScalarKind::Float).unwrap(), Scalar::Float(2.0));
        assert_eq!(coerce(Scalar::Float(3.0), ScalarKind::Int).unwrap(), Scalar::Int(3));
        assert!(coerce(Scalar::Float(3.5), ScalarKind::Int).is_err());
    }

    #[test]
    fn test_coerce_float_out_of_int_range() {
        assert_eq!(
            coerce(Scalar::Float(-9_223_372_036_854_775_808.0), ScalarKind::Int).unwrap(),
            Scalar::Int(i64::MIN)
        );
        for v in [1e30, -1e30, 9_223_372_036_854_775_808.0, f64::INFINITY, f64::NAN] {
            assert!(matches!(
                coerce(Scalar::Float(v), ScalarKind::Int),
                Err(ConversionError::Unconvertible { target: ScalarKind::Int, .. })
            ));
        }
    }

    #[test]
    fn test_coerce_strings() {
        assert_eq!(coerce(Scalar::from("42"), ScalarKind::Int).unwrap(), Scalar::Int(42));
        assert_eq!(coerce(Scalar::from("true"), ScalarKind::Bool).unwrap(), Scalar::Bool(true));
        assert_eq!(coerce(Scalar::Int(7), ScalarKind::String).unwrap(), Scalar::from("7"));
        assert_eq!(
            coerce(Scalar::from("1970-01-02"), ScalarKind::Date).unwrap(),
            Scalar::Date(86_400_000_000)
        );
        assert!(matches!(
            coerce(Scalar::from("x"), ScalarKind::Int),
            Err(ConversionError::Unconvertible { target: ScalarKind::Int, .. })
        ));
    }

    #[test]
    fn test_coerce_null_passes() {
        assert_eq!(coerce(Scalar::Null, ScalarKind::Int).unwrap(), Scalar::Null);
    }

    #[test]
    fn test_datetime_converter() {
        let c = DateTimeConverter;
        assert!(c.supports(ScalarKind::Date));
        let view = c.to_view(&Scalar::Date(0)).unwrap();
        assert_eq!(view, Scalar::from("1970-01-01T00:00:00Z"));
        assert_eq!(c.to_model(&view).unwrap(), Scalar::Date(0));
        assert!(c.to_model(&Scalar::from("nope")).is_err());
        assert!(c.to_model(&Scalar::from("2020-01-01T00:00:0\u{e9}")).is_err());
    }

    #[test]
    fn test_fn_converter() {
        let c = FnConverter::new(
            Some(ScalarKind::Int),
            |v| Ok(Scalar::Int(v.as_int().unwrap_or(0) * 100)),
            |v| Ok(Scalar::Int(v.as_int().unwrap_or(0) / 100)),
        );
        assert!(c.supports(ScalarKind::Int));
        assert!(!c.supports(ScalarKind::String));
        assert_eq!(c.to_view(&Scalar::Int(3)).unwrap(), Scalar::Int(300));
        assert_eq!(c.to_model(&Scalar::Int(300)).unwrap(), Scalar::Int(3));
    }
}
