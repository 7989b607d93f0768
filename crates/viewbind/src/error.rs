//! Error types for template construction, generation and application.

use thiserror::Error;

use crate::access::AccessModes;
use crate::event::EventKind;
use crate::model::{DataType, ScalarKind};
use crate::template::NodeKind;
use crate::util::datetime::DateTimeParseError;

/// Stable error codes, one per failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// V001: Template configuration
    Configuration,
    /// V002: Malformed event stream
    MalformedStream,
    /// V003: Unknown property in the view
    UnknownProperty,
    /// V004: Value conversion
    Conversion,
    /// V005: Accessor failure
    Access,
    /// V006: Association management
    Association,
    /// V007: Instantiation or reference resolution
    Instantiation,
    /// V008: Subtype resolution
    Subtype,
    /// V009: Meta or splice handler failure
    Handler,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "V001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Configuration => "V001",
            ErrorCode::MalformedStream => "V002",
            ErrorCode::UnknownProperty => "V003",
            ErrorCode::Conversion => "V004",
            ErrorCode::Access => "V005",
            ErrorCode::Association => "V006",
            ErrorCode::Instantiation => "V007",
            ErrorCode::Subtype => "V008",
            ErrorCode::Handler => "V009",
        }
    }
}

/// Error while building a template. These are fatal configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("[V001] type {owner} has no property {property:?}")]
    UnknownProperty { owner: String, property: String },

    #[error("[V001] property {property:?} of {owner} supports {supported} access, but {requested} was requested")]
    UnsupportedAccessMode {
        owner: String,
        property: String,
        requested: AccessModes,
        supported: AccessModes,
    },

    #[error("[V001] {kind:?} node {node:?} has no accessor")]
    MissingAccessor { node: String, kind: NodeKind },

    #[error("[V001] property {property:?} of type {data_type:?} cannot back a {kind:?} node")]
    ShapeMismatch {
        property: String,
        data_type: DataType,
        kind: NodeKind,
    },

    #[error("[V001] {kind:?} node {node:?} has no model type")]
    MissingModelType { node: String, kind: NodeKind },

    #[error("[V001] subtype {subtype} does not extend {parent}")]
    NotASubtype { parent: String, subtype: String },

    #[error("[V001] subtype {subtype} of {parent} is ambiguous with sibling {sibling}")]
    AmbiguousSubtype {
        parent: String,
        subtype: String,
        sibling: String,
    },

    #[error("[V001] {parent} has subtype branches but no discriminator")]
    MissingDiscriminator { parent: String },

    #[error("[V001] duplicate property name {name:?} in {parent}")]
    DuplicateName { parent: String, name: String },

    #[error("[V001] map key kind {key_kind} is not supported by a {kind:?} node")]
    UnsupportedKeyKind { key_kind: ScalarKind, kind: NodeKind },

    #[error("[V001] invalid composition: {reason}")]
    InvalidComposition { reason: String },
}

/// Error raised by an accessor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    #[error("property {property:?} is not readable")]
    NotReadable { property: String },

    #[error("property {property:?} is not writable")]
    NotWritable { property: String },

    #[error("property {property:?} expected {expected} but found {found}")]
    WrongShape {
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{operation} is not supported by property {property:?}")]
    Unsupported {
        property: String,
        operation: &'static str,
    },

    #[error("index {index} out of bounds for property {property:?} (size: {size})")]
    IndexOutOfBounds {
        property: String,
        index: usize,
        size: usize,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Error raised by a converter or by default scalar coercion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("cannot convert {value:?} to {target}")]
    Unconvertible { value: String, target: ScalarKind },

    #[error(transparent)]
    DateTime(#[from] DateTimeParseError),

    #[error("cannot coerce {found} through {coercion}")]
    Coercion {
        coercion: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Custom(String),
}

/// Structural error in an event stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("unexpected end of view while reading {context}")]
    UnexpectedEnd { context: &'static str },

    #[error("expected {expected} but found {found}")]
    UnexpectedEvent {
        expected: &'static str,
        found: EventKind,
    },

    #[error("{found} does not close {open}")]
    MismatchedEnd { open: EventKind, found: EventKind },

    #[error("{found} has no matching begin")]
    UnmatchedEnd { found: EventKind },

    #[error("view ended with {open} unclosed container(s)")]
    Unterminated { open: usize },

    #[error("{count} trailing event(s) after the root")]
    TrailingEvents { count: usize },

    #[error("anonymous {found} inside an object")]
    AnonymousProperty { found: EventKind },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },
}

/// What went wrong during generation or application.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewErrorKind {
    #[error("[V002] malformed view: {0}")]
    Stream(#[from] StreamError),

    #[error("[V003] unknown property {name:?}")]
    UnknownProperty { name: String },

    #[error("[V004] conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("[V005] {0}")]
    Access(#[from] AccessError),

    #[error("[V006] no association manager supports {descriptor}")]
    UnsupportedAssociation { descriptor: String },

    #[error("[V006] manager for {descriptor} does not provide {expected} access")]
    ManagerCapability {
        descriptor: String,
        expected: &'static str,
    },

    #[error("[V007] cannot instantiate {model_type}: {reason}")]
    Instantiation { model_type: String, reason: String },

    #[error("[V007] no reference resolver supports {model_type}")]
    NoReferenceResolver { model_type: String },

    #[error("[V007] reference to {model_type} could not be resolved")]
    UnresolvedReference { model_type: String },

    #[error("[V008] discriminator {value:?} does not identify {base} or one of its subtypes")]
    UndefinedDiscriminator { base: String, value: String },

    #[error("[V008] discriminator {value:?} matches more than one subtype of {base}")]
    AmbiguousDiscriminator { base: String, value: String },

    #[error("[V008] expected an instance of {expected} but found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("[V009] handler failed: {0}")]
    Handler(String),
}

impl ViewErrorKind {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ViewErrorKind::Stream(_) => ErrorCode::MalformedStream,
            ViewErrorKind::UnknownProperty { .. } => ErrorCode::UnknownProperty,
            ViewErrorKind::Conversion(_) | ViewErrorKind::Access(AccessError::Conversion(_)) => {
                ErrorCode::Conversion
            }
            ViewErrorKind::Access(_) => ErrorCode::Access,
            ViewErrorKind::UnsupportedAssociation { .. }
            | ViewErrorKind::ManagerCapability { .. } => ErrorCode::Association,
            ViewErrorKind::Instantiation { .. }
            | ViewErrorKind::NoReferenceResolver { .. }
            | ViewErrorKind::UnresolvedReference { .. } => ErrorCode::Instantiation,
            ViewErrorKind::UndefinedDiscriminator { .. }
            | ViewErrorKind::AmbiguousDiscriminator { .. }
            | ViewErrorKind::TypeMismatch { .. } => ErrorCode::Subtype,
            ViewErrorKind::Handler(_) => ErrorCode::Handler,
        }
    }
}

/// Error during generation or application, located by view path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} (at {path})")]
pub struct ViewError {
    kind: ViewErrorKind,
    path: String,
    model_path: Vec<String>,
}

impl ViewError {
    pub fn new(kind: impl Into<ViewErrorKind>, path: String, model_path: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            path,
            model_path,
        }
    }

    pub fn kind(&self) -> &ViewErrorKind {
        &self.kind
    }

    /// View path of the node being processed when the error occurred.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Model types of the enclosing frames, outermost first.
    pub fn model_path(&self) -> &[String] {
        &self.model_path
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ViewError::new(
            StreamError::UnexpectedEnd { context: "END_OBJECT" },
            "/order".to_string(),
            vec!["Order".to_string()],
        );
        assert_eq!(err.code(), ErrorCode::MalformedStream);
        assert_eq!(err.code().code(), "V002");
        assert_eq!(err.path(), "/order");
        assert!(err.to_string().contains("at /order"));
    }

    #[test]
    fn test_conversion_inside_access_error_reports_conversion() {
        let kind = ViewErrorKind::Access(AccessError::Conversion(ConversionError::Custom(
            "bad".to_string(),
        )));
        assert_eq!(kind.code(), ErrorCode::Conversion);
    }
}
