//! Dynamic model graph.
//!
//! This module contains the types the engine reads from and writes to:
//! - Scalars and values
//! - Shared objects and containers (identity-comparable handles)
//! - Model types with declared properties

pub mod object;
pub mod types;
pub mod value;

pub use object::{ListRef, MapRef, Object, ObjectRef, SetRef};
pub use types::{Getter, ModelType, PropertyDecl, Setter, Storage, TypeBuilder};
pub use value::{DataType, Scalar, ScalarKind, Value};
