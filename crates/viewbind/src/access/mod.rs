//! Accessor layer.
//!
//! An [`Accessor`] reads and writes one property of a model value regardless
//! of how the property is stored. Multi-valued shapes (lists, sets, fixed
//! arrays, maps) are reached through a [`MultiValuedAccessor`] layered over
//! the plain accessor of the containing property.
//!
//! Accessors are resolved once, when a template is built, and shared by every
//! generate/apply call that uses the template.

pub mod multi;
pub mod wrap;

use std::fmt;
use std::sync::Arc;

use crate::error::{AccessError, TemplateError};
use crate::model::{DataType, Getter, ModelType, PropertyDecl, Setter, Storage, Value};

pub use multi::{
    ArrayAccessor, Capability, ListAccessor, MapAccessor, MultiValuedAccessor, SetAccessor,
};
pub use wrap::{CoercingAccessor, Coercion, ConvertingAccessor, DelimitedCoercion};

/// Shared accessor handle.
pub type AccessorRef = Arc<dyn Accessor>;

/// Set of supported (or requested) access modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessModes {
    read: bool,
    write: bool,
}

impl AccessModes {
    pub const NONE: AccessModes = AccessModes::new(false, false);
    pub const READ: AccessModes = AccessModes::new(true, false);
    pub const WRITE: AccessModes = AccessModes::new(false, true);
    pub const READ_WRITE: AccessModes = AccessModes::new(true, true);

    pub const fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }

    pub fn can_read(self) -> bool {
        self.read
    }

    pub fn can_write(self) -> bool {
        self.write
    }

    /// Returns true if every mode in `other` is also in `self`.
    pub fn contains(self, other: AccessModes) -> bool {
        (self.read || !other.read) && (self.write || !other.write)
    }
}

impl fmt::Display for AccessModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match (self.read, self.write) {
            (true, true) => "read-write",
            (true, false) => "read",
            (false, true) => "write",
            (false, false) => "no",
        };
        f.write_str(s)
    }
}

/// Uniform read/write access to one property.
pub trait Accessor: Send + Sync + fmt::Debug {
    /// Property name, used in diagnostics.
    fn name(&self) -> &str;

    /// Declared data type of the property.
    fn data_type(&self) -> DataType;

    /// Modes this accessor supports.
    fn modes(&self) -> AccessModes;

    /// Reads the property of `source`.
    fn get(&self, source: &Value) -> Result<Value, AccessError>;

    /// Writes the property of `target`.
    fn set(&self, target: &Value, value: Value) -> Result<(), AccessError>;
}

pub(crate) fn expect_object<'v>(
    property: &str,
    value: &'v Value,
) -> Result<&'v crate::model::ObjectRef, AccessError> {
    value.as_object().ok_or_else(|| AccessError::WrongShape {
        property: property.to_string(),
        expected: "object",
        found: value.shape_name(),
    })
}

/// Identity accessor for a template root: the externally supplied value is
/// the property.
#[derive(Debug, Clone)]
pub struct RootAccessor {
    data_type: DataType,
}

impl RootAccessor {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl Accessor for RootAccessor {
    fn name(&self) -> &str {
        ""
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn modes(&self) -> AccessModes {
        AccessModes::READ
    }

    fn get(&self, source: &Value) -> Result<Value, AccessError> {
        Ok(source.clone())
    }

    fn set(&self, _target: &Value, _value: Value) -> Result<(), AccessError> {
        Err(AccessError::NotWritable {
            property: "<root>".to_string(),
        })
    }
}

/// Accessor over a plain field of a model object.
#[derive(Debug, Clone)]
pub struct FieldAccessor {
    name: Arc<str>,
    data_type: DataType,
    modes: AccessModes,
}

impl FieldAccessor {
    pub fn new(name: &str, data_type: DataType, modes: AccessModes) -> Self {
        Self {
            name: Arc::from(name),
            data_type,
            modes,
        }
    }
}

impl Accessor for FieldAccessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn modes(&self) -> AccessModes {
        self.modes
    }

    fn get(&self, source: &Value) -> Result<Value, AccessError> {
        if !self.modes.can_read() {
            return Err(AccessError::NotReadable {
                property: self.name.to_string(),
            });
        }
        Ok(expect_object(&self.name, source)?.get(&self.name))
    }

    fn set(&self, target: &Value, value: Value) -> Result<(), AccessError> {
        if !self.modes.can_write() {
            return Err(AccessError::NotWritable {
                property: self.name.to_string(),
            });
        }
        expect_object(&self.name, target)?.set(&self.name, value);
        Ok(())
    }
}

/// Accessor over a computed property backed by getter/setter closures.
#[derive(Clone)]
pub struct PropertyAccessor {
    name: Arc<str>,
    data_type: DataType,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl PropertyAccessor {
    pub fn new(name: &str, data_type: DataType, getter: Option<Getter>, setter: Option<Setter>) -> Self {
        Self {
            name: Arc::from(name),
            data_type,
            getter,
            setter,
        }
    }
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("modes", &self.modes())
            .finish()
    }
}

impl Accessor for PropertyAccessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn modes(&self) -> AccessModes {
        AccessModes::new(self.getter.is_some(), self.setter.is_some())
    }

    fn get(&self, source: &Value) -> Result<Value, AccessError> {
        let getter = self.getter.as_ref().ok_or_else(|| AccessError::NotReadable {
            property: self.name.to_string(),
        })?;
        Ok(getter(expect_object(&self.name, source)?))
    }

    fn set(&self, target: &Value, value: Value) -> Result<(), AccessError> {
        let setter = self.setter.as_ref().ok_or_else(|| AccessError::NotWritable {
            property: self.name.to_string(),
        })?;
        setter(expect_object(&self.name, target)?, value);
        Ok(())
    }
}

/// Resolves accessors for `(type, property)` pairs at template build time.
pub trait AccessorFactory: Send + Sync {
    fn accessor(&self, owner: &ModelType, property: &str) -> Result<AccessorRef, TemplateError>;
}

/// Accessor factory driven by the properties a [`ModelType`] declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredAccessorFactory;

impl DeclaredAccessorFactory {
    fn from_decl(decl: &PropertyDecl) -> AccessorRef {
        match decl.storage() {
            Storage::Field => Arc::new(FieldAccessor::new(decl.name(), decl.data_type(), decl.modes())),
            Storage::Computed { getter, setter } => Arc::new(PropertyAccessor::new(
                decl.name(),
                decl.data_type(),
                getter.clone(),
                setter.clone(),
            )),
        }
    }
}

impl AccessorFactory for DeclaredAccessorFactory {
    fn accessor(&self, owner: &ModelType, property: &str) -> Result<AccessorRef, TemplateError> {
        let decl = owner
            .property(property)
            .ok_or_else(|| TemplateError::UnknownProperty {
                owner: owner.name().to_string(),
                property: property.to_string(),
            })?;
        Ok(Self::from_decl(decl))
    }
}

/// Checks that `accessor` supports every mode in `requested`.
pub fn check_modes(
    owner: &str,
    accessor: &dyn Accessor,
    requested: AccessModes,
) -> Result<(), TemplateError> {
    let supported = accessor.modes();
    if supported.contains(requested) {
        Ok(())
    } else {
        Err(TemplateError::UnsupportedAccessMode {
            owner: owner.to_string(),
            property: accessor.name().to_string(),
            requested,
            supported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectRef, ScalarKind};

    fn person() -> ModelType {
        ModelType::builder("Person")
            .scalar("name", ScalarKind::String)
            .read_only("id", DataType::Scalar(ScalarKind::Int))
            .computed(
                "shout",
                DataType::Scalar(ScalarKind::String),
                |o: &ObjectRef| Value::from(o.scalar("name").to_string().to_uppercase()),
                Some(|o: &ObjectRef, v: Value| o.set("name", v)),
            )
            .build()
    }

    #[test]
    fn test_field_accessor_get_set() {
        let ty = person();
        let acc = DeclaredAccessorFactory.accessor(&ty, "name").unwrap();
        let obj = Value::Object(ObjectRef::new(&ty));
        acc.set(&obj, Value::from("ada")).unwrap();
        assert_eq!(acc.get(&obj).unwrap(), Value::from("ada"));
    }

    #[test]
    fn test_read_only_field_rejects_write() {
        let ty = person();
        let acc = DeclaredAccessorFactory.accessor(&ty, "id").unwrap();
        let obj = Value::Object(ObjectRef::new(&ty));
        assert!(matches!(
            acc.set(&obj, Value::from(1)),
            Err(AccessError::NotWritable { .. })
        ));
        assert!(check_modes("Person", acc.as_ref(), AccessModes::READ_WRITE).is_err());
        assert!(check_modes("Person", acc.as_ref(), AccessModes::READ).is_ok());
    }

    #[test]
    fn test_computed_property() {
        let ty = person();
        let acc = DeclaredAccessorFactory.accessor(&ty, "shout").unwrap();
        let obj = Value::Object(ObjectRef::new(&ty).with("name", "ada"));
        assert_eq!(acc.get(&obj).unwrap(), Value::from("ADA"));
        acc.set(&obj, Value::from("bob")).unwrap();
        assert_eq!(acc.get(&obj).unwrap(), Value::from("BOB"));
    }

    #[test]
    fn test_unknown_property() {
        let err = DeclaredAccessorFactory.accessor(&person(), "age").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownProperty { .. }));
    }

    #[test]
    fn test_wrong_shape() {
        let acc = FieldAccessor::new("x", DataType::Any, AccessModes::READ_WRITE);
        assert!(matches!(
            acc.get(&Value::from(1)),
            Err(AccessError::WrongShape { expected: "object", .. })
        ));
    }

    #[test]
    fn test_modes_contains() {
        assert!(AccessModes::READ_WRITE.contains(AccessModes::READ));
        assert!(!AccessModes::READ.contains(AccessModes::WRITE));
        assert!(AccessModes::READ.contains(AccessModes::NONE));
    }
}
