//! Model type registry.
//!
//! A [`ModelType`] describes one kind of model object: its name, optional
//! supertype, whether it can be instantiated, and the properties it declares.
//! Templates resolve accessors from these declarations at build time, so a
//! missing or badly shaped property is a configuration error rather than a
//! runtime surprise.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::access::AccessModes;
use crate::model::object::ObjectRef;
use crate::model::value::{DataType, ScalarKind, Value};

/// Getter for a computed property.
pub type Getter = Arc<dyn Fn(&ObjectRef) -> Value + Send + Sync>;

/// Setter for a computed property.
pub type Setter = Arc<dyn Fn(&ObjectRef, Value) + Send + Sync>;

/// How a property is stored.
#[derive(Clone)]
pub enum Storage {
    /// A plain field in the object's field table.
    Field,
    /// A property computed by closures, bean style.
    Computed {
        getter: Option<Getter>,
        setter: Option<Setter>,
    },
}

/// A property declared by a model type.
#[derive(Clone)]
pub struct PropertyDecl {
    name: Arc<str>,
    data_type: DataType,
    modes: AccessModes,
    storage: Storage,
}

impl PropertyDecl {
    /// Declares a read-write field.
    pub fn field(name: &str, data_type: DataType) -> Self {
        Self {
            name: Arc::from(name),
            data_type,
            modes: AccessModes::READ_WRITE,
            storage: Storage::Field,
        }
    }

    /// Declares a computed property. Supported modes follow from which of the
    /// getter and setter are present.
    pub fn computed(
        name: &str,
        data_type: DataType,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Self {
        let modes = AccessModes::new(getter.is_some(), setter.is_some());
        Self {
            name: Arc::from(name),
            data_type,
            modes,
            storage: Storage::Computed { getter, setter },
        }
    }

    /// Restricts the modes a field supports.
    pub fn with_modes(mut self, modes: AccessModes) -> Self {
        self.modes = modes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn modes(&self) -> AccessModes {
        self.modes
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_field(&self) -> bool {
        matches!(self.storage, Storage::Field)
    }
}

impl fmt::Debug for PropertyDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDecl")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("modes", &self.modes)
            .field("computed", &!self.is_field())
            .finish()
    }
}

struct TypeInfo {
    name: Arc<str>,
    supertype: Option<ModelType>,
    is_abstract: bool,
    properties: Vec<PropertyDecl>,
}

/// Shared, immutable description of a model type.
///
/// Types are compared by name; names are expected to be unique within one
/// model.
#[derive(Clone)]
pub struct ModelType(Arc<TypeInfo>);

impl ModelType {
    pub fn builder(name: &str) -> TypeBuilder {
        TypeBuilder {
            name: Arc::from(name),
            supertype: None,
            is_abstract: false,
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn supertype(&self) -> Option<&ModelType> {
        self.0.supertype.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract
    }

    /// Returns true if `self` is `other` or (transitively) extends it.
    pub fn is_subtype_of(&self, other: &ModelType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == other {
                return true;
            }
            current = ty.supertype();
        }
        false
    }

    /// Looks up a property, searching supertypes after this type's own
    /// declarations.
    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        let mut current = Some(self);
        while let Some(ty) = current {
            if let Some(decl) = ty.0.properties.iter().find(|p| p.name() == name) {
                return Some(decl);
            }
            current = ty.supertype();
        }
        None
    }

    /// All properties visible on this type, inherited ones included.
    /// Properties redeclared by a subtype shadow the inherited declaration.
    pub fn properties(&self) -> Vec<&PropertyDecl> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            chain.push(ty);
            current = ty.supertype();
        }
        let mut out: Vec<&PropertyDecl> = Vec::new();
        for ty in chain.into_iter().rev() {
            for decl in &ty.0.properties {
                match out.iter().position(|p| p.name() == decl.name()) {
                    Some(index) => out[index] = decl,
                    None => out.push(decl),
                }
            }
        }
        out
    }

    /// Names of this type and its supertypes, most specific first.
    pub fn lineage(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            names.push(ty.name());
            current = ty.supertype();
        }
        names
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelType({})", self.0.name)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Builder for [`ModelType`].
pub struct TypeBuilder {
    name: Arc<str>,
    supertype: Option<ModelType>,
    is_abstract: bool,
    properties: Vec<PropertyDecl>,
}

impl TypeBuilder {
    /// Sets the supertype.
    pub fn extends(mut self, supertype: &ModelType) -> Self {
        self.supertype = Some(supertype.clone());
        self
    }

    /// Marks the type abstract: the default object factory refuses to
    /// instantiate it.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Adds an arbitrary property declaration.
    pub fn property(mut self, decl: PropertyDecl) -> Self {
        self.properties.push(decl);
        self
    }

    pub fn scalar(self, name: &str, kind: ScalarKind) -> Self {
        self.property(PropertyDecl::field(name, DataType::Scalar(kind)))
    }

    pub fn object(self, name: &str) -> Self {
        self.property(PropertyDecl::field(name, DataType::Object))
    }

    pub fn list(self, name: &str) -> Self {
        self.property(PropertyDecl::field(name, DataType::List))
    }

    pub fn set(self, name: &str) -> Self {
        self.property(PropertyDecl::field(name, DataType::Set))
    }

    pub fn array(self, name: &str) -> Self {
        self.property(PropertyDecl::field(name, DataType::Array))
    }

    pub fn map(self, name: &str, key_kind: ScalarKind) -> Self {
        self.property(PropertyDecl::field(name, DataType::Map(key_kind)))
    }

    /// Adds a field with no declared shape.
    pub fn any(self, name: &str) -> Self {
        self.property(PropertyDecl::field(name, DataType::Any))
    }

    /// Adds a read-only field.
    pub fn read_only(self, name: &str, data_type: DataType) -> Self {
        self.property(PropertyDecl::field(name, data_type).with_modes(AccessModes::READ))
    }

    /// Adds a computed property backed by closures.
    pub fn computed<G, S>(self, name: &str, data_type: DataType, getter: G, setter: Option<S>) -> Self
    where
        G: Fn(&ObjectRef) -> Value + Send + Sync + 'static,
        S: Fn(&ObjectRef, Value) + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(getter);
        let setter = setter.map(|s| Arc::new(s) as Setter);
        self.property(PropertyDecl::computed(name, data_type, Some(getter), setter))
    }

    pub fn build(self) -> ModelType {
        ModelType(Arc::new(TypeInfo {
            name: self.name,
            supertype: self.supertype,
            is_abstract: self.is_abstract,
            properties: self.properties,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_chain() {
        let animal = ModelType::builder("Animal")
            .abstract_type()
            .scalar("name", ScalarKind::String)
            .build();
        let dog = ModelType::builder("Dog")
            .extends(&animal)
            .scalar("breed", ScalarKind::String)
            .build();
        assert!(dog.is_subtype_of(&animal));
        assert!(!animal.is_subtype_of(&dog));
        assert!(dog.property("name").is_some());
        assert_eq!(dog.properties().len(), 2);
        assert_eq!(dog.lineage(), vec!["Dog", "Animal"]);
    }

    #[test]
    fn test_computed_modes() {
        let ty = ModelType::builder("T")
            .computed(
                "upper",
                DataType::Scalar(ScalarKind::String),
                |o: &ObjectRef| Value::from(o.scalar("name").to_string().to_uppercase()),
                None::<fn(&ObjectRef, Value)>,
            )
            .build();
        let decl = ty.property("upper").unwrap();
        assert!(decl.modes().can_read());
        assert!(!decl.modes().can_write());
    }

    #[test]
    fn test_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelType>();
    }
}
