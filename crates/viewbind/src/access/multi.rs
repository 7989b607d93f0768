//! Multi-valued accessors.
//!
//! A [`MultiValuedAccessor`] wraps the plain accessor of a collection-shaped
//! property and exposes element-level operations on it. The operations a
//! shape supports are advertised through its [`Capability`]; the rest return
//! [`AccessError::Unsupported`].

use std::fmt;

use crate::access::{AccessModes, AccessorRef};
use crate::error::AccessError;
use crate::model::{ListRef, MapRef, Scalar, SetRef, Value};

/// Which family of element operations an accessor provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Index-based access (lists, fixed arrays).
    Ordered,
    /// Membership only (sets).
    Unordered,
    /// Key-based access (maps).
    Keyed,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Ordered => "ordered",
            Capability::Unordered => "unordered",
            Capability::Keyed => "keyed",
        };
        f.write_str(s)
    }
}

fn unsupported<T>(name: &str, operation: &'static str) -> Result<T, AccessError> {
    Err(AccessError::Unsupported {
        property: name.to_string(),
        operation,
    })
}

/// Element-level access to a collection-shaped property.
///
/// Every method takes the owner of the property, not the collection itself:
/// the collection is obtained through the wrapped accessor, and created on
/// first mutation if the property is null.
pub trait MultiValuedAccessor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn capability(&self) -> Capability;

    /// Modes of the underlying property accessor.
    fn modes(&self) -> AccessModes;

    /// Elements in iteration order. For maps, the entry values.
    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError>;

    fn size(&self, owner: &Value) -> Result<usize, AccessError> {
        Ok(self.iterate(owner)?.len())
    }

    fn add(&self, owner: &Value, value: Value) -> Result<(), AccessError>;

    /// Removes the first element that is the same as `value`.
    fn remove(&self, owner: &Value, value: &Value) -> Result<bool, AccessError>;

    fn clear(&self, owner: &Value) -> Result<(), AccessError>;

    fn get_at(&self, _owner: &Value, _index: usize) -> Result<Value, AccessError> {
        unsupported(self.name(), "indexed get")
    }

    fn set_at(&self, _owner: &Value, _index: usize, _value: Value) -> Result<(), AccessError> {
        unsupported(self.name(), "indexed set")
    }

    fn insert_at(&self, _owner: &Value, _index: usize, _value: Value) -> Result<(), AccessError> {
        unsupported(self.name(), "indexed insert")
    }

    fn remove_at(&self, _owner: &Value, _index: usize) -> Result<Value, AccessError> {
        unsupported(self.name(), "indexed remove")
    }

    fn index_of(&self, owner: &Value, value: &Value) -> Result<Option<usize>, AccessError> {
        Ok(self.iterate(owner)?.iter().position(|v| v.is_same(value)))
    }

    fn entries(&self, _owner: &Value) -> Result<Vec<(Scalar, Value)>, AccessError> {
        unsupported(self.name(), "entry iteration")
    }

    fn get_key(&self, _owner: &Value, _key: &Scalar) -> Result<Option<Value>, AccessError> {
        unsupported(self.name(), "keyed get")
    }

    fn put(&self, _owner: &Value, _key: Scalar, _value: Value) -> Result<Option<Value>, AccessError> {
        unsupported(self.name(), "keyed put")
    }

    fn remove_key(&self, _owner: &Value, _key: &Scalar) -> Result<Option<Value>, AccessError> {
        unsupported(self.name(), "keyed remove")
    }
}

fn wrong_shape(name: &str, expected: &'static str, found: &Value) -> AccessError {
    AccessError::WrongShape {
        property: name.to_string(),
        expected,
        found: found.shape_name(),
    }
}

fn check_index(name: &str, index: usize, size: usize) -> Result<(), AccessError> {
    if index < size {
        Ok(())
    } else {
        Err(AccessError::IndexOutOfBounds {
            property: name.to_string(),
            index,
            size,
        })
    }
}

// =============================================================================
// LISTS
// =============================================================================

/// Ordered access to a shared list property.
#[derive(Debug, Clone)]
pub struct ListAccessor {
    delegate: AccessorRef,
}

impl ListAccessor {
    pub fn new(delegate: AccessorRef) -> Self {
        Self { delegate }
    }

    fn read(&self, owner: &Value) -> Result<Option<ListRef>, AccessError> {
        match self.delegate.get(owner)? {
            Value::List(list) => Ok(Some(list)),
            v if v.is_null() => Ok(None),
            other => Err(wrong_shape(self.name(), "list", &other)),
        }
    }

    /// Returns the live list, creating and attaching an empty one if the
    /// property is null.
    fn write(&self, owner: &Value) -> Result<ListRef, AccessError> {
        if let Some(list) = self.read(owner)? {
            return Ok(list);
        }
        let list = ListRef::new();
        self.delegate.set(owner, Value::List(list.clone()))?;
        Ok(list)
    }
}

impl MultiValuedAccessor for ListAccessor {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn capability(&self) -> Capability {
        Capability::Ordered
    }

    fn modes(&self) -> AccessModes {
        self.delegate.modes()
    }

    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError> {
        Ok(self.read(owner)?.map(|l| l.snapshot()).unwrap_or_default())
    }

    fn size(&self, owner: &Value) -> Result<usize, AccessError> {
        Ok(self.read(owner)?.map_or(0, |l| l.len()))
    }

    fn add(&self, owner: &Value, value: Value) -> Result<(), AccessError> {
        self.write(owner)?.push(value);
        Ok(())
    }

    fn remove(&self, owner: &Value, value: &Value) -> Result<bool, AccessError> {
        let Some(list) = self.read(owner)? else {
            return Ok(false);
        };
        match list.snapshot().iter().position(|v| v.is_same(value)) {
            Some(index) => {
                list.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&self, owner: &Value) -> Result<(), AccessError> {
        if let Some(list) = self.read(owner)? {
            list.clear();
        }
        Ok(())
    }

    fn get_at(&self, owner: &Value, index: usize) -> Result<Value, AccessError> {
        let list = self.read(owner)?.unwrap_or_default();
        list.get(index).ok_or_else(|| AccessError::IndexOutOfBounds {
            property: self.name().to_string(),
            index,
            size: list.len(),
        })
    }

    fn set_at(&self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError> {
        let list = self.write(owner)?;
        check_index(self.name(), index, list.len())?;
        list.replace(index, value);
        Ok(())
    }

    fn insert_at(&self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError> {
        let list = self.write(owner)?;
        check_index(self.name(), index, list.len() + 1)?;
        list.insert(index, value);
        Ok(())
    }

    fn remove_at(&self, owner: &Value, index: usize) -> Result<Value, AccessError> {
        let list = self.write(owner)?;
        check_index(self.name(), index, list.len())?;
        Ok(list.remove(index))
    }
}

// =============================================================================
// FIXED ARRAYS
// =============================================================================

/// Ordered access to an array property stored by value.
///
/// Arrays cannot grow in place: every mutation copies the current elements,
/// edits the copy and writes it back through the delegate.
#[derive(Debug, Clone)]
pub struct ArrayAccessor {
    delegate: AccessorRef,
}

impl ArrayAccessor {
    pub fn new(delegate: AccessorRef) -> Self {
        Self { delegate }
    }

    fn read(&self, owner: &Value) -> Result<Vec<Value>, AccessError> {
        match self.delegate.get(owner)? {
            Value::Array(values) => Ok(values),
            v if v.is_null() => Ok(Vec::new()),
            other => Err(wrong_shape(self.name(), "array", &other)),
        }
    }

    fn modify<T>(
        &self,
        owner: &Value,
        edit: impl FnOnce(&mut Vec<Value>) -> Result<T, AccessError>,
    ) -> Result<T, AccessError> {
        let mut values = self.read(owner)?;
        let out = edit(&mut values)?;
        self.delegate.set(owner, Value::Array(values))?;
        Ok(out)
    }
}

impl MultiValuedAccessor for ArrayAccessor {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn capability(&self) -> Capability {
        Capability::Ordered
    }

    fn modes(&self) -> AccessModes {
        self.delegate.modes()
    }

    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError> {
        self.read(owner)
    }

    fn add(&self, owner: &Value, value: Value) -> Result<(), AccessError> {
        self.modify(owner, |values| {
            values.push(value);
            Ok(())
        })
    }

    fn remove(&self, owner: &Value, value: &Value) -> Result<bool, AccessError> {
        self.modify(owner, |values| match values.iter().position(|v| v.is_same(value)) {
            Some(index) => {
                values.remove(index);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn clear(&self, owner: &Value) -> Result<(), AccessError> {
        self.modify(owner, |values| {
            values.clear();
            Ok(())
        })
    }

    fn get_at(&self, owner: &Value, index: usize) -> Result<Value, AccessError> {
        let values = self.read(owner)?;
        check_index(self.name(), index, values.len())?;
        Ok(values[index].clone())
    }

    fn set_at(&self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError> {
        let name = self.name();
        self.modify(owner, |values| {
            check_index(name, index, values.len())?;
            values[index] = value;
            Ok(())
        })
    }

    fn insert_at(&self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError> {
        let name = self.name();
        self.modify(owner, |values| {
            check_index(name, index, values.len() + 1)?;
            values.insert(index, value);
            Ok(())
        })
    }

    fn remove_at(&self, owner: &Value, index: usize) -> Result<Value, AccessError> {
        let name = self.name();
        self.modify(owner, |values| {
            check_index(name, index, values.len())?;
            Ok(values.remove(index))
        })
    }
}

// =============================================================================
// SETS
// =============================================================================

/// Unordered access to a shared set property.
#[derive(Debug, Clone)]
pub struct SetAccessor {
    delegate: AccessorRef,
}

impl SetAccessor {
    pub fn new(delegate: AccessorRef) -> Self {
        Self { delegate }
    }

    fn read(&self, owner: &Value) -> Result<Option<SetRef>, AccessError> {
        match self.delegate.get(owner)? {
            Value::Set(set) => Ok(Some(set)),
            v if v.is_null() => Ok(None),
            other => Err(wrong_shape(self.name(), "set", &other)),
        }
    }

    fn write(&self, owner: &Value) -> Result<SetRef, AccessError> {
        if let Some(set) = self.read(owner)? {
            return Ok(set);
        }
        let set = SetRef::new();
        self.delegate.set(owner, Value::Set(set.clone()))?;
        Ok(set)
    }
}

impl MultiValuedAccessor for SetAccessor {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn capability(&self) -> Capability {
        Capability::Unordered
    }

    fn modes(&self) -> AccessModes {
        self.delegate.modes()
    }

    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError> {
        Ok(self.read(owner)?.map(|s| s.snapshot()).unwrap_or_default())
    }

    fn add(&self, owner: &Value, value: Value) -> Result<(), AccessError> {
        self.write(owner)?.insert(value);
        Ok(())
    }

    fn remove(&self, owner: &Value, value: &Value) -> Result<bool, AccessError> {
        Ok(self.read(owner)?.is_some_and(|s| s.remove(value)))
    }

    fn clear(&self, owner: &Value) -> Result<(), AccessError> {
        if let Some(set) = self.read(owner)? {
            set.clear();
        }
        Ok(())
    }
}

// =============================================================================
// MAPS
// =============================================================================

/// Keyed access to a shared map property.
#[derive(Debug, Clone)]
pub struct MapAccessor {
    delegate: AccessorRef,
}

impl MapAccessor {
    pub fn new(delegate: AccessorRef) -> Self {
        Self { delegate }
    }

    fn read(&self, owner: &Value) -> Result<Option<MapRef>, AccessError> {
        match self.delegate.get(owner)? {
            Value::Map(map) => Ok(Some(map)),
            v if v.is_null() => Ok(None),
            other => Err(wrong_shape(self.name(), "map", &other)),
        }
    }

    fn write(&self, owner: &Value) -> Result<MapRef, AccessError> {
        if let Some(map) = self.read(owner)? {
            return Ok(map);
        }
        let map = MapRef::new();
        self.delegate.set(owner, Value::Map(map.clone()))?;
        Ok(map)
    }
}

impl MultiValuedAccessor for MapAccessor {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn capability(&self) -> Capability {
        Capability::Keyed
    }

    fn modes(&self) -> AccessModes {
        self.delegate.modes()
    }

    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError> {
        Ok(self.entries(owner)?.into_iter().map(|(_, v)| v).collect())
    }

    fn size(&self, owner: &Value) -> Result<usize, AccessError> {
        Ok(self.read(owner)?.map_or(0, |m| m.len()))
    }

    fn add(&self, _owner: &Value, _value: Value) -> Result<(), AccessError> {
        unsupported(self.name(), "add without key")
    }

    fn remove(&self, owner: &Value, value: &Value) -> Result<bool, AccessError> {
        let Some(map) = self.read(owner)? else {
            return Ok(false);
        };
        match map.entries().into_iter().find(|(_, v)| v.is_same(value)) {
            Some((key, _)) => Ok(map.remove(&key).is_some()),
            None => Ok(false),
        }
    }

    fn clear(&self, owner: &Value) -> Result<(), AccessError> {
        if let Some(map) = self.read(owner)? {
            map.clear();
        }
        Ok(())
    }

    fn entries(&self, owner: &Value) -> Result<Vec<(Scalar, Value)>, AccessError> {
        Ok(self.read(owner)?.map(|m| m.entries()).unwrap_or_default())
    }

    fn get_key(&self, owner: &Value, key: &Scalar) -> Result<Option<Value>, AccessError> {
        Ok(self.read(owner)?.and_then(|m| m.get(key)))
    }

    fn put(&self, owner: &Value, key: Scalar, value: Value) -> Result<Option<Value>, AccessError> {
        Ok(self.write(owner)?.insert(key, value))
    }

    fn remove_key(&self, owner: &Value, key: &Scalar) -> Result<Option<Value>, AccessError> {
        Ok(self.read(owner)?.and_then(|m| m.remove(key)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::access::{AccessorFactory, DeclaredAccessorFactory};
    use crate::model::{ModelType, ObjectRef, ScalarKind};

    fn holder() -> ModelType {
        ModelType::builder("Holder")
            .list("list")
            .set("set")
            .array("array")
            .map("map", ScalarKind::String)
            .build()
    }

    fn accessor(ty: &ModelType, name: &str) -> AccessorRef {
        DeclaredAccessorFactory.accessor(ty, name).unwrap()
    }

    #[test]
    fn test_list_indexed_operations() {
        let ty = holder();
        let owner = Value::Object(ObjectRef::new(&ty));
        let list = ListAccessor::new(accessor(&ty, "list"));
        list.add(&owner, Value::from("a")).unwrap();
        list.add(&owner, Value::from("c")).unwrap();
        list.insert_at(&owner, 1, Value::from("b")).unwrap();
        assert_eq!(list.size(&owner).unwrap(), 3);
        assert_eq!(list.get_at(&owner, 1).unwrap(), Value::from("b"));
        assert_eq!(list.index_of(&owner, &Value::from("c")).unwrap(), Some(2));
        assert_eq!(list.remove_at(&owner, 0).unwrap(), Value::from("a"));
        assert!(matches!(
            list.get_at(&owner, 5),
            Err(AccessError::IndexOutOfBounds { index: 5, size: 2, .. })
        ));
    }

    #[test]
    fn test_list_created_on_first_write() {
        let ty = holder();
        let obj = ObjectRef::new(&ty);
        obj.set("list", Value::NULL);
        let owner = Value::Object(obj.clone());
        let list = ListAccessor::new(accessor(&ty, "list"));
        assert_eq!(list.size(&owner).unwrap(), 0);
        list.add(&owner, Value::from(1)).unwrap();
        assert!(matches!(obj.get("list"), Value::List(ref l) if l.len() == 1));
    }

    #[test]
    fn test_array_writes_back_copy() {
        let ty = holder();
        let obj = ObjectRef::new(&ty);
        let owner = Value::Object(obj.clone());
        let array = ArrayAccessor::new(accessor(&ty, "array"));
        array.add(&owner, Value::from(1)).unwrap();
        array.add(&owner, Value::from(3)).unwrap();
        array.insert_at(&owner, 1, Value::from(2)).unwrap();
        assert_eq!(
            obj.get("array"),
            Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)])
        );
        array.set_at(&owner, 0, Value::from(0)).unwrap();
        assert_eq!(array.get_at(&owner, 0).unwrap(), Value::from(0));
    }

    #[test]
    fn test_set_has_no_index() {
        let ty = holder();
        let owner = Value::Object(ObjectRef::new(&ty));
        let set = SetAccessor::new(accessor(&ty, "set"));
        set.add(&owner, Value::from("x")).unwrap();
        set.add(&owner, Value::from("x")).unwrap();
        assert_eq!(set.size(&owner).unwrap(), 1);
        assert_eq!(set.capability(), Capability::Unordered);
        assert!(matches!(
            set.get_at(&owner, 0),
            Err(AccessError::Unsupported { operation: "indexed get", .. })
        ));
        assert!(set.remove(&owner, &Value::from("x")).unwrap());
    }

    #[test]
    fn test_map_keyed_operations() {
        let ty = holder();
        let owner = Value::Object(ObjectRef::new(&ty));
        let map = MapAccessor::new(accessor(&ty, "map"));
        assert_eq!(map.put(&owner, Scalar::from("a"), Value::from(1)).unwrap(), None);
        map.put(&owner, Scalar::from("b"), Value::from(2)).unwrap();
        assert_eq!(map.get_key(&owner, &Scalar::from("b")).unwrap(), Some(Value::from(2)));
        assert_eq!(map.iterate(&owner).unwrap(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(map.remove_key(&owner, &Scalar::from("a")).unwrap(), Some(Value::from(1)));
        assert_eq!(map.size(&owner).unwrap(), 1);
        assert!(map.add(&owner, Value::from(3)).is_err());
    }

    #[test]
    fn test_wrong_shape_reported() {
        let ty = holder();
        let obj = ObjectRef::new(&ty).with("list", 5);
        let list = ListAccessor::new(Arc::clone(&accessor(&ty, "list")));
        assert!(matches!(
            list.iterate(&Value::Object(obj)),
            Err(AccessError::WrongShape { expected: "list", found: "scalar", .. })
        ));
    }
}
