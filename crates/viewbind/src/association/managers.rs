//! Default managers, derived from a node's accessors.

use std::sync::Arc;

use crate::access::{AccessorRef, MultiValuedAccessor};
use crate::apply::ViewEntity;
use crate::association::{
    AssociationManager, Identity, IndexedManager, KeyedManager, ToOneManager, UnorderedManager,
};
use crate::error::AccessError;
use crate::model::{ObjectRef, Scalar, Value};

/// To-one manager over a plain object-valued accessor.
#[derive(Debug, Clone)]
pub struct AccessorToOneManager {
    accessor: AccessorRef,
    identity: Identity,
}

impl AccessorToOneManager {
    pub fn new(accessor: AccessorRef, identity: Identity) -> Self {
        Self { accessor, identity }
    }
}

impl AssociationManager for AccessorToOneManager {
    fn is_same_associate(&self, live: &ObjectRef, staged: &ViewEntity) -> bool {
        self.identity.matches(live, staged, true)
    }
}

impl ToOneManager for AccessorToOneManager {
    fn get(&self, owner: &Value) -> Result<Option<ObjectRef>, AccessError> {
        match self.accessor.get(owner)? {
            Value::Object(object) => Ok(Some(object)),
            v if v.is_null() => Ok(None),
            other => Err(AccessError::WrongShape {
                property: self.accessor.name().to_string(),
                expected: "object",
                found: other.shape_name(),
            }),
        }
    }

    fn set(&mut self, owner: &Value, associate: Option<ObjectRef>) -> Result<(), AccessError> {
        self.accessor
            .set(owner, associate.map_or(Value::NULL, Value::Object))
    }
}

/// Indexed manager over an ordered multi-valued accessor.
#[derive(Debug, Clone)]
pub struct AccessorIndexedManager {
    multi: Arc<dyn MultiValuedAccessor>,
    identity: Identity,
}

impl AccessorIndexedManager {
    pub fn new(multi: Arc<dyn MultiValuedAccessor>, identity: Identity) -> Self {
        Self { multi, identity }
    }
}

impl AssociationManager for AccessorIndexedManager {
    fn is_same_associate(&self, live: &ObjectRef, staged: &ViewEntity) -> bool {
        self.identity.matches(live, staged, false)
    }
}

impl IndexedManager for AccessorIndexedManager {
    fn size(&self, owner: &Value) -> Result<usize, AccessError> {
        self.multi.size(owner)
    }

    fn get(&self, owner: &Value, index: usize) -> Result<Value, AccessError> {
        self.multi.get_at(owner, index)
    }

    fn add(&mut self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError> {
        self.multi.insert_at(owner, index, value)
    }

    fn remove(&mut self, owner: &Value, index: usize) -> Result<Value, AccessError> {
        self.multi.remove_at(owner, index)
    }

    fn index_of(&self, owner: &Value, value: &Value) -> Result<Option<usize>, AccessError> {
        self.multi.index_of(owner, value)
    }
}

/// Unordered manager over a set-like multi-valued accessor.
#[derive(Debug, Clone)]
pub struct AccessorUnorderedManager {
    multi: Arc<dyn MultiValuedAccessor>,
    identity: Identity,
}

impl AccessorUnorderedManager {
    pub fn new(multi: Arc<dyn MultiValuedAccessor>, identity: Identity) -> Self {
        Self { multi, identity }
    }
}

impl AssociationManager for AccessorUnorderedManager {
    fn is_same_associate(&self, live: &ObjectRef, staged: &ViewEntity) -> bool {
        self.identity.matches(live, staged, false)
    }
}

impl UnorderedManager for AccessorUnorderedManager {
    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError> {
        self.multi.iterate(owner)
    }

    fn add(&mut self, owner: &Value, value: Value) -> Result<(), AccessError> {
        self.multi.add(owner, value)
    }

    fn remove(&mut self, owner: &Value, value: &Value) -> Result<bool, AccessError> {
        self.multi.remove(owner, value)
    }
}

/// Keyed manager over a map accessor.
#[derive(Debug, Clone)]
pub struct AccessorKeyedManager {
    multi: Arc<dyn MultiValuedAccessor>,
    identity: Identity,
}

impl AccessorKeyedManager {
    pub fn new(multi: Arc<dyn MultiValuedAccessor>, identity: Identity) -> Self {
        Self { multi, identity }
    }
}

impl AssociationManager for AccessorKeyedManager {
    /// Entries are matched by key; the live value only has to be of a
    /// compatible type unless identity properties are declared.
    fn is_same_associate(&self, live: &ObjectRef, staged: &ViewEntity) -> bool {
        self.identity.matches(live, staged, true)
    }
}

impl KeyedManager for AccessorKeyedManager {
    fn entries(&self, owner: &Value) -> Result<Vec<(Scalar, Value)>, AccessError> {
        self.multi.entries(owner)
    }

    fn get(&self, owner: &Value, key: &Scalar) -> Result<Option<Value>, AccessError> {
        self.multi.get_key(owner, key)
    }

    fn put(&mut self, owner: &Value, key: Scalar, value: Value) -> Result<(), AccessError> {
        self.multi.put(owner, key, value).map(|_| ())
    }

    fn remove(&mut self, owner: &Value, key: &Scalar) -> Result<Option<Value>, AccessError> {
        self.multi.remove_key(owner, key)
    }
}
