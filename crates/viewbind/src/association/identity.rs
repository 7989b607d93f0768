//! Default "same associate" test.

use std::sync::Arc;

use crate::access::AccessorRef;
use crate::apply::ViewEntity;
use crate::model::{ObjectRef, Value};

/// One identity property: the view name it is staged under and the accessor
/// that reads it from a live object in the same form.
#[derive(Debug, Clone)]
pub struct IdentityKey {
    name: Arc<str>,
    accessor: AccessorRef,
}

impl IdentityKey {
    pub fn new(name: Arc<str>, accessor: AccessorRef) -> Self {
        Self { name, accessor }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Identity properties of an object-shaped template node.
///
/// A live object is the same associate as a staged entity when its type is
/// compatible with the entity's type and every identity property is staged
/// with a value equal to the live one. Without identity properties, a to-one
/// association matches on type alone and a to-many association never matches.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    keys: Vec<IdentityKey>,
}

impl Identity {
    pub fn new(keys: Vec<IdentityKey>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[IdentityKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matches(&self, live: &ObjectRef, staged: &ViewEntity, to_one: bool) -> bool {
        if !live.is_instance_of(staged.model_type()) {
            return false;
        }
        if self.keys.is_empty() {
            return to_one;
        }
        let owner = Value::Object(live.clone());
        self.keys.iter().all(|key| {
            let Some(expected) = staged.scalar(&key.name) else {
                return false;
            };
            match key.accessor.get(&owner) {
                Ok(Value::Scalar(actual)) => &actual == expected,
                _ => false,
            }
        })
    }
}
