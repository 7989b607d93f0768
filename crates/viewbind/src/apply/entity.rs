//! View entity staging.
//!
//! While the events of one object are read, their decoded values are
//! collected into a [`ViewEntity`]. Only once the whole object has been read
//! is the entity injected into a model instance. Injection takes the entity
//! by value, so each one is consumed exactly once.

use std::sync::Arc;

use crate::event::View;
use crate::model::{ModelType, Scalar};

/// A decoded value waiting to be injected.
#[derive(Debug, Clone, PartialEq)]
pub enum Staged {
    /// A scalar, already converted to its model form.
    Value(Scalar),
    /// A nested object.
    Entity(ViewEntity),
    /// An explicit null for an object- or collection-shaped property.
    Null,
    /// Leave the property as it is.
    Unchanged,
    /// Elements of an array, in view order.
    Elements(Vec<Staged>),
    /// Entries of a map, in view order.
    Entries(Vec<(Scalar, Staged)>),
    /// Value of a META event.
    Meta(Scalar),
    /// Events claimed by a splice node.
    Spliced(View),
}

impl Staged {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Staged::Value(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&ViewEntity> {
        match self {
            Staged::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Short name used in diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Staged::Value(_) => "value",
            Staged::Entity(_) => "object",
            Staged::Null => "null",
            Staged::Unchanged => "unchanged",
            Staged::Elements(_) => "array",
            Staged::Entries(_) => "map",
            Staged::Meta(_) => "meta",
            Staged::Spliced(_) => "splice",
        }
    }
}

/// Property bag for one object being applied.
///
/// The type starts as the type declared by the template and is narrowed when
/// a discriminator is read.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEntity {
    model_type: ModelType,
    properties: Vec<(Arc<str>, Staged)>,
}

impl ViewEntity {
    pub fn new(model_type: &ModelType) -> Self {
        Self {
            model_type: model_type.clone(),
            properties: Vec::new(),
        }
    }

    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    pub(crate) fn set_model_type(&mut self, model_type: ModelType) {
        self.model_type = model_type;
    }

    /// Stages a property. A later value for the same name replaces an
    /// earlier one.
    pub fn put(&mut self, name: Arc<str>, value: Staged) {
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Staged> {
        self.properties
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v)
    }

    /// Staged scalar for `name`, if the property was staged as a value.
    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name).and_then(Staged::as_scalar)
    }

    /// Removes and returns the staged value for `name`.
    pub fn take(&mut self, name: &str) -> Option<Staged> {
        let index = self.properties.iter().position(|(n, _)| &**n == name)?;
        Some(self.properties.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| &**n)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_replaces_and_take_consumes() {
        let ty = ModelType::builder("Item").build();
        let mut entity = ViewEntity::new(&ty);
        entity.put(Arc::from("sku"), Staged::Value(Scalar::from("A")));
        entity.put(Arc::from("sku"), Staged::Value(Scalar::from("B")));
        assert_eq!(entity.len(), 1);
        assert_eq!(entity.scalar("sku"), Some(&Scalar::from("B")));
        assert!(entity.take("sku").is_some());
        assert!(entity.take("sku").is_none());
        assert!(entity.is_empty());
    }
}
