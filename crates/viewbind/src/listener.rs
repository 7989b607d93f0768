//! Listener hooks.
//!
//! Listeners registered on a [`ViewContext`](crate::ViewContext) observe both
//! traversal directions. Every hook has a default, so an implementation only
//! overrides what it needs.

use std::cell::Cell;

use crate::model::{ModelType, ObjectRef, Scalar, Value};
use crate::template::Node;

/// A node about to be (or just) visited.
#[derive(Debug, Clone, Copy)]
pub struct NodeEvent<'a> {
    pub node: &'a Node,
    /// View path of the node, e.g. `/items/0/sku`.
    pub path: &'a str,
    /// Model the node reads from (generation) or writes to (application).
    pub model: &'a Value,
}

/// A model object created or discarded during reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct EntityEvent<'a> {
    pub path: &'a str,
    pub model_type: &'a ModelType,
    pub entity: &'a ObjectRef,
}

/// A scalar crossing between model and view.
#[derive(Debug, Clone, Copy)]
pub struct ValueEvent<'a> {
    pub node: &'a Node,
    pub path: &'a str,
}

/// Observer of generation and application.
pub trait ViewListener {
    /// Returns false to skip `event.node` entirely. A skipped node
    /// contributes no events and receives none.
    fn should_visit_node(&self, _event: &NodeEvent<'_>) -> bool {
        true
    }

    fn node_visited(&self, _event: &NodeEvent<'_>) {}

    fn entity_created(&self, _event: &EntityEvent<'_>) {}

    fn entity_discarded(&self, _event: &EntityEvent<'_>) {}

    /// Transforms a scalar read from the model before it is emitted.
    fn did_extract_value(&self, _event: &ValueEvent<'_>, value: Scalar) -> Scalar {
        value
    }

    /// Transforms a scalar read from the view before it is staged.
    /// Returning `None` leaves the target property unchanged.
    fn will_inject_value(&self, _event: &ValueEvent<'_>, value: Scalar) -> Option<Scalar> {
        Some(value)
    }
}

/// Counts created and discarded entities.
#[derive(Debug, Default)]
pub struct EntityCounter {
    created: Cell<usize>,
    discarded: Cell<usize>,
}

impl EntityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn discarded(&self) -> usize {
        self.discarded.get()
    }

    pub fn reset(&self) {
        self.created.set(0);
        self.discarded.set(0);
    }
}

impl ViewListener for EntityCounter {
    fn entity_created(&self, _event: &EntityEvent<'_>) {
        self.created.set(self.created.get() + 1);
    }

    fn entity_discarded(&self, _event: &EntityEvent<'_>) {
        self.discarded.set(self.discarded.get() + 1);
    }
}
