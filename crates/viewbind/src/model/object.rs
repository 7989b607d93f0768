//! Shared model objects and containers.
//!
//! A model graph is built from reference-counted handles so that the same
//! object can be reached from several places and compared by identity during
//! reconciliation. Handles are cheap to clone and are not thread-safe; a
//! model graph belongs to the call that walks it.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::types::ModelType;
use crate::model::value::{DataType, Scalar, Value};

/// Field storage of a model object.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    model_type: ModelType,
    fields: FxHashMap<String, Value>,
}

impl Object {
    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

thread_local! {
    /// Object pairs under comparison further up the stack.
    static COMPARING: RefCell<FxHashSet<(usize, usize)>> = RefCell::new(FxHashSet::default());
    /// Objects being formatted further up the stack.
    static PRINTING: RefCell<FxHashSet<usize>> = RefCell::new(FxHashSet::default());
}

/// Shared handle to a model object.
///
/// Equality is structural and `Debug` prints the fields. Both terminate on
/// cyclic graphs: a pair of objects reached again while it is already being
/// compared counts as equal, and an object reached again while it is being
/// printed is shown as `Type(<cycle>)`.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// Creates an instance of `model_type` with every declared field set to
    /// its empty value: null for scalars and objects, empty containers for
    /// collection shapes.
    pub fn new(model_type: &ModelType) -> Self {
        let mut fields = FxHashMap::default();
        for decl in model_type.properties() {
            if decl.is_field() {
                fields.insert(decl.name().to_string(), empty_value(decl.data_type()));
            }
        }
        Self(Rc::new(RefCell::new(Object {
            model_type: model_type.clone(),
            fields,
        })))
    }

    /// Builder-style field assignment, handy for constructing fixtures.
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn model_type(&self) -> ModelType {
        self.0.borrow().model_type.clone()
    }

    pub fn is_instance_of(&self, model_type: &ModelType) -> bool {
        self.0.borrow().model_type.is_subtype_of(model_type)
    }

    /// Reads a raw field. Missing fields read as null.
    pub fn get(&self, name: &str) -> Value {
        self.0.borrow().fields.get(name).cloned().unwrap_or(Value::NULL)
    }

    /// Writes a raw field.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut object = self.0.borrow_mut();
        match object.fields.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                object.fields.insert(name.to_string(), value);
            }
        }
    }

    /// Convenience read of a scalar field.
    pub fn scalar(&self, name: &str) -> Scalar {
        match self.get(name) {
            Value::Scalar(s) => s,
            _ => Scalar::Null,
        }
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let pair = (self.addr(), other.addr());
        if !COMPARING.with(|c| c.borrow_mut().insert(pair)) {
            return true;
        }
        let equal = match (self.0.try_borrow(), other.0.try_borrow()) {
            (Ok(a), Ok(b)) => *a == *b,
            _ => false,
        };
        COMPARING.with(|c| c.borrow_mut().remove(&pair));
        equal
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(object) = self.0.try_borrow() else {
            return f.write_str("ObjectRef(<borrowed>)");
        };
        let addr = self.addr();
        if !PRINTING.with(|p| p.borrow_mut().insert(addr)) {
            return write!(f, "{}(<cycle>)", object.model_type.name());
        }
        let mut names: Vec<&String> = object.fields.keys().collect();
        names.sort();
        let mut s = f.debug_struct(object.model_type.name());
        for name in names {
            s.field(name, &object.fields[name]);
        }
        let result = s.finish();
        PRINTING.with(|p| p.borrow_mut().remove(&addr));
        result
    }
}

fn empty_value(data_type: DataType) -> Value {
    match data_type {
        DataType::List => Value::List(ListRef::default()),
        DataType::Set => Value::Set(SetRef::default()),
        DataType::Array => Value::Array(Vec::new()),
        DataType::Map(_) => Value::Map(MapRef::default()),
        DataType::Scalar(_) | DataType::Object | DataType::Any => Value::NULL,
    }
}

/// Shared, ordered, growable collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRef(Rc<RefCell<Vec<Value>>>);

impl ListRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn insert(&self, index: usize, value: Value) {
        self.0.borrow_mut().insert(index, value);
    }

    pub fn remove(&self, index: usize) -> Value {
        self.0.borrow_mut().remove(index)
    }

    pub fn replace(&self, index: usize, value: Value) -> Value {
        std::mem::replace(&mut self.0.borrow_mut()[index], value)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Copies the current elements out.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<Value>> for ListRef {
    fn from(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }
}

/// Shared collection without meaningful order; equal elements are not
/// stored twice.
#[derive(Debug, Clone, Default)]
pub struct SetRef(Rc<RefCell<Vec<Value>>>);

impl SetRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.borrow().iter().any(|v| v.is_same(value))
    }

    /// Adds a value unless the same value is already present.
    pub fn insert(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.contains(&value) {
            return false;
        }
        self.0.borrow_mut().push(value);
        true
    }

    pub fn remove(&self, value: &Value) -> bool {
        let mut values = self.0.borrow_mut();
        match values.iter().position(|v| v.is_same(value)) {
            Some(index) => {
                values.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &SetRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SetRef {
    fn eq(&self, other: &Self) -> bool {
        let a = self.0.borrow();
        let b = other.0.borrow();
        a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x == y))
    }
}

impl From<Vec<Value>> for SetRef {
    fn from(values: Vec<Value>) -> Self {
        let set = SetRef::new();
        for value in values {
            set.insert(value);
        }
        set
    }
}

/// Shared keyed collection, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MapRef(Rc<RefCell<Vec<(Scalar, Value)>>>);

impl MapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, key: &Scalar) -> Option<Value> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Inserts or replaces the entry for `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<Scalar>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut entries = self.0.borrow_mut();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&self, key: &Scalar) -> Option<Value> {
        let mut entries = self.0.borrow_mut();
        let index = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(index).1)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn entries(&self) -> Vec<(Scalar, Value)> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for MapRef {
    fn eq(&self, other: &Self) -> bool {
        let a = self.0.borrow();
        let b = other.0.borrow();
        a.len() == b.len()
            && a
                .iter()
                .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
    }
}

impl From<Vec<(Scalar, Value)>> for MapRef {
    fn from(entries: Vec<(Scalar, Value)>) -> Self {
        let map = MapRef::new();
        for (k, v) in entries {
            map.insert(k, v);
        }
        map
    }
}
