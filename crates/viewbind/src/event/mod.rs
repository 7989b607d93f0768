//! View events.
//!
//! A view is an ordered, finite sequence of [`Event`]s. Structure is carried
//! by begin/end pairs of the same family (object or array); scalars travel
//! in VALUE, META and DISCRIMINATOR events.
//!
//! An object `Order{id, items:[{sku}]}` generates:
//! ```text
//! BEGIN_OBJECT
//! VALUE        id = 7
//! BEGIN_ARRAY  items
//! BEGIN_OBJECT
//! VALUE        sku = "A"
//! END_OBJECT
//! END_ARRAY
//! END_OBJECT
//! ```

pub mod stream;

use std::fmt;
use std::sync::Arc;

use crate::model::Scalar;

pub use stream::{ViewReader, ViewWriter};

/// Event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Value,
    Meta,
    Discriminator,
}

impl EventKind {
    pub fn is_begin(self) -> bool {
        matches!(self, EventKind::BeginObject | EventKind::BeginArray)
    }

    pub fn is_end(self) -> bool {
        matches!(self, EventKind::EndObject | EventKind::EndArray)
    }

    /// Returns the end event closing this begin event, or vice versa.
    pub fn complement(self) -> Option<EventKind> {
        match self {
            EventKind::BeginObject => Some(EventKind::EndObject),
            EventKind::EndObject => Some(EventKind::BeginObject),
            EventKind::BeginArray => Some(EventKind::EndArray),
            EventKind::EndArray => Some(EventKind::BeginArray),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::BeginObject => "BEGIN_OBJECT",
            EventKind::EndObject => "END_OBJECT",
            EventKind::BeginArray => "BEGIN_ARRAY",
            EventKind::EndArray => "END_ARRAY",
            EventKind::Value => "VALUE",
            EventKind::Meta => "META",
            EventKind::Discriminator => "DISCRIMINATOR",
        };
        f.write_str(s)
    }
}

/// A single view event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    name: Option<Arc<str>>,
    namespace: Option<Arc<str>>,
    value: Option<Scalar>,
}

impl Event {
    fn new(kind: EventKind, name: Option<Arc<str>>, value: Option<Scalar>) -> Self {
        Self {
            kind,
            name,
            namespace: None,
            value,
        }
    }

    pub fn begin_object(name: Option<&str>) -> Self {
        Self::new(EventKind::BeginObject, name.map(Arc::from), None)
    }

    pub fn end_object() -> Self {
        Self::new(EventKind::EndObject, None, None)
    }

    pub fn begin_array(name: Option<&str>) -> Self {
        Self::new(EventKind::BeginArray, name.map(Arc::from), None)
    }

    pub fn end_array() -> Self {
        Self::new(EventKind::EndArray, None, None)
    }

    /// A named VALUE event. Use [`Event::element`] inside arrays.
    pub fn value(name: &str, value: impl Into<Scalar>) -> Self {
        Self::new(EventKind::Value, Some(Arc::from(name)), Some(value.into()))
    }

    /// An anonymous VALUE event, as found in arrays of values.
    pub fn element(value: impl Into<Scalar>) -> Self {
        Self::new(EventKind::Value, None, Some(value.into()))
    }

    pub fn meta(name: &str, value: impl Into<Scalar>) -> Self {
        Self::new(EventKind::Meta, Some(Arc::from(name)), Some(value.into()))
    }

    pub fn discriminator(name: &str, value: impl Into<Scalar>) -> Self {
        Self::new(EventKind::Discriminator, Some(Arc::from(name)), Some(value.into()))
    }

    /// Builds an event from parts, sharing the name allocation.
    pub(crate) fn with_parts(
        kind: EventKind,
        name: Option<Arc<str>>,
        namespace: Option<Arc<str>>,
        value: Option<Scalar>,
    ) -> Self {
        Self {
            kind,
            name,
            namespace,
            value,
        }
    }

    /// Sets an explicit namespace.
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(Arc::from(namespace));
        self
    }

    /// Replaces the name, keeping everything else.
    pub fn renamed(mut self, name: Option<Arc<str>>) -> Self {
        self.name = name;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The explicit namespace, if any. See [`ViewReader::namespace`] for the
    /// inherited one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Scalar carried by VALUE, META and DISCRIMINATOR events.
    pub fn scalar(&self) -> Option<&Scalar> {
        self.value.as_ref()
    }

    /// True for a VALUE event carrying null.
    pub fn is_null_value(&self) -> bool {
        self.kind == EventKind::Value && matches!(self.value, Some(Scalar::Null) | None)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ns) = &self.namespace {
            write!(f, " {ns}:")?;
        } else if self.name.is_some() {
            f.write_str(" ")?;
        }
        if let Some(name) = &self.name {
            f.write_str(name)?;
        }
        if let Some(value) = &self.value {
            match value {
                Scalar::String(s) => write!(f, " = {s:?}")?,
                other => write!(f, " = {other}")?,
            }
        }
        Ok(())
    }
}

/// An owned, ordered sequence of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    events: Vec<Event>,
}

impl View {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Creates a reader with the given nesting limit.
    pub fn reader(&self, max_depth: usize) -> ViewReader<'_> {
        ViewReader::new(&self.events, max_depth)
    }
}

impl From<Vec<Event>> for View {
    fn from(events: Vec<Event>) -> Self {
        Self::new(events)
    }
}

impl FromIterator<Event> for View {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a View {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        for event in &self.events {
            if event.kind().is_end() {
                depth = depth.saturating_sub(1);
            }
            writeln!(f, "{:indent$}{event}", "", indent = depth * 2)?;
            if event.kind().is_begin() {
                depth += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement() {
        assert_eq!(EventKind::BeginObject.complement(), Some(EventKind::EndObject));
        assert_eq!(EventKind::EndArray.complement(), Some(EventKind::BeginArray));
        assert_eq!(EventKind::Value.complement(), None);
    }

    #[test]
    fn test_display_indents() {
        let view = View::new(vec![
            Event::begin_object(None),
            Event::value("sku", "A"),
            Event::end_object(),
        ]);
        let text = view.to_string();
        assert_eq!(text, "BEGIN_OBJECT\n  VALUE sku = \"A\"\nEND_OBJECT\n");
    }

    #[test]
    fn test_null_value() {
        assert!(Event::value("x", Scalar::Null).is_null_value());
        assert!(!Event::value("x", 1).is_null_value());
    }
}
