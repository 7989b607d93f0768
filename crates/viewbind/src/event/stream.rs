//! Validating event stream reader and writer.
//!
//! Both sides track the stack of open containers so that an unmatched begin,
//! a mismatched end, or a stream that stops early is reported as a
//! [`StreamError`] at the point it happens.

use crate::error::StreamError;
use crate::event::{Event, EventKind, View};

// =============================================================================
// WRITING
// =============================================================================

/// Collects events into a [`View`], checking begin/end pairing.
#[derive(Debug, Clone)]
pub struct ViewWriter {
    events: Vec<Event>,
    open: Vec<EventKind>,
    max_depth: usize,
}

impl ViewWriter {
    pub fn new(max_depth: usize) -> Self {
        Self {
            events: Vec::new(),
            open: Vec::new(),
            max_depth,
        }
    }

    /// Appends an event.
    pub fn push(&mut self, event: Event) -> Result<(), StreamError> {
        let kind = event.kind();
        if kind.is_begin() {
            if self.open.len() >= self.max_depth {
                return Err(StreamError::DepthExceeded { max: self.max_depth });
            }
            self.open.push(kind);
        } else if kind.is_end() {
            match self.open.pop() {
                None => return Err(StreamError::UnmatchedEnd { found: kind }),
                Some(open) if open.complement() != Some(kind) => {
                    return Err(StreamError::MismatchedEnd { open, found: kind });
                }
                Some(_) => {}
            }
        }
        self.events.push(event);
        Ok(())
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Finishes the view. Fails if any container is still open.
    pub fn finish(self) -> Result<View, StreamError> {
        if !self.open.is_empty() {
            return Err(StreamError::Unterminated {
                open: self.open.len(),
            });
        }
        Ok(View::new(self.events))
    }
}

// =============================================================================
// READING
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Open<'a> {
    kind: EventKind,
    namespace: Option<&'a str>,
}

/// Cursor over a borrowed event slice.
///
/// Wraps the events and provides checked consumption with namespace
/// inheritance: an event without an explicit namespace inherits the one of
/// its nearest enclosing container that has one.
#[derive(Debug, Clone)]
pub struct ViewReader<'a> {
    events: &'a [Event],
    pos: usize,
    open: Vec<Open<'a>>,
    max_depth: usize,
}

impl<'a> ViewReader<'a> {
    pub fn new(events: &'a [Event], max_depth: usize) -> Self {
        Self {
            events,
            pos: 0,
            open: Vec::new(),
            max_depth,
        }
    }

    /// Returns the current position in the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns true if all events have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.events.len()
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Returns the next event without consuming it.
    pub fn peek(&self) -> Option<&'a Event> {
        self.events.get(self.pos)
    }

    /// Effective namespace of the innermost open container.
    pub fn namespace(&self) -> Option<&'a str> {
        self.open.last().and_then(|o| o.namespace)
    }

    /// Effective namespace of `event` if it were read at the current position.
    pub fn effective_namespace(&self, event: &'a Event) -> Option<&'a str> {
        event.namespace().or_else(|| self.namespace())
    }

    /// Consumes the next event.
    #[inline]
    pub fn next_event(&mut self, context: &'static str) -> Result<&'a Event, StreamError> {
        let Some(event) = self.events.get(self.pos) else {
            return Err(StreamError::UnexpectedEnd { context });
        };
        let kind = event.kind();
        if kind.is_begin() {
            if self.open.len() >= self.max_depth {
                return Err(StreamError::DepthExceeded { max: self.max_depth });
            }
            let namespace = self.effective_namespace(event);
            self.open.push(Open { kind, namespace });
        } else if kind.is_end() {
            match self.open.pop() {
                None => return Err(StreamError::UnmatchedEnd { found: kind }),
                Some(open) if open.kind.complement() != Some(kind) => {
                    return Err(StreamError::MismatchedEnd {
                        open: open.kind,
                        found: kind,
                    });
                }
                Some(_) => {}
            }
        }
        self.pos += 1;
        Ok(event)
    }

    /// Consumes the next event, requiring it to be of `kind`.
    pub fn expect(&mut self, kind: EventKind, expected: &'static str) -> Result<&'a Event, StreamError> {
        let event = self.next_event(expected)?;
        if event.kind() != kind {
            return Err(StreamError::UnexpectedEvent {
                expected,
                found: event.kind(),
            });
        }
        Ok(event)
    }

    /// Consumes the next event and, if it begins a container, everything up
    /// to and including the matching end.
    pub fn skip(&mut self, context: &'static str) -> Result<(), StreamError> {
        let start = self.open.len();
        let first = self.next_event(context)?;
        if first.kind().is_begin() {
            while self.open.len() > start {
                self.next_event(context)?;
            }
        }
        Ok(())
    }

    /// Like [`skip`](Self::skip), but returns the consumed events as a view.
    pub fn read_subtree(&mut self, context: &'static str) -> Result<View, StreamError> {
        let from = self.pos;
        self.skip(context)?;
        Ok(View::new(self.events[from..self.pos].to_vec()))
    }

    /// Checks that the stream is exhausted and balanced.
    pub fn finish(&self) -> Result<(), StreamError> {
        if !self.open.is_empty() {
            return Err(StreamError::Unterminated {
                open: self.open.len(),
            });
        }
        if self.pos < self.events.len() {
            return Err(StreamError::TrailingEvents {
                count: self.events.len() - self.pos,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_rejects_mismatched_end() {
        let mut writer = ViewWriter::new(8);
        writer.push(Event::begin_object(None)).unwrap();
        let err = writer.push(Event::end_array()).unwrap_err();
        assert_eq!(
            err,
            StreamError::MismatchedEnd {
                open: EventKind::BeginObject,
                found: EventKind::EndArray
            }
        );
    }

    #[test]
    fn test_writer_rejects_unterminated() {
        let mut writer = ViewWriter::new(8);
        writer.push(Event::begin_array(None)).unwrap();
        assert_eq!(writer.finish().unwrap_err(), StreamError::Unterminated { open: 1 });
    }

    #[test]
    fn test_writer_depth_limit() {
        let mut writer = ViewWriter::new(1);
        writer.push(Event::begin_object(None)).unwrap();
        assert!(matches!(
            writer.push(Event::begin_object(Some("x"))),
            Err(StreamError::DepthExceeded { max: 1 })
        ));
    }

    #[test]
    fn test_reader_namespace_inheritance() {
        let events = vec![
            Event::begin_object(None).in_namespace("urn:a"),
            Event::value("x", 1),
            Event::begin_object(Some("inner")).in_namespace("urn:b"),
            Event::value("y", 2),
            Event::end_object(),
            Event::value("z", 3),
            Event::end_object(),
        ];
        let mut reader = ViewReader::new(&events, 8);
        reader.next_event("root").unwrap();
        let x = reader.next_event("x").unwrap();
        assert_eq!(reader.effective_namespace(x), Some("urn:a"));
        reader.next_event("inner").unwrap();
        let y = reader.next_event("y").unwrap();
        assert_eq!(reader.effective_namespace(y), Some("urn:b"));
        reader.next_event("end").unwrap();
        let z = reader.next_event("z").unwrap();
        assert_eq!(reader.effective_namespace(z), Some("urn:a"));
        reader.next_event("end").unwrap();
        reader.finish().unwrap();
    }

    #[test]
    fn test_reader_skip_and_subtree() {
        let events = vec![
            Event::begin_object(None),
            Event::begin_array(Some("a")),
            Event::element(1),
            Event::begin_object(None),
            Event::end_object(),
            Event::end_array(),
            Event::value("b", 2),
            Event::end_object(),
        ];
        let mut reader = ViewReader::new(&events, 8);
        reader.next_event("root").unwrap();
        let sub = reader.read_subtree("a").unwrap();
        assert_eq!(sub.len(), 5);
        assert_eq!(reader.peek().and_then(|e| e.name()), Some("b"));
        reader.skip("b").unwrap();
        reader.expect(EventKind::EndObject, "END_OBJECT").unwrap();
        reader.finish().unwrap();
    }

    #[test]
    fn test_reader_reports_missing_end() {
        let events = vec![Event::begin_object(None), Event::value("a", 1)];
        let mut reader = ViewReader::new(&events, 8);
        reader.next_event("root").unwrap();
        reader.next_event("a").unwrap();
        assert_eq!(
            reader.next_event("END_OBJECT").unwrap_err(),
            StreamError::UnexpectedEnd { context: "END_OBJECT" }
        );
        assert_eq!(reader.finish().unwrap_err(), StreamError::Unterminated { open: 1 });
    }

    #[test]
    fn test_reader_unmatched_end() {
        let events = vec![Event::end_object()];
        let mut reader = ViewReader::new(&events, 8);
        assert_eq!(
            reader.next_event("x").unwrap_err(),
            StreamError::UnmatchedEnd { found: EventKind::EndObject }
        );
    }
}
