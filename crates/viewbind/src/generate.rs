//! Generator chain (model → events).
//!
//! One [`Generator`] is built per template node when the template is built.
//! The chain holds no per-call state: everything a call mutates lives in the
//! [`ViewContext`] and the [`ViewWriter`] passed through it.

use std::sync::Arc;

use tracing::trace;

use crate::access::{AccessorRef, MultiValuedAccessor};
use crate::context::{Frame, ViewContext};
use crate::convert::{self, ConverterRef};
use crate::error::{AccessError, ViewError};
use crate::event::{Event, EventKind, ViewWriter};
use crate::model::{Scalar, Value};
use crate::template::traverse::{depth_first, NodeVisitor};
use crate::template::{Node, NodeKind};

/// Names of the two properties of a non-string map entry.
pub(crate) const ENTRY_KEY: &str = "key";
pub(crate) const ENTRY_VALUE: &str = "value";

/// Generator of one node, wired to the generators of its children.
#[derive(Debug)]
pub(crate) struct Generator {
    node: Arc<Node>,
    children: Vec<Generator>,
}

struct ChainBuilder;

impl NodeVisitor for ChainBuilder {
    type Output = Generator;

    fn visit(&mut self, node: &Arc<Node>, children: Vec<Generator>) -> Generator {
        Generator {
            node: node.clone(),
            children,
        }
    }
}

fn push(out: &mut ViewWriter, event: Event, ctx: &ViewContext) -> Result<(), ViewError> {
    out.push(event).map_err(|e| ctx.error(e))
}

fn null_value(name: Option<Arc<str>>, namespace: Option<Arc<str>>) -> Event {
    Event::with_parts(EventKind::Value, name, namespace, Some(Scalar::Null))
}

impl Generator {
    pub(crate) fn build(root: &Arc<Node>) -> Self {
        depth_first(root, &mut ChainBuilder)
    }

    /// Generates the root node against `model`, which its root accessor
    /// passes through unchanged.
    pub(crate) fn generate_root(
        &self,
        model: &Value,
        out: &mut ViewWriter,
        ctx: &mut ViewContext,
    ) -> Result<(), ViewError> {
        let node = &self.node;
        let frame = Frame::anonymous()
            .with_type(node.model_type())
            .with_model(model);
        ctx.scoped(frame, |ctx| {
            self.emit(model, out, ctx)?;
            ctx.node_visited(node, model);
            Ok(())
        })
    }

    /// Generates this node as a child of `owner`.
    fn generate(&self, owner: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let node = &self.node;
        let frame = Frame::named(node.name_arc())
            .with_type(node.model_type())
            .with_model(owner);
        ctx.scoped(frame, |ctx| {
            if !ctx.should_visit(node, owner) {
                trace!(path = %ctx.current_view_path(), "node vetoed");
                return Ok(());
            }
            if node.kind().is_property() && !node.modes().can_read() {
                return Ok(());
            }
            self.emit(owner, out, ctx)?;
            ctx.node_visited(node, owner);
            Ok(())
        })
    }

    fn emit_body(&self, model: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        for child in &self.children {
            child.generate(model, out, ctx)?;
        }
        Ok(())
    }

    fn event(&self, kind: EventKind, value: Option<Scalar>) -> Event {
        Event::with_parts(
            kind,
            self.node.name_arc().cloned(),
            self.node.namespace_arc().cloned(),
            value,
        )
    }

    fn property(&self) -> String {
        self.node.name().unwrap_or("<root>").to_string()
    }

    fn accessor(&self, ctx: &ViewContext) -> Result<&AccessorRef, ViewError> {
        self.node.accessor().ok_or_else(|| {
            ctx.error(AccessError::Unsupported {
                property: self.property(),
                operation: "get",
            })
        })
    }

    fn multi(&self, ctx: &ViewContext) -> Result<&Arc<dyn MultiValuedAccessor>, ViewError> {
        self.node.multi().ok_or_else(|| {
            ctx.error(AccessError::Unsupported {
                property: self.property(),
                operation: "iterate",
            })
        })
    }

    fn wrong_shape(&self, expected: &'static str, found: &Value, ctx: &ViewContext) -> ViewError {
        ctx.error(AccessError::WrongShape {
            property: self.property(),
            expected,
            found: found.shape_name(),
        })
    }

    /// Converts an element scalar of a value collection toward the view.
    fn element_to_view(&self, value: Scalar, ctx: &ViewContext) -> Result<Scalar, ViewError> {
        let node = &self.node;
        let converter: Option<&ConverterRef> = node
            .converter()
            .or_else(|| node.scalar_kind().and_then(|k| ctx.converter_for(k)));
        let value = convert::to_view(converter, value).map_err(|e| ctx.error(e))?;
        Ok(ctx.did_extract_value(node, value))
    }

    fn key_to_view(&self, key: Scalar, ctx: &ViewContext) -> Result<Scalar, ViewError> {
        let node = &self.node;
        let converter = node
            .key_converter()
            .or_else(|| node.key_kind().and_then(|k| ctx.converter_for(k)));
        convert::to_view(converter, key).map_err(|e| ctx.error(e))
    }

    // -------------------------------------------------------------------------
    // Per-kind emission
    // -------------------------------------------------------------------------

    fn emit(&self, owner: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        match self.node.kind() {
            NodeKind::Value => self.emit_value(owner, out, ctx),
            NodeKind::Object | NodeKind::Reference => self.emit_object(owner, out, ctx),
            NodeKind::ArrayOfObjects | NodeKind::ArrayOfValues => self.emit_array(owner, out, ctx),
            NodeKind::MapOfObjects | NodeKind::MapOfValues => self.emit_map(owner, out, ctx),
            NodeKind::Envelope => {
                push(out, self.event(EventKind::BeginObject, None), ctx)?;
                self.emit_body(owner, out, ctx)?;
                push(out, Event::end_object(), ctx)
            }
            NodeKind::Subtype => {
                let matches = match (owner, self.node.model_type()) {
                    (Value::Object(object), Some(ty)) => object.is_instance_of(ty),
                    _ => false,
                };
                if matches {
                    self.emit_body(owner, out, ctx)?;
                }
                Ok(())
            }
            NodeKind::Discriminator => {
                let (Value::Object(object), Some(strategy)) = (owner, self.node.discriminator()) else {
                    return Ok(());
                };
                let value = strategy.classify(&object.model_type());
                push(out, self.event(EventKind::Discriminator, Some(value)), ctx)
            }
            NodeKind::Meta => {
                let Some(handler) = self.node.meta() else {
                    return Ok(());
                };
                let value = handler.produce(owner, ctx).map_err(|k| ctx.error(k))?;
                push(out, self.event(EventKind::Meta, Some(value)), ctx)
            }
            NodeKind::Splice => {
                let Some(handler) = self.node.splice() else {
                    return Ok(());
                };
                let view = handler.generate(owner, ctx)?;
                for (i, event) in view.into_events().into_iter().enumerate() {
                    let event = if i == 0 {
                        event.renamed(self.node.name_arc().cloned())
                    } else {
                        event
                    };
                    push(out, event, ctx)?;
                }
                Ok(())
            }
        }
    }

    fn emit_value(&self, owner: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let node = &self.node;
        let raw = self.accessor(ctx)?.get(owner).map_err(|e| ctx.error(e))?;
        let Value::Scalar(value) = raw else {
            return Err(self.wrong_shape("scalar", &raw, ctx));
        };
        // A node converter already ran inside the accessor.
        let value = if node.converter().is_some() {
            ctx.did_extract_value(node, value)
        } else {
            self.element_to_view(value, ctx)?
        };
        if value.is_null() && ctx.options().omit_null_values {
            return Ok(());
        }
        push(out, self.event(EventKind::Value, Some(value)), ctx)
    }

    fn emit_object(&self, owner: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let value = self.accessor(ctx)?.get(owner).map_err(|e| ctx.error(e))?;
        self.emit_associate(self.node.name_arc().cloned(), &value, out, ctx)
    }

    /// Emits one associate under `name`: its body, or a null VALUE.
    fn emit_associate(
        &self,
        name: Option<Arc<str>>,
        value: &Value,
        out: &mut ViewWriter,
        ctx: &mut ViewContext,
    ) -> Result<(), ViewError> {
        let namespace = self.node.namespace_arc().cloned();
        match value {
            Value::Object(_) => {
                push(out, Event::with_parts(EventKind::BeginObject, name, namespace, None), ctx)?;
                self.emit_body(value, out, ctx)?;
                push(out, Event::end_object(), ctx)
            }
            v if v.is_null() => push(out, null_value(name, namespace), ctx),
            other => Err(self.wrong_shape("object", other, ctx)),
        }
    }

    /// Emits one collection element or map value under `name`.
    fn emit_element(
        &self,
        name: Option<Arc<str>>,
        value: &Value,
        out: &mut ViewWriter,
        ctx: &mut ViewContext,
    ) -> Result<(), ViewError> {
        if matches!(self.node.kind(), NodeKind::ArrayOfObjects | NodeKind::MapOfObjects) {
            return self.emit_associate(name, value, out, ctx);
        }
        let Value::Scalar(scalar) = value else {
            return Err(self.wrong_shape("scalar", value, ctx));
        };
        let scalar = self.element_to_view(scalar.clone(), ctx)?;
        push(out, Event::with_parts(EventKind::Value, name, None, Some(scalar)), ctx)
    }

    fn emit_array(&self, owner: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let current = self.accessor(ctx)?.get(owner).map_err(|e| ctx.error(e))?;
        if current.is_null() {
            return push(out, self.event(EventKind::Value, Some(Scalar::Null)), ctx);
        }
        let elements = self.multi(ctx)?.iterate(owner).map_err(|e| ctx.error(e))?;
        push(out, self.event(EventKind::BeginArray, None), ctx)?;
        let element_type = self.node.model_type();
        for (index, element) in elements.iter().enumerate() {
            let frame = Frame::indexed(index).with_type(element_type).with_model(element);
            ctx.scoped(frame, |ctx| self.emit_element(None, element, out, ctx))?;
        }
        push(out, Event::end_array(), ctx)
    }

    /// String-keyed maps become an object with one property per entry;
    /// other maps become an array of `{key, value}` entry objects.
    fn emit_map(&self, owner: &Value, out: &mut ViewWriter, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let current = self.accessor(ctx)?.get(owner).map_err(|e| ctx.error(e))?;
        if current.is_null() {
            return push(out, self.event(EventKind::Value, Some(Scalar::Null)), ctx);
        }
        let entries = self.multi(ctx)?.entries(owner).map_err(|e| ctx.error(e))?;
        let value_type = self.node.model_type();
        if self.node.string_keys() {
            push(out, self.event(EventKind::BeginObject, None), ctx)?;
            for (key, value) in &entries {
                let frame = Frame::keyed(key).with_type(value_type).with_model(value);
                ctx.scoped(frame, |ctx| {
                    let name: Arc<str> = match self.key_to_view(key.clone(), ctx)? {
                        Scalar::String(s) => Arc::from(s),
                        other => Arc::from(other.to_string()),
                    };
                    self.emit_element(Some(name), value, out, ctx)
                })?;
            }
            return push(out, Event::end_object(), ctx);
        }
        push(out, self.event(EventKind::BeginArray, None), ctx)?;
        let (key_name, value_name): (Arc<str>, Arc<str>) = (Arc::from(ENTRY_KEY), Arc::from(ENTRY_VALUE));
        for (key, value) in &entries {
            let frame = Frame::keyed(key).with_type(value_type).with_model(value);
            ctx.scoped(frame, |ctx| {
                let view_key = self.key_to_view(key.clone(), ctx)?;
                push(out, Event::begin_object(None), ctx)?;
                push(
                    out,
                    Event::with_parts(EventKind::Value, Some(key_name.clone()), None, Some(view_key)),
                    ctx,
                )?;
                self.emit_element(Some(value_name.clone()), value, out, ctx)?;
                push(out, Event::end_object(), ctx)
            })?;
        }
        push(out, Event::end_array(), ctx)
    }
}
