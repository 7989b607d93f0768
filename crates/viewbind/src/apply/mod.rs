//! Applicator chain (events → model).
//!
//! Application runs in two phases. Staging reads the whole view in lock-step
//! with the node tree and collects decoded values into [`ViewEntity`]s,
//! validating the stream as it goes. Injection then walks the staged tree and
//! writes it into the live model, handing collections and associates to the
//! reconciliation strategies. A view that fails to stage never reaches the
//! model.
//!
//! Children of subtype nodes are routed through their container with a type
//! guard, so a container dispatches every property name it can receive from
//! a single table.

mod entity;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::access::MultiValuedAccessor;
use crate::association::{
    reconcile_keyed, reconcile_ordered, reconcile_to_one, reconcile_unordered, resolve_manager,
    AssociationDescriptor, Manager, Reconciler,
};
use crate::context::{Frame, ViewContext};
use crate::convert::{self, ConverterRef};
use crate::error::{AccessError, StreamError, ViewError, ViewErrorKind};
use crate::event::{Event, EventKind, ViewReader};
use crate::generate::{ENTRY_KEY, ENTRY_VALUE};
use crate::model::{ModelType, ObjectRef, Scalar, Value};
use crate::template::traverse::{depth_first, NodeVisitor};
use crate::template::{Node, NodeKind};

pub use entity::{Staged, ViewEntity};

/// A child reachable by name from a container.
#[derive(Debug)]
struct Route {
    applicator: Arc<Applicator>,
    /// Subtype the staged entity must be an instance of.
    guard: Option<ModelType>,
}

/// Applicator of one node, wired to the applicators of its children.
#[derive(Debug)]
pub(crate) struct Applicator {
    node: Arc<Node>,
    children: Vec<Arc<Applicator>>,
    routes: FxHashMap<Arc<str>, Vec<Route>>,
    /// The container type followed by every subtype branch type.
    candidates: Vec<ModelType>,
    discriminated: bool,
}

struct ChainBuilder;

impl NodeVisitor for ChainBuilder {
    type Output = Arc<Applicator>;

    fn visit(&mut self, node: &Arc<Node>, children: Vec<Arc<Applicator>>) -> Arc<Applicator> {
        let mut routes: FxHashMap<Arc<str>, Vec<Route>> = FxHashMap::default();
        let mut candidates: Vec<ModelType> = node.model_type().cloned().into_iter().collect();
        let mut discriminated = false;
        for child in &children {
            match child.node.kind() {
                NodeKind::Subtype => {
                    candidates.extend(child.candidates.iter().cloned());
                    discriminated |= child.discriminated;
                    for (name, nested) in &child.routes {
                        let entry = routes.entry(name.clone()).or_default();
                        for route in nested {
                            entry.push(Route {
                                applicator: route.applicator.clone(),
                                guard: route.guard.clone().or_else(|| child.node.model_type().cloned()),
                            });
                        }
                    }
                }
                kind => {
                    discriminated |= kind == NodeKind::Discriminator;
                    if let Some(name) = child.node.name_arc() {
                        routes.entry(name.clone()).or_default().push(Route {
                            applicator: child.clone(),
                            guard: None,
                        });
                    }
                }
            }
        }
        Arc::new(Applicator {
            node: node.clone(),
            children,
            routes,
            candidates,
            discriminated,
        })
    }
}

fn peek<'a>(reader: &ViewReader<'a>, context: &'static str) -> Result<&'a Event, StreamError> {
    reader.peek().ok_or(StreamError::UnexpectedEnd { context })
}

fn unexpected(expected: &'static str, event: &Event) -> StreamError {
    StreamError::UnexpectedEvent {
        expected,
        found: event.kind(),
    }
}

fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> ViewErrorKind {
    ViewErrorKind::TypeMismatch {
        expected: expected.into(),
        found: found.into(),
    }
}

impl Applicator {
    pub(crate) fn build(root: &Arc<Node>) -> Arc<Self> {
        depth_first(root, &mut ChainBuilder)
    }

    fn property(&self) -> String {
        self.node.name().unwrap_or("<root>").to_string()
    }

    fn multi(&self, ctx: &ViewContext) -> Result<&Arc<dyn MultiValuedAccessor>, ViewError> {
        self.node.multi().ok_or_else(|| {
            ctx.error(AccessError::Unsupported {
                property: self.property(),
                operation: "add",
            })
        })
    }

    /// First route for `name` whose namespace matches and whose guard admits
    /// `entity_type`. Guards only apply once a discriminator can have set the
    /// type.
    fn route(&self, name: &str, namespace: Option<&str>, entity_type: &ModelType) -> Option<&Arc<Applicator>> {
        self.routes.get(name)?.iter().find_map(|route| {
            let node = &route.applicator.node;
            if node.namespace().is_some() && node.namespace() != namespace {
                return None;
            }
            match &route.guard {
                Some(guard) if self.discriminated && !entity_type.is_subtype_of(guard) => None,
                _ => Some(&route.applicator),
            }
        })
    }

    fn unknown(&self, name: &str, reader: &mut ViewReader<'_>, ctx: &mut ViewContext) -> Result<(), ViewError> {
        if !ctx.options().ignore_unknown_properties {
            return Err(ctx.error(ViewErrorKind::UnknownProperty {
                name: name.to_string(),
            }));
        }
        warn!(path = %ctx.current_view_path(), name, "skipping unknown property");
        reader.skip("unknown property").map_err(|e| ctx.error(e))
    }

    fn scalar_to_model(&self, value: Scalar, ctx: &ViewContext) -> Result<Scalar, ViewError> {
        let node = &self.node;
        let converter: Option<&ConverterRef> = node
            .converter()
            .or_else(|| node.scalar_kind().and_then(|k| ctx.converter_for(k)));
        convert::to_model(converter, value, node.scalar_kind()).map_err(|e| ctx.error(e))
    }

    fn key_to_model(&self, key: Scalar, ctx: &ViewContext) -> Result<Scalar, ViewError> {
        let node = &self.node;
        let converter = node
            .key_converter()
            .or_else(|| node.key_kind().and_then(|k| ctx.converter_for(k)));
        convert::to_model(converter, key, node.key_kind()).map_err(|e| ctx.error(e))
    }

    // =========================================================================
    // STAGING
    // =========================================================================

    /// Stages the root node. Object roots start from `initial`, which a
    /// discriminator may refine.
    pub(crate) fn stage_root(
        &self,
        reader: &mut ViewReader<'_>,
        initial: Option<&ModelType>,
        ctx: &mut ViewContext,
    ) -> Result<Staged, ViewError> {
        let frame = Frame::anonymous().with_type(self.node.model_type());
        ctx.scoped(frame, |ctx| match (self.node.kind(), initial) {
            (NodeKind::Object, Some(ty)) => self.stage_object(reader, ty, ctx),
            _ => self.stage(reader, ctx),
        })
    }

    /// Stages this node from the next event and everything it opens.
    fn stage(&self, reader: &mut ViewReader<'_>, ctx: &mut ViewContext) -> Result<Staged, ViewError> {
        let node = &self.node;
        match node.kind() {
            NodeKind::Value => {
                let event = reader.next_event("VALUE").map_err(|e| ctx.error(e))?;
                if event.kind() != EventKind::Value {
                    return Err(ctx.error(unexpected("VALUE", event)));
                }
                self.stage_scalar(event, ctx)
            }
            NodeKind::Object | NodeKind::Reference => match node.model_type() {
                Some(ty) => self.stage_object(reader, ty, ctx),
                None => Err(ctx.error(mismatch("object", "untyped node"))),
            },
            NodeKind::Envelope => {
                reader
                    .expect(EventKind::BeginObject, "BEGIN_OBJECT")
                    .map_err(|e| ctx.error(e))?;
                let Some(ty) = node.model_type() else {
                    return Err(ctx.error(mismatch("object", "untyped envelope")));
                };
                let mut entity = ViewEntity::new(ty);
                self.stage_body(reader, &mut entity, ctx)?;
                Ok(Staged::Entity(entity))
            }
            NodeKind::ArrayOfObjects | NodeKind::ArrayOfValues => self.stage_array(reader, ctx),
            NodeKind::MapOfObjects | NodeKind::MapOfValues => self.stage_map(reader, ctx),
            NodeKind::Meta => {
                let event = reader.next_event("META").map_err(|e| ctx.error(e))?;
                match event.kind() {
                    EventKind::Meta | EventKind::Value => {
                        Ok(Staged::Meta(event.scalar().cloned().unwrap_or(Scalar::Null)))
                    }
                    _ => Err(ctx.error(unexpected("META", event))),
                }
            }
            NodeKind::Splice => {
                let view = reader.read_subtree("splice").map_err(|e| ctx.error(e))?;
                Ok(Staged::Spliced(view))
            }
            // Both are consumed by their container.
            NodeKind::Discriminator | NodeKind::Subtype => {
                reader.skip("property").map_err(|e| ctx.error(e))?;
                Ok(Staged::Unchanged)
            }
        }
    }

    fn stage_scalar(&self, event: &Event, ctx: &mut ViewContext) -> Result<Staged, ViewError> {
        let value = event.scalar().cloned().unwrap_or(Scalar::Null);
        let Some(value) = ctx.will_inject_value(&self.node, value) else {
            return Ok(Staged::Unchanged);
        };
        // A node converter runs inside the accessor on injection.
        if self.node.kind() == NodeKind::Value && self.node.converter().is_some() {
            return Ok(Staged::Value(value));
        }
        Ok(Staged::Value(self.scalar_to_model(value, ctx)?))
    }

    /// A null VALUE for an object or collection: the hook decides between
    /// clearing and leaving the property alone.
    fn stage_null(&self, ctx: &mut ViewContext) -> Staged {
        match ctx.will_inject_value(&self.node, Scalar::Null) {
            Some(_) => Staged::Null,
            None => Staged::Unchanged,
        }
    }

    fn stage_object(
        &self,
        reader: &mut ViewReader<'_>,
        ty: &ModelType,
        ctx: &mut ViewContext,
    ) -> Result<Staged, ViewError> {
        let event = reader.next_event("BEGIN_OBJECT").map_err(|e| ctx.error(e))?;
        match event.kind() {
            EventKind::BeginObject => {
                let mut entity = ViewEntity::new(ty);
                self.stage_body(reader, &mut entity, ctx)?;
                Ok(Staged::Entity(entity))
            }
            _ if event.is_null_value() => Ok(self.stage_null(ctx)),
            _ => Err(ctx.error(unexpected("BEGIN_OBJECT", event))),
        }
    }

    /// Stages the properties of one object, up to and including its
    /// END_OBJECT.
    fn stage_body(
        &self,
        reader: &mut ViewReader<'_>,
        entity: &mut ViewEntity,
        ctx: &mut ViewContext,
    ) -> Result<(), ViewError> {
        loop {
            let event = peek(reader, "END_OBJECT").map_err(|e| ctx.error(e))?;
            if event.kind().is_end() {
                reader.next_event("END_OBJECT").map_err(|e| ctx.error(e))?;
                return Ok(());
            }
            let Some(name) = event.name() else {
                return Err(ctx.error(StreamError::AnonymousProperty { found: event.kind() }));
            };
            let namespace = reader.effective_namespace(event);
            let Some(child) = self.route(name, namespace, entity.model_type()).cloned() else {
                self.unknown(name, reader, ctx)?;
                continue;
            };
            let node = &child.node;
            let frame = Frame::named(node.name_arc()).with_type(node.model_type());
            ctx.scoped(frame, |ctx| {
                if node.kind() == NodeKind::Discriminator {
                    let resolved = child.stage_discriminator(reader, &self.candidates, ctx)?;
                    entity.set_model_type(resolved);
                    return Ok(());
                }
                let staged = child.stage(reader, ctx)?;
                if let Some(name) = node.name_arc() {
                    entity.put(name.clone(), staged);
                }
                Ok(())
            })?;
        }
    }

    fn stage_discriminator(
        &self,
        reader: &mut ViewReader<'_>,
        candidates: &[ModelType],
        ctx: &mut ViewContext,
    ) -> Result<ModelType, ViewError> {
        let event = reader.next_event("DISCRIMINATOR").map_err(|e| ctx.error(e))?;
        if !matches!(event.kind(), EventKind::Discriminator | EventKind::Value) {
            return Err(ctx.error(unexpected("DISCRIMINATOR", event)));
        }
        let Some(strategy) = self.node.discriminator() else {
            return Err(ctx.error(mismatch("discriminator strategy", "none")));
        };
        let value = event.scalar().cloned().unwrap_or(Scalar::Null);
        let resolved = strategy.resolve(&value, candidates).map_err(|k| ctx.error(k))?;
        trace!(path = %ctx.current_view_path(), model_type = %resolved, "discriminator resolved");
        Ok(resolved)
    }

    fn stage_array(&self, reader: &mut ViewReader<'_>, ctx: &mut ViewContext) -> Result<Staged, ViewError> {
        let event = reader.next_event("BEGIN_ARRAY").map_err(|e| ctx.error(e))?;
        if event.is_null_value() {
            return Ok(self.stage_null(ctx));
        }
        if event.kind() != EventKind::BeginArray {
            return Err(ctx.error(unexpected("BEGIN_ARRAY", event)));
        }
        let mut elements = Vec::new();
        loop {
            let event = peek(reader, "END_ARRAY").map_err(|e| ctx.error(e))?;
            if event.kind().is_end() {
                reader.next_event("END_ARRAY").map_err(|e| ctx.error(e))?;
                return Ok(Staged::Elements(elements));
            }
            let frame = Frame::indexed(elements.len()).with_type(self.node.model_type());
            let staged = ctx.scoped(frame, |ctx| self.stage_element(reader, ctx))?;
            elements.push(staged);
        }
    }

    /// Stages one collection element or map value.
    fn stage_element(&self, reader: &mut ViewReader<'_>, ctx: &mut ViewContext) -> Result<Staged, ViewError> {
        if matches!(self.node.kind(), NodeKind::ArrayOfObjects | NodeKind::MapOfObjects) {
            return match self.node.model_type() {
                Some(ty) => self.stage_object(reader, ty, ctx),
                None => Err(ctx.error(mismatch("object", "untyped node"))),
            };
        }
        let event = reader.next_event("VALUE").map_err(|e| ctx.error(e))?;
        if event.kind() != EventKind::Value {
            return Err(ctx.error(unexpected("VALUE", event)));
        }
        self.stage_scalar(event, ctx)
    }

    fn stage_map(&self, reader: &mut ViewReader<'_>, ctx: &mut ViewContext) -> Result<Staged, ViewError> {
        let event = reader.next_event("BEGIN_OBJECT").map_err(|e| ctx.error(e))?;
        if event.is_null_value() {
            return Ok(self.stage_null(ctx));
        }
        let mut entries = Vec::new();
        if self.node.string_keys() {
            if event.kind() != EventKind::BeginObject {
                return Err(ctx.error(unexpected("BEGIN_OBJECT", event)));
            }
            loop {
                let event = peek(reader, "END_OBJECT").map_err(|e| ctx.error(e))?;
                if event.kind().is_end() {
                    reader.next_event("END_OBJECT").map_err(|e| ctx.error(e))?;
                    return Ok(Staged::Entries(entries));
                }
                let Some(name) = event.name() else {
                    return Err(ctx.error(StreamError::AnonymousProperty { found: event.kind() }));
                };
                let key = self.key_to_model(Scalar::from(name), ctx)?;
                let frame = Frame::keyed(&key).with_type(self.node.model_type());
                let staged = ctx.scoped(frame, |ctx| self.stage_element(reader, ctx))?;
                entries.push((key, staged));
            }
        }
        if event.kind() != EventKind::BeginArray {
            return Err(ctx.error(unexpected("BEGIN_ARRAY", event)));
        }
        loop {
            let event = peek(reader, "END_ARRAY").map_err(|e| ctx.error(e))?;
            if event.kind().is_end() {
                reader.next_event("END_ARRAY").map_err(|e| ctx.error(e))?;
                return Ok(Staged::Entries(entries));
            }
            let frame = Frame::indexed(entries.len()).with_type(self.node.model_type());
            let entry = ctx.scoped(frame, |ctx| self.stage_entry(reader, ctx))?;
            entries.push(entry);
        }
    }

    /// Stages one `{key, value}` entry object. A missing value stages as
    /// null.
    fn stage_entry(&self, reader: &mut ViewReader<'_>, ctx: &mut ViewContext) -> Result<(Scalar, Staged), ViewError> {
        reader
            .expect(EventKind::BeginObject, "BEGIN_OBJECT")
            .map_err(|e| ctx.error(e))?;
        let mut key = None;
        let mut value = Staged::Null;
        loop {
            let event = peek(reader, "END_OBJECT").map_err(|e| ctx.error(e))?;
            if event.kind().is_end() {
                reader.next_event("END_OBJECT").map_err(|e| ctx.error(e))?;
                break;
            }
            match event.name() {
                Some(ENTRY_KEY) => {
                    let event = reader
                        .expect(EventKind::Value, "VALUE")
                        .map_err(|e| ctx.error(e))?;
                    let raw = event.scalar().cloned().unwrap_or(Scalar::Null);
                    key = Some(self.key_to_model(raw, ctx)?);
                }
                Some(ENTRY_VALUE) => value = self.stage_element(reader, ctx)?,
                Some(other) => self.unknown(other, reader, ctx)?,
                None => {
                    return Err(ctx.error(StreamError::AnonymousProperty { found: event.kind() }));
                }
            }
        }
        match key {
            Some(key) if !key.is_null() => Ok((key, value)),
            _ => Err(ctx.error(mismatch("map entry with a key", "entry without a key"))),
        }
    }

    // =========================================================================
    // INJECTION
    // =========================================================================

    /// Injects a staged root into `target`.
    pub(crate) fn inject_root(&self, staged: Staged, target: &Value, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let node = &self.node;
        let frame = Frame::anonymous().with_type(node.model_type()).with_model(target);
        ctx.scoped(frame, |ctx| {
            match (node.kind(), staged) {
                (_, Staged::Unchanged | Staged::Null) => {}
                (NodeKind::Object, Staged::Entity(entity)) => {
                    let Value::Object(object) = target else {
                        return Err(ctx.error(mismatch(entity.model_type().name(), target.shape_name())));
                    };
                    if !object.is_instance_of(entity.model_type()) {
                        return Err(ctx.error(mismatch(
                            entity.model_type().name(),
                            object.model_type().name(),
                        )));
                    }
                    self.inject(entity, object, ctx)?;
                }
                (NodeKind::ArrayOfObjects, Staged::Elements(elements)) => {
                    let Some(element_type) = node.model_type() else {
                        return Err(ctx.error(mismatch("object", target.shape_name())));
                    };
                    let descriptor = AssociationDescriptor::root(element_type);
                    self.reconcile_elements(target, &descriptor, elements, ctx)?;
                }
                (NodeKind::ArrayOfValues, Staged::Elements(elements)) => {
                    self.replace_values(target, elements, ctx)?;
                }
                (kind, other) => {
                    return Err(ctx.error(mismatch(format!("{kind:?}"), other.shape_name())));
                }
            }
            ctx.node_visited(node, target);
            Ok(())
        })
    }

    /// Injects `entity` into the live object `target`, child by child.
    fn inject(&self, entity: ViewEntity, target: &ObjectRef, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let mut entity = entity;
        let model = Value::Object(target.clone());
        self.inject_children(&mut entity, &model, ctx)
    }

    fn inject_children(&self, entity: &mut ViewEntity, model: &Value, ctx: &mut ViewContext) -> Result<(), ViewError> {
        for child in &self.children {
            child.inject_into(entity, model, ctx)?;
        }
        Ok(())
    }

    fn inject_into(&self, entity: &mut ViewEntity, model: &Value, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let node = &self.node;
        match node.kind() {
            NodeKind::Subtype => {
                let applies = match (model, node.model_type()) {
                    (Value::Object(object), Some(ty)) => object.is_instance_of(ty),
                    _ => false,
                };
                if applies {
                    self.inject_children(entity, model, ctx)?;
                }
                return Ok(());
            }
            NodeKind::Discriminator => return Ok(()),
            _ => {}
        }
        let Some(staged) = node.name().and_then(|name| entity.take(name)) else {
            return Ok(());
        };
        let frame = Frame::named(node.name_arc())
            .with_type(node.model_type())
            .with_model(model);
        ctx.scoped(frame, |ctx| {
            if !ctx.should_visit(node, model) {
                trace!(path = %ctx.current_view_path(), "node vetoed");
                return Ok(());
            }
            if node.kind().is_property() && !node.modes().can_write() {
                trace!(path = %ctx.current_view_path(), "read-only property skipped");
                return Ok(());
            }
            self.inject_staged(staged, model, ctx)?;
            ctx.node_visited(node, model);
            Ok(())
        })
    }

    fn inject_staged(&self, staged: Staged, model: &Value, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let node = &self.node;
        match (node.kind(), staged) {
            (_, Staged::Unchanged) => Ok(()),
            (NodeKind::Value, Staged::Value(value)) => {
                let Some(accessor) = node.accessor() else {
                    return Ok(());
                };
                accessor
                    .set(model, Value::Scalar(value))
                    .map_err(|e| ctx.error(e))
            }
            (NodeKind::Object | NodeKind::Reference, staged) => self.reconcile_one(model, staged, ctx),
            (NodeKind::Envelope, Staged::Entity(mut entity)) => self.inject_children(&mut entity, model, ctx),
            (
                NodeKind::ArrayOfObjects
                | NodeKind::ArrayOfValues
                | NodeKind::MapOfObjects
                | NodeKind::MapOfValues,
                Staged::Null,
            ) => match node.accessor() {
                Some(accessor) => accessor.set(model, Value::NULL).map_err(|e| ctx.error(e)),
                None => Ok(()),
            },
            (NodeKind::ArrayOfObjects, Staged::Elements(elements)) => self.reconcile_many(model, elements, ctx),
            (NodeKind::MapOfObjects, Staged::Entries(entries)) => self.reconcile_map(model, entries, ctx),
            (NodeKind::ArrayOfValues, Staged::Elements(elements)) => self.replace_values(model, elements, ctx),
            (NodeKind::MapOfValues, Staged::Entries(entries)) => {
                let multi = self.multi(ctx)?;
                multi.clear(model).map_err(|e| ctx.error(e))?;
                for (key, staged) in entries {
                    if let Staged::Value(value) = staged {
                        multi
                            .put(model, key, Value::Scalar(value))
                            .map_err(|e| ctx.error(e))?;
                    }
                }
                Ok(())
            }
            (NodeKind::Meta, Staged::Meta(value)) => match node.meta() {
                Some(handler) => handler.consume(model, &value, ctx).map_err(|k| ctx.error(k)),
                None => Ok(()),
            },
            (NodeKind::Splice, Staged::Spliced(view)) => match node.splice() {
                Some(handler) => handler.apply(&view, model, ctx),
                None => Ok(()),
            },
            (kind, other) => Err(ctx.error(mismatch(format!("{kind:?}"), other.shape_name()))),
        }
    }

    /// Replaces the contents of a value collection. Unchanged and null
    /// elements are dropped.
    fn replace_values(&self, model: &Value, elements: Vec<Staged>, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let multi = self.multi(ctx)?;
        multi.clear(model).map_err(|e| ctx.error(e))?;
        for staged in elements {
            match staged {
                Staged::Value(value) if !value.is_null() => {
                    multi.add(model, Value::Scalar(value)).map_err(|e| ctx.error(e))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn descriptor(&self, model: &Value, ctx: &ViewContext) -> Result<AssociationDescriptor, ViewError> {
        let (Value::Object(owner), Some(associate)) = (model, self.node.model_type()) else {
            return Err(ctx.error(mismatch("object", model.shape_name())));
        };
        let name = self.node.name().unwrap_or("");
        Ok(AssociationDescriptor::new(&owner.model_type(), associate, name))
    }

    fn capability_error(&self, descriptor: &AssociationDescriptor, expected: &'static str, ctx: &ViewContext) -> ViewError {
        ctx.error(ViewErrorKind::ManagerCapability {
            descriptor: descriptor.to_string(),
            expected,
        })
    }

    fn reconcile_one(&self, model: &Value, staged: Staged, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let descriptor = self.descriptor(model, ctx)?;
        let Manager::ToOne(mut manager) = resolve_manager(&self.node, &descriptor, ctx)? else {
            return Err(self.capability_error(&descriptor, "to-one", ctx));
        };
        let inject = |entity: ViewEntity, object: &ObjectRef, ctx: &mut ViewContext| self.inject(entity, object, ctx);
        let reconciler = Reconciler {
            reference: self.node.is_reference(),
            inject: &inject,
        };
        reconcile_to_one(manager.as_mut(), model, staged, &reconciler, ctx)
    }

    fn reconcile_many(&self, model: &Value, elements: Vec<Staged>, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let descriptor = self.descriptor(model, ctx)?;
        self.reconcile_elements(model, &descriptor, elements, ctx)
    }

    /// Reconciles `elements` against the collection `model` holds, through
    /// the manager located for `descriptor`.
    fn reconcile_elements(
        &self,
        model: &Value,
        descriptor: &AssociationDescriptor,
        elements: Vec<Staged>,
        ctx: &mut ViewContext,
    ) -> Result<(), ViewError> {
        let manager = resolve_manager(&self.node, descriptor, ctx)?;
        let inject = |entity: ViewEntity, object: &ObjectRef, ctx: &mut ViewContext| self.inject(entity, object, ctx);
        let reconciler = Reconciler {
            reference: self.node.is_reference(),
            inject: &inject,
        };
        match manager {
            Manager::Indexed(mut manager) => reconcile_ordered(manager.as_mut(), model, elements, &reconciler, ctx),
            Manager::Unordered(mut manager) => {
                reconcile_unordered(manager.as_mut(), model, elements, &reconciler, ctx)
            }
            _ => Err(self.capability_error(descriptor, "indexed or unordered", ctx)),
        }
    }

    fn reconcile_map(
        &self,
        model: &Value,
        entries: Vec<(Scalar, Staged)>,
        ctx: &mut ViewContext,
    ) -> Result<(), ViewError> {
        let descriptor = self.descriptor(model, ctx)?;
        let Manager::Keyed(mut manager) = resolve_manager(&self.node, &descriptor, ctx)? else {
            return Err(self.capability_error(&descriptor, "keyed", ctx));
        };
        let inject = |entity: ViewEntity, object: &ObjectRef, ctx: &mut ViewContext| self.inject(entity, object, ctx);
        let reconciler = Reconciler {
            reference: self.node.is_reference(),
            inject: &inject,
        };
        reconcile_keyed(manager.as_mut(), model, entries, &reconciler, ctx)
    }
}
