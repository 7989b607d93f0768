//! Per-call view context.
//!
//! A [`ViewContext`] carries everything one generate or apply call needs
//! besides the template: options, the scope stack used for path reporting,
//! and the registered collaborators (converters, reference resolvers,
//! association manager factories, object factories, listeners). Collaborators
//! are consulted in registration order and the first one that claims support
//! wins.
//!
//! A context drives one traversal at a time. Templates are shared; contexts
//! are not.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::apply::ViewEntity;
use crate::association::ManagerFactory;
use crate::convert::ConverterRef;
use crate::error::{ViewError, ViewErrorKind};
use crate::listener::{EntityEvent, NodeEvent, ValueEvent, ViewListener};
use crate::model::{ModelType, ObjectRef, Scalar, ScalarKind, Value};
use crate::template::Node;

/// Default maximum nesting depth of views.
pub const DEFAULT_MAX_DEPTH: usize = 256;

// =============================================================================
// OPTIONS
// =============================================================================

/// Options consulted during generation and application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    /// Skip named events that match no template node instead of failing.
    pub ignore_unknown_properties: bool,

    /// Do not emit `VALUE(null)` for scalar properties.
    pub omit_null_values: bool,

    /// Maximum container nesting accepted or produced.
    pub max_depth: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            ignore_unknown_properties: false,
            omit_null_values: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that skip unknown properties.
    pub fn lenient() -> Self {
        Self {
            ignore_unknown_properties: true,
            ..Self::default()
        }
    }

    pub fn with_omit_null_values(mut self, omit: bool) -> Self {
        self.omit_null_values = omit;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Creates model instances.
pub trait ObjectFactory {
    fn supports(&self, model_type: &ModelType) -> bool;

    fn new_instance(&self, model_type: &ModelType) -> Result<ObjectRef, ViewErrorKind>;
}

/// Looks up existing model objects for reference nodes.
pub trait ReferenceResolver {
    fn supports(&self, model_type: &ModelType) -> bool;

    /// Returns the object `entity` refers to, or `None` if there is none.
    fn resolve(
        &self,
        model_type: &ModelType,
        entity: &ViewEntity,
    ) -> Result<Option<ObjectRef>, ViewErrorKind>;
}

/// Reference resolver over an in-memory set of objects, matched by one
/// scalar key property.
#[derive(Debug)]
pub struct ObjectRegistry {
    model_type: ModelType,
    key: String,
    objects: RefCell<Vec<ObjectRef>>,
}

impl ObjectRegistry {
    pub fn new(model_type: &ModelType, key: &str) -> Self {
        Self {
            model_type: model_type.clone(),
            key: key.to_string(),
            objects: RefCell::new(Vec::new()),
        }
    }

    pub fn register(&self, object: ObjectRef) {
        self.objects.borrow_mut().push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }
}

impl ReferenceResolver for ObjectRegistry {
    fn supports(&self, model_type: &ModelType) -> bool {
        model_type.is_subtype_of(&self.model_type)
    }

    fn resolve(
        &self,
        _model_type: &ModelType,
        entity: &ViewEntity,
    ) -> Result<Option<ObjectRef>, ViewErrorKind> {
        let Some(key) = entity.scalar(&self.key) else {
            return Ok(None);
        };
        Ok(self
            .objects
            .borrow()
            .iter()
            .find(|o| &o.scalar(&self.key) == key)
            .cloned())
    }
}

// =============================================================================
// SCOPE STACK
// =============================================================================

/// One level of the scope stack.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    name: Option<Arc<str>>,
    index: Option<usize>,
    model_type: Option<ModelType>,
    model: Value,
    attributes: FxHashMap<String, Value>,
}

impl Frame {
    /// A frame that adds nothing to the view path.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn named(name: Option<&Arc<str>>) -> Self {
        Self {
            name: name.cloned(),
            ..Self::default()
        }
    }

    pub fn indexed(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    /// A frame for a map entry, which appears in the path by its key.
    pub fn keyed(key: &Scalar) -> Self {
        Self {
            name: Some(Arc::from(key.to_string())),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, model_type: Option<&ModelType>) -> Self {
        self.model_type = model_type.cloned();
        self
    }

    pub fn with_model(mut self, model: &Value) -> Self {
        self.model = model.clone();
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn model_type(&self) -> Option<&ModelType> {
        self.model_type.as_ref()
    }

    pub fn model(&self) -> &Value {
        &self.model
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Mutable state of one generate or apply call.
#[derive(Default)]
pub struct ViewContext {
    options: ViewOptions,
    frames: Vec<Frame>,
    converters: Vec<ConverterRef>,
    resolvers: Vec<Rc<dyn ReferenceResolver>>,
    managers: Vec<Arc<dyn ManagerFactory>>,
    factories: Vec<Rc<dyn ObjectFactory>>,
    listeners: Vec<Rc<dyn ViewListener>>,
}

impl fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("options", &self.options)
            .field("path", &self.current_view_path())
            .field("converters", &self.converters.len())
            .field("resolvers", &self.resolvers.len())
            .field("managers", &self.managers.len())
            .field("factories", &self.factories.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ViewContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ViewOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ViewOptions {
        &mut self.options
    }

    pub fn add_converter(&mut self, converter: ConverterRef) -> &mut Self {
        self.converters.push(converter);
        self
    }

    pub fn add_resolver(&mut self, resolver: Rc<dyn ReferenceResolver>) -> &mut Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn add_manager(&mut self, factory: Arc<dyn ManagerFactory>) -> &mut Self {
        self.managers.push(factory);
        self
    }

    pub fn add_factory(&mut self, factory: Rc<dyn ObjectFactory>) -> &mut Self {
        self.factories.push(factory);
        self
    }

    pub fn add_listener(&mut self, listener: Rc<dyn ViewListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// First registered converter supporting model values of `kind`.
    pub fn converter_for(&self, kind: ScalarKind) -> Option<&ConverterRef> {
        self.converters.iter().find(|c| c.supports(kind))
    }

    pub(crate) fn manager_factories(&self) -> &[Arc<dyn ManagerFactory>] {
        &self.managers
    }

    // -------------------------------------------------------------------------
    // Scope stack
    // -------------------------------------------------------------------------

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Runs `f` with `frame` pushed, popping it afterwards even on error.
    pub fn scoped<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Self) -> Result<T, ViewError>,
    ) -> Result<T, ViewError> {
        self.push(frame);
        let out = f(self);
        self.pop();
        out
    }

    /// Innermost frame.
    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Path of the current node, e.g. `/items/0/sku`. The root is `/`.
    pub fn current_view_path(&self) -> String {
        let mut path = String::new();
        for frame in &self.frames {
            if let Some(name) = &frame.name {
                path.push('/');
                path.push_str(name);
            } else if let Some(index) = frame.index {
                path.push('/');
                path.push_str(&index.to_string());
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }

    /// Model types of the enclosing frames, outermost first.
    pub fn current_model_path(&self) -> Vec<String> {
        self.frames
            .iter()
            .filter_map(|f| f.model_type.as_ref().map(|t| t.name().to_string()))
            .collect()
    }

    /// Sets a scoped attribute on the innermost frame.
    pub fn put_attribute(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.attributes.insert(name.to_string(), value);
        }
    }

    /// Reads an attribute from the innermost frame that defines it.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.attributes.get(name))
    }

    /// Wraps `kind` with the current view and model paths.
    pub fn error(&self, kind: impl Into<ViewErrorKind>) -> ViewError {
        ViewError::new(kind, self.current_view_path(), self.current_model_path())
    }

    // -------------------------------------------------------------------------
    // Instantiation
    // -------------------------------------------------------------------------

    /// Creates an instance through the first supporting object factory, or
    /// directly if none is registered. Abstract types cannot be created
    /// directly.
    pub fn new_instance(&self, model_type: &ModelType) -> Result<ObjectRef, ViewError> {
        if let Some(factory) = self.factories.iter().find(|f| f.supports(model_type)) {
            return factory.new_instance(model_type).map_err(|k| self.error(k));
        }
        if model_type.is_abstract() {
            return Err(self.error(ViewErrorKind::Instantiation {
                model_type: model_type.name().to_string(),
                reason: "type is abstract".to_string(),
            }));
        }
        Ok(ObjectRef::new(model_type))
    }

    /// Resolves a reference through the first supporting resolver.
    pub fn resolve_reference(
        &self,
        model_type: &ModelType,
        entity: &ViewEntity,
    ) -> Result<ObjectRef, ViewError> {
        let Some(resolver) = self.resolvers.iter().find(|r| r.supports(model_type)) else {
            return Err(self.error(ViewErrorKind::NoReferenceResolver {
                model_type: model_type.name().to_string(),
            }));
        };
        match resolver.resolve(model_type, entity) {
            Ok(Some(object)) => Ok(object),
            Ok(None) => Err(self.error(ViewErrorKind::UnresolvedReference {
                model_type: model_type.name().to_string(),
            })),
            Err(kind) => Err(self.error(kind)),
        }
    }

    // -------------------------------------------------------------------------
    // Listener notifications
    // -------------------------------------------------------------------------

    pub(crate) fn should_visit(&self, node: &Node, model: &Value) -> bool {
        if self.listeners.is_empty() {
            return true;
        }
        let path = self.current_view_path();
        let event = NodeEvent {
            node,
            path: &path,
            model,
        };
        self.listeners.iter().all(|l| l.should_visit_node(&event))
    }

    pub(crate) fn node_visited(&self, node: &Node, model: &Value) {
        if self.listeners.is_empty() {
            return;
        }
        let path = self.current_view_path();
        let event = NodeEvent {
            node,
            path: &path,
            model,
        };
        for listener in &self.listeners {
            listener.node_visited(&event);
        }
    }

    pub(crate) fn entity_created(&self, entity: &ObjectRef) {
        if self.listeners.is_empty() {
            return;
        }
        let path = self.current_view_path();
        let model_type = entity.model_type();
        let event = EntityEvent {
            path: &path,
            model_type: &model_type,
            entity,
        };
        for listener in &self.listeners {
            listener.entity_created(&event);
        }
    }

    pub(crate) fn entity_discarded(&self, entity: &ObjectRef) {
        if self.listeners.is_empty() {
            return;
        }
        let path = self.current_view_path();
        let model_type = entity.model_type();
        let event = EntityEvent {
            path: &path,
            model_type: &model_type,
            entity,
        };
        for listener in &self.listeners {
            listener.entity_discarded(&event);
        }
    }

    pub(crate) fn did_extract_value(&self, node: &Node, value: Scalar) -> Scalar {
        if self.listeners.is_empty() {
            return value;
        }
        let path = self.current_view_path();
        let event = ValueEvent { node, path: &path };
        self.listeners
            .iter()
            .fold(value, |v, l| l.did_extract_value(&event, v))
    }

    pub(crate) fn will_inject_value(&self, node: &Node, value: Scalar) -> Option<Scalar> {
        if self.listeners.is_empty() {
            return Some(value);
        }
        let path = self.current_view_path();
        let event = ValueEvent { node, path: &path };
        let mut value = value;
        for listener in &self.listeners {
            value = listener.will_inject_value(&event, value)?;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarKind;

    #[test]
    fn test_view_path() {
        let mut ctx = ViewContext::new();
        assert_eq!(ctx.current_view_path(), "/");
        let items: Arc<str> = Arc::from("items");
        ctx.push(Frame::anonymous());
        ctx.push(Frame::named(Some(&items)));
        ctx.push(Frame::indexed(0));
        ctx.push(Frame::named(Some(&Arc::from("sku"))));
        assert_eq!(ctx.current_view_path(), "/items/0/sku");
        ctx.pop();
        assert_eq!(ctx.current_view_path(), "/items/0");
    }

    #[test]
    fn test_scoped_pops_on_error() {
        let mut ctx = ViewContext::new();
        let name: Arc<str> = Arc::from("x");
        let result: Result<(), ViewError> = ctx.scoped(Frame::named(Some(&name)), |ctx| {
            Err(ctx.error(ViewErrorKind::Handler("boom".to_string())))
        });
        let err = result.unwrap_err();
        assert_eq!(err.path(), "/x");
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_attributes_walk_the_stack() {
        let mut ctx = ViewContext::new();
        ctx.push(Frame::anonymous());
        ctx.put_attribute("tenant", Value::from("acme"));
        ctx.push(Frame::indexed(1));
        assert_eq!(ctx.attribute("tenant"), Some(&Value::from("acme")));
        ctx.put_attribute("tenant", Value::from("inner"));
        assert_eq!(ctx.attribute("tenant"), Some(&Value::from("inner")));
        ctx.pop();
        assert_eq!(ctx.attribute("tenant"), Some(&Value::from("acme")));
    }

    #[test]
    fn test_abstract_types_need_a_factory() {
        let shape = ModelType::builder("Shape").abstract_type().build();
        let ctx = ViewContext::new();
        assert!(matches!(
            ctx.new_instance(&shape).unwrap_err().kind(),
            ViewErrorKind::Instantiation { .. }
        ));

        struct Fallback(ModelType);
        impl ObjectFactory for Fallback {
            fn supports(&self, model_type: &ModelType) -> bool {
                model_type.name() == "Shape"
            }
            fn new_instance(&self, _model_type: &ModelType) -> Result<ObjectRef, ViewErrorKind> {
                Ok(ObjectRef::new(&self.0))
            }
        }
        let circle = ModelType::builder("Circle").extends(&shape).build();
        let mut ctx = ViewContext::new();
        ctx.add_factory(Rc::new(Fallback(circle)));
        assert_eq!(ctx.new_instance(&shape).unwrap().model_type().name(), "Circle");
    }

    #[test]
    fn test_model_path() {
        let order = ModelType::builder("Order").scalar("id", ScalarKind::Int).build();
        let mut ctx = ViewContext::new();
        ctx.push(Frame::anonymous().with_type(Some(&order)));
        ctx.push(Frame::indexed(0));
        assert_eq!(ctx.current_model_path(), vec!["Order".to_string()]);
    }
}
