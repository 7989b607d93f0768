//! View templates.
//!
//! A template is an immutable tree of [`Node`]s describing how a model maps
//! onto view structure. Templates are built with a [`TemplateBuilder`], which
//! resolves accessors and validates the tree once; the resulting generator
//! and applicator chains are built at the same time and reused by every
//! [`Template::generate`] and [`Template::apply`] call.
//!
//! Templates are `Send + Sync` and cheap to clone. All per-call state lives
//! in the [`ViewContext`] passed to each call.

mod builder;
pub mod traverse;
mod validate;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::access::{AccessModes, AccessorRef, MultiValuedAccessor};
use crate::apply::{Applicator, Staged};
use crate::association::{Identity, ManagerFactory};
use crate::context::ViewContext;
use crate::convert::ConverterRef;
use crate::discriminator::DiscriminatorStrategy;
use crate::error::{ViewError, ViewErrorKind};
use crate::event::{View, ViewWriter};
use crate::generate::Generator;
use crate::handler::{MetaHandler, SpliceHandler};
use crate::model::{ListRef, ModelType, ScalarKind, Value};

pub use builder::TemplateBuilder;
pub use traverse::{BreadthFirst, NodeVisitor};

// =============================================================================
// NODES
// =============================================================================

/// Kinds of template nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A scalar property.
    Value,
    /// A single owned associate.
    Object,
    /// A collection of scalars.
    ArrayOfValues,
    /// A collection of associates.
    ArrayOfObjects,
    /// A keyed collection of scalars.
    MapOfValues,
    /// A keyed collection of associates.
    MapOfObjects,
    /// A single associate resolved by reference on application.
    Reference,
    /// Properties that apply only to instances of a subtype.
    Subtype,
    /// A named object wrapping properties of the enclosing model.
    Envelope,
    /// The runtime type of the enclosing object.
    Discriminator,
    /// A scalar produced and consumed by a [`MetaHandler`].
    Meta,
    /// A subtree delegated to a [`SpliceHandler`].
    Splice,
}

impl NodeKind {
    /// Kinds whose children describe the properties of an object.
    pub fn is_object_shaped(self) -> bool {
        matches!(
            self,
            NodeKind::Object
                | NodeKind::Reference
                | NodeKind::ArrayOfObjects
                | NodeKind::MapOfObjects
                | NodeKind::Envelope
                | NodeKind::Subtype
        )
    }

    /// Kinds backed by a property accessor.
    pub fn is_property(self) -> bool {
        matches!(
            self,
            NodeKind::Value
                | NodeKind::Object
                | NodeKind::Reference
                | NodeKind::ArrayOfValues
                | NodeKind::ArrayOfObjects
                | NodeKind::MapOfValues
                | NodeKind::MapOfObjects
        )
    }

    /// Kinds backed by a multi-valued accessor.
    pub fn is_multi_valued(self) -> bool {
        matches!(
            self,
            NodeKind::ArrayOfValues
                | NodeKind::ArrayOfObjects
                | NodeKind::MapOfValues
                | NodeKind::MapOfObjects
        )
    }
}

/// One node of a template.
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) namespace: Option<Arc<str>>,
    /// Associate, element or subtype type; the enclosing type for envelopes.
    pub(crate) model_type: Option<ModelType>,
    pub(crate) accessor: Option<AccessorRef>,
    pub(crate) multi: Option<Arc<dyn MultiValuedAccessor>>,
    pub(crate) children: Vec<Arc<Node>>,
    pub(crate) scalar_kind: Option<ScalarKind>,
    pub(crate) key_kind: Option<ScalarKind>,
    pub(crate) string_keys: bool,
    pub(crate) converter: Option<ConverterRef>,
    pub(crate) key_converter: Option<ConverterRef>,
    pub(crate) identity: Identity,
    pub(crate) manager: Option<Arc<dyn ManagerFactory>>,
    pub(crate) discriminator: Option<Arc<dyn DiscriminatorStrategy>>,
    pub(crate) meta: Option<Arc<dyn MetaHandler>>,
    pub(crate) splice: Option<Arc<dyn SpliceHandler>>,
    pub(crate) modes: Option<AccessModes>,
    pub(crate) reference: bool,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Property name; `None` for the root and for subtype nodes.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn name_arc(&self) -> Option<&Arc<str>> {
        self.name.as_ref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn namespace_arc(&self) -> Option<&Arc<str>> {
        self.namespace.as_ref()
    }

    pub fn model_type(&self) -> Option<&ModelType> {
        self.model_type.as_ref()
    }

    pub fn accessor(&self) -> Option<&AccessorRef> {
        self.accessor.as_ref()
    }

    pub fn multi(&self) -> Option<&Arc<dyn MultiValuedAccessor>> {
        self.multi.as_ref()
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    /// Declared scalar kind of a value node, or of the elements of a value
    /// collection.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        self.scalar_kind
    }

    pub fn key_kind(&self) -> Option<ScalarKind> {
        self.key_kind
    }

    /// Map keys travel as property names rather than as entry objects.
    pub fn string_keys(&self) -> bool {
        self.string_keys
    }

    pub fn converter(&self) -> Option<&ConverterRef> {
        self.converter.as_ref()
    }

    pub fn key_converter(&self) -> Option<&ConverterRef> {
        self.key_converter.as_ref()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn manager(&self) -> Option<&Arc<dyn ManagerFactory>> {
        self.manager.as_ref()
    }

    pub fn discriminator(&self) -> Option<&Arc<dyn DiscriminatorStrategy>> {
        self.discriminator.as_ref()
    }

    pub fn meta(&self) -> Option<&Arc<dyn MetaHandler>> {
        self.meta.as_ref()
    }

    pub fn splice(&self) -> Option<&Arc<dyn SpliceHandler>> {
        self.splice.as_ref()
    }

    /// True for reference nodes and for collections of references.
    pub fn is_reference(&self) -> bool {
        self.reference
    }

    /// Effective access modes: the requested ones, else those the accessor
    /// supports. Nodes without an accessor are readable and writable.
    pub fn modes(&self) -> AccessModes {
        if let Some(modes) = self.modes {
            return modes;
        }
        match (&self.multi, &self.accessor) {
            (Some(multi), _) => multi.modes(),
            (None, Some(accessor)) => accessor.modes(),
            (None, None) => AccessModes::READ_WRITE,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("model_type", &self.model_type)
            .field("children", &self.children.len())
            .finish()
    }
}

// =============================================================================
// TEMPLATE
// =============================================================================

struct Inner {
    root: Arc<Node>,
    generator: Generator,
    applicator: Arc<Applicator>,
}

/// A built, validated view template.
#[derive(Clone)]
pub struct Template(Arc<Inner>);

impl Template {
    pub(crate) fn new(root: Arc<Node>) -> Self {
        let generator = Generator::build(&root);
        let applicator = Applicator::build(&root);
        debug!(root = ?root.model_type(), kind = ?root.kind(), "processing chains built");
        Self(Arc::new(Inner {
            root,
            generator,
            applicator,
        }))
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.0.root
    }

    /// All nodes, breadth-first.
    pub fn nodes(&self) -> BreadthFirst {
        BreadthFirst::new(&self.0.root)
    }

    /// First node named `name`, breadth-first.
    pub fn find(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes().find(|n| n.name() == Some(name))
    }

    /// Generates the view of `model`.
    ///
    /// Object templates take an object (or null); array templates take a
    /// list.
    #[instrument(skip_all, fields(root = ?self.0.root.model_type()))]
    pub fn generate(&self, model: &Value, ctx: &mut ViewContext) -> Result<View, ViewError> {
        let root = &self.0.root;
        if let (Value::Object(object), Some(ty)) = (model, root.model_type()) {
            if root.kind() == NodeKind::Object && !object.is_instance_of(ty) {
                return Err(ctx.error(ViewErrorKind::TypeMismatch {
                    expected: ty.name().to_string(),
                    found: object.model_type().name().to_string(),
                }));
            }
        }
        let mut writer = ViewWriter::new(ctx.options().max_depth);
        self.0.generator.generate_root(model, &mut writer, ctx)?;
        let view = writer.finish().map_err(|e| ctx.error(e))?;
        debug!(events = view.len(), "view generated");
        Ok(view)
    }

    /// Applies `view` to the live `target`.
    ///
    /// The whole view is read and checked before the model is touched, so a
    /// malformed view leaves `target` unchanged.
    #[instrument(skip_all, fields(root = ?self.0.root.model_type(), events = view.len()))]
    pub fn apply(&self, view: &View, target: &Value, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let applicator = &self.0.applicator;
        let initial = self.initial_type(target);
        let mut reader = view.reader(ctx.options().max_depth);
        let staged = applicator.stage_root(&mut reader, initial.as_ref(), ctx)?;
        reader.finish().map_err(|e| ctx.error(e))?;
        applicator.inject_root(staged, target, ctx)
    }

    /// Applies `view` to a new model value and returns it.
    ///
    /// Object templates instantiate the (possibly discriminated) root type
    /// through the context; array templates fill a new list.
    #[instrument(skip_all, fields(root = ?self.0.root.model_type(), events = view.len()))]
    pub fn apply_new(&self, view: &View, ctx: &mut ViewContext) -> Result<Value, ViewError> {
        let applicator = &self.0.applicator;
        let root_type = self.0.root.model_type().cloned();
        let mut reader = view.reader(ctx.options().max_depth);
        let staged = applicator.stage_root(&mut reader, root_type.as_ref(), ctx)?;
        reader.finish().map_err(|e| ctx.error(e))?;
        let target = match (&staged, self.0.root.kind()) {
            (Staged::Null | Staged::Unchanged, _) => return Ok(Value::NULL),
            (Staged::Entity(entity), _) => {
                let object = ctx.new_instance(entity.model_type())?;
                ctx.entity_created(&object);
                Value::Object(object)
            }
            _ => Value::List(ListRef::new()),
        };
        applicator.inject_root(staged, &target, ctx)?;
        Ok(target)
    }

    /// Staging starts from the live root's type when it is a subtype of the
    /// template's root type.
    fn initial_type(&self, target: &Value) -> Option<ModelType> {
        let declared = self.0.root.model_type()?;
        match target {
            Value::Object(object) if self.0.root.kind() == NodeKind::Object => {
                let live = object.model_type();
                if live.is_subtype_of(declared) {
                    Some(live)
                } else {
                    Some(declared.clone())
                }
            }
            _ => Some(declared.clone()),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("root", &self.0.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item_type, order_template, order_type};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_template_is_send_sync() {
        assert_send_sync::<Template>();
        assert_send_sync::<Node>();
    }

    #[test]
    fn test_find_is_breadth_first() {
        let template = order_template(&order_type(&item_type()), &item_type());
        let node = template.find("sku").unwrap();
        assert_eq!(node.kind(), NodeKind::Value);
        assert!(template.find("missing").is_none());
        let first = template.nodes().next().unwrap();
        assert!(Arc::ptr_eq(&first, template.root()));
    }

    #[test]
    fn test_effective_modes_default_to_supported() {
        let template = order_template(&order_type(&item_type()), &item_type());
        let total = template.find("total").unwrap();
        assert_eq!(total.modes(), AccessModes::READ);
        let id = template.find("id").unwrap();
        assert_eq!(id.modes(), AccessModes::READ_WRITE);
    }
}
