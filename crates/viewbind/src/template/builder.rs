//! Cursor-based template builder.
//!
//! The cursor starts inside the root container. Adding an object-shaped
//! child (object, reference, array or map of objects, envelope, subtype)
//! moves the cursor into it; [`end`](TemplateBuilder::end) moves it back to
//! the parent. Leaves (values, value collections, discriminators, meta and
//! splice nodes) leave the cursor where it is. Modifiers such as
//! [`converter`](TemplateBuilder::converter) apply to the node added (or
//! closed) last.
//!
//! Accessors are resolved as nodes are added. The first error is kept and
//! returned by [`build`](TemplateBuilder::build), so calls can be chained
//! freely.
//!
//! # Example
//!
//! ```rust
//! use viewbind::model::{ModelType, ScalarKind};
//! use viewbind::TemplateBuilder;
//!
//! let item = ModelType::builder("Item")
//!     .scalar("sku", ScalarKind::String)
//!     .scalar("qty", ScalarKind::Int)
//!     .build();
//! let order = ModelType::builder("Order")
//!     .scalar("id", ScalarKind::Int)
//!     .list("items")
//!     .build();
//!
//! let template = TemplateBuilder::for_object(&order)
//!     .value("id")
//!     .array_of_objects("items", &item)
//!         .identity(["sku"])
//!         .value("sku")
//!         .value("qty")
//!     .end()
//!     .build()
//!     .unwrap();
//! assert!(template.find("qty").is_some());
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::access::{
    check_modes, AccessModes, AccessorFactory, AccessorRef, ArrayAccessor, CoercingAccessor,
    Coercion, ConvertingAccessor, DeclaredAccessorFactory, ListAccessor, MapAccessor,
    MultiValuedAccessor, RootAccessor, SetAccessor,
};
use crate::association::{Identity, IdentityKey, ManagerFactory};
use crate::convert::ConverterRef;
use crate::discriminator::{DiscriminatorStrategy, SimpleDiscriminator, DEFAULT_DISCRIMINATOR};
use crate::error::TemplateError;
use crate::handler::{MetaHandler, SpliceHandler};
use crate::model::{DataType, ModelType, ScalarKind};
use crate::template::{validate, Node, NodeKind, Template};

enum Child {
    Draft(usize),
    Built(Arc<Node>),
}

/// A node under construction.
struct Draft {
    kind: NodeKind,
    name: Option<Arc<str>>,
    namespace: Option<Arc<str>>,
    model_type: Option<ModelType>,
    /// Type the property is read from.
    owner: Option<ModelType>,
    accessor: Option<AccessorRef>,
    children: Vec<Child>,
    scalar_kind: Option<ScalarKind>,
    converter: Option<ConverterRef>,
    key_converter: Option<ConverterRef>,
    identity: Vec<Arc<str>>,
    inherited_identity: Option<Identity>,
    manager: Option<Arc<dyn ManagerFactory>>,
    discriminator: Option<Arc<dyn DiscriminatorStrategy>>,
    meta: Option<Arc<dyn MetaHandler>>,
    splice: Option<Arc<dyn SpliceHandler>>,
    modes: Option<AccessModes>,
    coercion: Option<Arc<dyn Coercion>>,
    reference: bool,
}

impl Draft {
    fn new(kind: NodeKind, name: Option<&str>) -> Self {
        Self {
            kind,
            name: name.map(Arc::from),
            namespace: None,
            model_type: None,
            owner: None,
            accessor: None,
            children: Vec::new(),
            scalar_kind: None,
            converter: None,
            key_converter: None,
            identity: Vec::new(),
            inherited_identity: None,
            manager: None,
            discriminator: None,
            meta: None,
            splice: None,
            modes: None,
            coercion: None,
            reference: false,
        }
    }

    fn root(kind: NodeKind, data_type: DataType) -> Self {
        let mut draft = Self::new(kind, None);
        draft.accessor = Some(Arc::new(RootAccessor::new(data_type)));
        draft
    }

    fn with_type(mut self, model_type: &ModelType) -> Self {
        self.model_type = Some(model_type.clone());
        self
    }

    fn label(&self) -> String {
        self.name.as_deref().unwrap_or("<root>").to_string()
    }

    fn into_node(self, children: Vec<Arc<Node>>) -> Result<Node, TemplateError> {
        let label = self.label();
        let kind = self.kind;
        if let (Some(requested), Some(accessor)) = (self.modes, &self.accessor) {
            let owner = self.owner.as_ref().map_or("<root>", |t| t.name());
            check_modes(owner, accessor.as_ref(), requested)?;
        }

        let data_type = self.accessor.as_ref().map(|a| a.data_type());
        if let Some(data_type) = data_type {
            let fits = match kind {
                NodeKind::Value => matches!(data_type, DataType::Scalar(_) | DataType::Any),
                NodeKind::Object | NodeKind::Reference => {
                    matches!(data_type, DataType::Object | DataType::Any)
                }
                NodeKind::ArrayOfValues | NodeKind::ArrayOfObjects => {
                    self.coercion.is_some() || data_type.is_collection() || data_type == DataType::Any
                }
                NodeKind::MapOfValues | NodeKind::MapOfObjects => {
                    matches!(data_type, DataType::Map(_) | DataType::Any)
                }
                _ => true,
            };
            if !fits {
                return Err(TemplateError::ShapeMismatch {
                    property: label,
                    data_type,
                    kind,
                });
            }
        }

        let mut accessor = self.accessor;
        let mut scalar_kind = self.scalar_kind;
        let mut key_kind = None;
        let mut multi: Option<Arc<dyn MultiValuedAccessor>> = None;
        match (kind, accessor.clone()) {
            (NodeKind::Value, Some(base)) => {
                scalar_kind = base.data_type().scalar_kind();
                if let Some(converter) = &self.converter {
                    accessor = Some(Arc::new(ConvertingAccessor::new(base, converter.clone())));
                }
            }
            (NodeKind::ArrayOfValues | NodeKind::ArrayOfObjects, Some(base)) => {
                if let Some(coercion) = &self.coercion {
                    let coerced: AccessorRef = Arc::new(CoercingAccessor::new(base, coercion.clone()));
                    accessor = Some(coerced.clone());
                    multi = Some(Arc::new(ArrayAccessor::new(coerced)));
                } else {
                    let selected: Arc<dyn MultiValuedAccessor> = match base.data_type() {
                        DataType::Set => Arc::new(SetAccessor::new(base)),
                        DataType::Array => Arc::new(ArrayAccessor::new(base)),
                        _ => Arc::new(ListAccessor::new(base)),
                    };
                    multi = Some(selected);
                }
            }
            (NodeKind::MapOfValues | NodeKind::MapOfObjects, Some(base)) => {
                let declared = match base.data_type() {
                    DataType::Map(k) => k,
                    _ => ScalarKind::String,
                };
                if declared == ScalarKind::Float {
                    return Err(TemplateError::UnsupportedKeyKind {
                        key_kind: declared,
                        kind,
                    });
                }
                key_kind = Some(declared);
                multi = Some(Arc::new(MapAccessor::new(base)));
            }
            _ => {}
        }

        let identity = if self.identity.is_empty() {
            self.inherited_identity.unwrap_or_default()
        } else {
            let mut keys = Vec::with_capacity(self.identity.len());
            for name in &self.identity {
                let accessor = children
                    .iter()
                    .find(|c| c.kind() == NodeKind::Value && c.name() == Some(&**name))
                    .and_then(|c| c.accessor().cloned())
                    .ok_or_else(|| TemplateError::UnknownProperty {
                        owner: self
                            .model_type
                            .as_ref()
                            .map_or_else(|| label.clone(), |t| t.name().to_string()),
                        property: name.to_string(),
                    })?;
                keys.push(IdentityKey::new(name.clone(), accessor));
            }
            Identity::new(keys)
        };

        let string_keys =
            key_kind == Some(ScalarKind::String) || self.key_converter.is_some();
        Ok(Node {
            kind,
            name: self.name,
            namespace: self.namespace,
            model_type: self.model_type,
            accessor,
            multi,
            children,
            scalar_kind,
            key_kind,
            string_keys,
            converter: self.converter,
            key_converter: self.key_converter,
            identity,
            manager: self.manager,
            discriminator: self.discriminator,
            meta: self.meta,
            splice: self.splice,
            modes: self.modes,
            reference: self.reference,
        })
    }
}

fn finalize(drafts: &mut [Option<Draft>], index: usize) -> Result<Arc<Node>, TemplateError> {
    let mut draft = drafts
        .get_mut(index)
        .and_then(Option::take)
        .ok_or_else(|| TemplateError::InvalidComposition {
            reason: format!("node {index} is referenced twice"),
        })?;
    let pending = std::mem::take(&mut draft.children);
    let mut children = Vec::with_capacity(pending.len());
    for child in pending {
        children.push(match child {
            Child::Draft(i) => finalize(drafts, i)?,
            Child::Built(node) => node,
        });
    }
    Ok(Arc::new(draft.into_node(children)?))
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builder for [`Template`]s.
pub struct TemplateBuilder {
    factory: Arc<dyn AccessorFactory>,
    drafts: Vec<Draft>,
    open: Vec<usize>,
    last: usize,
    error: Option<TemplateError>,
}

impl TemplateBuilder {
    fn with_root(root: Draft, open: bool) -> Self {
        Self {
            factory: Arc::new(DeclaredAccessorFactory),
            drafts: vec![root],
            open: if open { vec![0] } else { Vec::new() },
            last: 0,
            error: None,
        }
    }

    /// Starts a template whose root is an object of `model_type`.
    pub fn for_object(model_type: &ModelType) -> Self {
        Self::with_root(
            Draft::root(NodeKind::Object, DataType::Object).with_type(model_type),
            true,
        )
    }

    /// Starts a template whose root is a list of `model_type` objects.
    pub fn for_array_of_objects(model_type: &ModelType) -> Self {
        Self::with_root(
            Draft::root(NodeKind::ArrayOfObjects, DataType::List).with_type(model_type),
            true,
        )
    }

    /// Starts a template whose root is a list of scalars.
    pub fn for_array_of_values(kind: ScalarKind) -> Self {
        let mut root = Draft::root(NodeKind::ArrayOfValues, DataType::List);
        root.scalar_kind = Some(kind);
        Self::with_root(root, false)
    }

    /// Replaces the accessor factory used for nodes added afterwards.
    pub fn with_factory(mut self, factory: Arc<dyn AccessorFactory>) -> Self {
        self.factory = factory;
        self
    }

    fn fail(mut self, error: TemplateError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    fn add(mut self, mut draft: Draft, enter: bool) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(&parent) = self.open.last() else {
            return self.fail(TemplateError::InvalidComposition {
                reason: format!("no open container for {:?} node {}", draft.kind, draft.label()),
            });
        };
        let owner = self.drafts[parent].model_type.clone();
        if draft.kind == NodeKind::Envelope {
            draft.model_type = owner.clone();
        }
        if draft.kind.is_property() && draft.accessor.is_none() {
            let Some(owner) = owner else {
                let error = TemplateError::MissingModelType {
                    node: self.drafts[parent].label(),
                    kind: self.drafts[parent].kind,
                };
                return self.fail(error);
            };
            let name = draft.name.clone().unwrap_or_else(|| Arc::from(""));
            match self.factory.accessor(&owner, &name) {
                Ok(accessor) => draft.accessor = Some(accessor),
                Err(e) => return self.fail(e),
            }
            draft.owner = Some(owner);
        }
        let index = self.drafts.len();
        self.drafts.push(draft);
        self.drafts[parent].children.push(Child::Draft(index));
        self.last = index;
        if enter {
            self.open.push(index);
        }
        self
    }

    fn modify<F>(mut self, what: &str, allowed: &[NodeKind], f: F) -> Self
    where
        F: FnOnce(&mut Draft),
    {
        if self.error.is_some() {
            return self;
        }
        let draft = &mut self.drafts[self.last];
        if !allowed.is_empty() && !allowed.contains(&draft.kind) {
            let reason = format!("{what} does not apply to {:?} node {}", draft.kind, draft.label());
            return self.fail(TemplateError::InvalidComposition { reason });
        }
        f(draft);
        self
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    /// Adds a scalar property.
    pub fn value(self, name: &str) -> Self {
        self.add(Draft::new(NodeKind::Value, Some(name)), false)
    }

    /// Adds an owned object property and enters it.
    pub fn object(self, name: &str, model_type: &ModelType) -> Self {
        self.add(Draft::new(NodeKind::Object, Some(name)).with_type(model_type), true)
    }

    /// Adds an object property resolved by reference on application, and
    /// enters it.
    pub fn reference(self, name: &str, model_type: &ModelType) -> Self {
        let mut draft = Draft::new(NodeKind::Reference, Some(name)).with_type(model_type);
        draft.reference = true;
        self.add(draft, true)
    }

    /// Adds a collection of owned objects and enters its element template.
    pub fn array_of_objects(self, name: &str, model_type: &ModelType) -> Self {
        self.add(Draft::new(NodeKind::ArrayOfObjects, Some(name)).with_type(model_type), true)
    }

    /// Adds a collection of referenced objects and enters its element
    /// template.
    pub fn array_of_references(self, name: &str, model_type: &ModelType) -> Self {
        let mut draft = Draft::new(NodeKind::ArrayOfObjects, Some(name)).with_type(model_type);
        draft.reference = true;
        self.add(draft, true)
    }

    /// Adds a collection of scalars of `kind`.
    pub fn array_of_values(self, name: &str, kind: ScalarKind) -> Self {
        let mut draft = Draft::new(NodeKind::ArrayOfValues, Some(name));
        draft.scalar_kind = Some(kind);
        self.add(draft, false)
    }

    /// Adds a map of scalars of `kind`.
    pub fn map_of_values(self, name: &str, kind: ScalarKind) -> Self {
        let mut draft = Draft::new(NodeKind::MapOfValues, Some(name));
        draft.scalar_kind = Some(kind);
        self.add(draft, false)
    }

    /// Adds a map of owned objects and enters its value template.
    pub fn map_of_objects(self, name: &str, model_type: &ModelType) -> Self {
        self.add(Draft::new(NodeKind::MapOfObjects, Some(name)).with_type(model_type), true)
    }

    /// Adds a map of referenced objects and enters its value template.
    pub fn map_of_references(self, name: &str, model_type: &ModelType) -> Self {
        let mut draft = Draft::new(NodeKind::MapOfObjects, Some(name)).with_type(model_type);
        draft.reference = true;
        self.add(draft, true)
    }

    /// Adds a named object that groups properties of the enclosing model,
    /// and enters it.
    pub fn envelope(self, name: &str) -> Self {
        self.add(Draft::new(NodeKind::Envelope, Some(name)), true)
    }

    /// Adds a branch for instances of `model_type` and enters it.
    pub fn subtype(self, model_type: &ModelType) -> Self {
        self.add(Draft::new(NodeKind::Subtype, None).with_type(model_type), true)
    }

    /// Adds a discriminator named `type` that identifies types by name.
    pub fn discriminator(self) -> Self {
        self.discriminator_with(DEFAULT_DISCRIMINATOR, Arc::new(SimpleDiscriminator))
    }

    pub fn discriminator_with(self, name: &str, strategy: Arc<dyn DiscriminatorStrategy>) -> Self {
        let mut draft = Draft::new(NodeKind::Discriminator, Some(name));
        draft.discriminator = Some(strategy);
        self.add(draft, false)
    }

    pub fn meta(self, name: &str, handler: Arc<dyn MetaHandler>) -> Self {
        let mut draft = Draft::new(NodeKind::Meta, Some(name));
        draft.meta = Some(handler);
        self.add(draft, false)
    }

    pub fn splice(self, name: &str, handler: Arc<dyn SpliceHandler>) -> Self {
        let mut draft = Draft::new(NodeKind::Splice, Some(name));
        draft.splice = Some(handler);
        self.add(draft, false)
    }

    /// Closes the current container.
    pub fn end(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.open.len() <= 1 {
            return self.fail(TemplateError::InvalidComposition {
                reason: "end() without an open container".to_string(),
            });
        }
        if let Some(closed) = self.open.pop() {
            self.last = closed;
        }
        self
    }

    // -------------------------------------------------------------------------
    // Template splicing
    // -------------------------------------------------------------------------

    fn graft(self, kind: NodeKind, name: &str, template: &Template, reference: bool) -> Self {
        let root = template.root();
        let element_type = match root.kind() {
            NodeKind::Object | NodeKind::ArrayOfObjects => root.model_type(),
            _ => None,
        };
        let Some(element_type) = element_type else {
            return self.fail(TemplateError::InvalidComposition {
                reason: format!("a {:?} template cannot be spliced as {name}", root.kind()),
            });
        };
        let mut draft = Draft::new(kind, Some(name)).with_type(element_type);
        draft.reference = reference;
        draft.namespace = root.namespace_arc().cloned();
        draft.manager = root.manager().cloned();
        draft.inherited_identity = Some(root.identity().clone());
        draft.children = root.children().iter().cloned().map(Child::Built).collect();
        self.add(draft, false)
    }

    /// Adds an object property whose properties are those of `template`.
    pub fn object_template(self, name: &str, template: &Template) -> Self {
        self.graft(NodeKind::Object, name, template, false)
    }

    pub fn reference_template(self, name: &str, template: &Template) -> Self {
        self.graft(NodeKind::Reference, name, template, true)
    }

    /// Adds a collection whose element template is `template`.
    pub fn array_template(self, name: &str, template: &Template) -> Self {
        self.graft(NodeKind::ArrayOfObjects, name, template, false)
    }

    pub fn map_template(self, name: &str, template: &Template) -> Self {
        self.graft(NodeKind::MapOfObjects, name, template, false)
    }

    // -------------------------------------------------------------------------
    // Modifiers
    // -------------------------------------------------------------------------

    /// Converter for the scalars of the last value node or value collection.
    pub fn converter(self, converter: ConverterRef) -> Self {
        self.modify(
            "converter",
            &[NodeKind::Value, NodeKind::ArrayOfValues, NodeKind::MapOfValues],
            |d| d.converter = Some(converter),
        )
    }

    /// Converter for the keys of the last map node.
    pub fn key_converter(self, converter: ConverterRef) -> Self {
        self.modify(
            "key converter",
            &[NodeKind::MapOfValues, NodeKind::MapOfObjects],
            |d| d.key_converter = Some(converter),
        )
    }

    /// Identity properties of the current container's objects. Each name
    /// must be a value node of the container.
    pub fn identity<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.error.is_some() {
            return self;
        }
        let Some(&current) = self.open.last() else {
            return self.fail(TemplateError::InvalidComposition {
                reason: "identity() without an open container".to_string(),
            });
        };
        let draft = &mut self.drafts[current];
        if matches!(draft.kind, NodeKind::Envelope | NodeKind::Subtype) {
            let reason = format!("identity does not apply to {:?} node {}", draft.kind, draft.label());
            return self.fail(TemplateError::InvalidComposition { reason });
        }
        draft.identity = names.into_iter().map(|n| Arc::from(n.as_ref())).collect();
        self
    }

    /// Namespace of the last node's events.
    pub fn namespace(self, namespace: &str) -> Self {
        self.modify("namespace", &[], |d| d.namespace = Some(Arc::from(namespace)))
    }

    /// Pins the association manager of the last object-shaped node.
    pub fn manager(self, factory: Arc<dyn ManagerFactory>) -> Self {
        self.modify(
            "manager",
            &[
                NodeKind::Object,
                NodeKind::Reference,
                NodeKind::ArrayOfObjects,
                NodeKind::MapOfObjects,
            ],
            |d| d.manager = Some(factory),
        )
    }

    /// Requests access modes for the last node. They must be supported by
    /// its accessor.
    pub fn access_mode(self, modes: AccessModes) -> Self {
        self.modify("access mode", &[], |d| d.modes = Some(modes))
    }

    /// Treats the last collection's property through `coercion`.
    pub fn coerce(self, coercion: Arc<dyn Coercion>) -> Self {
        self.modify(
            "coercion",
            &[NodeKind::ArrayOfValues, NodeKind::ArrayOfObjects],
            |d| d.coercion = Some(coercion),
        )
    }

    /// Closes any open containers, resolves and validates the tree, and
    /// builds the processing chains.
    pub fn build(self) -> Result<Template, TemplateError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut drafts: Vec<Option<Draft>> = self.drafts.into_iter().map(Some).collect();
        let root = finalize(&mut drafts, 0)?;
        validate::validate(&root)?;
        let template = Template::new(root);
        debug!(nodes = template.nodes().count(), "template built");
        Ok(template)
    }
}
