//! Association management and reconciliation.
//!
//! An association manager reads and mutates one relationship between an
//! owner object and its associates. The capability a manager offers selects
//! the reconciliation strategy:
//!
//! - [`ToOneManager`]: single associate (`to_one`)
//! - [`IndexedManager`]: ordered collection (`ordered`)
//! - [`UnorderedManager`]: collection without order (`unordered`)
//! - [`KeyedManager`]: map (`keyed`)
//!
//! Managers are located per reconciliation: a factory pinned on the template
//! node wins, then the first factory registered on the context that supports
//! the association, then a default manager built from the node's accessor.
//! Factories produce a fresh manager every time, so managers may keep state
//! for the duration of one reconciliation.

mod identity;
mod keyed;
mod managers;
mod ordered;
mod to_one;
mod unordered;

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::access::Capability;
use crate::apply::ViewEntity;
use crate::context::ViewContext;
use crate::error::{AccessError, ViewError, ViewErrorKind};
use crate::model::{ModelType, ObjectRef, Scalar, Value};
use crate::template::{Node, NodeKind};

pub use identity::{Identity, IdentityKey};
pub use managers::{
    AccessorIndexedManager, AccessorKeyedManager, AccessorToOneManager, AccessorUnorderedManager,
};

pub(crate) use keyed::reconcile as reconcile_keyed;
pub(crate) use ordered::reconcile as reconcile_ordered;
pub(crate) use to_one::reconcile as reconcile_to_one;
pub(crate) use unordered::reconcile as reconcile_unordered;

/// Identifies one relationship: which property of which owner type holds
/// associates of which type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationDescriptor {
    owner: ModelType,
    associate: ModelType,
    name: Arc<str>,
}

impl AssociationDescriptor {
    pub fn new(owner: &ModelType, associate: &ModelType, name: &str) -> Self {
        Self {
            owner: owner.clone(),
            associate: associate.clone(),
            name: Arc::from(name),
        }
    }

    /// Descriptor of a template's root collection. There is no owning
    /// object, so the owner is the element type and the name is empty.
    pub fn root(associate: &ModelType) -> Self {
        Self::new(associate, associate, "")
    }

    pub fn owner(&self) -> &ModelType {
        &self.owner
    }

    pub fn associate(&self) -> &ModelType {
        &self.associate
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AssociationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.owner, self.name, self.associate)
    }
}

// =============================================================================
// MANAGER CONTRACTS
// =============================================================================

/// Operations shared by every manager.
pub trait AssociationManager {
    /// Called before a reconciliation touches the association.
    fn begin(&mut self, _owner: &Value) -> Result<(), ViewErrorKind> {
        Ok(())
    }

    /// Called after a reconciliation completed.
    fn end(&mut self, _owner: &Value) -> Result<(), ViewErrorKind> {
        Ok(())
    }

    /// Returns true if `live` is the associate `staged` describes.
    fn is_same_associate(&self, live: &ObjectRef, staged: &ViewEntity) -> bool;

    /// Creates a new associate of `model_type`.
    fn new_associate(
        &mut self,
        model_type: &ModelType,
        ctx: &ViewContext,
    ) -> Result<ObjectRef, ViewError> {
        ctx.new_instance(model_type)
    }
}

/// Manager of a single associate.
pub trait ToOneManager: AssociationManager {
    fn get(&self, owner: &Value) -> Result<Option<ObjectRef>, AccessError>;

    fn set(&mut self, owner: &Value, associate: Option<ObjectRef>) -> Result<(), AccessError>;
}

/// Manager of an ordered, index-addressable collection.
pub trait IndexedManager: AssociationManager {
    fn size(&self, owner: &Value) -> Result<usize, AccessError>;

    fn get(&self, owner: &Value, index: usize) -> Result<Value, AccessError>;

    /// Inserts `value` at `index`, shifting later elements.
    fn add(&mut self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError>;

    fn remove(&mut self, owner: &Value, index: usize) -> Result<Value, AccessError>;

    fn index_of(&self, owner: &Value, value: &Value) -> Result<Option<usize>, AccessError>;
}

/// Manager of a collection without meaningful order.
pub trait UnorderedManager: AssociationManager {
    fn iterate(&self, owner: &Value) -> Result<Vec<Value>, AccessError>;

    fn add(&mut self, owner: &Value, value: Value) -> Result<(), AccessError>;

    fn remove(&mut self, owner: &Value, value: &Value) -> Result<bool, AccessError>;

    /// Picks the candidate that is the same associate as `staged`. The first
    /// match in iteration order wins.
    fn find_associate(&self, candidates: &[ObjectRef], staged: &ViewEntity) -> Option<usize> {
        candidates
            .iter()
            .position(|c| self.is_same_associate(c, staged))
    }
}

/// Manager of a keyed collection.
pub trait KeyedManager: AssociationManager {
    fn entries(&self, owner: &Value) -> Result<Vec<(Scalar, Value)>, AccessError>;

    fn get(&self, owner: &Value, key: &Scalar) -> Result<Option<Value>, AccessError>;

    fn put(&mut self, owner: &Value, key: Scalar, value: Value) -> Result<(), AccessError>;

    fn remove(&mut self, owner: &Value, key: &Scalar) -> Result<Option<Value>, AccessError>;
}

/// A manager, tagged by the capability it provides.
pub enum Manager {
    ToOne(Box<dyn ToOneManager>),
    Indexed(Box<dyn IndexedManager>),
    Unordered(Box<dyn UnorderedManager>),
    Keyed(Box<dyn KeyedManager>),
}

impl Manager {
    pub fn capability(&self) -> &'static str {
        match self {
            Manager::ToOne(_) => "to-one",
            Manager::Indexed(_) => "indexed",
            Manager::Unordered(_) => "unordered",
            Manager::Keyed(_) => "keyed",
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Manager({})", self.capability())
    }
}

/// Produces a fresh manager for each reconciliation of a supported
/// association.
pub trait ManagerFactory: Send + Sync + fmt::Debug {
    fn supports(&self, descriptor: &AssociationDescriptor) -> bool;

    fn create(&self, descriptor: &AssociationDescriptor) -> Manager;
}

/// Locates the manager for `node`, which holds associates of `descriptor`.
pub(crate) fn resolve_manager(
    node: &Node,
    descriptor: &AssociationDescriptor,
    ctx: &ViewContext,
) -> Result<Manager, ViewError> {
    if let Some(factory) = node.manager() {
        if !factory.supports(descriptor) {
            return Err(ctx.error(ViewErrorKind::UnsupportedAssociation {
                descriptor: descriptor.to_string(),
            }));
        }
        trace!(%descriptor, "using pinned manager");
        return Ok(factory.create(descriptor));
    }
    if let Some(factory) = ctx.manager_factories().iter().find(|f| f.supports(descriptor)) {
        trace!(%descriptor, "using registered manager");
        return Ok(factory.create(descriptor));
    }
    default_manager(node, ctx)
}

fn default_manager(node: &Node, ctx: &ViewContext) -> Result<Manager, ViewError> {
    let identity = node.identity().clone();
    let missing = || {
        ctx.error(ViewErrorKind::UnsupportedAssociation {
            descriptor: node.name().unwrap_or("<root>").to_string(),
        })
    };
    match node.kind() {
        NodeKind::Object | NodeKind::Reference => {
            let accessor = node.accessor().cloned().ok_or_else(missing)?;
            Ok(Manager::ToOne(Box::new(AccessorToOneManager::new(accessor, identity))))
        }
        NodeKind::ArrayOfObjects => {
            let multi = node.multi().cloned().ok_or_else(missing)?;
            match multi.capability() {
                Capability::Ordered => Ok(Manager::Indexed(Box::new(
                    AccessorIndexedManager::new(multi, identity),
                ))),
                Capability::Unordered => Ok(Manager::Unordered(Box::new(
                    AccessorUnorderedManager::new(multi, identity),
                ))),
                Capability::Keyed => Err(missing()),
            }
        }
        NodeKind::MapOfObjects => {
            let multi = node.multi().cloned().ok_or_else(missing)?;
            Ok(Manager::Keyed(Box::new(AccessorKeyedManager::new(multi, identity))))
        }
        _ => Err(missing()),
    }
}

// =============================================================================
// RECONCILIATION SUPPORT
// =============================================================================

/// Injects a staged entity into a live object.
pub(crate) type Inject<'a> =
    &'a dyn Fn(ViewEntity, &ObjectRef, &mut ViewContext) -> Result<(), ViewError>;

/// What a reconciliation needs besides the manager and the staged data.
pub(crate) struct Reconciler<'a> {
    /// New associates are resolved rather than instantiated.
    pub reference: bool,
    pub inject: Inject<'a>,
}

impl Reconciler<'_> {
    /// Creates or resolves the associate for `entity`.
    pub(crate) fn obtain<M>(
        &self,
        manager: &mut M,
        entity: &ViewEntity,
        ctx: &ViewContext,
    ) -> Result<ObjectRef, ViewError>
    where
        M: AssociationManager + ?Sized,
    {
        if self.reference {
            ctx.resolve_reference(entity.model_type(), entity)
        } else {
            manager.new_associate(entity.model_type(), ctx)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the strategy tests.

    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use crate::access::{AccessorFactory, DeclaredAccessorFactory, ListAccessor, MultiValuedAccessor};
    use crate::apply::{Staged, ViewEntity};
    use crate::association::{Identity, IdentityKey};
    use crate::context::ViewContext;
    use crate::error::ViewError;
    use crate::listener::{EntityEvent, ViewListener};
    use crate::model::{ModelType, ObjectRef, Scalar, ScalarKind, Value};

    pub fn item_type() -> ModelType {
        ModelType::builder("Item")
            .scalar("sku", ScalarKind::String)
            .scalar("qty", ScalarKind::Int)
            .build()
    }

    pub fn identity(ty: &ModelType) -> Identity {
        let sku = DeclaredAccessorFactory.accessor(ty, "sku").unwrap();
        Identity::new(vec![IdentityKey::new(Arc::from("sku"), sku)])
    }

    pub fn item(ty: &ModelType, sku: &str, qty: i64) -> ObjectRef {
        ObjectRef::new(ty).with("sku", sku).with("qty", qty)
    }

    pub fn staged(ty: &ModelType, sku: &str, qty: i64) -> ViewEntity {
        let mut e = ViewEntity::new(ty);
        e.put(Arc::from("sku"), Staged::Value(Scalar::from(sku)));
        e.put(Arc::from("qty"), Staged::Value(Scalar::from(qty)));
        e
    }

    /// Copies staged scalars onto the object.
    pub fn inject(entity: ViewEntity, obj: &ObjectRef, _ctx: &mut ViewContext) -> Result<(), ViewError> {
        let mut entity = entity;
        for name in ["sku", "qty"] {
            if let Some(Staged::Value(s)) = entity.take(name) {
                obj.set(name, s);
            }
        }
        Ok(())
    }

    pub fn holder(items: Vec<ObjectRef>) -> (ModelType, Value, Arc<dyn MultiValuedAccessor>) {
        let ty = ModelType::builder("Order").list("items").set("tags").build();
        let owner = ObjectRef::new(&ty);
        for it in items {
            if let Value::List(list) = owner.get("items") {
                list.push(it);
            }
        }
        let acc = DeclaredAccessorFactory.accessor(&ty, "items").unwrap();
        (ty, Value::Object(owner), Arc::new(ListAccessor::new(acc)))
    }

    pub fn skus(values: &[Value]) -> Vec<String> {
        values
            .iter()
            .filter_map(|v| v.as_object().map(|o| o.scalar("sku").to_string()))
            .collect()
    }

    #[derive(Default)]
    pub struct Log {
        pub created: RefCell<Vec<String>>,
        pub discarded: RefCell<Vec<String>>,
    }

    impl ViewListener for Log {
        fn entity_created(&self, event: &EntityEvent<'_>) {
            self.created.borrow_mut().push(event.entity.scalar("sku").to_string());
        }

        fn entity_discarded(&self, event: &EntityEvent<'_>) {
            self.discarded.borrow_mut().push(event.entity.scalar("sku").to_string());
        }
    }

    pub fn context_with_log() -> (ViewContext, Rc<Log>) {
        let log = Rc::new(Log::default());
        let mut ctx = ViewContext::new();
        ctx.add_listener(log.clone());
        (ctx, log)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ErrorCode;
    use crate::event::{Event, View};
    use crate::model::ListRef;
    use crate::template::TemplateBuilder;
    use crate::testing::{item, item_type, items_of, order, order_type};

    /// Shared record of factory and manager calls.
    #[derive(Debug, Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: String) {
            if let Ok(mut entries) = self.0.lock() {
                entries.push(entry);
            }
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    /// Factory of indexed managers that journal every call.
    #[derive(Debug)]
    struct JournalFactory {
        label: &'static str,
        supported: bool,
        created: AtomicUsize,
        journal: Arc<Journal>,
    }

    impl JournalFactory {
        fn new(label: &'static str, supported: bool, journal: &Arc<Journal>) -> Arc<Self> {
            Arc::new(Self {
                label,
                supported,
                created: AtomicUsize::new(0),
                journal: journal.clone(),
            })
        }
    }

    impl ManagerFactory for JournalFactory {
        fn supports(&self, _descriptor: &AssociationDescriptor) -> bool {
            self.supported
        }

        fn create(&self, descriptor: &AssociationDescriptor) -> Manager {
            let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            self.journal.push(format!("{} create #{serial}", self.label));
            Manager::Indexed(Box::new(JournalManager {
                label: self.label,
                serial,
                property: descriptor.name().to_string(),
                journal: self.journal.clone(),
            }))
        }
    }

    /// Indexed manager over a list, either the owner itself or its
    /// `property`. Associates match by `sku`.
    struct JournalManager {
        label: &'static str,
        serial: usize,
        property: String,
        journal: Arc<Journal>,
    }

    impl JournalManager {
        fn list(&self, owner: &Value) -> Result<ListRef, AccessError> {
            let held = match owner {
                Value::Object(object) => object.get(&self.property),
                other => other.clone(),
            };
            match held {
                Value::List(list) => Ok(list),
                other => Err(AccessError::WrongShape {
                    property: self.property.clone(),
                    expected: "list",
                    found: other.shape_name(),
                }),
            }
        }
    }

    impl AssociationManager for JournalManager {
        fn begin(&mut self, _owner: &Value) -> Result<(), ViewErrorKind> {
            self.journal.push(format!("{} begin #{}", self.label, self.serial));
            Ok(())
        }

        fn end(&mut self, _owner: &Value) -> Result<(), ViewErrorKind> {
            self.journal.push(format!("{} end #{}", self.label, self.serial));
            Ok(())
        }

        fn is_same_associate(&self, live: &ObjectRef, staged: &ViewEntity) -> bool {
            staged.scalar("sku") == Some(&live.scalar("sku"))
        }
    }

    impl IndexedManager for JournalManager {
        fn size(&self, owner: &Value) -> Result<usize, AccessError> {
            Ok(self.list(owner)?.len())
        }

        fn get(&self, owner: &Value, index: usize) -> Result<Value, AccessError> {
            let list = self.list(owner)?;
            list.get(index).ok_or(AccessError::IndexOutOfBounds {
                property: self.property.clone(),
                index,
                size: list.len(),
            })
        }

        fn add(&mut self, owner: &Value, index: usize, value: Value) -> Result<(), AccessError> {
            self.list(owner)?.insert(index, value);
            Ok(())
        }

        fn remove(&mut self, owner: &Value, index: usize) -> Result<Value, AccessError> {
            Ok(self.list(owner)?.remove(index))
        }

        fn index_of(&self, owner: &Value, value: &Value) -> Result<Option<usize>, AccessError> {
            Ok(self.list(owner)?.snapshot().iter().position(|v| v.is_same(value)))
        }
    }

    fn items_template(order: &ModelType, item: &ModelType, pinned: Option<Arc<JournalFactory>>) -> crate::Template {
        let mut builder = TemplateBuilder::for_object(order).array_of_objects("items", item);
        if let Some(factory) = pinned {
            builder = builder.manager(factory);
        }
        builder.identity(["sku"]).value("sku").value("qty").end().build().unwrap()
    }

    fn element_events(events: &mut Vec<Event>, items: &[(&str, i64)]) {
        for (sku, qty) in items {
            events.push(Event::begin_object(None));
            events.push(Event::value("sku", *sku));
            events.push(Event::value("qty", *qty));
            events.push(Event::end_object());
        }
    }

    fn items_view(items: &[(&str, i64)]) -> View {
        let mut events = vec![Event::begin_object(None), Event::begin_array(Some("items"))];
        element_events(&mut events, items);
        events.push(Event::end_array());
        events.push(Event::end_object());
        View::new(events)
    }

    #[test]
    fn test_pinned_manager_wins_over_registered() {
        let item = item_type();
        let order_ty = order_type(&item);
        let journal = Arc::new(Journal::default());
        let pinned = JournalFactory::new("pinned", true, &journal);
        let registered = JournalFactory::new("registered", true, &journal);
        let template = items_template(&order_ty, &item, Some(pinned));

        let model = order(&order_ty, &item, 1, &[("A", 1), ("B", 2)]);
        let mut ctx = ViewContext::new();
        ctx.add_manager(registered.clone());
        template
            .apply(&items_view(&[("B", 5), ("C", 1)]), &Value::Object(model.clone()), &mut ctx)
            .unwrap();

        assert_eq!(items_of(&model), vec![("B".to_string(), 5), ("C".to_string(), 1)]);
        assert_eq!(registered.created.load(Ordering::SeqCst), 0);
        assert!(journal.entries().iter().all(|e| e.starts_with("pinned")));
    }

    #[test]
    fn test_registered_managers_in_registration_order() {
        let item = item_type();
        let order_ty = order_type(&item);
        let journal = Arc::new(Journal::default());
        let skipped = JournalFactory::new("skipped", false, &journal);
        let first = JournalFactory::new("first", true, &journal);
        let second = JournalFactory::new("second", true, &journal);
        let template = items_template(&order_ty, &item, None);

        let model = order(&order_ty, &item, 1, &[("A", 1)]);
        let mut ctx = ViewContext::new();
        ctx.add_manager(skipped.clone()).add_manager(first.clone()).add_manager(second.clone());
        template
            .apply(&items_view(&[("A", 3)]), &Value::Object(model.clone()), &mut ctx)
            .unwrap();

        assert_eq!(items_of(&model), vec![("A".to_string(), 3)]);
        assert_eq!(skipped.created.load(Ordering::SeqCst), 0);
        assert_eq!(first.created.load(Ordering::SeqCst), 1);
        assert_eq!(second.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_manager_when_no_factory_supports() {
        let item = item_type();
        let order_ty = order_type(&item);
        let journal = Arc::new(Journal::default());
        let template = items_template(&order_ty, &item, None);

        let model = order(&order_ty, &item, 1, &[("A", 1), ("B", 2)]);
        let live = model.get("items");
        let mut ctx = ViewContext::new();
        ctx.add_manager(JournalFactory::new("skipped", false, &journal));
        template
            .apply(&items_view(&[("B", 5)]), &Value::Object(model.clone()), &mut ctx)
            .unwrap();

        assert_eq!(items_of(&model), vec![("B".to_string(), 5)]);
        assert!(live.is_same(&model.get("items")));
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_pinned_manager_must_support_association() {
        let item = item_type();
        let order_ty = order_type(&item);
        let journal = Arc::new(Journal::default());
        let pinned = JournalFactory::new("pinned", false, &journal);
        let registered = JournalFactory::new("registered", true, &journal);
        let template = items_template(&order_ty, &item, Some(pinned));

        let model = order(&order_ty, &item, 1, &[("A", 1)]);
        let mut ctx = ViewContext::new();
        ctx.add_manager(registered.clone());
        let err = template
            .apply(&items_view(&[("C", 1)]), &Value::Object(model.clone()), &mut ctx)
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Association);
        assert!(matches!(err.kind(), ViewErrorKind::UnsupportedAssociation { .. }));
        assert_eq!(items_of(&model), vec![("A".to_string(), 1)]);
        assert_eq!(registered.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reconciliation_is_bracketed() {
        let item = item_type();
        let order_ty = order_type(&item);
        let journal = Arc::new(Journal::default());
        let template = items_template(&order_ty, &item, Some(JournalFactory::new("m", true, &journal)));

        let model = order(&order_ty, &item, 1, &[("A", 1)]);
        template
            .apply(&items_view(&[("A", 1), ("B", 1)]), &Value::Object(model), &mut ViewContext::new())
            .unwrap();

        assert_eq!(journal.entries(), vec!["m create #1", "m begin #1", "m end #1"]);
    }

    #[test]
    fn test_fresh_manager_per_reconciliation() {
        let item = item_type();
        let order_ty = order_type(&item);
        let journal = Arc::new(Journal::default());
        let template = TemplateBuilder::for_array_of_objects(&order_ty)
            .identity(["id"])
            .value("id")
            .array_of_objects("items", &item)
            .manager(JournalFactory::new("m", true, &journal))
            .identity(["sku"])
            .value("sku")
            .value("qty")
            .end()
            .build()
            .unwrap();

        let orders = ListRef::new();
        orders.push(order(&order_ty, &item, 1, &[("A", 1)]));
        orders.push(order(&order_ty, &item, 2, &[("B", 1)]));
        let mut events = vec![Event::begin_array(None)];
        for (id, sku) in [(1, "A"), (2, "C")] {
            events.push(Event::begin_object(None));
            events.push(Event::value("id", id));
            events.push(Event::begin_array(Some("items")));
            element_events(&mut events, &[(sku, 4)]);
            events.push(Event::end_array());
            events.push(Event::end_object());
        }
        events.push(Event::end_array());
        template
            .apply(&View::new(events), &Value::List(orders.clone()), &mut ViewContext::new())
            .unwrap();

        assert_eq!(
            journal.entries(),
            vec!["m create #1", "m begin #1", "m end #1", "m create #2", "m begin #2", "m end #2"]
        );
        let second = orders.get(1).unwrap();
        assert_eq!(items_of(second.as_object().unwrap()), vec![("C".to_string(), 4)]);
    }

    #[test]
    fn test_root_array_uses_manager_lookup() {
        let item_ty = item_type();
        let journal = Arc::new(Journal::default());
        let root = |pinned: Option<Arc<JournalFactory>>| {
            let mut builder = TemplateBuilder::for_array_of_objects(&item_ty);
            if let Some(factory) = pinned {
                builder = builder.manager(factory);
            }
            builder.identity(["sku"]).value("sku").value("qty").build().unwrap()
        };
        let mut events = vec![Event::begin_array(None)];
        element_events(&mut events, &[("B", 2), ("A", 5)]);
        events.push(Event::end_array());
        let view = View::new(events);

        // Pinned on the root.
        let list = ListRef::new();
        let a = item(&item_ty, "A", 1);
        list.push(a.clone());
        root(Some(JournalFactory::new("pinned", true, &journal)))
            .apply(&view, &Value::List(list.clone()), &mut ViewContext::new())
            .unwrap();
        assert_eq!(journal.entries(), vec!["pinned create #1", "pinned begin #1", "pinned end #1"]);
        assert_eq!(list.len(), 2);
        assert!(list.get(1).unwrap().as_object().unwrap().ptr_eq(&a));
        assert_eq!(a.scalar("qty").as_int(), Some(5));

        // Registered on the context.
        let registered = JournalFactory::new("registered", true, &journal);
        let mut ctx = ViewContext::new();
        ctx.add_manager(registered.clone());
        root(None).apply(&view, &Value::List(ListRef::new()), &mut ctx).unwrap();
        assert_eq!(registered.created.load(Ordering::SeqCst), 1);

        // A pinned manager that does not support the root is an error.
        let err = root(Some(JournalFactory::new("refusing", false, &journal)))
            .apply(&view, &Value::List(ListRef::new()), &mut ViewContext::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Association);
    }
}
