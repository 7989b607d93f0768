//! Unordered reconciliation.

use tracing::debug;

use crate::apply::Staged;
use crate::association::{AssociationManager, Reconciler, UnorderedManager};
use crate::context::{Frame, ViewContext};
use crate::error::{ViewError, ViewErrorKind};
use crate::model::{ObjectRef, Value};

/// Reconciles an unordered collection of `owner` with `elements`.
///
/// Each incoming element is matched only against live elements that no
/// earlier incoming element has claimed; newly created elements are never
/// candidates. Live elements left unclaimed are removed and discarded.
pub(crate) fn reconcile(
    manager: &mut dyn UnorderedManager,
    owner: &Value,
    elements: Vec<Staged>,
    reconciler: &Reconciler<'_>,
    ctx: &mut ViewContext,
) -> Result<(), ViewError> {
    manager.begin(owner).map_err(|k| ctx.error(k))?;
    let live: Vec<Value> = manager.iterate(owner).map_err(|e| ctx.error(e))?;
    let mut untouched: Vec<ObjectRef> = live
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
    let mut created = 0usize;

    for (position, staged) in elements.into_iter().enumerate() {
        let entity = match staged {
            Staged::Entity(entity) => entity,
            Staged::Null | Staged::Unchanged => continue,
            other => {
                return Err(ctx.error(ViewErrorKind::TypeMismatch {
                    expected: "object".to_string(),
                    found: other.shape_name().to_string(),
                }));
            }
        };
        let frame = Frame::indexed(position).with_type(Some(entity.model_type()));
        ctx.scoped(frame, |ctx| {
            match manager.find_associate(&untouched, &entity) {
                Some(index) => {
                    let object = untouched.remove(index);
                    (reconciler.inject)(entity, &object, ctx)?;
                }
                None => {
                    let object = reconciler.obtain(manager, &entity, ctx)?;
                    (reconciler.inject)(entity, &object, ctx)?;
                    manager
                        .add(owner, Value::Object(object.clone()))
                        .map_err(|e| ctx.error(e))?;
                    ctx.entity_created(&object);
                    created += 1;
                }
            }
            Ok(())
        })?;
    }

    let discarded = untouched.len();
    for object in untouched {
        manager
            .remove(owner, &Value::Object(object.clone()))
            .map_err(|e| ctx.error(e))?;
        ctx.entity_discarded(&object);
    }
    debug!(
        path = %ctx.current_view_path(),
        created,
        discarded,
        "unordered reconciliation"
    );
    manager.end(owner).map_err(|k| ctx.error(k))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::access::{AccessorFactory, DeclaredAccessorFactory, MultiValuedAccessor, SetAccessor};
    use crate::association::testing::*;
    use crate::association::AccessorUnorderedManager;
    use crate::model::{ModelType, SetRef};

    fn set_holder(ty: &ModelType, items: &[(&str, i64)]) -> (Value, Arc<dyn MultiValuedAccessor>) {
        let holder = ModelType::builder("Bag").set("items").build();
        let set = SetRef::new();
        for (sku, qty) in items {
            set.insert(item(ty, sku, *qty));
        }
        let owner = ObjectRef::new(&holder).with("items", set);
        let acc = DeclaredAccessorFactory.accessor(&holder, "items").unwrap();
        (Value::Object(owner), Arc::new(SetAccessor::new(acc)))
    }

    #[test]
    fn test_permutation_creates_nothing() {
        let ty = item_type();
        let (owner, multi) = set_holder(&ty, &[("A", 1), ("B", 2), ("C", 3)]);
        let mut manager = AccessorUnorderedManager::new(multi.clone(), identity(&ty));
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let elements = vec![
            Staged::Entity(staged(&ty, "C", 3)),
            Staged::Entity(staged(&ty, "A", 1)),
            Staged::Entity(staged(&ty, "B", 2)),
        ];
        reconcile(&mut manager, &owner, elements, &r, &mut ctx).unwrap();
        assert_eq!(multi.size(&owner).unwrap(), 3);
        assert!(log.created.borrow().is_empty());
        assert!(log.discarded.borrow().is_empty());
    }

    #[test]
    fn test_untouched_discarded_and_new_created() {
        let ty = item_type();
        let (owner, multi) = set_holder(&ty, &[("A", 1), ("B", 2)]);
        let mut manager = AccessorUnorderedManager::new(multi.clone(), identity(&ty));
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let elements = vec![Staged::Entity(staged(&ty, "B", 7)), Staged::Entity(staged(&ty, "D", 1))];
        reconcile(&mut manager, &owner, elements, &r, &mut ctx).unwrap();
        let mut skus = skus(&multi.iterate(&owner).unwrap());
        skus.sort();
        assert_eq!(skus, vec!["B", "D"]);
        assert_eq!(*log.created.borrow(), vec!["D"]);
        assert_eq!(*log.discarded.borrow(), vec!["A"]);
    }

    #[test]
    fn test_duplicate_incoming_does_not_match_created() {
        let ty = item_type();
        let (owner, multi) = set_holder(&ty, &[]);
        let mut manager = AccessorUnorderedManager::new(multi.clone(), identity(&ty));
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let elements = vec![Staged::Entity(staged(&ty, "A", 1)), Staged::Entity(staged(&ty, "A", 1))];
        reconcile(&mut manager, &owner, elements, &r, &mut ctx).unwrap();
        assert_eq!(log.created.borrow().len(), 2);
        assert_eq!(multi.size(&owner).unwrap(), 2);
    }
}
