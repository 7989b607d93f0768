//! Keyed (map) reconciliation.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::apply::Staged;
use crate::association::{AssociationManager, KeyedManager, Reconciler};
use crate::context::{Frame, ViewContext};
use crate::error::{ViewError, ViewErrorKind};
use crate::model::{Scalar, Value};

/// Scalars are not `Hash` (floats); keys are tracked by their display form
/// together with their kind.
fn key_id(key: &Scalar) -> (Option<crate::model::ScalarKind>, String) {
    (key.kind(), key.to_string())
}

/// Reconciles a keyed collection of `owner` with `entries`.
///
/// Entries are matched by key. A matching live associate is updated in place;
/// otherwise a new associate is created and put under the key, replacing
/// (and discarding) an incompatible one. Live entries whose key is absent
/// from the view are removed and discarded. A null entry counts as absent;
/// an unchanged entry keeps its live value.
pub(crate) fn reconcile(
    manager: &mut dyn KeyedManager,
    owner: &Value,
    entries: Vec<(Scalar, Staged)>,
    reconciler: &Reconciler<'_>,
    ctx: &mut ViewContext,
) -> Result<(), ViewError> {
    manager.begin(owner).map_err(|k| ctx.error(k))?;
    let mut touched = FxHashSet::default();
    let (mut created, mut discarded) = (0usize, 0usize);

    for (key, staged) in entries {
        let entity = match staged {
            Staged::Entity(entity) => entity,
            Staged::Unchanged => {
                touched.insert(key_id(&key));
                continue;
            }
            Staged::Null => continue,
            other => {
                return Err(ctx.error(ViewErrorKind::TypeMismatch {
                    expected: "object".to_string(),
                    found: other.shape_name().to_string(),
                }));
            }
        };
        touched.insert(key_id(&key));
        let frame = Frame::keyed(&key).with_type(Some(entity.model_type()));
        ctx.scoped(frame, |ctx| {
            let current = manager.get(owner, &key).map_err(|e| ctx.error(e))?;
            let current = current.and_then(|v| v.as_object().cloned());
            match current {
                Some(live) if manager.is_same_associate(&live, &entity) => {
                    (reconciler.inject)(entity, &live, ctx)?;
                }
                current => {
                    let object = reconciler.obtain(manager, &entity, ctx)?;
                    (reconciler.inject)(entity, &object, ctx)?;
                    manager
                        .put(owner, key.clone(), Value::Object(object.clone()))
                        .map_err(|e| ctx.error(e))?;
                    if let Some(old) = current {
                        ctx.entity_discarded(&old);
                        discarded += 1;
                    }
                    ctx.entity_created(&object);
                    created += 1;
                }
            }
            Ok(())
        })?;
    }

    let live = manager.entries(owner).map_err(|e| ctx.error(e))?;
    for (key, value) in live {
        if touched.contains(&key_id(&key)) {
            continue;
        }
        manager.remove(owner, &key).map_err(|e| ctx.error(e))?;
        if let Value::Object(object) = value {
            ctx.scoped(Frame::keyed(&key), |ctx| {
                ctx.entity_discarded(&object);
                Ok(())
            })?;
            discarded += 1;
        }
    }
    debug!(
        path = %ctx.current_view_path(),
        created,
        discarded,
        "keyed reconciliation"
    );
    manager.end(owner).map_err(|k| ctx.error(k))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::access::{AccessorFactory, DeclaredAccessorFactory, MapAccessor, MultiValuedAccessor};
    use crate::association::testing::*;
    use crate::association::AccessorKeyedManager;
    use crate::association::Identity;
    use crate::model::{MapRef, ModelType, ObjectRef, ScalarKind};

    fn map_holder(entries: Vec<(&str, ObjectRef)>) -> (Value, Arc<dyn MultiValuedAccessor>) {
        let holder = ModelType::builder("Catalog").map("items", ScalarKind::String).build();
        let map = MapRef::new();
        for (k, v) in entries {
            map.insert(k, v);
        }
        let owner = ObjectRef::new(&holder).with("items", map);
        let acc = DeclaredAccessorFactory.accessor(&holder, "items").unwrap();
        (Value::Object(owner), Arc::new(MapAccessor::new(acc)))
    }

    #[test]
    fn test_changed_value_updated_in_place() {
        let ty = item_type();
        let a = item(&ty, "A", 1);
        let b = item(&ty, "B", 2);
        let (owner, multi) = map_holder(vec![("a", a.clone()), ("b", b.clone())]);
        let mut manager = AccessorKeyedManager::new(multi.clone(), Identity::default());
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let entries = vec![
            (Scalar::from("a"), Staged::Entity(staged(&ty, "A", 1))),
            (Scalar::from("b"), Staged::Entity(staged(&ty, "B", 9))),
        ];
        reconcile(&mut manager, &owner, entries, &r, &mut ctx).unwrap();
        assert_eq!(b.scalar("qty").as_int(), Some(9));
        let current = multi.get_key(&owner, &Scalar::from("b")).unwrap().unwrap();
        assert!(current.as_object().unwrap().ptr_eq(&b));
        assert!(log.created.borrow().is_empty());
        assert!(log.discarded.borrow().is_empty());
    }

    #[test]
    fn test_missing_keys_discarded_new_keys_created() {
        let ty = item_type();
        let (owner, multi) = map_holder(vec![("a", item(&ty, "A", 1)), ("b", item(&ty, "B", 2))]);
        let mut manager = AccessorKeyedManager::new(multi.clone(), Identity::default());
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let entries = vec![
            (Scalar::from("b"), Staged::Unchanged),
            (Scalar::from("c"), Staged::Entity(staged(&ty, "C", 3))),
        ];
        reconcile(&mut manager, &owner, entries, &r, &mut ctx).unwrap();
        assert_eq!(multi.size(&owner).unwrap(), 2);
        assert!(multi.get_key(&owner, &Scalar::from("a")).unwrap().is_none());
        assert_eq!(*log.created.borrow(), vec!["C"]);
        assert_eq!(*log.discarded.borrow(), vec!["A"]);
    }

    #[test]
    fn test_identity_mismatch_replaces_entry() {
        let ty = item_type();
        let (owner, multi) = map_holder(vec![("a", item(&ty, "A", 1))]);
        let mut manager = AccessorKeyedManager::new(multi.clone(), identity(&ty));
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let entries = vec![(Scalar::from("a"), Staged::Entity(staged(&ty, "Z", 1)))];
        reconcile(&mut manager, &owner, entries, &r, &mut ctx).unwrap();
        assert_eq!(*log.created.borrow(), vec!["Z"]);
        assert_eq!(*log.discarded.borrow(), vec!["A"]);
        assert_eq!(multi.size(&owner).unwrap(), 1);
    }
}
