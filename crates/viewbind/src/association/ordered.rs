//! Ordered (indexed) reconciliation.

use tracing::debug;

use crate::apply::Staged;
use crate::association::{AssociationManager, IndexedManager, Reconciler};
use crate::context::{Frame, ViewContext};
use crate::error::{ViewError, ViewErrorKind};
use crate::model::Value;

/// Reconciles an ordered collection of `owner` with `elements`.
///
/// Incoming elements are walked with a running view index. Each one is
/// searched for among the live elements at or after the view index; a match
/// is updated in place and moved to the view index if it sits further back.
/// An element without a match is created and inserted at the view index.
/// Live elements left beyond the final view index are discarded.
///
/// Null and unchanged elements occupy no slot in the result.
pub(crate) fn reconcile(
    manager: &mut dyn IndexedManager,
    owner: &Value,
    elements: Vec<Staged>,
    reconciler: &Reconciler<'_>,
    ctx: &mut ViewContext,
) -> Result<(), ViewError> {
    manager.begin(owner).map_err(|k| ctx.error(k))?;
    let mut view_index = 0;
    let (mut created, mut moved) = (0usize, 0usize);
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
            let size = manager.size(owner).map_err(|e| ctx.error(e))?;
            let mut found = None;
            for model_index in view_index..size {
                let live = manager.get(owner, model_index).map_err(|e| ctx.error(e))?;
                if let Value::Object(object) = live {
                    if manager.is_same_associate(&object, &entity) {
                        found = Some((model_index, object));
                        break;
                    }
                }
            }
            match found {
                Some((model_index, object)) => {
                    (reconciler.inject)(entity, &object, ctx)?;
                    if model_index > view_index {
                        let value = manager.remove(owner, model_index).map_err(|e| ctx.error(e))?;
                        manager
                            .add(owner, view_index, value)
                            .map_err(|e| ctx.error(e))?;
                        moved += 1;
                    }
                }
                None => {
                    let object = reconciler.obtain(manager, &entity, ctx)?;
                    (reconciler.inject)(entity, &object, ctx)?;
                    manager
                        .add(owner, view_index, Value::Object(object.clone()))
                        .map_err(|e| ctx.error(e))?;
                    ctx.entity_created(&object);
                    created += 1;
                }
            }
            Ok(())
        })?;
        view_index += 1;
    }

    let mut discarded = 0usize;
    while manager.size(owner).map_err(|e| ctx.error(e))? > view_index {
        let value = manager.remove(owner, view_index).map_err(|e| ctx.error(e))?;
        if let Value::Object(object) = value {
            ctx.entity_discarded(&object);
            discarded += 1;
        }
    }
    debug!(
        path = %ctx.current_view_path(),
        size = view_index,
        created,
        moved,
        discarded,
        "ordered reconciliation"
    );
    manager.end(owner).map_err(|k| ctx.error(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::MultiValuedAccessor;
    use crate::association::testing::*;
    use crate::association::AccessorIndexedManager;

    fn run(live: &[(&str, i64)], incoming: &[(&str, i64)]) -> (Vec<String>, Vec<String>, Vec<String>, Vec<i64>) {
        let ty = item_type();
        let (_, owner, multi) = holder(live.iter().map(|(s, q)| item(&ty, s, *q)).collect());
        let mut manager = AccessorIndexedManager::new(multi.clone(), identity(&ty));
        let elements = incoming
            .iter()
            .map(|(s, q)| Staged::Entity(staged(&ty, s, *q)))
            .collect();
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        reconcile(&mut manager, &owner, elements, &r, &mut ctx).unwrap();
        let values = multi.iterate(&owner).unwrap();
        let qty = values
            .iter()
            .filter_map(|v| v.as_object().and_then(|o| o.scalar("qty").as_int()))
            .collect();
        (
            skus(&values),
            log.created.borrow().clone(),
            log.discarded.borrow().clone(),
            qty,
        )
    }

    #[test]
    fn test_order_scenario() {
        let (skus, created, discarded, qty) = run(&[("A", 1), ("B", 2)], &[("B", 5), ("C", 1)]);
        assert_eq!(skus, vec!["B", "C"]);
        assert_eq!(qty, vec![5, 1]);
        assert_eq!(created, vec!["C"]);
        assert_eq!(discarded, vec!["A"]);
    }

    #[test]
    fn test_matched_elements_keep_identity() {
        let ty = item_type();
        let b = item(&ty, "B", 2);
        let (_, owner, multi) = holder(vec![item(&ty, "A", 1), b.clone()]);
        let mut manager = AccessorIndexedManager::new(multi.clone(), identity(&ty));
        let (mut ctx, _) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        reconcile(&mut manager, &owner, vec![Staged::Entity(staged(&ty, "B", 5))], &r, &mut ctx)
            .unwrap();
        let first = multi.get_at(&owner, 0).unwrap();
        assert!(first.as_object().unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_reverse_order() {
        let (skus, created, discarded, _) =
            run(&[("A", 1), ("B", 1), ("C", 1)], &[("C", 1), ("B", 1), ("A", 1)]);
        assert_eq!(skus, vec!["C", "B", "A"]);
        assert!(created.is_empty());
        assert!(discarded.is_empty());
    }

    #[test]
    fn test_empty_incoming_discards_all() {
        let (skus, created, discarded, _) = run(&[("A", 1), ("B", 1)], &[]);
        assert!(skus.is_empty());
        assert!(created.is_empty());
        assert_eq!(discarded, vec!["A", "B"]);
    }

    #[test]
    fn test_null_elements_skipped() {
        let ty = item_type();
        let (_, owner, multi) = holder(vec![item(&ty, "A", 1)]);
        let mut manager = AccessorIndexedManager::new(multi.clone(), identity(&ty));
        let (mut ctx, log) = context_with_log();
        let r = Reconciler { reference: false, inject: &inject };
        let elements = vec![Staged::Null, Staged::Entity(staged(&ty, "A", 3))];
        reconcile(&mut manager, &owner, elements, &r, &mut ctx).unwrap();
        assert_eq!(skus(&multi.iterate(&owner).unwrap()), vec!["A"]);
        assert!(log.created.borrow().is_empty());
    }
}
