//! To-one reconciliation.

use tracing::debug;

use crate::apply::Staged;
use crate::association::{AssociationManager, Reconciler, ToOneManager};
use crate::context::ViewContext;
use crate::error::{ViewError, ViewErrorKind};
use crate::model::Value;

/// Reconciles a single associate of `owner` with `staged`.
///
/// If the staged entity is the same associate as the current one, it is
/// injected in place. Otherwise the current associate is discarded and a new
/// one is created (or resolved), injected and set. Null clears the
/// association; [`Staged::Unchanged`] leaves it alone.
pub(crate) fn reconcile(
    manager: &mut dyn ToOneManager,
    owner: &Value,
    staged: Staged,
    reconciler: &Reconciler<'_>,
    ctx: &mut ViewContext,
) -> Result<(), ViewError> {
    if matches!(staged, Staged::Unchanged) {
        return Ok(());
    }
    manager.begin(owner).map_err(|k| ctx.error(k))?;
    let current = manager.get(owner).map_err(|e| ctx.error(e))?;
    match staged {
        Staged::Null => {
            manager.set(owner, None).map_err(|e| ctx.error(e))?;
            if let Some(old) = current {
                debug!(path = %ctx.current_view_path(), "associate cleared");
                ctx.entity_discarded(&old);
            }
        }
        Staged::Entity(entity) => match current {
            Some(live) if manager.is_same_associate(&live, &entity) => {
                (reconciler.inject)(entity, &live, ctx)?;
            }
            current => {
                let associate = reconciler.obtain(manager, &entity, ctx)?;
                (reconciler.inject)(entity, &associate, ctx)?;
                manager
                    .set(owner, Some(associate.clone()))
                    .map_err(|e| ctx.error(e))?;
                if let Some(old) = current {
                    ctx.entity_discarded(&old);
                }
                ctx.entity_created(&associate);
                debug!(path = %ctx.current_view_path(), "associate replaced");
            }
        },
        other => {
            return Err(ctx.error(ViewErrorKind::TypeMismatch {
                expected: "object".to_string(),
                found: other.shape_name().to_string(),
            }));
        }
    }
    manager.end(owner).map_err(|k| ctx.error(k))
}
