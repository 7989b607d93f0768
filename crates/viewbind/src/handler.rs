//! Meta and splice handlers.
//!
//! Meta nodes carry a single scalar that is not backed by a model property;
//! a [`MetaHandler`] produces it during generation and receives it during
//! application. Splice nodes hand a whole subtree to a [`SpliceHandler`],
//! which may drive another template.

use std::fmt;
use std::sync::Arc;

use crate::context::ViewContext;
use crate::error::{AccessError, ViewError, ViewErrorKind};
use crate::event::{Event, EventKind, View};
use crate::model::{Scalar, Value};
use crate::template::Template;

/// Producer and consumer of META event values.
pub trait MetaHandler: Send + Sync + fmt::Debug {
    /// Value to emit for `model`.
    fn produce(&self, model: &Value, ctx: &ViewContext) -> Result<Scalar, ViewErrorKind>;

    /// Receives the value read for `model`. Ignores it by default.
    fn consume(
        &self,
        _model: &Value,
        _value: &Scalar,
        _ctx: &mut ViewContext,
    ) -> Result<(), ViewErrorKind> {
        Ok(())
    }
}

/// External generator and applicator of one subtree.
///
/// The first event a splice handler generates is renamed to the splice
/// node's name; on application the handler receives the subtree as read,
/// including its first event.
pub trait SpliceHandler: Send + Sync + fmt::Debug {
    fn generate(&self, model: &Value, ctx: &mut ViewContext) -> Result<View, ViewError>;

    fn apply(&self, view: &View, model: &Value, ctx: &mut ViewContext) -> Result<(), ViewError>;
}

/// Splice handler that drives a nested object template.
///
/// With a property name, the nested template works on that property of the
/// spliced model: a null property generates `VALUE(null)`, and is created
/// through the context when a non-null subtree is applied to it. Without a
/// property the nested template works on the model itself.
#[derive(Debug, Clone)]
pub struct TemplateSplice {
    template: Template,
    property: Option<Arc<str>>,
}

impl TemplateSplice {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            property: None,
        }
    }

    pub fn on_property(template: Template, property: &str) -> Self {
        Self {
            template,
            property: Some(Arc::from(property)),
        }
    }

    fn target(&self, model: &Value) -> Result<Value, AccessError> {
        let Some(property) = &self.property else {
            return Ok(model.clone());
        };
        match model {
            Value::Object(object) => Ok(object.get(property)),
            other => Err(AccessError::WrongShape {
                property: property.to_string(),
                expected: "object",
                found: other.shape_name(),
            }),
        }
    }
}

impl SpliceHandler for TemplateSplice {
    fn generate(&self, model: &Value, ctx: &mut ViewContext) -> Result<View, ViewError> {
        let target = self.target(model).map_err(|e| ctx.error(e))?;
        if target.is_null() {
            return Ok(View::new(vec![Event::with_parts(
                EventKind::Value,
                None,
                None,
                Some(Scalar::Null),
            )]));
        }
        self.template.generate(&target, ctx)
    }

    fn apply(&self, view: &View, model: &Value, ctx: &mut ViewContext) -> Result<(), ViewError> {
        let is_null = matches!(view.events(), [only] if only.is_null_value());
        let Some(property) = &self.property else {
            if is_null {
                return Ok(());
            }
            return self.template.apply(view, model, ctx);
        };
        let owner = model
            .as_object()
            .ok_or_else(|| {
                ctx.error(AccessError::WrongShape {
                    property: property.to_string(),
                    expected: "object",
                    found: model.shape_name(),
                })
            })?
            .clone();
        if is_null {
            owner.set(property, Value::NULL);
            return Ok(());
        }
        let mut target = owner.get(property);
        if target.is_null() {
            let root_type = self.template.root().model_type().cloned();
            let Some(root_type) = root_type else {
                return Err(ctx.error(ViewErrorKind::Handler(format!(
                    "spliced template for {property:?} has no root type"
                ))));
            };
            let created = ctx.new_instance(&root_type)?;
            owner.set(property, created.clone());
            ctx.entity_created(&created);
            target = Value::Object(created);
        }
        self.template.apply(view, &target, ctx)
    }
}
