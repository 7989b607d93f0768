//! viewbind: bidirectional mapping between object graphs and hierarchical
//! event-stream views.
//!
//! A [`Template`] describes which parts of a model appear in a view and how
//! they are named. The same template drives both directions:
//!
//! - **Generate**: walk a model and emit a flat sequence of [`Event`]s
//! - **Apply**: read a view back into an existing model, reconciling
//!   associated objects by identity instead of rebuilding them
//!
//! # Quick Start
//!
//! ```rust
//! use viewbind::model::{ModelType, ObjectRef, ScalarKind, Value};
//! use viewbind::{TemplateBuilder, ViewContext};
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
//!
//! let model = ObjectRef::new(&order).with("id", 7);
//! let view = template
//!     .generate(&Value::Object(model.clone()), &mut ViewContext::new())
//!     .unwrap();
//!
//! // Apply the view to a fresh instance.
//! let copy = template.apply_new(&view, &mut ViewContext::new()).unwrap();
//! assert_eq!(copy.as_object().unwrap().scalar("id").as_int(), Some(7));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Dynamic object model (types, objects, collections, scalars)
//! - [`event`]: View events and the reader/writer over them
//! - [`template`]: Template nodes and the builder
//! - [`access`]: Property accessors and multi-valued accessors
//! - [`association`]: Association managers and reconciliation
//! - [`apply`]: Staged view entities
//! - [`context`]: Per-call state, options, factories and resolvers
//! - [`convert`]: Scalar converters
//! - [`discriminator`]: Subtype discriminator strategies
//! - [`handler`]: Meta and splice handlers
//! - [`listener`]: Lifecycle listeners
//! - [`error`]: Error types
//!
//! # Atomicity
//!
//! Application reads the whole view before touching the model. A malformed
//! view, an unknown property or a failed conversion leaves the target
//! unchanged.

pub mod access;
pub mod apply;
pub mod association;
pub mod context;
pub mod convert;
pub mod discriminator;
pub mod error;
pub mod event;
mod generate;
pub mod handler;
pub mod listener;
pub mod model;
pub mod template;
pub mod util;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root
pub use apply::{Staged, ViewEntity};
pub use association::{AssociationDescriptor, Identity, IdentityKey, ManagerFactory};
pub use context::{Frame, ObjectRegistry, ReferenceResolver, ViewContext, ViewOptions};
pub use convert::{ConverterRef, DateTimeConverter, FnConverter, ValueConverter};
pub use discriminator::{DiscriminatorStrategy, SimpleDiscriminator};
pub use error::{
    AccessError, ConversionError, ErrorCode, StreamError, TemplateError, ViewError,
    ViewErrorKind,
};
pub use event::{Event, EventKind, View, ViewReader, ViewWriter};
pub use handler::{MetaHandler, SpliceHandler, TemplateSplice};
pub use listener::{EntityCounter, ViewListener};
pub use template::{Node, NodeKind, Template, TemplateBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
