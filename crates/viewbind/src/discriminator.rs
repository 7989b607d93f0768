//! Discriminator strategies.
//!
//! A discriminator names the concrete runtime type of an object in the view
//! so that application can pick the matching subtype branch.

use std::fmt;

use crate::error::ViewErrorKind;
use crate::model::{ModelType, Scalar};

/// Default name of discriminator events.
pub const DEFAULT_DISCRIMINATOR: &str = "type";

/// Maps model types to discriminator values and back.
pub trait DiscriminatorStrategy: Send + Sync + fmt::Debug {
    /// Value identifying `model_type` in the view.
    fn classify(&self, model_type: &ModelType) -> Scalar;

    /// Picks the candidate identified by `value`.
    ///
    /// The default implementation classifies every candidate and requires
    /// exactly one to match.
    fn resolve(&self, value: &Scalar, candidates: &[ModelType]) -> Result<ModelType, ViewErrorKind> {
        let mut found: Option<&ModelType> = None;
        for candidate in candidates {
            if &self.classify(candidate) != value {
                continue;
            }
            if found.is_some() {
                return Err(ViewErrorKind::AmbiguousDiscriminator {
                    base: base_name(candidates),
                    value: value.to_string(),
                });
            }
            found = Some(candidate);
        }
        found.cloned().ok_or_else(|| ViewErrorKind::UndefinedDiscriminator {
            base: base_name(candidates),
            value: value.to_string(),
        })
    }
}

fn base_name(candidates: &[ModelType]) -> String {
    candidates
        .first()
        .map(|c| c.name().to_string())
        .unwrap_or_default()
}

/// Identifies types by their name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleDiscriminator;

impl DiscriminatorStrategy for SimpleDiscriminator {
    fn classify(&self, model_type: &ModelType) -> Scalar {
        Scalar::from(model_type.name())
    }
}
