//! Build-time template validation.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::TemplateError;
use crate::model::{ModelType, Scalar};
use crate::template::traverse::BreadthFirst;
use crate::template::{Node, NodeKind};

/// Checks a finished node tree.
///
/// - property nodes carry an accessor (and collections a multi-valued one)
/// - subtype branches strictly extend their container's type
/// - subtype branches are distinguishable, by type and by discriminator value
/// - abstract containers with subtype branches declare a discriminator
/// - property names are unique within a container, counting the branches a
///   given instance would see
pub(crate) fn validate(root: &Arc<Node>) -> Result<(), TemplateError> {
    for node in BreadthFirst::new(root) {
        check_accessor(&node)?;
        if node.kind().is_object_shaped() || node.name().is_none() {
            check_container(&node)?;
        }
    }
    Ok(())
}

fn label(node: &Node) -> String {
    node.name()
        .map(str::to_string)
        .or_else(|| node.model_type().map(|t| t.name().to_string()))
        .unwrap_or_else(|| "<root>".to_string())
}

fn check_accessor(node: &Node) -> Result<(), TemplateError> {
    let kind = node.kind();
    let missing = kind.is_property()
        && (node.accessor().is_none() || (kind.is_multi_valued() && node.multi().is_none()));
    if missing {
        return Err(TemplateError::MissingAccessor {
            node: label(node),
            kind,
        });
    }
    let needs_type = kind.is_object_shaped() && kind != NodeKind::Envelope;
    if needs_type && node.model_type().is_none() {
        return Err(TemplateError::MissingModelType {
            node: label(node),
            kind,
        });
    }
    Ok(())
}

/// All subtype branches below `node`, including nested ones.
fn subtypes(node: &Node) -> Vec<&Arc<Node>> {
    let mut out = Vec::new();
    for child in node.children() {
        if child.kind() == NodeKind::Subtype {
            out.push(child);
            out.extend(subtypes(child));
        }
    }
    out
}

fn check_container(node: &Node) -> Result<(), TemplateError> {
    let Some(base) = node.model_type() else {
        return Ok(());
    };
    let parent = label(node);

    for branch in node.children().iter().filter(|c| c.kind() == NodeKind::Subtype) {
        if let Some(sub) = branch.model_type() {
            if sub == base || !sub.is_subtype_of(base) {
                return Err(TemplateError::NotASubtype {
                    parent: base.name().to_string(),
                    subtype: sub.name().to_string(),
                });
            }
        }
    }

    let branches = subtypes(node);
    let mut seen: Vec<&ModelType> = Vec::new();
    for branch in &branches {
        let Some(sub) = branch.model_type() else {
            continue;
        };
        if let Some(sibling) = seen.iter().find(|s| **s == sub) {
            return Err(TemplateError::AmbiguousSubtype {
                parent: base.name().to_string(),
                subtype: sub.name().to_string(),
                sibling: sibling.name().to_string(),
            });
        }
        seen.push(sub);
    }

    let discriminator = node
        .children()
        .iter()
        .find(|c| c.kind() == NodeKind::Discriminator)
        .and_then(|c| c.discriminator().cloned());
    match discriminator {
        Some(strategy) => {
            let mut classified: Vec<(Scalar, &ModelType)> = vec![(strategy.classify(base), base)];
            for sub in &seen {
                let value = strategy.classify(sub);
                if let Some((_, sibling)) = classified.iter().find(|(v, _)| *v == value) {
                    return Err(TemplateError::AmbiguousSubtype {
                        parent: base.name().to_string(),
                        subtype: sub.name().to_string(),
                        sibling: sibling.name().to_string(),
                    });
                }
                classified.push((value, sub));
            }
        }
        None if base.is_abstract() && !branches.is_empty() => {
            return Err(TemplateError::MissingDiscriminator {
                parent: base.name().to_string(),
            });
        }
        None => {}
    }

    check_names(node, &parent)
}

/// Names visible to one instance: the container's own properties plus those
/// of every branch on the path to a subtype.
fn check_names(node: &Node, parent: &str) -> Result<(), TemplateError> {
    fn walk<'a>(
        node: &'a Node,
        inherited: &FxHashSet<&'a str>,
        parent: &str,
    ) -> Result<(), TemplateError> {
        let mut names = inherited.clone();
        for child in node.children() {
            if child.kind() == NodeKind::Subtype {
                continue;
            }
            if let Some(name) = child.name() {
                if !names.insert(name) {
                    return Err(TemplateError::DuplicateName {
                        parent: parent.to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }
        for branch in node.children().iter().filter(|c| c.kind() == NodeKind::Subtype) {
            walk(branch, &names, parent)?;
        }
        Ok(())
    }
    walk(node, &FxHashSet::default(), parent)
}

#[cfg(test)]
mod tests {
    use crate::error::TemplateError;
    use crate::model::{ModelType, ScalarKind};
    use crate::template::TemplateBuilder;

    fn shapes() -> (ModelType, ModelType, ModelType) {
        let shape = ModelType::builder("Shape")
            .abstract_type()
            .scalar("name", ScalarKind::String)
            .build();
        let circle = ModelType::builder("Circle")
            .extends(&shape)
            .scalar("radius", ScalarKind::Float)
            .build();
        let square = ModelType::builder("Square")
            .extends(&shape)
            .scalar("side", ScalarKind::Float)
            .build();
        (shape, circle, square)
    }

    #[test]
    fn test_abstract_container_needs_discriminator() {
        let (shape, circle, _) = shapes();
        let err = TemplateBuilder::for_object(&shape)
            .value("name")
            .subtype(&circle)
            .value("radius")
            .end()
            .build()
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingDiscriminator { parent: "Shape".to_string() });
    }

    #[test]
    fn test_duplicate_subtype_is_ambiguous() {
        let (shape, circle, _) = shapes();
        let err = TemplateBuilder::for_object(&shape)
            .discriminator()
            .subtype(&circle)
            .value("radius")
            .end()
            .subtype(&circle)
            .end()
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::AmbiguousSubtype { .. }));
    }

    #[test]
    fn test_unrelated_subtype_is_rejected() {
        let (shape, circle, _) = shapes();
        let other = ModelType::builder("Other").build();
        let err = TemplateBuilder::for_object(&circle)
            .subtype(&other)
            .end()
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::NotASubtype { .. }));
        let err = TemplateBuilder::for_object(&shape)
            .discriminator()
            .subtype(&shape)
            .end()
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::NotASubtype { .. }));
    }

    #[test]
    fn test_duplicate_names_across_branches() {
        let (shape, circle, square) = shapes();
        let err = TemplateBuilder::for_object(&shape)
            .discriminator()
            .value("name")
            .subtype(&circle)
            .value("name")
            .end()
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateName { .. }));

        let renamed = ModelType::builder("Sphere")
            .extends(&shape)
            .scalar("radius", ScalarKind::Float)
            .build();
        TemplateBuilder::for_object(&shape)
            .discriminator()
            .subtype(&circle)
            .value("radius")
            .end()
            .subtype(&renamed)
            .value("radius")
            .end()
            .subtype(&square)
            .value("side")
            .end()
            .build()
            .unwrap();
    }
}
