//! Node tree traversal.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::template::Node;

/// Post-order visitor: each node is visited once, after its children, and
/// receives their outputs in declared order.
pub trait NodeVisitor {
    type Output;

    fn visit(&mut self, node: &Arc<Node>, children: Vec<Self::Output>) -> Self::Output;
}

/// Walks `root` depth-first, children before their container.
pub fn depth_first<V: NodeVisitor>(root: &Arc<Node>, visitor: &mut V) -> V::Output {
    let children = root
        .children()
        .iter()
        .map(|child| depth_first(child, visitor))
        .collect();
    visitor.visit(root, children)
}

/// Breadth-first iterator over a node tree, starting with the root.
#[derive(Debug, Clone)]
pub struct BreadthFirst {
    queue: VecDeque<Arc<Node>>,
}

impl BreadthFirst {
    pub fn new(root: &Arc<Node>) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(root.clone());
        Self { queue }
    }
}

impl Iterator for BreadthFirst {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Arc<Node>> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children().iter().cloned());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item_type, order_template, order_type};

    struct Names;

    impl NodeVisitor for Names {
        type Output = Vec<String>;

        fn visit(&mut self, node: &Arc<Node>, children: Vec<Vec<String>>) -> Vec<String> {
            let mut out: Vec<String> = children.into_iter().flatten().collect();
            out.push(node.name().unwrap_or("<root>").to_string());
            out
        }
    }

    #[test]
    fn test_depth_first_is_post_order() {
        let item = item_type();
        let template = order_template(&order_type(&item), &item);
        let names = depth_first(template.root(), &mut Names);
        assert_eq!(names.last().map(String::as_str), Some("<root>"));
        let sku = names.iter().position(|n| n == "sku").unwrap();
        let items = names.iter().position(|n| n == "items").unwrap();
        assert!(sku < items);
    }

    #[test]
    fn test_breadth_first_visits_levels_in_order() {
        let item = item_type();
        let template = order_template(&order_type(&item), &item);
        let names: Vec<_> = template
            .nodes()
            .map(|n| n.name().unwrap_or("<root>").to_string())
            .collect();
        let items = names.iter().position(|n| n == "items").unwrap();
        let sku = names.iter().position(|n| n == "sku").unwrap();
        assert_eq!(names[0], "<root>");
        assert!(items < sku);
        assert_eq!(names.len(), template.nodes().count());
    }
}
