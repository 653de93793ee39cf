use crate::model::Node;
use serde::{Deserialize, Serialize};

/// Index into a document's master node list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeHandle(pub u32);

/// Deduplicated node templates. Classes refer to templates by handle on the
/// wire; in memory every class owns its own copies.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    templates: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: Vec<Node>) -> Self {
        NodeArena { templates }
    }

    /// Handle of an equal template, adding one if none exists yet.
    pub fn intern(&mut self, node: &Node) -> NodeHandle {
        if let Some(i) = self.templates.iter().position(|t| t == node) {
            return NodeHandle(i as u32);
        }
        self.templates.push(node.clone());
        NodeHandle((self.templates.len() - 1) as u32)
    }

    pub fn get(&self, h: NodeHandle) -> Option<&Node> {
        self.templates.get(h.0 as usize)
    }

    /// Independent copy of a template.
    pub fn materialize(&self, h: NodeHandle) -> Option<Node> {
        self.get(h).cloned()
    }

    pub fn templates(&self) -> &[Node] {
        &self.templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Shape;

    #[test]
    fn equal_nodes_share_a_handle() {
        let mut arena = NodeArena::new();
        let a = arena.intern(&Node::default());
        let b = arena.intern(&Node { shape: Shape::Square, ..Node::default() });
        let c = arena.intern(&Node::default());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(arena.templates().len(), 2);
    }

    #[test]
    fn materialized_copies_do_not_alias() {
        let mut arena = NodeArena::new();
        let h = arena.intern(&Node::default());
        let mut first = arena.materialize(h).unwrap();
        let second = arena.materialize(h).unwrap();
        first.color = Some("red".into());
        assert_eq!(second.color, None);
        assert_eq!(arena.get(h).and_then(|n| n.color.clone()), None);
    }
}
