//! Pattern matching engine
//!
//! Matches a tree-shaped [`PatternSpec`] top-down against the producers of a
//! root node: the root must satisfy the pattern's op test and predicate,
//! and child `i` must match the producer of input `i`. Matching never
//! mutates the graph and never backtracks.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::graph::{Graph, Node, NodeId, OpKind};

/// Op test of one pattern node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpPattern {
    /// Exactly this kind
    Kind(OpKind),
    /// Any of these kinds
    AnyOf(Vec<OpKind>),
    /// Wildcard
    Any,
}

impl OpPattern {
    /// Check if `kind` satisfies the test
    pub fn accepts(&self, kind: OpKind) -> bool {
        match self {
            Self::Kind(k) => *k == kind,
            Self::AnyOf(kinds) => kinds.contains(&kind),
            Self::Any => true,
        }
    }
}

/// Extra condition on a matched node
pub type NodePredicate = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Tree pattern over producer edges
#[derive(Clone)]
pub struct PatternSpec {
    op: OpPattern,
    label: Option<&'static str>,
    children: Vec<PatternSpec>,
    predicate: Option<NodePredicate>,
}

impl fmt::Debug for PatternSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSpec")
            .field("op", &self.op)
            .field("label", &self.label)
            .field("children", &self.children)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl PatternSpec {
    /// Pattern node with an arbitrary op test
    pub fn new(op: OpPattern) -> Self {
        Self {
            op,
            label: None,
            children: Vec::new(),
            predicate: None,
        }
    }

    /// Pattern node matching exactly `kind`
    pub fn kind(kind: OpKind) -> Self {
        Self::new(OpPattern::Kind(kind))
    }

    /// Pattern node matching any of `kinds`
    pub fn any_of(kinds: &[OpKind]) -> Self {
        Self::new(OpPattern::AnyOf(kinds.to_vec()))
    }

    /// Wildcard pattern node
    pub fn any() -> Self {
        Self::new(OpPattern::Any)
    }

    /// Linear producer chain, first kind is the anchor.
    ///
    /// `chain(&[Relu, Add])` matches a Relu whose first input comes from an
    /// Add. The first eight nodes are labelled by position (`"0"` to `"7"`);
    /// deeper nodes still have to match but carry no label.
    pub fn chain(kinds: &[OpKind]) -> Self {
        const POSITIONS: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];

        let mut tail: Option<PatternSpec> = None;
        for (i, &kind) in kinds.iter().enumerate().rev() {
            let mut node = Self::kind(kind);
            node.label = POSITIONS.get(i).copied();
            if let Some(child) = tail.take() {
                node.children.push(child);
            }
            tail = Some(node);
        }
        tail.unwrap_or_else(Self::any)
    }

    /// Bind the matched node under `label`
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Constrain the producer of the next input position
    pub fn child(mut self, child: PatternSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Require `predicate` to hold on the matched node
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Node) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Op test of the pattern root
    pub fn op(&self) -> &OpPattern {
        &self.op
    }

    /// Depth of the pattern tree
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }
}

/// Nodes bound by a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    root: NodeId,
    labels: IndexMap<&'static str, NodeId>,
    matched: Vec<NodeId>,
}

impl Binding {
    /// The node the match started from
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node bound under `label`
    pub fn get(&self, label: &str) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    /// All matched nodes in pattern pre-order (root first)
    pub fn matched(&self) -> &[NodeId] {
        &self.matched
    }

    /// Labelled nodes in pattern pre-order
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, NodeId)> + '_ {
        self.labels.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of matched nodes
    pub fn len(&self) -> usize {
        self.matched.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Pattern matcher over one graph
pub struct PatternMatcher<'a> {
    graph: &'a Graph,
}

impl<'a> PatternMatcher<'a> {
    /// Create a new pattern matcher
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Match `pattern` rooted at `root`.
    ///
    /// A label bound twice must bind the same node both times, which lets
    /// a pattern require shared producers.
    pub fn match_node(&self, root: NodeId, pattern: &PatternSpec) -> Option<Binding> {
        let mut binding = Binding {
            root,
            labels: IndexMap::new(),
            matched: Vec::with_capacity(pattern.children.len() + 1),
        };
        self.match_rec(root, pattern, &mut binding).then_some(binding)
    }

    fn match_rec(&self, id: NodeId, pattern: &PatternSpec, binding: &mut Binding) -> bool {
        let Some(node) = self.graph.node(id) else {
            return false;
        };
        if !pattern.op.accepts(node.kind()) {
            return false;
        }
        if pattern.children.len() > node.inputs().len() {
            return false;
        }
        if let Some(pred) = &pattern.predicate {
            if !pred(node) {
                return false;
            }
        }

        if let Some(label) = pattern.label {
            match binding.labels.get(label) {
                Some(&bound) if bound != id => return false,
                Some(_) => {}
                None => {
                    binding.labels.insert(label, id);
                }
            }
        }
        binding.matched.push(id);

        pattern
            .children
            .iter()
            .zip(node.inputs())
            .all(|(child, src)| self.match_rec(src.node, child, binding))
    }

    /// All matches in topological order
    pub fn find_all(&self, pattern: &PatternSpec) -> Vec<Binding> {
        self.graph
            .topological_order()
            .iter()
            .filter_map(|&id| self.match_node(id, pattern))
            .collect()
    }
}

/// Convenience function to create a matcher
pub fn matcher(graph: &Graph) -> PatternMatcher<'_> {
    PatternMatcher::new(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Attributes;
    use crate::tensor::{scalar, vector, ElementType};

    /// x -> reshape -> relu -> out, plus c -> add(relu, c) -> out2
    fn make_graph() -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new();
        let x = graph.add_parameter("x", ElementType::F32, &[2, 2]).unwrap();
        let reshape = graph
            .add_node(
                OpKind::Reshape,
                "reshape",
                &[x.into()],
                Attributes::new().with("shape", vec![4i64]),
            )
            .unwrap();
        let relu = graph
            .add_node(OpKind::Relu, "relu", &[reshape.into()], Attributes::new())
            .unwrap();
        let c = graph.add_constant("c", vector(&[1.0; 4])).unwrap();
        let add = graph
            .add_node(OpKind::Add, "add", &[relu.into(), c.into()], Attributes::new())
            .unwrap();
        graph.add_result("out", add.into()).unwrap();
        (graph, vec![x, reshape, relu, c, add])
    }

    #[test]
    fn test_chain_match() {
        let (graph, ids) = make_graph();
        let m = matcher(&graph);

        let pattern = PatternSpec::chain(&[OpKind::Relu, OpKind::Reshape, OpKind::Parameter]);
        let binding = m.match_node(ids[2], &pattern).unwrap();

        assert_eq!(binding.root(), ids[2]);
        assert_eq!(binding.matched(), &[ids[2], ids[1], ids[0]]);
        assert_eq!(binding.get("1"), Some(ids[1]));
        assert!(m.match_node(ids[1], &pattern).is_none());
    }

    #[test]
    fn test_tree_match_with_labels() {
        let (graph, ids) = make_graph();
        let m = matcher(&graph);

        let pattern = PatternSpec::kind(OpKind::Add)
            .label("add")
            .child(PatternSpec::any().label("lhs"))
            .child(PatternSpec::kind(OpKind::Constant).label("rhs"));
        let binding = m.match_node(ids[4], &pattern).unwrap();

        assert_eq!(binding.get("add"), Some(ids[4]));
        assert_eq!(binding.get("lhs"), Some(ids[2]));
        assert_eq!(binding.get("rhs"), Some(ids[3]));
        assert_eq!(binding.len(), 3);
    }

    #[test]
    fn test_predicate() {
        let (graph, ids) = make_graph();
        let m = matcher(&graph);

        let flat = PatternSpec::kind(OpKind::Reshape)
            .with_predicate(|n| n.attrs().ints("shape").is_some_and(|s| s.len() == 1));
        let rank2 = PatternSpec::kind(OpKind::Reshape)
            .with_predicate(|n| n.attrs().ints("shape").is_some_and(|s| s.len() == 2));

        assert!(m.match_node(ids[1], &flat).is_some());
        assert!(m.match_node(ids[1], &rank2).is_none());
    }

    #[test]
    fn test_too_many_children() {
        let (graph, ids) = make_graph();
        let pattern = PatternSpec::kind(OpKind::Relu)
            .child(PatternSpec::any())
            .child(PatternSpec::any());
        assert!(matcher(&graph).match_node(ids[2], &pattern).is_none());
    }

    #[test]
    fn test_shared_label_must_agree() {
        let mut graph = Graph::new();
        let x = graph.add_parameter("x", ElementType::F32, &[3]).unwrap();
        let y = graph.add_parameter("y", ElementType::F32, &[3]).unwrap();
        let sq = graph
            .add_node(OpKind::Multiply, "sq", &[x.into(), x.into()], Attributes::new())
            .unwrap();
        let xy = graph
            .add_node(OpKind::Multiply, "xy", &[x.into(), y.into()], Attributes::new())
            .unwrap();

        let square = PatternSpec::kind(OpKind::Multiply)
            .child(PatternSpec::any().label("v"))
            .child(PatternSpec::any().label("v"));
        let m = matcher(&graph);
        assert!(m.match_node(sq, &square).is_some());
        assert!(m.match_node(xy, &square).is_none());
    }

    #[test]
    fn test_find_all() {
        let mut graph = Graph::new();
        let a = graph.add_constant("a", scalar(1.0)).unwrap();
        let r1 = graph
            .add_node(OpKind::Relu, "r1", &[a.into()], Attributes::new())
            .unwrap();
        let r2 = graph
            .add_node(OpKind::Relu, "r2", &[r1.into()], Attributes::new())
            .unwrap();

        let pattern = PatternSpec::chain(&[OpKind::Relu, OpKind::Relu]);
        let found: Vec<_> = matcher(&graph)
            .find_all(&pattern)
            .iter()
            .map(Binding::root)
            .collect();
        assert_eq!(found, vec![r2]);

        let any_relu = PatternSpec::any_of(&[OpKind::Relu, OpKind::Clamp]);
        assert_eq!(matcher(&graph).find_all(&any_relu).len(), 2);
    }

    #[test]
    fn test_chain_labels_first_eight() {
        let mut graph = Graph::new();
        let mut prev = graph.add_parameter("x", ElementType::F32, &[2]).unwrap();
        let mut idents = Vec::new();
        for i in 0..8 {
            prev = graph
                .add_node(OpKind::Identity, format!("i{}", i), &[prev.into()], Attributes::new())
                .unwrap();
            idents.push(prev);
        }

        let mut kinds = vec![OpKind::Identity; 8];
        kinds.push(OpKind::Parameter);
        let pattern = PatternSpec::chain(&kinds);
        assert_eq!(pattern.depth(), 9);

        let binding = matcher(&graph).match_node(idents[7], &pattern).unwrap();
        assert_eq!(binding.len(), 9);
        assert_eq!(binding.get("0"), Some(idents[7]));
        assert_eq!(binding.get("7"), Some(idents[0]));
        assert_eq!(binding.get("8"), None);
        assert!(matcher(&graph).match_node(idents[6], &pattern).is_none());
    }

    #[test]
    fn test_depth() {
        let pattern = PatternSpec::chain(&[OpKind::Relu, OpKind::Add, OpKind::Constant]);
        assert_eq!(pattern.depth(), 3);
    }
}
