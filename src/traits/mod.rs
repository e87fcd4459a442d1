//! Core traits for lowp-optimizer
//!
//! Defines the contract every graph transformation pass implements.

use crate::error::OptResult;
use crate::graph::{Graph, Node, NodeId};
use crate::transform::TransformationContext;

/// Static description of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformationDescriptor {
    /// Unique pass identifier
    pub id: &'static str,
    /// Default priority; lower runs first
    pub priority: i32,
    /// Pass ids that must run before this one when both are enabled
    pub runs_after: &'static [&'static str],
}

impl TransformationDescriptor {
    /// Descriptor with no ordering hints
    pub const fn new(id: &'static str, priority: i32) -> Self {
        Self {
            id,
            priority,
            runs_after: &[],
        }
    }

    /// Builder-style ordering hint
    pub const fn after(mut self, runs_after: &'static [&'static str]) -> Self {
        self.runs_after = runs_after;
        self
    }
}

/// A node-local graph rewrite
///
/// The pipeline visits nodes one at a time and calls [`matches`] as a cheap
/// pre-filter before [`transform`]. A transform either rewrites completely
/// or leaves the graph as it was.
///
/// # Example
///
/// ```ignore
/// struct DropRelu;
///
/// impl Transformation for DropRelu {
///     fn descriptor(&self) -> TransformationDescriptor {
///         TransformationDescriptor::new("drop_relu", 50)
///     }
///
///     fn matches(&self, graph: &Graph, node: NodeId) -> bool {
///         graph.node(node).is_some_and(|n| n.kind() == OpKind::Relu)
///     }
///
///     fn transform(
///         &self,
///         _ctx: &mut TransformationContext,
///         graph: &mut Graph,
///         node: NodeId,
///     ) -> OptResult<bool> {
///         let src = graph.try_node(node)?.inputs()[0];
///         graph.replace_node(node, &[src])?;
///         Ok(true)
///     }
/// }
/// ```
///
/// [`matches`]: Transformation::matches
/// [`transform`]: Transformation::transform
pub trait Transformation: Send {
    /// Identifier, priority and ordering hints
    fn descriptor(&self) -> TransformationDescriptor;

    /// Cheap structural pre-filter; must not mutate anything
    fn matches(&self, graph: &Graph, node: NodeId) -> bool;

    /// Perform the rewrite if still applicable.
    ///
    /// Returns whether the graph changed.
    fn transform(
        &self,
        ctx: &mut TransformationContext,
        graph: &mut Graph,
        node: NodeId,
    ) -> OptResult<bool>;

    /// Whether `node` is transparent for quantization-range propagation
    fn is_precision_preserving(&self, node: &Node) -> bool {
        crate::pattern::is_precision_preserving(node.kind())
    }

    /// Skip a whole sweep when nothing in the graph could match
    fn is_applicable(&self, _graph: &Graph) -> bool {
        true
    }

    /// Identifier shortcut
    fn id(&self) -> &'static str {
        self.descriptor().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Attributes, OpKind};
    use crate::tensor::ElementType;

    struct DropRelu;

    impl Transformation for DropRelu {
        fn descriptor(&self) -> TransformationDescriptor {
            TransformationDescriptor::new("drop_relu", 50).after(&["other"])
        }

        fn matches(&self, graph: &Graph, node: NodeId) -> bool {
            graph.node(node).is_some_and(|n| n.kind() == OpKind::Relu)
        }

        fn transform(
            &self,
            _ctx: &mut TransformationContext,
            graph: &mut Graph,
            node: NodeId,
        ) -> OptResult<bool> {
            let src = graph.try_node(node)?.inputs()[0];
            graph.replace_node(node, &[src])?;
            Ok(true)
        }
    }

    #[test]
    fn test_descriptor() {
        let d = DropRelu.descriptor();
        assert_eq!(d.id, "drop_relu");
        assert_eq!(d.priority, 50);
        assert_eq!(d.runs_after, &["other"]);
        assert_eq!(DropRelu.id(), "drop_relu");
    }

    #[test]
    fn test_default_methods() {
        let mut graph = Graph::new();
        let x = graph.add_parameter("x", ElementType::F32, &[2]).unwrap();
        let relu = graph
            .add_node(OpKind::Relu, "relu", &[x.into()], Attributes::new())
            .unwrap();
        let ident = graph
            .add_node(OpKind::Identity, "ident", &[relu.into()], Attributes::new())
            .unwrap();

        assert!(DropRelu.is_applicable(&graph));
        assert!(DropRelu.is_precision_preserving(graph.node(ident).unwrap()));
        assert!(!DropRelu.is_precision_preserving(graph.node(relu).unwrap()));
    }

    #[test]
    fn test_transform_contract() {
        let mut graph = Graph::new();
        let x = graph.add_parameter("x", ElementType::F32, &[2]).unwrap();
        let relu = graph
            .add_node(OpKind::Relu, "relu", &[x.into()], Attributes::new())
            .unwrap();
        let out = graph.add_result("out", relu.into()).unwrap();
        let mut ctx = TransformationContext::new();

        assert!(DropRelu.matches(&graph, relu));
        assert!(!DropRelu.matches(&graph, x));
        assert!(DropRelu.transform(&mut ctx, &mut graph, relu).unwrap());
        assert_eq!(graph.producer(out, 0), Some(x));
        graph.validate().unwrap();
    }
}
