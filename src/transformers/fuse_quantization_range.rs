//! Quantization range folding into constants
//!
//! Folds a quantization range node whose value comes from a compile-time
//! constant, possibly through a chain of precision-preserving ops:
//!
//! ```text
//! Constant -> Reshape -> ... -> QuantizeRange -> consumers
//! ```
//!
//! becomes
//!
//! ```text
//! Constant' -> consumers
//! ```
//!
//! where `Constant'` holds the quantized values in the output layout.

use ndarray::ArrayD;

use crate::error::{OptResult, TransformError};
use crate::graph::{Attributes, Graph, NodeId, OpKind};
use crate::pattern::{matcher, quantize_range};
use crate::tensor::QuantRange;
use crate::traits::{Transformation, TransformationDescriptor};
use crate::transform::{remove_chain, PassParams, TransformationContext};

use super::common::{evaluate_preserving, has_kind, unique_name};

/// Pass identifier
pub const ID: &str = "fuse_quantization_range";

/// Fold a quantization range into the constant that feeds it
///
/// The backward walk from the range's producer crosses only
/// precision-preserving nodes with a single consumer, and the constant at
/// the end must itself be single-use. Anything else declines without error.
#[derive(Debug, Clone)]
pub struct FuseQuantizationRange {
    /// Longest preserving chain the walk will cross
    pub max_chain_length: usize,
}

impl Default for FuseQuantizationRange {
    fn default() -> Self {
        Self {
            max_chain_length: 16,
        }
    }
}

impl FuseQuantizationRange {
    /// Create with the default chain bound
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain bound
    pub fn with_max_chain_length(mut self, max_chain_length: usize) -> Self {
        self.max_chain_length = max_chain_length;
        self
    }

    /// Registry factory
    pub fn from_params(params: &PassParams) -> OptResult<Box<dyn Transformation>> {
        params.check_known(&["max_chain_length"])?;
        let max_chain_length = params.usize_or("max_chain_length", 16)?;
        Ok(Box::new(Self { max_chain_length }))
    }

    /// Walk back from `q` to a foldable constant.
    ///
    /// Returns the preserving chain (consumer first) and the constant.
    fn find_source(&self, graph: &Graph, q: NodeId) -> Option<(Vec<NodeId>, NodeId)> {
        let mut chain = Vec::new();
        let mut current = graph.producer(q, 0)?;

        loop {
            let node = graph.node(current)?;
            if !graph.is_single_use(current) {
                tracing::trace!(node = node.name(), "producer is shared");
                return None;
            }
            match node.kind() {
                OpKind::Constant => return Some((chain, current)),
                _ if !self.is_precision_preserving(node) => return None,
                _ if chain.len() >= self.max_chain_length => {
                    tracing::trace!(limit = self.max_chain_length, "chain too long");
                    return None;
                }
                _ => {
                    chain.push(current);
                    current = graph.producer(current, 0)?;
                }
            }
        }
    }

    /// Evaluate the preserving chain and the range on the constant's value
    fn fold_values(
        &self,
        graph: &Graph,
        name: &str,
        range: &QuantRange,
        chain: &[NodeId],
        constant: NodeId,
    ) -> OptResult<ArrayD<f32>> {
        let mut value = graph
            .constant_value(constant)
            .ok_or_else(|| {
                TransformError::InvalidNode(format!("'{}' has no value", graph.display_name(constant)))
            })?
            .clone();

        for &id in chain.iter().rev() {
            value = evaluate_preserving(graph.try_node(id)?, &value)?;
        }

        range.apply(name, &value)
    }
}

impl Transformation for FuseQuantizationRange {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::new(ID, 100).after(&[
            super::fuse_multiply_to_quantization_range::ID,
            super::fuse_add_to_quantization_range::ID,
        ])
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        matcher(graph).match_node(node, &quantize_range()).is_some()
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        has_kind(graph, OpKind::QuantizeRange)
    }

    fn transform(
        &self,
        ctx: &mut TransformationContext,
        graph: &mut Graph,
        node: NodeId,
    ) -> OptResult<bool> {
        let q = graph.try_node(node)?;
        let q_name = q.name().to_string();
        let out_type = q
            .output_type(0)
            .cloned()
            .ok_or_else(|| TransformError::Internal(format!("'{}' has no output", q_name)))?;
        let range = QuantRange::from_node(q)?;

        let Some((chain, constant)) = self.find_source(graph, node) else {
            return Ok(false);
        };
        range.validate(&q_name)?;

        let folded = self.fold_values(graph, &q_name, &range, &chain, constant)?;
        if folded.shape() != out_type.shape.as_slice() {
            return Err(TransformError::Internal(format!(
                "folded value of '{}' has shape {:?}, expected {:?}",
                q_name,
                folded.shape(),
                out_type.shape.as_slice()
            )));
        }

        let attrs = Attributes::new()
            .with("value", folded)
            .with("element_type", out_type.elem);
        let temp_name = unique_name(graph, &format!("{}_folded", q_name));
        let new_const = graph.add_node(OpKind::Constant, temp_name, &[], attrs)?;

        if let Err(e) = graph.replace_node(node, &[new_const.into()]) {
            graph.remove_node(new_const)?;
            return Err(e);
        }

        let removed = remove_chain(graph, &chain)?;
        graph.remove_node(constant)?;
        graph.rename_node(new_const, q_name.as_str())?;
        ctx.annotate_precision(new_const, range.levels);

        tracing::debug!(
            node = %q_name,
            chain = removed,
            levels = range.levels,
            "quantization range folded into constant"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{array_from_vec, scalar, vector, ElementType};
    use crate::transform::Pipeline;

    fn range_attrs(il: f32, ih: f32, ol: f32, oh: f32, levels: i64) -> Attributes {
        Attributes::new()
            .with("input_low", scalar(il))
            .with("input_high", scalar(ih))
            .with("output_low", scalar(ol))
            .with("output_high", scalar(oh))
            .with("levels", levels)
    }

    fn pipeline() -> Pipeline {
        Pipeline::new().with_pass(Box::new(FuseQuantizationRange::new()))
    }

    /// `Constant(value) -> QuantizeRange -> Result`
    fn direct_graph(value: ArrayD<f32>, levels: i64) -> Graph {
        let mut graph = Graph::new();
        let c = graph.add_constant("c", value).unwrap();
        let q = graph
            .add_node(
                OpKind::QuantizeRange,
                "q",
                &[c.into()],
                range_attrs(0.0, 4.0, 0.0, 4.0, levels),
            )
            .unwrap();
        graph.add_result("out", q.into()).unwrap();
        graph
    }

    fn result_value(graph: &Graph) -> &ArrayD<f32> {
        let out = graph.results()[0];
        let src = graph.producer(out, 0).unwrap();
        graph.constant_value(src).unwrap()
    }

    #[test]
    fn test_direct_fold_on_grid() {
        let mut graph = direct_graph(vector(&[1.0, 2.0, 3.0, 4.0]), 5);
        let stats = pipeline().run(&mut graph).unwrap();

        assert_eq!(stats.passes_applied["fuse_quantization_range"], 1);
        assert_eq!(result_value(&graph), &vector(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(graph.live_node_count(), 2);
        assert!(graph.find_nodes_by_kind(OpKind::QuantizeRange).is_empty());
        graph.validate().unwrap();
    }

    #[test]
    fn test_direct_fold_snaps_values() {
        let mut graph = direct_graph(vector(&[0.4, 1.6, 2.5, 3.9, 5.0]), 5);
        let mut ctx = TransformationContext::new();
        pipeline().run_with_context(&mut ctx, &mut graph).unwrap();

        assert_eq!(result_value(&graph), &vector(&[0.0, 2.0, 2.0, 4.0, 4.0]));

        let folded = graph.node_by_name("q").unwrap();
        assert_eq!(graph.node(folded).unwrap().kind(), OpKind::Constant);
        assert_eq!(ctx.precision(folded).map(|p| p.levels), Some(5));
    }

    #[test]
    fn test_single_level_is_diagnostic() {
        let mut graph = direct_graph(vector(&[1.0, 2.0, 3.0, 4.0]), 1);
        let before = graph.clone();

        let stats = pipeline().run(&mut graph).unwrap();

        assert_eq!(graph, before);
        assert_eq!(stats.total_rewrites(), 0);
        assert_eq!(stats.diagnostics.len(), 1);
        assert_eq!(stats.diagnostics[0].node, "q");
        assert!(stats.diagnostics[0].message.contains("levels"));
    }

    #[test]
    fn test_inverted_input_range_is_diagnostic() {
        let mut graph = Graph::new();
        let c = graph.add_constant("c", vector(&[1.0, 4.5])).unwrap();
        let q = graph
            .add_node(
                OpKind::QuantizeRange,
                "q",
                &[c.into()],
                range_attrs(5.0, 4.0, 0.0, 4.0, 256),
            )
            .unwrap();
        graph.add_result("out", q.into()).unwrap();
        let before = graph.clone();

        let stats = pipeline().run(&mut graph).unwrap();

        assert_eq!(graph, before);
        assert_eq!(stats.total_rewrites(), 0);
        assert_eq!(stats.diagnostics.len(), 1);
        assert_eq!(stats.diagnostics[0].node, "q");
        assert_eq!(stats.diagnostics[0].pass, ID);
    }

    #[test]
    fn test_zero_width_range() {
        let mut graph = Graph::new();
        let c = graph.add_constant("c", vector(&[-1.0, 1.0, 1.5])).unwrap();
        let q = graph
            .add_node(
                OpKind::QuantizeRange,
                "q",
                &[c.into()],
                range_attrs(1.0, 1.0, -2.0, 2.0, 256),
            )
            .unwrap();
        graph.add_result("out", q.into()).unwrap();

        pipeline().run(&mut graph).unwrap();
        assert_eq!(result_value(&graph), &vector(&[-2.0, -2.0, 2.0]));
    }

    #[test]
    fn test_fold_across_reshape() {
        let mut graph = Graph::new();
        let c = graph
            .add_constant("c", array_from_vec(vec![0.4, 1.6, 2.5, 3.9], &[2, 2]).unwrap())
            .unwrap();
        let reshape = graph
            .add_node(
                OpKind::Reshape,
                "reshape",
                &[c.into()],
                Attributes::new().with("shape", vec![4i64]),
            )
            .unwrap();
        let q = graph
            .add_node(
                OpKind::QuantizeRange,
                "q",
                &[reshape.into()],
                range_attrs(0.0, 4.0, 0.0, 4.0, 5),
            )
            .unwrap();
        graph.add_result("out", q.into()).unwrap();

        let stats = pipeline().run(&mut graph).unwrap();

        assert_eq!(stats.rewrites(ID), 1);
        assert!(!graph.contains(reshape));
        assert!(!graph.contains(c));
        assert_eq!(result_value(&graph), &vector(&[0.0, 2.0, 2.0, 4.0]));
        graph.validate().unwrap();
    }

    #[test]
    fn test_fold_matches_unfused_evaluation() {
        let data = array_from_vec(vec![-0.3, 0.1, 0.77, 1.2, 0.49, 0.51], &[2, 3]).unwrap();
        let range = QuantRange {
            input_low: scalar(0.0),
            input_high: scalar(1.0),
            output_low: scalar(-1.0),
            output_high: scalar(1.0),
            levels: 3,
        };

        let mut graph = Graph::new();
        let c = graph.add_constant("c", data.clone()).unwrap();
        let t = graph
            .add_node(
                OpKind::Transpose,
                "t",
                &[c.into()],
                Attributes::new().with("perm", vec![1i64, 0]),
            )
            .unwrap();
        let q = graph
            .add_node(OpKind::QuantizeRange, "q", &[t.into()], range.to_attributes())
            .unwrap();
        graph.add_result("out", q.into()).unwrap();

        let expected = range
            .apply("q", &data.t().as_standard_layout().into_owned())
            .unwrap();
        pipeline().run(&mut graph).unwrap();
        assert_eq!(result_value(&graph), &expected);
    }

    #[test]
    fn test_sharing_blocks_fusion() {
        let mut graph = Graph::new();
        let c = graph.add_constant("c", vector(&[1.0, 2.0])).unwrap();
        let reshape = graph
            .add_node(
                OpKind::Reshape,
                "reshape",
                &[c.into()],
                Attributes::new().with("shape", vec![2i64, 1]),
            )
            .unwrap();
        let q = graph
            .add_node(
                OpKind::QuantizeRange,
                "q",
                &[reshape.into()],
                range_attrs(0.0, 4.0, 0.0, 4.0, 5),
            )
            .unwrap();
        graph.add_result("out", q.into()).unwrap();
        graph.add_result("side", reshape.into()).unwrap();
        let before = graph.clone();

        let stats = pipeline().run(&mut graph).unwrap();
        assert_eq!(stats.total_rewrites(), 0);
        assert_eq!(graph, before);
    }

    #[test]
    fn test_parameter_and_compute_producers_decline() {
        let mut graph = Graph::new();
        let x = graph.add_parameter("x", ElementType::F32, &[2]).unwrap();
        let relu = graph
            .add_node(OpKind::Relu, "relu", &[x.into()], Attributes::new())
            .unwrap();
        let q0 = graph
            .add_node(OpKind::QuantizeRange, "q0", &[x.into()], range_attrs(0.0, 1.0, 0.0, 1.0, 256))
            .unwrap();
        let q1 = graph
            .add_node(OpKind::QuantizeRange, "q1", &[relu.into()], range_attrs(0.0, 1.0, 0.0, 1.0, 256))
            .unwrap();
        graph.add_result("o0", q0.into()).unwrap();
        graph.add_result("o1", q1.into()).unwrap();

        let stats = pipeline().run(&mut graph).unwrap();
        assert_eq!(stats.total_rewrites(), 0);
        assert!(stats.diagnostics.is_empty());
    }

    #[test]
    fn test_chain_length_bound() {
        let build = || {
            let mut graph = Graph::new();
            let mut prev = graph.add_constant("c", vector(&[1.0, 3.0])).unwrap();
            for i in 0..3 {
                prev = graph
                    .add_node(OpKind::Identity, format!("id{}", i), &[prev.into()], Attributes::new())
                    .unwrap();
            }
            let q = graph
                .add_node(OpKind::QuantizeRange, "q", &[prev.into()], range_attrs(0.0, 4.0, 0.0, 4.0, 3))
                .unwrap();
            graph.add_result("out", q.into()).unwrap();
            graph
        };

        let mut graph = build();
        let short = Pipeline::new()
            .with_pass(Box::new(FuseQuantizationRange::new().with_max_chain_length(2)));
        assert_eq!(short.run(&mut graph).unwrap().total_rewrites(), 0);

        let mut graph = build();
        let long = Pipeline::new()
            .with_pass(Box::new(FuseQuantizationRange::new().with_max_chain_length(3)));
        assert_eq!(long.run(&mut graph).unwrap().total_rewrites(), 1);
        assert_eq!(graph.live_node_count(), 2);
        assert_eq!(result_value(&graph), &vector(&[0.0, 4.0]));
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut graph = direct_graph(vector(&[0.4, 1.6]), 5);
        pipeline().run(&mut graph).unwrap();
        let settled = graph.clone();

        let stats = pipeline().run(&mut graph).unwrap();
        assert_eq!(stats.total_sweeps, 1);
        assert_eq!(stats.total_rewrites(), 0);
        assert_eq!(graph, settled);
    }

    #[test]
    fn test_factory_params() {
        let params = PassParams::new(
            ID,
            [("max_chain_length".to_string(), crate::transform::ParamValue::Int(4))]
                .into_iter()
                .collect(),
        );
        assert_eq!(FuseQuantizationRange::from_params(&params).unwrap().id(), ID);

        let bad = PassParams::new(
            ID,
            [("depth".to_string(), crate::transform::ParamValue::Int(4))]
                .into_iter()
                .collect(),
        );
        assert!(matches!(
            FuseQuantizationRange::from_params(&bad),
            Err(TransformError::InvalidPassParam { .. })
        ));
    }
}
