//! Whole-graph invariant checks
//!
//! `validate` recomputes everything the mutators maintain incrementally and
//! compares. Passes never need it; the pipeline calls it when configured to.

use super::core::Graph;
use super::maps::build_consumer_index;
use super::node::Consumer;
use super::op::infer_outputs;
use crate::error::{OptResult, TransformError};

impl Graph {
    /// Check every graph invariant.
    ///
    /// - inputs resolve to live outputs
    /// - consumer sets match the input lists exactly
    /// - the name index covers every live node and nothing else
    /// - the graph is acyclic
    /// - stored output types equal a fresh inference
    pub fn validate(&self) -> OptResult<()> {
        self.validate_inputs()?;
        self.validate_consumers()?;
        self.validate_names()?;
        self.validate_acyclic()?;
        self.validate_types()
    }

    fn validate_inputs(&self) -> OptResult<()> {
        for (_, node) in self.nodes() {
            for (i, src) in node.inputs.iter().enumerate() {
                if self.output_type(*src).is_none() {
                    return Err(TransformError::shape(
                        &node.name,
                        format!("input {} refers to dead output {}", i, src),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_consumers(&self) -> OptResult<()> {
        let expected = build_consumer_index(&self.nodes);

        for (id, node) in self.nodes() {
            for (index, slot) in node.outputs.iter().enumerate() {
                let mut actual: Vec<Consumer> = slot.consumers.to_vec();
                actual.sort_unstable();
                let want = expected.get(&(id, index)).map_or(&[][..], |v| v.as_slice());
                if actual != want {
                    return Err(TransformError::Internal(format!(
                        "consumer set of {}:{} is {:?}, input lists say {:?}",
                        node.name, index, actual, want
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_names(&self) -> OptResult<()> {
        if self.names.len() != self.live {
            return Err(TransformError::Internal(format!(
                "name index has {} entries for {} live nodes",
                self.names.len(),
                self.live
            )));
        }
        for (id, node) in self.nodes() {
            if self.names.get(&node.name) != Some(&id) {
                return Err(TransformError::Internal(format!(
                    "name index does not map '{}' to {}",
                    node.name, id
                )));
            }
        }
        Ok(())
    }

    fn validate_acyclic(&self) -> OptResult<()> {
        let ordered = self.compute_order().len();
        if ordered != self.live {
            return Err(TransformError::Internal(format!(
                "graph has a cycle: only {} of {} nodes can be ordered",
                ordered, self.live
            )));
        }
        Ok(())
    }

    fn validate_types(&self) -> OptResult<()> {
        for (_, node) in self.nodes() {
            let inputs: Vec<_> = node
                .inputs
                .iter()
                .filter_map(|r| self.output_type(*r).cloned())
                .collect();
            let fresh = infer_outputs(node.kind, &node.name, &inputs, &node.attrs)?;
            let stale = fresh.len() != node.outputs.len()
                || fresh.iter().zip(&node.outputs).any(|(t, s)| *t != s.ty);
            if stale {
                return Err(TransformError::shape(
                    &node.name,
                    "stored output types are stale",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Attributes, NodeId, OpKind};
    use crate::tensor::ElementType;

    fn sample() -> (Graph, NodeId) {
        let mut graph = Graph::new();
        let x = graph.add_parameter("x", ElementType::F32, &[3]).unwrap();
        let relu = graph
            .add_node(OpKind::Relu, "relu", &[x.into()], Attributes::new())
            .unwrap();
        graph.add_result("out", relu.into()).unwrap();
        (graph, relu)
    }

    #[test]
    fn test_valid_graph() {
        let (graph, _) = sample();
        graph.validate().unwrap();
    }

    #[test]
    fn test_detects_corrupt_consumers() {
        let (mut graph, relu) = sample();
        graph.nodes[relu.index()].as_mut().unwrap().outputs[0]
            .consumers
            .clear();
        assert!(matches!(graph.validate(), Err(TransformError::Internal(_))));
    }

    #[test]
    fn test_detects_stale_types() {
        let (mut graph, relu) = sample();
        graph.nodes[relu.index()].as_mut().unwrap().outputs[0].ty =
            crate::graph::TensorType::new(ElementType::F32, &[7]);
        assert!(matches!(
            graph.validate(),
            Err(TransformError::ShapeInference { .. })
        ));
    }

    #[test]
    fn test_detects_bad_name_index() {
        let (mut graph, _) = sample();
        graph.names.remove("relu");
        assert!(graph.validate().is_err());
    }
}
