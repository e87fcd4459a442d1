//! Simulated quantization arithmetic
//!
//! The quantize-then-dequantize function of a quantization range node,
//! evaluated in f32 with round-half-to-even so that folded constants match
//! what a runtime kernel would produce for the unfused graph.

use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn, Zip};

use crate::error::{OptResult, TransformError};
use crate::graph::{Attributes, Node, OpKind};

/// Attribute names of the four bounds, in declaration order
pub const BOUND_ATTRS: [&str; 4] = ["input_low", "input_high", "output_low", "output_high"];

/// Bounds and level count of a quantization range node
#[derive(Debug, Clone, PartialEq)]
pub struct QuantRange {
    /// Lower clamp bound on the input side
    pub input_low: ArrayD<f32>,
    /// Upper clamp bound on the input side
    pub input_high: ArrayD<f32>,
    /// Value emitted for the lowest level
    pub output_low: ArrayD<f32>,
    /// Value emitted for the highest level
    pub output_high: ArrayD<f32>,
    /// Number of representable levels
    pub levels: i64,
}

impl QuantRange {
    /// Read the bounds and level count from a quantization range node
    pub fn from_node(node: &Node) -> OptResult<Self> {
        if node.kind() != OpKind::QuantizeRange {
            return Err(TransformError::InvalidNode(format!(
                "'{}' is a {}, not a quantization range",
                node.name(),
                node.kind()
            )));
        }

        let attrs = node.attrs();
        let name = node.name();
        Ok(Self {
            input_low: attrs.require_tensor(name, "input_low")?.clone(),
            input_high: attrs.require_tensor(name, "input_high")?.clone(),
            output_low: attrs.require_tensor(name, "output_low")?.clone(),
            output_high: attrs.require_tensor(name, "output_high")?.clone(),
            levels: attrs.require_int(name, "levels")?,
        })
    }

    /// Attribute map for a quantization range node with these bounds
    pub fn to_attributes(&self) -> Attributes {
        Attributes::new()
            .with("input_low", self.input_low.clone())
            .with("input_high", self.input_high.clone())
            .with("output_low", self.output_low.clone())
            .with("output_high", self.output_high.clone())
            .with("levels", self.levels)
    }

    /// Check levels and bound ordering.
    ///
    /// `node` is only used to label the error.
    pub fn validate(&self, node: &str) -> OptResult<()> {
        self.check_levels(node)?;
        check_ordered(node, "input", &self.input_low, &self.input_high)?;
        check_ordered(node, "output", &self.output_low, &self.output_high)?;
        Ok(())
    }

    fn check_levels(&self, node: &str) -> OptResult<()> {
        if self.levels < 2 {
            return Err(TransformError::InvalidQuantizationLevels {
                node: node.to_string(),
                levels: self.levels,
            });
        }
        Ok(())
    }

    /// Apply the quantize/dequantize function elementwise.
    ///
    /// Bounds are broadcast against `data`; the result has `data`'s shape.
    /// Fails with `InvalidQuantizationLevels` below two levels. `node`
    /// only labels errors.
    pub fn apply(&self, node: &str, data: &ArrayD<f32>) -> OptResult<ArrayD<f32>> {
        self.check_levels(node)?;

        let dim = data.raw_dim();
        let il = broadcast_bound(node, "input_low", &self.input_low, &dim)?;
        let ih = broadcast_bound(node, "input_high", &self.input_high, &dim)?;
        let ol = broadcast_bound(node, "output_low", &self.output_low, &dim)?;
        let oh = broadcast_bound(node, "output_high", &self.output_high, &dim)?;

        let levels = self.levels;
        let mut out = ArrayD::<f32>::zeros(dim.clone());
        Zip::from(&mut out)
            .and(data)
            .and(&il)
            .and(&ih)
            .and(&ol)
            .and(&oh)
            .for_each(|o, &x, &il, &ih, &ol, &oh| {
                *o = quantize_value(x, il, ih, ol, oh, levels);
            });

        Ok(out)
    }

    /// Whether every bound is a single value
    pub fn is_per_tensor(&self) -> bool {
        [
            &self.input_low,
            &self.input_high,
            &self.output_low,
            &self.output_high,
        ]
        .iter()
        .all(|b| b.len() == 1)
    }
}

fn broadcast_bound<'a>(
    node: &str,
    what: &str,
    bound: &'a ArrayD<f32>,
    dim: &IxDyn,
) -> OptResult<ArrayViewD<'a, f32>> {
    bound.broadcast(dim.clone()).ok_or_else(|| {
        TransformError::shape(
            node,
            format!(
                "{} of shape {:?} does not broadcast to {:?}",
                what,
                bound.shape(),
                dim.slice()
            ),
        )
    })
}

fn check_ordered(node: &str, side: &str, low: &ArrayD<f32>, high: &ArrayD<f32>) -> OptResult<()> {
    let Some(shape) = crate::tensor::shape::broadcast_shape(low.shape(), high.shape()) else {
        return Err(TransformError::InvalidQuantizationRange {
            node: node.to_string(),
            reason: format!(
                "{}_low {:?} and {}_high {:?} are not broadcastable",
                side,
                low.shape(),
                side,
                high.shape()
            ),
        });
    };

    let dim = IxDyn(&shape);
    let (Some(lo), Some(hi)) = (low.broadcast(dim.clone()), high.broadcast(dim)) else {
        return Err(TransformError::Internal(format!(
            "broadcast of {} bounds failed",
            side
        )));
    };

    let ordered = Zip::from(&lo).and(&hi).all(|&l, &h| l <= h);
    if !ordered {
        return Err(TransformError::InvalidQuantizationRange {
            node: node.to_string(),
            reason: format!("{}_low exceeds {}_high", side, side),
        });
    }

    Ok(())
}

/// Quantize-then-dequantize a single value.
///
/// Values at or below the input low bound map to `ol`, values above the
/// input high bound map to `oh`. A zero-width input range therefore never
/// reaches the division. Callers check `levels >= 2`.
fn quantize_value(x: f32, il: f32, ih: f32, ol: f32, oh: f32, levels: i64) -> f32 {
    if x <= il.min(ih) {
        return ol;
    }
    if x > il.max(ih) {
        return oh;
    }

    let steps = (levels - 1) as f32;
    ((x - il) / (ih - il) * steps).round_ties_even() / steps * (oh - ol) + ol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::convert::{array_from_vec, scalar, vector};

    fn per_tensor(il: f32, ih: f32, ol: f32, oh: f32, levels: i64) -> QuantRange {
        QuantRange {
            input_low: scalar(il),
            input_high: scalar(ih),
            output_low: scalar(ol),
            output_high: scalar(oh),
            levels,
        }
    }

    #[test]
    fn test_identity_grid() {
        let q = per_tensor(0.0, 4.0, 0.0, 4.0, 5);
        let data = vector(&[1.0, 2.0, 3.0, 4.0]);
        let out = q.apply("fq", &data).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_clamping() {
        let q = per_tensor(0.0, 4.0, 0.0, 4.0, 5);
        let out = q.apply("fq", &vector(&[-3.0, 0.0, 9.0])).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_rounding_half_even() {
        // 5 levels over [0, 4]: one level per unit, ties go to even
        assert_eq!(quantize_value(2.5, 0.0, 4.0, 0.0, 4.0, 5), 2.0);
        assert_eq!(quantize_value(3.5, 0.0, 4.0, 0.0, 4.0, 5), 4.0);
        assert_eq!(quantize_value(3.4, 0.0, 4.0, 0.0, 4.0, 5), 3.0);
    }

    #[test]
    fn test_output_rescale() {
        // two levels: everything inside snaps to either end of the output range
        assert_eq!(quantize_value(0.2, 0.0, 1.0, -1.0, 1.0, 2), -1.0);
        assert_eq!(quantize_value(0.8, 0.0, 1.0, -1.0, 1.0, 2), 1.0);
    }

    #[test]
    fn test_zero_width_range() {
        let v = quantize_value(1.0, 1.0, 1.0, 0.0, 10.0, 2);
        assert_eq!(v, 0.0);
        let v = quantize_value(1.5, 1.0, 1.0, 0.0, 10.0, 2);
        assert_eq!(v, 10.0);
        assert!(quantize_value(0.5, 1.0, 1.0, 0.0, 10.0, 2).is_finite());
    }

    #[test]
    fn test_per_channel_broadcast() {
        let q = QuantRange {
            input_low: array_from_vec(vec![0.0, 0.0], &[2, 1]).unwrap(),
            input_high: array_from_vec(vec![1.0, 10.0], &[2, 1]).unwrap(),
            output_low: array_from_vec(vec![0.0, 0.0], &[2, 1]).unwrap(),
            output_high: array_from_vec(vec![1.0, 10.0], &[2, 1]).unwrap(),
            levels: 2,
        };
        assert!(!q.is_per_tensor());
        let data = array_from_vec(vec![0.9, 5.0, 0.9, 6.0], &[2, 2]).unwrap();
        let out = q.apply("fq", &data).unwrap();
        assert_eq!(
            out.iter().copied().collect::<Vec<_>>(),
            vec![1.0, 1.0, 0.0, 10.0]
        );
    }

    #[test]
    fn test_from_node_roundtrip_attrs() {
        use crate::graph::Graph;

        let mut graph = Graph::new();
        let c = graph.add_constant("c", vector(&[1.0, 2.0])).unwrap();
        let range = per_tensor(0.0, 4.0, -1.0, 1.0, 5);
        let q = graph
            .add_node(OpKind::QuantizeRange, "q", &[c.into()], range.to_attributes())
            .unwrap();

        assert_eq!(QuantRange::from_node(graph.node(q).unwrap()).unwrap(), range);
        assert!(matches!(
            QuantRange::from_node(graph.node(c).unwrap()),
            Err(TransformError::InvalidNode(_))
        ));
    }

    #[test]
    fn test_apply_rejects_single_level() {
        let q = per_tensor(0.0, 4.0, 0.0, 4.0, 1);
        let err = q.apply("fq", &vector(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(
            err,
            TransformError::InvalidQuantizationLevels { levels: 1, ref node } if node == "fq"
        ));

        let q = per_tensor(0.0, 4.0, 0.0, 4.0, i64::MIN);
        assert!(q.apply("fq", &vector(&[1.0])).is_err());
    }

    #[test]
    fn test_apply_bound_shape_error_names_node() {
        let q = QuantRange {
            input_low: vector(&[0.0, 0.0, 0.0]),
            ..per_tensor(0.0, 4.0, 0.0, 4.0, 5)
        };
        let err = q.apply("fq", &vector(&[1.0, 2.0])).unwrap_err();
        match err {
            TransformError::ShapeInference { node, reason } => {
                assert_eq!(node, "fq");
                assert!(reason.contains("input_low"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validate() {
        assert!(per_tensor(0.0, 4.0, 0.0, 4.0, 5).validate("fq").is_ok());
        assert!(per_tensor(1.0, 1.0, 0.0, 4.0, 2).validate("fq").is_ok());

        let err = per_tensor(0.0, 4.0, 0.0, 4.0, 1).validate("fq").unwrap_err();
        assert!(matches!(
            err,
            TransformError::InvalidQuantizationLevels { levels: 1, .. }
        ));

        let err = per_tensor(5.0, 4.0, 0.0, 4.0, 5).validate("fq").unwrap_err();
        assert!(matches!(err, TransformError::InvalidQuantizationRange { .. }));

        let err = per_tensor(0.0, 4.0, 3.0, 2.0, 5).validate("fq").unwrap_err();
        assert!(matches!(err, TransformError::InvalidQuantizationRange { .. }));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn output_stays_in_range(
                x in -100.0f32..100.0,
                il in -10.0f32..0.0,
                width in 0.0f32..20.0,
                ol in -5.0f32..0.0,
                owidth in 0.0f32..10.0,
                levels in 2i64..300,
            ) {
                let ih = il + width;
                let oh = ol + owidth;
                let v = quantize_value(x, il, ih, ol, oh, levels);
                prop_assert!(v.is_finite());
                prop_assert!(v >= ol - 1e-3 && v <= oh + 1e-3);
            }

            #[test]
            fn requantizing_is_stable(
                x in -10.0f32..10.0,
                levels in 2i64..64,
            ) {
                // snapping an already-snapped value onto the same grid is a no-op
                let once = quantize_value(x, -4.0, 4.0, -4.0, 4.0, levels);
                let twice = quantize_value(once, -4.0, 4.0, -4.0, 4.0, levels);
                prop_assert!((once - twice).abs() <= 1e-5);
            }
        }
    }
}
