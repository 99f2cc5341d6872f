//! Attention rollout.
//!
//! Composes per-layer attention matrices into one joint matrix describing,
//! for each output token, how much each input token contributed transitively
//! through all layers (Abnar & Zuidema, "Quantifying Attention Flow in
//! Transformers", ACL 2020). The classification token's row, excluding its
//! self-entry, becomes the per-patch importance grid.

use ndarray::{s, Array2, Array3, Axis};

use crate::error::{EngineError, EngineResult};

/// Ordered per-layer attention tensors from one forward pass.
///
/// Each layer is `[heads, tokens, tokens]`. Immutable once constructed;
/// consumed by the saliency engine and discarded.
#[derive(Debug)]
pub struct AttentionStack {
    layers: Vec<Array3<f32>>,
}

impl AttentionStack {
    /// Build a stack, validating layer shapes against the first layer.
    pub fn new(layers: Vec<Array3<f32>>) -> EngineResult<Self> {
        let first = layers
            .first()
            .ok_or_else(|| EngineError::shape("Attention stack is empty"))?;

        let (heads, rows, cols) = first.dim();
        if heads == 0 {
            return Err(EngineError::shape("Attention layer has no heads"));
        }
        if rows != cols {
            return Err(EngineError::shape(format!(
                "Attention matrices must be square, got {}x{}",
                rows, cols
            )));
        }

        for (index, layer) in layers.iter().enumerate().skip(1) {
            let (h, r, c) = layer.dim();
            if h == 0 {
                return Err(EngineError::shape(format!("Layer {} has no heads", index)));
            }
            if r != rows || c != cols {
                return Err(EngineError::shape(format!(
                    "Layer {} has token shape {}x{}, expected {}x{}",
                    index, r, c, rows, cols
                )));
            }
        }

        Ok(Self { layers })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Token count per attention matrix (classification token included).
    pub fn token_count(&self) -> usize {
        self.layers[0].dim().1
    }

    pub fn layers(&self) -> &[Array3<f32>] {
        &self.layers
    }
}

/// One layer's transition matrix: head-average, add the residual identity,
/// then row-normalize so the matrix is row-stochastic.
fn layer_transition(layer: &Array3<f32>) -> Array2<f32> {
    let mut averaged = layer.mean_axis(Axis(0)).expect("non-empty head axis");

    let tokens = averaged.dim().0;
    for i in 0..tokens {
        averaged[[i, i]] += 1.0;
    }

    for mut row in averaged.rows_mut() {
        let sum = row.sum();
        if sum > f32::EPSILON {
            row /= sum;
        }
    }

    averaged
}

/// Compose all layers into the joint attention matrix.
///
/// Layers apply first-to-last: with transitions `A1..An`, the joint matrix
/// is `An · … · A2 · A1`.
pub fn joint_attention(stack: &AttentionStack) -> Array2<f32> {
    let mut joint = layer_transition(&stack.layers()[0]);
    for layer in &stack.layers()[1..] {
        joint = layer_transition(layer).dot(&joint);
    }
    joint
}

/// Reduce a stack to the classification token's per-patch importance grid.
///
/// Fails with a shape error when the patch count is not a perfect square.
pub fn patch_saliency(stack: &AttentionStack) -> EngineResult<Array2<f32>> {
    let joint = joint_attention(stack);
    let cls_row = joint.slice(s![0, 1..]);

    let patch_count = cls_row.len();
    let side = (patch_count as f64).sqrt().round() as usize;
    if side * side != patch_count {
        return Err(EngineError::shape(format!(
            "Patch count {} is not a perfect square",
            patch_count
        )));
    }

    Array2::from_shape_vec((side, side), cls_row.to_vec())
        .map_err(|e| EngineError::shape(format!("Patch grid reshape failed: {}", e)))
}
