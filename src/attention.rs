//! Typed view over a model's self-attention weights.
//!
//! Axis order is `[layer, head, query, key]`. Each `[query, key]` plane is the
//! matrix of one head in one layer: row `q` holds how much token `q` attends to
//! every key token, so the token axes are always square.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use ndarray::{Array4, ArrayView2, s};

use crate::error::{LensError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct AttentionTensor {
    weights: Array4<f32>,
}

impl AttentionTensor {
    pub fn new(weights: Array4<f32>) -> Result<Self> {
        let (_, _, queries, keys) = weights.dim();
        if queries != keys {
            return Err(LensError::MalformedAttention {
                reason: format!("token axes must be square, got {queries}x{keys}"),
            });
        }
        Ok(Self { weights })
    }

    /// Build from `[layer][head][query][key]` nesting, rejecting ragged input.
    pub fn from_nested(nested: &[Vec<Vec<Vec<f32>>>]) -> Result<Self> {
        let layers = nested.len();
        let heads = nested.first().map_or(0, Vec::len);
        let tokens = nested
            .first()
            .and_then(|layer| layer.first())
            .map_or(0, Vec::len);

        let mut flat = Vec::with_capacity(layers * heads * tokens * tokens);
        for (layer_idx, layer) in nested.iter().enumerate() {
            if layer.len() != heads {
                return Err(malformed(format!(
                    "layer {layer_idx} has {} heads, expected {heads}",
                    layer.len()
                )));
            }
            for (head_idx, head) in layer.iter().enumerate() {
                if head.len() != tokens {
                    return Err(malformed(format!(
                        "layer {layer_idx} head {head_idx} has {} query rows, expected {tokens}",
                        head.len()
                    )));
                }
                for (row_idx, row) in head.iter().enumerate() {
                    if row.len() != tokens {
                        return Err(malformed(format!(
                            "layer {layer_idx} head {head_idx} row {row_idx} has {} keys, expected {tokens}",
                            row.len()
                        )));
                    }
                    flat.extend_from_slice(row);
                }
            }
        }

        let weights = Array4::from_shape_vec((layers, heads, tokens, tokens), flat)
            .map_err(|err| malformed(err.to_string()))?;
        Self::new(weights)
    }

    /// Read back a `[layer, head, query, key]` tensor from a burn backend.
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 4>) -> Result<Self> {
        let [layers, heads, queries, keys] = tensor.shape().dims::<4>();
        let values = tensor
            .to_data()
            .convert::<f32>()
            .into_vec::<f32>()
            .map_err(|err| LensError::Tensor {
                reason: format!("{err:?}"),
            })?;
        let weights = Array4::from_shape_vec((layers, heads, queries, keys), values)
            .map_err(|err| malformed(err.to_string()))?;
        Self::new(weights)
    }

    pub fn layers(&self) -> usize {
        self.weights.dim().0
    }

    pub fn heads(&self) -> usize {
        self.weights.dim().1
    }

    pub fn tokens(&self) -> usize {
        self.weights.dim().2
    }

    /// The `[query, key]` matrix of one head; indices are zero-based.
    pub fn head(&self, layer: usize, head: usize) -> ArrayView2<'_, f32> {
        self.weights.slice(s![layer, head, .., ..])
    }

    /// The token axes must line up with the labels drawn along them. A tensor
    /// without any head carries no token axes, so any label count fits it.
    pub fn ensure_tokens(&self, labels: usize) -> Result<()> {
        if self.layers() * self.heads() == 0 {
            return Ok(());
        }
        if self.tokens() != labels {
            return Err(malformed(format!(
                "token axes have length {}, but {labels} token labels were supplied",
                self.tokens()
            )));
        }
        Ok(())
    }

    /// Number of weights outside `[0, 1]` (NaN included).
    pub fn out_of_range(&self) -> usize {
        self.weights
            .iter()
            .filter(|w| !(0.0..=1.0).contains(*w))
            .count()
    }
}

fn malformed(reason: String) -> LensError {
    LensError::MalformedAttention { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    fn uniform(layers: usize, heads: usize, tokens: usize) -> Vec<Vec<Vec<Vec<f32>>>> {
        let w = if tokens == 0 { 0.0 } else { 1.0 / tokens as f32 };
        vec![vec![vec![vec![w; tokens]; tokens]; heads]; layers]
    }

    #[test]
    fn nested_dimensions_are_discovered() {
        let tensor = AttentionTensor::from_nested(&uniform(3, 2, 4)).expect("tensor");
        assert_eq!(tensor.layers(), 3);
        assert_eq!(tensor.heads(), 2);
        assert_eq!(tensor.tokens(), 4);
        assert_eq!(tensor.head(2, 1).dim(), (4, 4));
    }

    #[test]
    fn head_view_preserves_query_key_order() {
        let mut nested = uniform(1, 2, 2);
        nested[0][1][0][1] = 0.9;
        let tensor = AttentionTensor::from_nested(&nested).expect("tensor");
        let head = tensor.head(0, 1);
        assert_eq!(head[[0, 1]], 0.9);
        assert_eq!(head[[1, 0]], 0.5);
    }

    #[test]
    fn ragged_heads_are_rejected() {
        let mut nested = uniform(2, 2, 3);
        nested[1].pop();
        let err = AttentionTensor::from_nested(&nested).unwrap_err();
        assert!(matches!(err, LensError::MalformedAttention { .. }));
    }

    #[test]
    fn non_square_rows_are_rejected() {
        let mut nested = uniform(1, 1, 3);
        nested[0][0][2].push(0.0);
        assert!(AttentionTensor::from_nested(&nested).is_err());
    }

    #[test]
    fn label_count_must_match_token_axes() {
        let tensor = AttentionTensor::from_nested(&uniform(1, 1, 3)).expect("tensor");
        assert!(tensor.ensure_tokens(3).is_ok());
        assert!(tensor.ensure_tokens(4).is_err());
    }

    #[test]
    fn counts_out_of_range_weights() {
        let mut nested = uniform(1, 1, 2);
        nested[0][0][0][0] = 1.5;
        nested[0][0][1][1] = f32::NAN;
        let tensor = AttentionTensor::from_nested(&nested).expect("tensor");
        assert_eq!(tensor.out_of_range(), 2);
    }

    #[test]
    fn empty_tensor_is_valid() {
        let tensor = AttentionTensor::from_nested(&[]).expect("tensor");
        assert_eq!(tensor.layers(), 0);
        assert_eq!(tensor.heads(), 0);
        assert!(tensor.ensure_tokens(4).is_ok());

        let headless = AttentionTensor::from_nested(&uniform(2, 0, 0)).expect("tensor");
        assert_eq!(headless.layers(), 2);
        assert!(headless.ensure_tokens(6).is_ok());
    }

    #[test]
    fn reads_back_burn_tensor() {
        let device = Default::default();
        let values: Vec<f32> = (0..8).map(|v| v as f32 / 8.0).collect();
        let tensor =
            Tensor::<NdArray<f32>, 4>::from_data(TensorData::new(values, [1, 2, 2, 2]), &device);
        let attention = AttentionTensor::from_tensor(tensor).expect("tensor");
        assert_eq!(attention.heads(), 2);
        assert_eq!(attention.head(0, 1)[[1, 0]], 6.0 / 8.0);
    }

    #[test]
    fn non_square_burn_tensor_is_rejected() {
        let device = Default::default();
        let tensor = Tensor::<NdArray<f32>, 4>::from_data(
            TensorData::new(vec![0.0f32; 6], [1, 1, 2, 3]),
            &device,
        );
        assert!(AttentionTensor::from_tensor(tensor).is_err());
    }
}
