use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::{LensError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// One fill-mask prediction: the vocabulary id, its decoded surface text and
/// the sentence with the placeholder substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub token_id: u32,
    pub text: String,
    pub sentence: String,
}

/// Turns an externally ranked list of token ids into filled-in sentences.
#[derive(Clone, Copy, Debug)]
pub struct CandidateRanker {
    top_k: usize,
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl CandidateRanker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Substitute each candidate's decoded text for every `placeholder` in `text`.
    ///
    /// Candidate order is kept as given; at most `top_k` candidates are used
    /// and a shorter list simply yields fewer sentences.
    pub fn rank<F>(
        &self,
        text: &str,
        placeholder: &str,
        ranked_ids: &[u32],
        decode: F,
    ) -> Vec<Candidate>
    where
        F: Fn(u32) -> String,
    {
        ranked_ids
            .iter()
            .take(self.top_k)
            .map(|&token_id| {
                let decoded = decode(token_id);
                Candidate {
                    token_id,
                    sentence: text.replace(placeholder, &decoded),
                    text: decoded,
                }
            })
            .collect()
    }

    /// Pick the `top_k` highest-scoring ids from one position's vocabulary logits.
    pub fn select<B: Backend>(&self, logits: &[f32], device: &B::Device) -> Result<Vec<u32>> {
        if logits.is_empty() {
            return Ok(Vec::new());
        }
        let tensor =
            Tensor::<B, 1>::from_data(TensorData::new(logits.to_vec(), [logits.len()]), device);
        top_k_token_ids(tensor, self.top_k)
    }
}

/// Indices of the `k` largest logits, highest first. `k` is clamped to the
/// vocabulary size.
pub fn top_k_token_ids<B: Backend>(logits: Tensor<B, 1>, k: usize) -> Result<Vec<u32>> {
    let [vocab] = logits.shape().dims::<1>();
    let k = k.min(vocab);
    if k == 0 {
        return Ok(Vec::new());
    }

    let (_, idxs) = logits.topk_with_indices(k, 0);
    let idxs = idxs
        .to_data()
        .convert::<i64>()
        .into_vec::<i64>()
        .map_err(|err| LensError::Tensor {
            reason: format!("{err:?}"),
        })?;

    idxs.into_iter()
        .map(|idx| {
            u32::try_from(idx).map_err(|_| LensError::Tensor {
                reason: format!("token index {idx} out of range"),
            })
        })
        .collect()
}
