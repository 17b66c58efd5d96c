//! The JSON document an external fill-mask model run hands to this crate.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::attention::AttentionTensor;
use crate::error::{LensError, Result};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InferenceRecord {
    /// Raw sentence containing the mask placeholder.
    pub text: String,
    /// Decoded label of every input token, `[CLS]` and `[SEP]` included.
    pub tokens: Vec<String>,
    pub input_ids: Vec<u32>,
    pub mask_token_id: u32,
    /// Placeholder string as it appears in `text`, e.g. `[MASK]`.
    pub mask_token: String,
    /// Vocabulary logits per input position, `[token][vocab]`.
    pub logits: Vec<Vec<f32>>,
    /// Attention weights, `[layer][head][query][key]`.
    pub attentions: Vec<Vec<Vec<Vec<f32>>>>,
}

impl InferenceRecord {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read inference record {}", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("failed to parse inference record {}", path.display()))
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let record: Self = serde_json::from_str(data)?;
        Ok(record)
    }

    /// Token labels and ids must describe the same sequence.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.len() != self.input_ids.len() {
            return Err(LensError::Record {
                reason: format!(
                    "{} token labels but {} input ids",
                    self.tokens.len(),
                    self.input_ids.len()
                ),
            });
        }
        Ok(())
    }

    /// Vocabulary logits at `position`.
    pub fn logits_at(&self, position: usize) -> Result<&[f32]> {
        self.logits
            .get(position)
            .map(Vec::as_slice)
            .ok_or_else(|| LensError::Record {
                reason: format!(
                    "no logits for position {position}; record has {} rows",
                    self.logits.len()
                ),
            })
    }

    pub fn attention(&self) -> Result<AttentionTensor> {
        let attention = AttentionTensor::from_nested(&self.attentions)?;
        attention.ensure_tokens(self.tokens.len())?;
        Ok(attention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "text": "The [MASK] sat.",
        "tokens": ["[CLS]", "the", "[MASK]", "sat", ".", "[SEP]"],
        "input_ids": [101, 1996, 103, 2938, 1012, 102],
        "mask_token_id": 103,
        "mask_token": "[MASK]",
        "logits": [[0.0], [0.0], [0.1, 0.9], [0.0], [0.0], [0.0]],
        "attentions": []
    }"#;

    #[test]
    fn parses_and_validates() {
        let record = InferenceRecord::from_json_str(RECORD).expect("record");
        record.validate().expect("valid");
        assert_eq!(record.logits_at(2).expect("logits"), &[0.1, 0.9]);
        assert!(record.logits_at(6).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut record = InferenceRecord::from_json_str(RECORD).expect("record");
        record.input_ids.pop();
        assert!(matches!(record.validate(), Err(LensError::Record { .. })));
    }

    #[test]
    fn attention_must_cover_every_token() {
        let mut record = InferenceRecord::from_json_str(RECORD).expect("record");
        record.attentions = vec![vec![vec![vec![0.25; 4]; 4]]];
        assert!(matches!(
            record.attention(),
            Err(LensError::MalformedAttention { .. })
        ));

        record.attentions = vec![vec![vec![vec![1.0 / 6.0; 6]; 6]; 2]; 3];
        let attention = record.attention().expect("attention");
        assert_eq!((attention.layers(), attention.heads()), (3, 2));
    }
}
