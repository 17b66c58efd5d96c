use crate::error::{LensError, Result};

/// Zero-based position of the first `mask_token_id` in `input_ids`, or `None`
/// when the sequence carries no mask token.
pub fn locate_mask(input_ids: &[u32], mask_token_id: u32) -> Option<usize> {
    input_ids.iter().position(|&id| id == mask_token_id)
}

/// Like [`locate_mask`], but treats absence as fatal and names the expected
/// placeholder in the error.
pub fn require_mask(input_ids: &[u32], mask_token_id: u32, placeholder: &str) -> Result<usize> {
    locate_mask(input_ids, mask_token_id).ok_or_else(|| LensError::MissingMask {
        placeholder: placeholder.to_string(),
    })
}
