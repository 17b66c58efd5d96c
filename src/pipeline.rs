//! One fill-mask request in two stages: [`predict`] locates the mask and ranks
//! candidates, [`visualize`] sweeps every attention head into a diagram.
//! Callers publish the prediction before starting the sweep.

use burn::tensor::backend::Backend;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::mask::require_mask;
use crate::ranking::{Candidate, CandidateRanker};
use crate::record::InferenceRecord;
use crate::tokenizer::Tokenizer;
use crate::viz::{AttentionSweep, DiagramRenderer, LabelFont, SweepReport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prediction {
    pub mask_index: usize,
    pub candidates: Vec<Candidate>,
}

/// Resolve the mask position and fill it with the top-ranked candidates.
///
/// Fails with `MissingMask` before touching the logits when the input has no
/// mask token.
pub fn predict<B: Backend>(
    record: &InferenceRecord,
    tokenizer: &dyn Tokenizer,
    ranker: &CandidateRanker,
    device: &B::Device,
) -> Result<Prediction> {
    record.validate()?;
    let mask_index = require_mask(&record.input_ids, record.mask_token_id, &record.mask_token)?;
    if let Some(expected) = tokenizer.mask_id()
        && expected != record.mask_token_id
    {
        warn!(
            record = record.mask_token_id,
            vocabulary = expected,
            "mask token id differs from the vocabulary's"
        );
    }

    let logits = record.logits_at(mask_index)?;
    let ranked = ranker.select::<B>(logits, device)?;
    debug!(mask_index, ?ranked, "ranked mask candidates");

    let candidates = ranker.rank(&record.text, &record.mask_token, &ranked, |id| {
        tokenizer.decode(&[id])
    });
    Ok(Prediction {
        mask_index,
        candidates,
    })
}

/// Render one diagram per (layer, head) into `render.output_dir`.
pub fn visualize(
    record: &InferenceRecord,
    render: &RenderConfig,
    font: &dyn LabelFont,
) -> Result<SweepReport> {
    let attention = record.attention()?;
    let out_of_range = attention.out_of_range();
    if out_of_range > 0 {
        warn!(
            count = out_of_range,
            "attention weights outside [0, 1] will be clamped"
        );
    }

    let renderer = DiagramRenderer::new(render.layout(), font);
    AttentionSweep::new(renderer, &render.output_dir)
        .with_workers(render.workers)
        .run(&record.tokens, &attention)
}
