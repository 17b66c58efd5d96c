pub mod attention;
pub mod config;
pub mod error;
pub mod mask;
pub mod pipeline;
pub mod ranking;
pub mod record;
pub mod tokenizer;
pub mod viz;

pub use attention::AttentionTensor;
pub use config::{AppConfig, FontConfig, RankingConfig, RenderConfig, load_config};
pub use error::{LensError, Result};
pub use mask::{locate_mask, require_mask};
pub use pipeline::{Prediction, predict, visualize};
pub use ranking::{Candidate, CandidateRanker, DEFAULT_TOP_K, top_k_token_ids};
pub use record::InferenceRecord;
pub use tokenizer::{Tokenizer, WordPieceVocab};
pub use viz::{
    AttentionSweep, BlockFont, Canvas, DiagramId, DiagramLayout, DiagramRenderer, LabelFont,
    SweepReport, attention_color,
};
