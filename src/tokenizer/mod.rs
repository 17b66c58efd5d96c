pub mod wordpiece;

pub use wordpiece::WordPieceVocab;

/// Decoding side of a subword tokenizer. Encoding is done by whatever runs the
/// model; this crate only needs ids turned back into surface text.
pub trait Tokenizer: Send + Sync {
    fn decode(&self, ids: &[u32]) -> String;
    fn mask_id(&self) -> Option<u32>;
}
