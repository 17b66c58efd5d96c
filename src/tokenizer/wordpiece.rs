use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexSet;

pub const MASK_TOKEN: &str = "[MASK]";
pub const UNK_TOKEN: &str = "[UNK]";
const CONTINUATION_PREFIX: &str = "##";

/// Contractions and punctuation that BERT-style decoding glues back onto the
/// preceding word.
const SPACE_CLEANUPS: &[(&str, &str)] = &[
    (" .", "."),
    (" ?", "?"),
    (" !", "!"),
    (" ,", ","),
    (" ' ", "'"),
    (" n't", "n't"),
    (" 'm", "'m"),
    (" 's", "'s"),
    (" 've", "'ve"),
    (" 're", "'re"),
];

/// WordPiece vocabulary in `vocab.txt` form: one token per line, the line
/// number being the token id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordPieceVocab {
    tokens: IndexSet<String>,
    mask: Option<u32>,
}

impl WordPieceVocab {
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for token in tokens {
            let token = token.into();
            if !set.insert(token.clone()) {
                return Err(anyhow!("duplicate token {token:?}"));
            }
        }
        if set.is_empty() {
            return Err(anyhow!("vocabulary cannot be empty"));
        }

        let mask = set.get_index_of(MASK_TOKEN).map(|idx| idx as u32);
        Ok(Self { tokens: set, mask })
    }

    pub fn from_vocab_str(data: &str) -> Result<Self> {
        Self::from_tokens(data.lines().map(|line| line.trim_end_matches('\r')))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        Self::from_vocab_str(&data)
            .with_context(|| format!("failed to parse vocabulary {}", path.display()))
    }

    pub fn decode(&self, ids: &[u32]) -> String {
        let mut text = String::new();
        for &id in ids {
            let token = self.token(id).unwrap_or(UNK_TOKEN);
            match token.strip_prefix(CONTINUATION_PREFIX) {
                Some(piece) if !text.is_empty() => text.push_str(piece),
                _ => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(token);
                }
            }
        }

        SPACE_CLEANUPS
            .iter()
            .fold(text, |acc, (from, to)| acc.replace(from, to))
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get_index(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn mask(&self) -> Option<u32> {
        self.mask
    }
}

impl super::Tokenizer for WordPieceVocab {
    fn decode(&self, ids: &[u32]) -> String {
        Self::decode(self, ids)
    }

    fn mask_id(&self) -> Option<u32> {
        self.mask()
    }
}
