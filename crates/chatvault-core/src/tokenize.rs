//! Default tokenizer implementation.

use crate::error::Result;
use crate::traits::Tokenizer;

/// Lowercasing alphanumeric tokenizer.
///
/// Splits on anything that is not alphanumeric, lowercases each token,
/// and joins with single spaces. Good enough for Latin-script chat
/// logs; swap in a segmenting tokenizer via the [`Tokenizer`] trait
/// for languages without word separators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Result<String> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        Ok(tokens.join(" "))
    }
}
