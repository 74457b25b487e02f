//! Token- and sentence-level generation confidence.

use crate::types::TokenConfidence;
use serde::{Deserialize, Serialize};

/// Tokens and sentences above this probability count as high confidence.
pub const HIGH_TOKEN_CONFIDENCE: f64 = 0.9;
/// Tokens below this probability are flagged for review.
pub const LOW_TOKEN_CONFIDENCE: f64 = 0.5;

/// Pair generated tokens with their log-probabilities.
///
/// Extra entries on either side are ignored.
pub fn token_confidences<S: AsRef<str>>(tokens: &[S], logprobs: &[f64]) -> Vec<TokenConfidence> {
    tokens
        .iter()
        .zip(logprobs)
        .map(|(token, &logprob)| TokenConfidence {
            token: token.as_ref().to_string(),
            logprob,
            probability: logprob.exp(),
        })
        .collect()
}

/// Tokens the model was unsure about.
pub fn low_confidence_tokens(tokens: &[TokenConfidence]) -> Vec<&TokenConfidence> {
    tokens
        .iter()
        .filter(|t| t.probability < LOW_TOKEN_CONFIDENCE)
        .collect()
}

/// Tokens the model was sure about.
pub fn high_confidence_tokens(tokens: &[TokenConfidence]) -> Vec<&TokenConfidence> {
    tokens
        .iter()
        .filter(|t| t.probability > HIGH_TOKEN_CONFIDENCE)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceConfidence {
    pub sentence: String,
    pub avg_confidence: f64,
}

/// Split text after `.`, `!` or `?` when followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let Some(&(_, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }
        sentences.push(&text[start..end]);
        // Swallow the whole whitespace run.
        start = end;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            start = j + w.len_utf8();
            chars.next();
        }
    }
    sentences.push(&text[start..]);
    sentences
}

/// Mean probability of the tokens occurring in each sentence.
///
/// A token belongs to a sentence when its text is a case-insensitive substring
/// of it. Sentences without token data score 1.0.
pub fn sentence_confidences(
    answer: &str,
    tokens: Option<&[TokenConfidence]>,
) -> Vec<SentenceConfidence> {
    split_sentences(answer)
        .into_iter()
        .map(|sentence| {
            let avg_confidence = tokens
                .map(|tokens| {
                    let lowered = sentence.to_lowercase();
                    let matching: Vec<f64> = tokens
                        .iter()
                        .filter(|t| lowered.contains(&t.token.to_lowercase()))
                        .map(|t| t.probability)
                        .collect();
                    if matching.is_empty() {
                        1.0
                    } else {
                        matching.iter().sum::<f64>() / matching.len() as f64
                    }
                })
                .unwrap_or(1.0);
            SentenceConfidence {
                sentence: sentence.to_string(),
                avg_confidence,
            }
        })
        .collect()
}

/// Only the high-confidence sentences of `answer`, joined by single spaces.
pub fn high_confidence_text(answer: &str, tokens: Option<&[TokenConfidence]>) -> String {
    sentence_confidences(answer, tokens)
        .into_iter()
        .filter(|s| s.avg_confidence > HIGH_TOKEN_CONFIDENCE)
        .map(|s| s.sentence)
        .collect::<Vec<_>>()
        .join(" ")
}
