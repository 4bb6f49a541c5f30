//! Content fingerprint used to decide whether a fill landed.
//!
//! Editors rewrite what they are given: paragraphs become `\n\n`, spaces
//! become NBSP, zero-width joiners appear around mentions. Both sides are
//! normalised the same way before hashing so only real content differences
//! count.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Normalised length in chars
    pub len: usize,
    pub digest: String,
}

/// Result of comparing an observed value against a [`Fingerprint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verification {
    Match,
    Empty,
    Mismatch {
        expected_len: usize,
        observed_len: usize,
    },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match)
    }
}

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let normalized = normalize(text);
        let digest = hex::encode(Sha256::digest(normalized.as_bytes()));
        Self {
            len: normalized.chars().count(),
            digest: format!("sha256:{}", digest),
        }
    }

    pub fn verify(&self, observed: &str) -> Verification {
        let seen = Fingerprint::of(observed);
        if seen.digest == self.digest {
            Verification::Match
        } else if seen.len == 0 {
            Verification::Empty
        } else {
            Verification::Mismatch {
                expected_len: self.len,
                observed_len: seen.len,
            }
        }
    }
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Line endings unified, NBSP to space, zero-width chars dropped, whitespace
/// runs collapsed, trimmed.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| !is_zero_width(*c))
        .map(|c| match c {
            '\u{00A0}' | '\r' => ' ',
            other => other,
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
