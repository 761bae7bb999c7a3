//! Similarity measures over normalized strings
//!
//! All scores are in `[0, 1]`. The measures expect already-normalized input;
//! [`compare`] normalizes for callers holding raw names.

use crate::normalize::{normalize, tokens};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Full-string normalized Levenshtein similarity
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Best alignment of the shorter string against every same-width window of the longer
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    let width = short.len();
    if width == 0 {
        return if long.is_empty() { 1.0 } else { 0.0 };
    }

    let short = CharSlice(&short);
    let mut best = 0.0_f64;
    for window in long.windows(width) {
        let distance = strsim::generic_levenshtein(&short, &CharSlice(window));
        let score = 1.0 - distance as f64 / width as f64;
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

/// Borrowed chars that `strsim::generic_levenshtein` can iterate
struct CharSlice<'s>(&'s [char]);

impl<'a, 's> IntoIterator for &'a CharSlice<'s> {
    type Item = &'s char;
    type IntoIter = std::slice::Iter<'s, char>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Token-order-independent ratio
///
/// Compares the shared token core against each side's core-plus-remainder and
/// keeps the best score, so reordered or extended names still match.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = tokens(a).collect();
    let right: BTreeSet<&str> = tokens(b).collect();

    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let common = join(left.intersection(&right));
    let only_left = join(left.difference(&right));
    let only_right = join(right.difference(&left));

    let with_left = concat(&common, &only_left);
    let with_right = concat(&common, &only_right);

    let mut best = ratio(&with_left, &with_right);
    if !common.is_empty() {
        best = best
            .max(ratio(&common, &with_left))
            .max(ratio(&common, &with_right));
    }
    best
}

fn join<'a, 'b: 'a>(words: impl Iterator<Item = &'a &'b str>) -> String {
    words.copied().collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

/// How the three measures collapse into one score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Blend {
    /// Most forgiving: the best of the three
    Max,
    /// Weighted sum; weights should add up to 1
    Weighted {
        ratio: f64,
        partial: f64,
        token_set: f64,
    },
}

impl Blend {
    /// Weighting used by the safety gate and duplicate grouping
    pub const BALANCED: Blend = Blend::Weighted {
        ratio: 0.3,
        partial: 0.2,
        token_set: 0.5,
    };
}

impl Default for Blend {
    fn default() -> Self {
        Self::BALANCED
    }
}

/// The three raw measures for one pair of strings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScores {
    pub ratio: f64,
    pub partial: f64,
    pub token_set: f64,
}

impl SimilarityScores {
    /// Scores for two already-normalized strings
    pub fn of_normalized(a: &str, b: &str) -> Self {
        Self {
            ratio: ratio(a, b),
            partial: partial_ratio(a, b),
            token_set: token_set_ratio(a, b),
        }
    }

    pub fn max(&self) -> f64 {
        self.ratio.max(self.partial).max(self.token_set)
    }

    pub fn blended(&self, blend: Blend) -> f64 {
        match blend {
            Blend::Max => self.max(),
            Blend::Weighted {
                ratio,
                partial,
                token_set,
            } => (self.ratio * ratio + self.partial * partial + self.token_set * token_set)
                .clamp(0.0, 1.0),
        }
    }
}

/// Normalizes both inputs and scores them
pub fn compare(a: &str, b: &str) -> SimilarityScores {
    SimilarityScores::of_normalized(&normalize(a), &normalize(b))
}
