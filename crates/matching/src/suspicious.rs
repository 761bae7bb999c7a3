//! Safety gate against assigning a folder the identity of a different book

use crate::normalize::{normalize, tokens};
use crate::similarity::{Blend, SimilarityScores};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Combined similarity below which a proposed rename is flagged
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

const TITLE_WEIGHT: f64 = 0.75;
const AUTHOR_WEIGHT: f64 = 0.25;

/// Evidence behind a suspicious-change verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub title_scores: SimilarityScores,
    pub title_score: f64,
    /// Only present when both sides carry an author
    pub author_score: Option<f64>,
    pub combined: f64,
    pub threshold: f64,
    pub shared_title_tokens: usize,
    pub suspicious: bool,
    pub reason: String,
}

/// Scores a proposed title/author change and decides whether it needs review
pub fn check_change(
    old_title: &str,
    new_title: &str,
    old_author: Option<&str>,
    new_author: Option<&str>,
    threshold: f64,
) -> SafetyCheck {
    let old_norm = normalize(old_title);
    let new_norm = normalize(new_title);
    let title_scores = SimilarityScores::of_normalized(&old_norm, &new_norm);
    let title_score = title_scores.blended(Blend::BALANCED);

    let author_score = match (
        old_author.map(normalize).filter(|a| !a.is_empty()),
        new_author.map(normalize).filter(|a| !a.is_empty()),
    ) {
        (Some(old), Some(new)) => {
            Some(SimilarityScores::of_normalized(&old, &new).blended(Blend::BALANCED))
        }
        _ => None,
    };

    let combined = match author_score {
        Some(author) => TITLE_WEIGHT * title_score + AUTHOR_WEIGHT * author,
        None => title_score,
    };

    let old_tokens: HashSet<&str> = tokens(&old_norm).collect();
    let shared_title_tokens = tokens(&new_norm)
        .collect::<HashSet<_>>()
        .intersection(&old_tokens)
        .count();

    let (suspicious, reason) = if old_norm == new_norm && !old_norm.is_empty() {
        (false, "titles identical after normalization".to_string())
    } else if old_norm.is_empty() || new_norm.is_empty() {
        (true, "one of the titles is empty after normalization".to_string())
    } else if shared_title_tokens == 0 {
        (true, format!("no words shared between '{}' and '{}'", old_norm, new_norm))
    } else if combined < threshold {
        (
            true,
            format!("similarity {:.2} below threshold {:.2}", combined, threshold),
        )
    } else {
        (
            false,
            format!("similarity {:.2} meets threshold {:.2}", combined, threshold),
        )
    };

    SafetyCheck {
        title_scores,
        title_score,
        author_score,
        combined,
        threshold,
        shared_title_tokens,
        suspicious,
        reason,
    }
}

/// True when the change from old to new title/author looks like a different book
///
/// Identical titles never trip the gate. Titles that share no words always do,
/// whatever the threshold.
pub fn is_suspicious_change(
    old_title: &str,
    new_title: &str,
    old_author: Option<&str>,
    new_author: Option<&str>,
    threshold: f64,
) -> bool {
    check_change(old_title, new_title, old_author, new_author, threshold).suspicious
}
