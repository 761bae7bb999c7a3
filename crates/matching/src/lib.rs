//! Fuzzy title/author matching
//!
//! Pure functions only: normalization, three similarity measures, the
//! suspicious-change safety gate and blocked duplicate grouping.

mod duplicates;
mod normalize;
mod similarity;
mod suspicious;

pub use duplicates::{find_duplicates, DuplicateGroup, PairScore, DEFAULT_DUPLICATE_THRESHOLD};
pub use normalize::{blocking_key, normalize, tokens};
pub use similarity::{compare, partial_ratio, ratio, token_set_ratio, Blend, SimilarityScores};
pub use suspicious::{
    check_change, is_suspicious_change, SafetyCheck, DEFAULT_SIMILARITY_THRESHOLD,
};
