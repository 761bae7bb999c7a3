//! Duplicate grouping over (title, author) pairs
//!
//! Entries are bucketed by their leading significant title word before any
//! pairwise scoring, so cost grows with bucket sizes rather than N². Inside a
//! bucket, a pair is only scored when an upper bound on its score, taken
//! from character counts and token lengths, reaches the threshold. The bound
//! never undershoots the real score, so pruning does not change the result.
//! Matches are merged transitively with a union-find.

use crate::normalize::{blocking_key, normalize, tokens};
use crate::similarity::{Blend, SimilarityScores};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Combined similarity at or above which two entries are considered the same book
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.88;

/// One matching pair, by index into the caller's slice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub left: usize,
    pub right: usize,
    pub score: f64,
}

/// Entries judged to be the same book, with the pair scores that linked them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Sorted indices into the input slice
    pub members: Vec<usize>,
    pub scores: Vec<PairScore>,
}

/// Tolerance when comparing a score bound with the threshold
const BOUND_EPSILON: f64 = 1e-9;

/// Weight of the title when both entries have an author
const TITLE_WEIGHT: f64 = 0.75;
const AUTHOR_WEIGHT: f64 = 0.25;

struct Prepared {
    normalized: String,
    /// Tokens sorted so word order does not affect scoring
    title: String,
    author: Option<String>,
    sketch: Sketch,
}

/// Character buckets: `a`-`z`, `0`-`9`, space, everything else
const BUCKETS: usize = 38;

/// Per-character counts of a string
///
/// Distinct characters may share a bucket, which only lowers the distance
/// computed from two counts.
#[derive(Clone, Copy)]
struct CharCounts([u32; BUCKETS]);

impl CharCounts {
    fn of<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts = [0u32; BUCKETS];
        for c in parts.into_iter().flat_map(str::chars) {
            let bucket = match c {
                'a'..='z' => c as usize - 'a' as usize,
                '0'..='9' => 26 + c as usize - '0' as usize,
                ' ' => 36,
                _ => 37,
            };
            counts[bucket] += 1;
        }
        Self(counts)
    }

    /// Characters of `self` that `other` cannot supply
    fn excess_over(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(mine, theirs)| mine.saturating_sub(*theirs))
            .sum()
    }

    /// Bag distance, a lower bound on the Levenshtein distance
    fn distance(&self, other: &Self) -> u32 {
        self.excess_over(other).max(other.excess_over(self))
    }
}

/// What the pruning bound needs to know about one title
struct Sketch {
    /// Char length of the sorted-token title
    len: usize,
    counts: CharCounts,
    /// Distinct tokens, sorted
    set: Vec<String>,
    /// Char length of the distinct tokens joined by spaces
    set_len: usize,
    set_counts: CharCounts,
}

impl Sketch {
    fn of(sorted_title: &str) -> Self {
        let mut set: Vec<String> = tokens(sorted_title).map(str::to_string).collect();
        set.dedup();
        let set_len = joined_len(set.iter().map(String::as_str));
        let set_counts = CharCounts::of(spaced(&set));
        Self {
            len: sorted_title.chars().count(),
            counts: CharCounts::of([sorted_title]),
            set,
            set_len,
            set_counts,
        }
    }

    /// Char length of the tokens both titles share, joined by spaces
    fn common_len(&self, other: &Self) -> usize {
        let (mut i, mut j) = (0, 0);
        let (mut chars, mut count) = (0, 0);
        while i < self.set.len() && j < other.set.len() {
            match self.set[i].cmp(&other.set[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    chars += self.set[i].chars().count();
                    count += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        chars + usize::saturating_sub(count, 1)
    }

    /// Upper bound on the blended title similarity of two sketches
    fn title_bound(&self, other: &Self) -> f64 {
        let longest = self.len.max(other.len).max(1) as f64;
        let ratio = 1.0 - f64::from(self.counts.distance(&other.counts)) / longest;

        let (short, long) = if self.len <= other.len {
            (self, other)
        } else {
            (other, self)
        };
        let partial =
            1.0 - f64::from(short.counts.excess_over(&long.counts)) / short.len.max(1) as f64;

        let set_longest = self.set_len.max(other.set_len).max(1) as f64;
        let mut token_set =
            1.0 - f64::from(self.set_counts.distance(&other.set_counts)) / set_longest;
        let common = self.common_len(other);
        if common > 0 {
            let common = common as f64;
            token_set = token_set
                .max(common / self.set_len.max(1) as f64)
                .max(common / other.set_len.max(1) as f64);
        }

        SimilarityScores {
            ratio: ratio.clamp(0.0, 1.0),
            partial: partial.clamp(0.0, 1.0),
            token_set: token_set.clamp(0.0, 1.0),
        }
        .blended(Blend::BALANCED)
    }
}

/// Tokens with single spaces between them, as the similarity measures join them
fn spaced(words: &[String]) -> impl Iterator<Item = &str> {
    words
        .iter()
        .enumerate()
        .flat_map(|(i, word)| [if i == 0 { "" } else { " " }, word.as_str()])
}

fn joined_len<'a>(words: impl IntoIterator<Item = &'a str>) -> usize {
    let (chars, count) = words
        .into_iter()
        .fold((0usize, 0usize), |(chars, count), word| {
            (chars + word.chars().count(), count + 1)
        });
    chars + count.saturating_sub(1)
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins so group identity is stable
            let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[merge] = keep;
        }
    }
}

fn sorted_tokens(normalized: &str) -> String {
    let mut words: Vec<&str> = tokens(normalized).collect();
    words.sort_unstable();
    words.join(" ")
}

fn pair_score(a: &Prepared, b: &Prepared) -> f64 {
    let title = SimilarityScores::of_normalized(&a.title, &b.title).blended(Blend::BALANCED);
    match (&a.author, &b.author) {
        (Some(left), Some(right)) => {
            let author = SimilarityScores::of_normalized(left, right).blended(Blend::BALANCED);
            TITLE_WEIGHT * title + AUTHOR_WEIGHT * author
        }
        _ => title,
    }
}

/// Never below `pair_score`; the author is assumed to match perfectly
fn pair_bound(a: &Prepared, b: &Prepared) -> f64 {
    let title = a.sketch.title_bound(&b.sketch);
    match (&a.author, &b.author) {
        (Some(_), Some(_)) => TITLE_WEIGHT * title + AUTHOR_WEIGHT,
        _ => title,
    }
}

/// Partitions entries into duplicate groups
///
/// Only groups with two or more members are returned. Output is deterministic:
/// members are sorted, groups are ordered by their first member and pair
/// scores by `(left, right)`.
pub fn find_duplicates<T: AsRef<str>>(
    entries: &[(T, Option<T>)],
    threshold: f64,
) -> Vec<DuplicateGroup> {
    let prepared: Vec<Prepared> = entries
        .iter()
        .map(|(title, author)| {
            let normalized = normalize(title.as_ref());
            let title = sorted_tokens(&normalized);
            Prepared {
                sketch: Sketch::of(&title),
                title,
                normalized,
                author: author
                    .as_ref()
                    .map(|a| normalize(a.as_ref()))
                    .filter(|a| !a.is_empty()),
            }
        })
        .collect();

    let mut blocks: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, entry) in prepared.iter().enumerate() {
        if let Some(key) = blocking_key(&entry.normalized) {
            blocks.entry(key).or_default().push(index);
        }
    }

    let mut sets = DisjointSet::new(prepared.len());
    let mut matches = Vec::new();
    for members in blocks.values() {
        for (i, &left) in members.iter().enumerate() {
            for &right in &members[i + 1..] {
                if pair_bound(&prepared[left], &prepared[right]) + BOUND_EPSILON < threshold {
                    continue;
                }
                let score = pair_score(&prepared[left], &prepared[right]);
                if score >= threshold {
                    sets.union(left, right);
                    matches.push(PairScore { left, right, score });
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, DuplicateGroup> = BTreeMap::new();
    for index in 0..prepared.len() {
        let root = sets.find(index);
        groups
            .entry(root)
            .or_insert_with(|| DuplicateGroup {
                members: Vec::new(),
                scores: Vec::new(),
            })
            .members
            .push(index);
    }

    matches.sort_by(|a, b| (a.left, a.right).cmp(&(b.left, b.right)));
    for pair in matches {
        let root = sets.find(pair.left);
        if let Some(group) = groups.get_mut(&root) {
            group.scores.push(pair);
        }
    }

    groups
        .into_values()
        .filter(|group| group.members.len() > 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, author: Option<&str>) -> (String, Option<String>) {
        (title.to_string(), author.map(str::to_string))
    }

    #[test]
    fn test_groups_variants_of_same_book() {
        let entries = vec![
            entry("The Hobbit", Some("J.R.R. Tolkien")),
            entry("Dune", Some("Frank Herbert")),
            entry("Hobbit, The (Unabridged)", Some("J. R. R. Tolkien")),
            entry("Dune", Some("Frank Herbert")),
            entry("Emma", Some("Jane Austen")),
        ];
        let groups = find_duplicates(&entries, DEFAULT_DUPLICATE_THRESHOLD);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![0, 2]);
        assert_eq!(groups[1].members, vec![1, 3]);
        assert_eq!(groups[1].scores.len(), 1);
        assert!(groups[1].scores[0].score > 0.99);
    }

    #[test]
    fn test_distinct_books_stay_apart() {
        let entries = vec![
            entry("Dune", None),
            entry("Dune Messiah", None),
            entry("Children of Dune", None),
        ];
        let groups = find_duplicates(&entries, DEFAULT_DUPLICATE_THRESHOLD);
        assert!(groups.is_empty(), "{:?}", groups);
    }

    #[test]
    fn test_transitive_merge() {
        let entries = vec![
            entry("Foundation", None),
            entry("Foundation", None),
            entry("Foundation", None),
        ];
        let groups = find_duplicates(&entries, 0.9);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
        assert_eq!(groups[0].scores.len(), 3);
    }

    #[test]
    fn test_bound_never_undershoots_score() {
        let titles = [
            "dune",
            "dune messiah",
            "children of dune",
            "the hobbit",
            "hobbit the",
            "project hail mary",
            "project hail mary book one",
            "project hail mari",
            "les misérables",
            "les miserables",
            "1984",
            "nineteen eighty four",
            "a a a",
        ];
        let prepared: Vec<Prepared> = titles
            .iter()
            .map(|title| {
                let normalized = normalize(title);
                let sorted = sorted_tokens(&normalized);
                Prepared {
                    sketch: Sketch::of(&sorted),
                    title: sorted,
                    normalized,
                    author: None,
                }
            })
            .collect();

        for a in &prepared {
            for b in &prepared {
                let score = pair_score(a, b);
                let bound = pair_bound(a, b);
                assert!(
                    bound + BOUND_EPSILON >= score,
                    "'{}' vs '{}': bound {} below score {}",
                    a.normalized,
                    b.normalized,
                    bound,
                    score
                );
            }
        }
    }

    #[test]
    fn test_bound_prunes_unrelated_titles() {
        let a = Sketch::of(&sorted_tokens("alpha river stone"));
        let b = Sketch::of(&sorted_tokens("alpha quick lantern"));
        assert!(a.title_bound(&b) < DEFAULT_DUPLICATE_THRESHOLD);
    }

    #[test]
    fn test_extended_title_still_grouped() {
        let entries = vec![
            entry("Project Hail Mary", None),
            entry("Project Hail Mary Book", None),
        ];
        let groups = find_duplicates(&entries, DEFAULT_DUPLICATE_THRESHOLD);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_empty_titles_ignored() {
        let entries = vec![entry("", None), entry("!!!", None)];
        assert!(find_duplicates(&entries, 0.5).is_empty());
    }
}
