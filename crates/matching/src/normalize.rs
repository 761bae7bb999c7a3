//! Text normalization shared by every similarity measure

/// Release tags that say nothing about which book a name refers to
const NOISE_WORDS: &[&str] = &[
    "unabridged",
    "abridged",
    "audiobook",
    "audio",
    "retail",
    "m4b",
    "mp3",
];

const ARTICLES: &[&str] = &["the", "a", "an"];

/// Lowercases, turns punctuation into spaces, drops noise tags and collapses whitespace
///
/// ```
/// use audioshelf_matching::normalize;
/// assert_eq!(normalize("Dune: Messiah [Unabridged]"), "dune messiah");
/// ```
pub fn normalize(input: &str) -> String {
    let mut spaced = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_alphanumeric() {
            spaced.extend(c.to_lowercase());
        } else if c != '\'' && c != '\u{2019}' {
            spaced.push(' ');
        }
    }

    spaced
        .split_whitespace()
        .filter(|word| !NOISE_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokens of an already-normalized string
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace()
}

/// Leading significant token, used to bucket titles before pairwise comparison
pub fn blocking_key(normalized: &str) -> Option<&str> {
    let mut words = tokens(normalized).peekable();
    let first = words.next()?;
    if ARTICLES.contains(&first) {
        words.next().or(Some(first))
    } else {
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation_and_case() {
        assert_eq!(normalize("  The  Hobbit;  or, There & Back  "), "the hobbit or there back");
        assert_eq!(normalize("Ender's Game"), "enders game");
    }

    #[test]
    fn test_normalize_drops_noise_words() {
        assert_eq!(normalize("Project Hail Mary (Unabridged) [M4B]"), "project hail mary");
        assert_eq!(normalize("Unabridged"), "");
    }

    #[test]
    fn test_normalize_keeps_unicode_letters() {
        assert_eq!(normalize("Les Misérables"), "les misérables");
    }

    #[test]
    fn test_blocking_key_skips_articles() {
        assert_eq!(blocking_key("the hobbit"), Some("hobbit"));
        assert_eq!(blocking_key("a"), Some("a"));
        assert_eq!(blocking_key("dune"), Some("dune"));
        assert_eq!(blocking_key(""), None);
    }
}
