//! Folder-name parsing and canonical folder naming

use crate::client::BookMetadata;
use audioshelf_core::{Identity, ParsedName};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTITY_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\{\[]\s*(?:asin|isbn)\s*[.:=]?\s*([a-z0-9]{10})\s*[\}\]]")
        .expect("identity tag regex should compile")
});

static BRACKET_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]").expect("bracket regex should compile"));

static PAREN_GROUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("paren regex should compile"));

static BRACE_GROUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("brace regex should compile"));

static YEAR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(1[5-9]\d\d|20\d\d)$").expect("year regex should compile"));

static SERIES_VOLUME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)[\s,]+(?:(?:book|vol\.?|volume|#)\s*)?(\d+(?:\.\d+)?)$")
        .expect("series regex should compile")
});

static PART_SEPARATOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+-\s+").expect("separator regex should compile"));

static EMPTY_GROUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]|\{\s*\}").expect("empty group regex should compile"));

static COLLAPSE_WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Parenthesised words that describe the release rather than the book
const EDITION_WORDS: &[&str] = &["unabridged", "abridged", "retail", "audiobook", "dramatized"];

fn collapse_whitespace(value: &str) -> String {
    COLLAPSE_WHITESPACE_REGEX
        .replace_all(value.trim(), " ")
        .to_string()
}

fn split_series(part: &str) -> (String, Option<String>) {
    match SERIES_VOLUME_REGEX.captures(part) {
        Some(caps) if !caps[1].trim().is_empty() => {
            (caps[1].trim().to_string(), Some(caps[2].to_string()))
        }
        _ => (part.to_string(), None),
    }
}

/// Parses a book folder name into its components
///
/// Recognised shapes, in any combination:
/// - `Title (Year) (Author) {ASIN.B000000001}`
/// - `Author - Title`
/// - `Series 02 - Title`, `Author - Series 02 - Title`
/// - bracketed source tags such as `[Audible]` or `[MP3]`
///
/// When nothing is recognised the whole name becomes the title. The identity
/// field is `None` unless a valid tag is embedded.
pub fn parse_folder_name(raw: &str) -> ParsedName {
    let mut name = raw.replace('_', " ");
    let mut parsed = ParsedName::default();

    if let Some(caps) = IDENTITY_TAG_REGEX.captures(&name) {
        match Identity::parse(&caps[1]) {
            Ok(identity) => parsed.identity = Some(identity),
            Err(e) => log::debug!("Ignoring identity tag in '{}': {}", raw, e),
        }
    }
    name = IDENTITY_TAG_REGEX.replace_all(&name, " ").to_string();

    parsed.source_tag = BRACKET_TAG_REGEX
        .captures_iter(&name)
        .map(|caps| caps[1].trim().to_string())
        .find(|tag| !tag.is_empty());
    name = BRACKET_TAG_REGEX.replace_all(&name, " ").to_string();

    for caps in PAREN_GROUP_REGEX.captures_iter(&name) {
        let group = caps[1].trim();
        if group.is_empty() || EDITION_WORDS.contains(&group.to_lowercase().as_str()) {
            continue;
        }
        if parsed.year.is_none() && YEAR_REGEX.is_match(group) {
            parsed.year = group.parse().ok();
        } else if parsed.author.is_none() {
            parsed.author = Some(group.to_string());
        }
    }
    name = PAREN_GROUP_REGEX.replace_all(&name, " ").to_string();
    name = BRACE_GROUP_REGEX.replace_all(&name, " ").to_string();

    let rest = collapse_whitespace(&name);
    let rest = rest.trim_matches(|c: char| c == '-' || c == ',' || c.is_whitespace());
    let parts: Vec<&str> = PART_SEPARATOR_REGEX
        .split(rest)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [] => {}
        [title] => parsed.title = title.to_string(),
        [first, title] => {
            let (series, volume) = split_series(first);
            if volume.is_none() && parsed.author.is_none() {
                parsed.author = Some(series);
            } else {
                parsed.series = Some(series);
                parsed.volume = volume;
            }
            parsed.title = title.to_string();
        }
        [first, second, title @ ..] => {
            if parsed.author.is_none() {
                parsed.author = Some(first.to_string());
            }
            let (series, volume) = split_series(second);
            parsed.series = Some(series);
            parsed.volume = volume;
            parsed.title = title.join(" - ");
        }
    }

    if parsed.title.is_empty() {
        parsed.title = raw.trim().to_string();
    }
    parsed
}

/// Replaces characters that are unsafe in folder names on common filesystems
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .replace(':', " ")
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .collect();
    collapse_whitespace(&cleaned)
        .trim_end_matches('.')
        .to_string()
}

/// Placeholder template for canonical folder names
///
/// Placeholders are `{title}`, `{author}`, `{year}`, `{series}`, `{volume}`
/// and `{identity}`. Any other brace is literal, so
/// `{ASIN.{identity}}` renders as `{ASIN.B000000001}`. Groups left empty by a
/// missing value, such as `()`, are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    template: String,
}

impl NamingTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    fn value(name: &str, metadata: &BookMetadata) -> Option<Option<String>> {
        let value = match name {
            "title" => Some(metadata.title.clone()),
            "author" => metadata.author.clone(),
            "year" => metadata.year.map(|y| y.to_string()),
            "series" => metadata.series.clone(),
            "volume" => metadata.volume.clone(),
            "identity" => Some(metadata.identity.to_string()),
            _ => return None,
        };
        Some(value.map(|v| sanitize_component(&v)))
    }

    pub fn render(&self, metadata: &BookMetadata) -> String {
        let mut out = String::with_capacity(self.template.len() + metadata.title.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let placeholder = after
                .find('}')
                .map(|end| &after[..end])
                .and_then(|name| Self::value(name, metadata).map(|value| (name.len(), value)));

            match placeholder {
                Some((len, value)) => {
                    out.push_str(value.as_deref().unwrap_or(""));
                    rest = &after[len + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        let mut name = out;
        loop {
            let stripped = EMPTY_GROUP_REGEX.replace_all(&name, "").to_string();
            if stripped == name {
                break;
            }
            name = stripped;
        }
        let name = collapse_whitespace(&name);
        if name.is_empty() {
            metadata.identity.to_string()
        } else {
            name
        }
    }
}
