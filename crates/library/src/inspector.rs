//! Quality inspection of a book folder with lofty

use crate::client::QualityInspector;
use crate::local::is_audio_file;
use audioshelf_core::Identity;
use audioshelf_media_formats::{AudioFormat, ChannelLayout, QualityDescriptor};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Sidecar files that carry chapter markers for lossy releases
const CHAPTER_SIDECARS: &[&str] = &["chapters.txt", "chapters.json"];

/// Tag names holding a catalog identity, compared after the last `:` so
/// MP4 freeform atoms such as `----:com.apple.iTunes:ASIN` match too
const IDENTITY_TAGS: &[&str] = &["ASIN", "AUDIBLE_ASIN"];

/// Audio files read when looking for an identity tag
const IDENTITY_TAG_FILES: usize = 3;

/// Reads every audio file of a folder and summarises the release
///
/// The folder's format is the one holding the most bytes. Durations are
/// summed and the bitrate is the duration-weighted average over readable
/// files. Files lofty cannot read contribute their size only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileInspector;

#[derive(Default)]
struct Totals {
    bytes_by_format: HashMap<AudioFormat, u64>,
    duration_secs: u64,
    weighted_bitrate: u64,
    sample_rate: Option<u32>,
    channels: Option<u8>,
    has_cue: bool,
}

impl FileInspector {
    pub fn new() -> Self {
        Self
    }

    fn audio_files(path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return vec![path.to_path_buf()];
        }
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
            .map(|entry| entry.into_path())
            .filter(|p| is_audio_file(p))
            .collect();
        files.sort();
        files
    }

    fn read_file(file: &Path, totals: &mut Totals) {
        let tagged = match Probe::open(file).and_then(|opened| opened.read()) {
            Ok(tagged) => tagged,
            Err(e) => {
                log::debug!("Could not read {}: {}", file.display(), e);
                return;
            }
        };

        let properties = tagged.properties();
        let secs = properties.duration().as_secs();
        totals.duration_secs += secs;
        if let Some(kbps) = properties.audio_bitrate() {
            totals.weighted_bitrate += u64::from(kbps) * secs.max(1);
        }
        totals.sample_rate = totals.sample_rate.max(properties.sample_rate());
        totals.channels = totals.channels.max(properties.channels());
    }

    fn tagged_identity(file: &Path) -> Option<Identity> {
        let tagged = Probe::open(file)
            .and_then(|opened| opened.read())
            .map_err(|e| log::debug!("Could not read tags of {}: {}", file.display(), e))
            .ok()?;
        tagged.tags().iter().find_map(identity_from_tag)
    }

    fn has_chapter_sidecar(path: &Path) -> bool {
        fs::read_dir(path)
            .map(|entries| {
                entries.filter_map(Result::ok).any(|entry| {
                    let name = entry.file_name().to_string_lossy().to_lowercase();
                    name.ends_with(".cue") || CHAPTER_SIDECARS.contains(&name.as_str())
                })
            })
            .unwrap_or(false)
    }
}

impl QualityInspector for FileInspector {
    fn inspect(&self, path: &Path) -> QualityDescriptor {
        let files = Self::audio_files(path);
        if files.is_empty() {
            log::debug!("No audio under {}", path.display());
            return QualityDescriptor::unknown();
        }

        let mut totals = Totals {
            has_cue: path.is_dir() && Self::has_chapter_sidecar(path),
            ..Totals::default()
        };

        for file in &files {
            if let Some(format) = AudioFormat::from_path(file) {
                let size = fs::metadata(file).map(|m| m.len()).unwrap_or(0);
                *totals.bytes_by_format.entry(format).or_default() += size;
            }
            Self::read_file(file, &mut totals);
        }

        let Some(format) = totals
            .bytes_by_format
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.extension().cmp(a.0.extension())))
            .map(|(format, _)| *format)
        else {
            return QualityDescriptor::unknown();
        };

        let mut quality = QualityDescriptor::new(format)
            .with_chapters(format.implies_chapters() || totals.has_cue);
        if totals.duration_secs > 0 {
            quality = quality.with_duration(totals.duration_secs);
            if totals.weighted_bitrate > 0 {
                let kbps = totals.weighted_bitrate / totals.duration_secs.max(1);
                quality = quality.with_bitrate(u32::try_from(kbps).unwrap_or(u32::MAX));
            }
        }
        if let Some(rate) = totals.sample_rate {
            quality = quality.with_sample_rate(rate);
        }
        if let Some(layout) = totals.channels.and_then(ChannelLayout::from_channels) {
            quality = quality.with_channels(layout);
        }

        log::debug!("Inspected {}: {}", path.display(), quality);
        quality
    }

    fn embedded_identity(&self, path: &Path) -> Option<Identity> {
        let identity = Self::audio_files(path)
            .iter()
            .take(IDENTITY_TAG_FILES)
            .find_map(|file| Self::tagged_identity(file))?;
        log::debug!("Tag identity {} in {}", identity, path.display());
        Some(identity)
    }
}

/// First valid identity among a tag's ASIN items
fn identity_from_tag(tag: &Tag) -> Option<Identity> {
    tag.items().find_map(|item| {
        let ItemKey::Unknown(key) = item.key() else {
            return None;
        };
        let name = key.rsplit(':').next().unwrap_or(key);
        if !IDENTITY_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name.trim())) {
            return None;
        }
        item.value().text()?.trim().parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::{ItemValue, TagItem, TagType};
    use tempfile::TempDir;

    fn tag_with(key: &str, value: &str) -> Tag {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.insert_unchecked(TagItem::new(
            ItemKey::Unknown(key.to_string()),
            ItemValue::Text(value.to_string()),
        ));
        tag
    }

    #[test]
    fn test_identity_from_asin_tags() {
        let expected: Identity = "B000000001".parse().expect("identity");
        assert_eq!(identity_from_tag(&tag_with("ASIN", "B000000001")), Some(expected.clone()));
        assert_eq!(
            identity_from_tag(&tag_with("AUDIBLE_ASIN", " b000000001 ")),
            Some(expected.clone())
        );
        assert_eq!(
            identity_from_tag(&tag_with("----:com.apple.iTunes:ASIN", "B000000001")),
            Some(expected)
        );
    }

    #[test]
    fn test_identity_from_tag_ignores_other_items() {
        assert_eq!(identity_from_tag(&tag_with("ASIN", "not an id")), None);
        assert_eq!(identity_from_tag(&tag_with("CATALOGNUMBER", "B000000001")), None);
        assert_eq!(identity_from_tag(&Tag::new(TagType::Id3v2)), None);
    }

    #[test]
    fn test_untagged_folder_has_no_identity() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("01.mp3"), vec![0u8; 64]).expect("write");
        assert_eq!(FileInspector::new().embedded_identity(temp.path()), None);
    }

    #[test]
    fn test_empty_folder_is_unknown() {
        let temp = TempDir::new().expect("tempdir");
        assert!(FileInspector::new().inspect(temp.path()).is_unknown());
    }

    #[test]
    fn test_missing_folder_is_unknown() {
        let quality = FileInspector::new().inspect(Path::new("/nonexistent/audioshelf/book"));
        assert!(quality.is_unknown());
    }

    #[test]
    fn test_unreadable_audio_keeps_format() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("01.mp3"), vec![0u8; 64]).expect("write");
        fs::write(temp.path().join("02.mp3"), vec![0u8; 64]).expect("write");
        fs::write(temp.path().join("bonus.flac"), vec![0u8; 16]).expect("write");
        fs::write(temp.path().join("book.cue"), "FILE \"01.mp3\" MP3").expect("write");

        let quality = FileInspector::new().inspect(temp.path());
        assert_eq!(quality.format, Some(AudioFormat::Mp3));
        assert!(quality.has_chapters);
        assert_eq!(quality.bitrate_kbps, None);
    }
}
