//! Audio container/codec labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Audio formats found in audiobook releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    // === Lossless ===
    /// FLAC - Free Lossless Audio Codec
    Flac,
    /// ALAC - Apple Lossless Audio Codec
    Alac,
    /// WAV - uncompressed PCM
    Wav,
    /// AIFF - uncompressed PCM
    Aiff,

    // === Lossy ===
    /// Opus
    Opus,
    /// OGG Vorbis
    Vorbis,
    /// AAC in an M4A container
    M4a,
    /// AAC in an M4B container (audiobook format with chapters)
    M4b,
    /// Raw AAC stream
    Aac,
    /// MP3 - MPEG Audio Layer 3
    Mp3,
    /// WMA - Windows Media Audio
    Wma,
}

impl AudioFormat {
    /// Returns all known formats
    pub fn all() -> Vec<Self> {
        vec![
            Self::Flac,
            Self::Alac,
            Self::Wav,
            Self::Aiff,
            Self::Opus,
            Self::Vorbis,
            Self::M4a,
            Self::M4b,
            Self::Aac,
            Self::Mp3,
            Self::Wma,
        ]
    }

    /// Detects format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "flac" => Some(Self::Flac),
            "alac" => Some(Self::Alac),
            "wav" | "wave" => Some(Self::Wav),
            "aiff" | "aif" | "aifc" => Some(Self::Aiff),
            "opus" => Some(Self::Opus),
            "ogg" | "oga" => Some(Self::Vorbis),
            "m4a" => Some(Self::M4a),
            "m4b" => Some(Self::M4b),
            "aac" => Some(Self::Aac),
            "mp3" => Some(Self::Mp3),
            "wma" => Some(Self::Wma),
            _ => None,
        }
    }

    /// Detects format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns the canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Alac => "alac",
            Self::Wav => "wav",
            Self::Aiff => "aiff",
            Self::Opus => "opus",
            Self::Vorbis => "ogg",
            Self::M4a => "m4a",
            Self::M4b => "m4b",
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
            Self::Wma => "wma",
        }
    }

    /// Returns the format name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flac => "FLAC",
            Self::Alac => "ALAC",
            Self::Wav => "WAV",
            Self::Aiff => "AIFF",
            Self::Opus => "Opus",
            Self::Vorbis => "Vorbis",
            Self::M4a => "AAC (M4A)",
            Self::M4b => "AAC (M4B)",
            Self::Aac => "AAC",
            Self::Mp3 => "MP3",
            Self::Wma => "WMA",
        }
    }

    /// Returns true if no audio information is discarded (lossless or PCM)
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Alac | Self::Wav | Self::Aiff)
    }

    /// Returns true if the container itself implies chapter markers
    pub fn implies_chapters(&self) -> bool {
        matches!(self, Self::M4b)
    }

    /// Returns true if this format is commonly used for audiobooks
    pub fn is_audiobook_format(&self) -> bool {
        matches!(self, Self::M4b | Self::Mp3 | Self::M4a | Self::Opus)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
