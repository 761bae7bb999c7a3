//! Technical-quality descriptors used when two releases of a book compete

use crate::format::AudioFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse container ranking, applied before any numeric comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerTier {
    /// Lossy audio with no chapter markers
    Lossy,
    /// Lossy audio with chapter markers (m4b, cue sheet, sidecar)
    ChapteredLossy,
    /// Lossless or uncompressed audio
    Lossless,
}

impl ContainerTier {
    pub fn classify(format: AudioFormat, has_chapters: bool) -> Self {
        if format.is_lossless() {
            Self::Lossless
        } else if has_chapters || format.implies_chapters() {
            Self::ChapteredLossy
        } else {
            Self::Lossy
        }
    }
}

impl fmt::Display for ContainerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lossy => write!(f, "lossy"),
            Self::ChapteredLossy => write!(f, "chaptered lossy"),
            Self::Lossless => write!(f, "lossless"),
        }
    }
}

/// Speaker layout, ordered from least to most channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Multichannel,
}

impl ChannelLayout {
    /// Maps a channel count; zero means the count is unknown
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            0 => None,
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            _ => Some(Self::Multichannel),
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => write!(f, "mono"),
            Self::Stereo => write!(f, "stereo"),
            Self::Multichannel => write!(f, "multichannel"),
        }
    }
}

/// Technical description of one release of a book
///
/// Every field is optional because inspection can fail part-way. A descriptor
/// with no format and no bitrate is "unknown" and never wins a comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityDescriptor {
    pub format: Option<AudioFormat>,
    /// Average audio bitrate in kbps
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    /// Total running time in seconds
    pub duration_secs: Option<u64>,
    pub has_chapters: bool,
    pub channels: Option<ChannelLayout>,
}

impl QualityDescriptor {
    /// Descriptor for a release that could not be inspected
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(format: AudioFormat) -> Self {
        Self {
            format: Some(format),
            has_chapters: format.implies_chapters(),
            ..Default::default()
        }
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = Some(hz);
        self
    }

    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_chapters(mut self, has_chapters: bool) -> Self {
        self.has_chapters = has_chapters;
        self
    }

    pub fn with_channels(mut self, layout: ChannelLayout) -> Self {
        self.channels = Some(layout);
        self
    }

    /// True when inspection produced nothing usable
    pub fn is_unknown(&self) -> bool {
        self.format.is_none() && self.bitrate_kbps.is_none()
    }

    /// Container tier, if the format is known
    pub fn tier(&self) -> Option<ContainerTier> {
        self.format
            .map(|format| ContainerTier::classify(format, self.has_chapters))
    }

    /// Short label used in reports and name suffixes, e.g. `M4B 64kbps`
    pub fn label(&self) -> String {
        let format = self
            .format
            .map(|f| f.extension().to_uppercase())
            .unwrap_or_else(|| "unknown".to_string());
        match self.bitrate_kbps {
            Some(kbps) => format!("{} {}kbps", format, kbps),
            None => format,
        }
    }
}

impl fmt::Display for QualityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())?;
        if let Some(rate) = self.sample_rate {
            write!(f, ", {} Hz", rate)?;
        }
        if let Some(layout) = self.channels {
            write!(f, ", {}", layout)?;
        }
        if let Some(secs) = self.duration_secs {
            write!(f, ", {}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)?;
        }
        if self.has_chapters {
            write!(f, ", chaptered")?;
        }
        Ok(())
    }
}
