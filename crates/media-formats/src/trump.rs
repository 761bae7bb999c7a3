//! Trump decisions: which of two releases of the same book stays canonical
//!
//! The procedure is a pure function over two [`QualityDescriptor`]s. Rules,
//! in priority order:
//!
//! 0. An uninspectable descriptor, or durations that differ by more than the
//!    tolerance (a different edition or abridgement), yields `KeepBoth`.
//! 1. A strictly better container tier wins regardless of bitrate.
//! 2. A bitrate difference above the noise ratio wins.
//! 3. Chapter markers win.
//! 4. A wider channel layout wins.
//! 5. Otherwise the existing release is kept.
//!
//! Every decision carries the metric and both values that decided it.

use crate::quality::QualityDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default relative bitrate difference treated as noise
pub const DEFAULT_BITRATE_NOISE_RATIO: f64 = 0.15;

/// Default relative duration difference tolerated for "same edition"
pub const DEFAULT_DURATION_TOLERANCE: f64 = 0.20;

/// Terminal result of a trump comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrumpOutcome {
    /// Existing release stays; nothing happens
    KeepExisting,
    /// Releases are not comparable; import the new one alongside
    KeepBoth,
    /// Existing is archived, incoming becomes canonical
    ReplaceWithNew,
    /// Incoming is clearly inferior and is discarded/flagged
    RejectNew,
}

impl TrumpOutcome {
    /// True when the outcome leaves the filesystem untouched
    pub fn is_non_mutating(&self) -> bool {
        matches!(self, Self::KeepExisting | Self::RejectNew)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepExisting => "KEEP_EXISTING",
            Self::KeepBoth => "KEEP_BOTH",
            Self::ReplaceWithNew => "REPLACE_WITH_NEW",
            Self::RejectNew => "REJECT_NEW",
        }
    }
}

impl fmt::Display for TrumpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dimension that settled a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrumpMetric {
    Inspection,
    Duration,
    ContainerTier,
    Bitrate,
    Chapters,
    Channels,
    /// No dimension differed meaningfully
    Equivalent,
}

impl fmt::Display for TrumpMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inspection => "inspection",
            Self::Duration => "duration",
            Self::ContainerTier => "container tier",
            Self::Bitrate => "bitrate",
            Self::Chapters => "chapters",
            Self::Channels => "channels",
            Self::Equivalent => "equivalent",
        };
        f.write_str(name)
    }
}

/// Audit record for a trump decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrumpDecision {
    pub outcome: TrumpOutcome,
    pub metric: TrumpMetric,
    pub existing_value: String,
    pub incoming_value: String,
    pub reason: String,
}

impl TrumpDecision {
    fn new(
        outcome: TrumpOutcome,
        metric: TrumpMetric,
        existing_value: impl Into<String>,
        incoming_value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            outcome,
            metric,
            existing_value: existing_value.into(),
            incoming_value: incoming_value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TrumpDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} by {} (existing: {}, incoming: {}): {}",
            self.outcome, self.metric, self.existing_value, self.incoming_value, self.reason
        )
    }
}

/// Tunable thresholds for the decision procedure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrumpPolicy {
    /// Bitrate differences at or below this ratio (of the lower bitrate) are noise
    pub bitrate_noise_ratio: f64,
    /// Duration differences above this ratio (of the longer duration) mean a different edition
    pub duration_tolerance: f64,
}

impl Default for TrumpPolicy {
    fn default() -> Self {
        Self {
            bitrate_noise_ratio: DEFAULT_BITRATE_NOISE_RATIO,
            duration_tolerance: DEFAULT_DURATION_TOLERANCE,
        }
    }
}

impl TrumpPolicy {
    pub fn new(bitrate_noise_ratio: f64, duration_tolerance: f64) -> Self {
        Self {
            bitrate_noise_ratio,
            duration_tolerance,
        }
    }

    /// Decides between an existing library release and an incoming one
    pub fn decide(
        &self,
        existing: &QualityDescriptor,
        incoming: &QualityDescriptor,
    ) -> TrumpDecision {
        if existing.is_unknown() || incoming.is_unknown() {
            return TrumpDecision::new(
                TrumpOutcome::KeepBoth,
                TrumpMetric::Inspection,
                existing.label(),
                incoming.label(),
                "technical inspection failed; refusing to guess",
            );
        }

        match (existing.duration_secs, incoming.duration_secs) {
            (Some(old), Some(new)) => {
                let longer = old.max(new).max(1) as f64;
                let diff = old.abs_diff(new) as f64 / longer;
                if diff > self.duration_tolerance {
                    return TrumpDecision::new(
                        TrumpOutcome::KeepBoth,
                        TrumpMetric::Duration,
                        format!("{}s", old),
                        format!("{}s", new),
                        format!(
                            "durations differ by {:.0}% (> {:.0}%); likely a different edition",
                            diff * 100.0,
                            self.duration_tolerance * 100.0
                        ),
                    );
                }
            }
            (old, new) => {
                return TrumpDecision::new(
                    TrumpOutcome::KeepBoth,
                    TrumpMetric::Duration,
                    describe(old.map(|s| format!("{}s", s))),
                    describe(new.map(|s| format!("{}s", s))),
                    "duration unknown; cannot confirm the same edition",
                );
            }
        }

        if let (Some(old), Some(new)) = (existing.tier(), incoming.tier()) {
            if new > old {
                return TrumpDecision::new(
                    TrumpOutcome::ReplaceWithNew,
                    TrumpMetric::ContainerTier,
                    old.to_string(),
                    new.to_string(),
                    format!("{} beats {}", new, old),
                );
            }
            if new < old {
                return TrumpDecision::new(
                    TrumpOutcome::RejectNew,
                    TrumpMetric::ContainerTier,
                    old.to_string(),
                    new.to_string(),
                    format!("incoming {} is inferior to existing {}", new, old),
                );
            }
        }

        if let (Some(old), Some(new)) = (existing.bitrate_kbps, incoming.bitrate_kbps) {
            let lower = old.min(new).max(1) as f64;
            let diff = old.abs_diff(new) as f64 / lower;
            if diff > self.bitrate_noise_ratio {
                let outcome = if new > old {
                    TrumpOutcome::ReplaceWithNew
                } else {
                    TrumpOutcome::KeepExisting
                };
                return TrumpDecision::new(
                    outcome,
                    TrumpMetric::Bitrate,
                    format!("{}kbps", old),
                    format!("{}kbps", new),
                    format!(
                        "bitrate differs by {:.0}% (> {:.0}% noise)",
                        diff * 100.0,
                        self.bitrate_noise_ratio * 100.0
                    ),
                );
            }
        }

        if existing.has_chapters != incoming.has_chapters {
            let outcome = if incoming.has_chapters {
                TrumpOutcome::ReplaceWithNew
            } else {
                TrumpOutcome::KeepExisting
            };
            return TrumpDecision::new(
                outcome,
                TrumpMetric::Chapters,
                chapters(existing.has_chapters),
                chapters(incoming.has_chapters),
                "chaptered release preferred",
            );
        }

        if let (Some(old), Some(new)) = (existing.channels, incoming.channels) {
            if old != new {
                let outcome = if new > old {
                    TrumpOutcome::ReplaceWithNew
                } else {
                    TrumpOutcome::KeepExisting
                };
                return TrumpDecision::new(
                    outcome,
                    TrumpMetric::Channels,
                    old.to_string(),
                    new.to_string(),
                    "wider channel layout preferred",
                );
            }
        }

        TrumpDecision::new(
            TrumpOutcome::KeepExisting,
            TrumpMetric::Equivalent,
            existing.label(),
            incoming.label(),
            "no meaningful difference; keeping the existing release",
        )
    }
}

/// Decides with the default policy
pub fn decide(existing: &QualityDescriptor, incoming: &QualityDescriptor) -> TrumpDecision {
    TrumpPolicy::default().decide(existing, incoming)
}

fn describe(value: Option<String>) -> String {
    value.unwrap_or_else(|| "unknown".to_string())
}

fn chapters(present: bool) -> &'static str {
    if present {
        "chaptered"
    } else {
        "no chapters"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AudioFormat;
    use crate::quality::ChannelLayout;

    fn mp3(kbps: u32) -> QualityDescriptor {
        QualityDescriptor::new(AudioFormat::Mp3)
            .with_bitrate(kbps)
            .with_sample_rate(44_100)
            .with_channels(ChannelLayout::Stereo)
            .with_duration(36_000)
    }

    fn m4b(kbps: u32) -> QualityDescriptor {
        QualityDescriptor::new(AudioFormat::M4b)
            .with_bitrate(kbps)
            .with_sample_rate(44_100)
            .with_channels(ChannelLayout::Stereo)
            .with_duration(36_000)
    }

    #[test]
    fn test_chaptered_lower_bitrate_beats_unchaptered_higher() {
        let decision = decide(&mp3(128), &m4b(64));
        assert_eq!(decision.outcome, TrumpOutcome::ReplaceWithNew);
        assert_eq!(decision.metric, TrumpMetric::ContainerTier);

        let decision = decide(&m4b(64), &mp3(128));
        assert_eq!(decision.outcome, TrumpOutcome::RejectNew);
        assert_eq!(decision.metric, TrumpMetric::ContainerTier);
    }

    #[test]
    fn test_equal_everything_keeps_existing() {
        let decision = decide(&mp3(128), &mp3(128));
        assert_eq!(decision.outcome, TrumpOutcome::KeepExisting);
        assert_eq!(decision.metric, TrumpMetric::Equivalent);
    }

    #[test]
    fn test_wildly_different_duration_keeps_both() {
        let abridged = mp3(320).with_duration(20_000);
        let decision = decide(&mp3(64), &abridged);
        assert_eq!(decision.outcome, TrumpOutcome::KeepBoth);
        assert_eq!(decision.metric, TrumpMetric::Duration);
        assert_eq!(decision.existing_value, "36000s");
        assert_eq!(decision.incoming_value, "20000s");
    }

    #[test]
    fn test_duration_never_replaces_even_with_better_tier() {
        let flac = QualityDescriptor::new(AudioFormat::Flac)
            .with_bitrate(900)
            .with_duration(10_000);
        let decision = decide(&mp3(64), &flac);
        assert_ne!(decision.outcome, TrumpOutcome::ReplaceWithNew);
    }

    #[test]
    fn test_unknown_descriptor_keeps_both() {
        let decision = decide(&mp3(128), &QualityDescriptor::unknown());
        assert_eq!(decision.outcome, TrumpOutcome::KeepBoth);
        assert_eq!(decision.metric, TrumpMetric::Inspection);
    }

    #[test]
    fn test_missing_duration_keeps_both() {
        let mut incoming = mp3(256);
        incoming.duration_secs = None;
        let decision = decide(&mp3(128), &incoming);
        assert_eq!(decision.outcome, TrumpOutcome::KeepBoth);
        assert_eq!(decision.incoming_value, "unknown");
    }

    #[test]
    fn test_bitrate_above_noise_wins() {
        let decision = decide(&mp3(64), &mp3(128));
        assert_eq!(decision.outcome, TrumpOutcome::ReplaceWithNew);
        assert_eq!(decision.metric, TrumpMetric::Bitrate);
        assert_eq!(decision.existing_value, "64kbps");
        assert_eq!(decision.incoming_value, "128kbps");

        let decision = decide(&mp3(128), &mp3(64));
        assert_eq!(decision.outcome, TrumpOutcome::KeepExisting);
        assert_eq!(decision.metric, TrumpMetric::Bitrate);
    }

    #[test]
    fn test_bitrate_within_noise_is_ignored() {
        let decision = decide(&mp3(128), &mp3(136));
        assert_eq!(decision.outcome, TrumpOutcome::KeepExisting);
        assert_eq!(decision.metric, TrumpMetric::Equivalent);
    }

    #[test]
    fn test_chapters_break_ties_among_lossless() {
        let plain = QualityDescriptor::new(AudioFormat::Flac)
            .with_bitrate(700)
            .with_duration(36_000);
        let chaptered = plain.clone().with_chapters(true);
        let decision = decide(&plain, &chaptered);
        assert_eq!(decision.outcome, TrumpOutcome::ReplaceWithNew);
        assert_eq!(decision.metric, TrumpMetric::Chapters);
    }

    #[test]
    fn test_stereo_beats_mono() {
        let mono = mp3(128).with_channels(ChannelLayout::Mono);
        let decision = decide(&mono, &mp3(128));
        assert_eq!(decision.outcome, TrumpOutcome::ReplaceWithNew);
        assert_eq!(decision.metric, TrumpMetric::Channels);
        assert_eq!(decision.existing_value, "mono");

        let decision = decide(&mp3(128), &mono);
        assert_eq!(decision.outcome, TrumpOutcome::KeepExisting);
    }

    #[test]
    fn test_custom_policy_thresholds() {
        let strict = TrumpPolicy::new(0.05, 0.20);
        let decision = strict.decide(&mp3(128), &mp3(136));
        assert_eq!(decision.outcome, TrumpOutcome::ReplaceWithNew);
    }

    #[test]
    fn test_outcome_serializes_screaming() {
        let json = serde_json::to_string(&TrumpOutcome::KeepExisting).unwrap();
        assert_eq!(json, "\"KEEP_EXISTING\"");
        assert!(TrumpOutcome::RejectNew.is_non_mutating());
        assert!(!TrumpOutcome::KeepBoth.is_non_mutating());
    }
}
