//! Audio format labels, quality descriptors and the trump decision procedure

mod format;
mod quality;
pub mod trump;

pub use format::AudioFormat;
pub use quality::{ChannelLayout, ContainerTier, QualityDescriptor};
pub use trump::{decide, TrumpDecision, TrumpMetric, TrumpOutcome, TrumpPolicy};

pub mod prelude {
    pub use crate::{
        AudioFormat, ChannelLayout, ContainerTier, QualityDescriptor, TrumpDecision,
        TrumpOutcome, TrumpPolicy,
    };
}
