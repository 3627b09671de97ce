//! Per-voice-slot channel assignment.

use serde::{Deserialize, Serialize};

/// The channel a voice slot listens on.
///
/// Wire encoding (used by the performance protocol and persisted
/// configuration): 0..=15 explicit channel, 16 Omni, anything else Disabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelAssignment {
    Channel(u8),
    Omni,
    Disabled,
}

impl ChannelAssignment {
    pub const OMNI_RAW: u8 = 16;
    pub const DISABLED_RAW: u8 = 17;

    #[inline]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0..=15 => ChannelAssignment::Channel(raw),
            Self::OMNI_RAW => ChannelAssignment::Omni,
            _ => ChannelAssignment::Disabled,
        }
    }

    #[inline]
    pub fn to_raw(self) -> u8 {
        match self {
            ChannelAssignment::Channel(ch) => ch & 0x0F,
            ChannelAssignment::Omni => Self::OMNI_RAW,
            ChannelAssignment::Disabled => Self::DISABLED_RAW,
        }
    }

    /// Routing rule: an explicit match or Omni accepts the channel.
    #[inline]
    pub fn matches(self, channel: u8) -> bool {
        match self {
            ChannelAssignment::Channel(ch) => ch == channel,
            ChannelAssignment::Omni => true,
            ChannelAssignment::Disabled => false,
        }
    }
}

impl Default for ChannelAssignment {
    fn default() -> Self {
        ChannelAssignment::Disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        assert_eq!(
            ChannelAssignment::from_raw(5),
            ChannelAssignment::Channel(5)
        );
        assert_eq!(ChannelAssignment::from_raw(16), ChannelAssignment::Omni);
        assert_eq!(ChannelAssignment::from_raw(17), ChannelAssignment::Disabled);
        assert_eq!(ChannelAssignment::from_raw(255), ChannelAssignment::Disabled);

        for raw in 0..=17u8 {
            assert_eq!(ChannelAssignment::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn test_matches() {
        assert!(ChannelAssignment::Channel(3).matches(3));
        assert!(!ChannelAssignment::Channel(3).matches(4));
        assert!(ChannelAssignment::Omni.matches(0));
        assert!(ChannelAssignment::Omni.matches(15));
        assert!(!ChannelAssignment::Disabled.matches(0));
    }
}
