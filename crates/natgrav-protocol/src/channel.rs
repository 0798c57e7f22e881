//! Channel numbering.
//!
//! Channel ids are fixed so that participants running different builds
//! still find each other's handlers.

/// Base channel id for field synchronisation.
const SYNC_CHANNEL_ID: u16 = 12316;

/// A numbered message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Field create/remove messages.
    Sync,
    /// One-byte config verb sent from a follower to the host.
    Config,
    /// Settings request carrying the sender's participant id.
    AskSettings,
    /// Full settings text.
    Settings,
}

impl Channel {
    /// Every channel, in id order.
    pub const ALL: [Self; 4] = [Self::Sync, Self::Config, Self::AskSettings, Self::Settings];

    /// The numeric id of this channel.
    pub const fn id(self) -> u16 {
        match self {
            Self::Sync => SYNC_CHANNEL_ID,
            Self::Config => SYNC_CHANNEL_ID.saturating_add(1),
            Self::AskSettings => SYNC_CHANNEL_ID.saturating_add(2),
            Self::Settings => SYNC_CHANNEL_ID.saturating_add(3),
        }
    }

    /// Look up a channel by its numeric id.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.id() == id)
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Sync => "sync",
            Self::Config => "config",
            Self::AskSettings => "ask-settings",
            Self::Settings => "settings",
        };
        write!(f, "{name}({})", self.id())
    }
}
