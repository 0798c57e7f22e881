//! Network message types.
//!
//! All messages exchanged between session participants.

use natgrav_types::{FieldId, FieldParams, ParticipantId};

use crate::channel::Channel;

/// Any message that can travel between participants.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Field create/remove.
    Sync(SyncMessage),
    /// Full settings text (comment-free form).
    Settings(String),
    /// A participant asks the host for the current settings.
    AskSettings(ParticipantId),
    /// A follower asks the host to run a config verb.
    ConfigAction(ConfigAction),
}

impl WireMessage {
    /// The channel this message travels on.
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Sync(_) => Channel::Sync,
            Self::Settings(_) => Channel::Settings,
            Self::AskSettings(_) => Channel::AskSettings,
            Self::ConfigAction(_) => Channel::Config,
        }
    }
}

/// Field replication messages on the sync channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncMessage {
    /// Create, or replace if the id already exists.
    Create(CreateField),
    /// Remove the field with this id.
    Remove(RemoveField),
}

impl SyncMessage {
    /// Numeric discriminant written as the first token.
    pub const fn type_code(&self) -> u8 {
        match self {
            Self::Create(_) => 0,
            Self::Remove(_) => 1,
        }
    }

    /// The field this message is about.
    pub const fn field_id(&self) -> FieldId {
        match self {
            Self::Create(create) => create.id,
            Self::Remove(remove) => remove.id,
        }
    }
}

/// Create or replace a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateField {
    /// Host-assigned field id.
    pub id: FieldId,
    /// Center, radius and strength.
    pub params: FieldParams,
}

/// Remove a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveField {
    /// Id of the field to remove.
    pub id: FieldId,
}

/// Config verbs a follower can ask the host to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigAction {
    /// Write the settings file.
    Save,
    /// Re-read the settings file.
    Load,
    /// Restore defaults (not saved).
    Reset,
}

impl ConfigAction {
    /// The one-byte wire code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Save => 0,
            Self::Load => 1,
            Self::Reset => 2,
        }
    }

    /// Look up an action by wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Save),
            1 => Some(Self::Load),
            2 => Some(Self::Reset),
            _ => None,
        }
    }
}

impl core::fmt::Display for ConfigAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Save => "save",
            Self::Load => "load",
            Self::Reset => "reset",
        };
        f.write_str(name)
    }
}
