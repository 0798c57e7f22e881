//! Network protocol for Natural Gravity session replication.
//!
//! Every message is a single opaque byte buffer sent on a numbered channel.
//! Payloads are ASCII text so that they stay byte-compatible with the
//! established `;`-separated format:
//!
//! | Channel | Payload | Meaning |
//! |---------|---------|---------|
//! | [`Channel::Sync`] | `0;id;x;y;z;radius;strength` | create/replace field `id` |
//! | [`Channel::Sync`] | `1;id` | remove field `id` |
//! | [`Channel::Settings`] | full settings text | replace the settings cache |
//! | [`Channel::AskSettings`] | sender id | request the settings from the host |
//! | [`Channel::Config`] | one byte: 0 save, 1 load, 2 reset | run a config verb on the host |
//!
//! # Modules
//!
//! - [`channel`] -- Channel numbering.
//! - [`messages`] -- Typed message enums.
//! - [`codec`] -- One encode/decode pair per message kind, exhaustive over
//!   the discriminant.

pub mod channel;
pub mod codec;
pub mod messages;

pub use channel::Channel;
pub use codec::{CodecError, decode, decode_raw, encode};
pub use messages::{ConfigAction, CreateField, RemoveField, SyncMessage, WireMessage};
