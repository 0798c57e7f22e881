//! Text codec for network messages.
//!
//! Sync payloads are `;`-separated ASCII tokens whose first token is the
//! message type. Numbers are written with Rust's shortest round-trip
//! formatting, so `decode(encode(m)) == m` holds bit-for-bit for finite
//! coordinates.

use std::str::FromStr;

use natgrav_types::{DVec3, FieldId, FieldParams, ParticipantId};
use thiserror::Error;

use crate::channel::Channel;
use crate::messages::{ConfigAction, CreateField, RemoveField, SyncMessage, WireMessage};

/// Token separator inside sync payloads.
const SEPARATOR: char = ';';

/// Token count of `0;id;x;y;z;radius;strength`.
const CREATE_ARITY: usize = 7;

/// Token count of `1;id`.
const REMOVE_ARITY: usize = 2;

/// Byte count of a config action payload.
const CONFIG_ACTION_LEN: usize = 1;

/// Errors that can occur while decoding a payload.
///
/// Every variant is structural: the offending message is dropped and the
/// channel keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The payload contained no bytes.
    #[error("empty payload")]
    Empty,

    /// The payload contained non-ASCII bytes.
    #[error("payload is not ASCII text")]
    NotAscii,

    /// The first token is not an integer.
    #[error("invalid message type: '{0}'")]
    InvalidType(String),

    /// The first token is an integer with no known message.
    #[error("unknown message type: {0}")]
    UnknownType(i64),

    /// Wrong number of tokens for the message type, or of bytes for a
    /// config action.
    #[error("invalid number of arguments for {kind}: got {actual}, need exactly {expected}")]
    Arity {
        /// Message kind being decoded.
        kind: &'static str,
        /// Required token count.
        expected: usize,
        /// Token count received.
        actual: usize,
    },

    /// A numeric token failed to parse or was not finite.
    #[error("invalid {field} value: '{value}'")]
    InvalidNumber {
        /// Which field the token was for.
        field: &'static str,
        /// The raw token.
        value: String,
    },

    /// The config action byte has no known verb.
    #[error("unknown config action: {0}")]
    UnknownConfigAction(u8),

    /// The raw channel id is not one of ours.
    #[error("unknown channel id: {0}")]
    UnknownChannel(u16),
}

/// Encode a message to its payload bytes.
///
/// The channel to send on is [`WireMessage::channel`].
pub fn encode(message: &WireMessage) -> Vec<u8> {
    match message {
        WireMessage::Sync(sync) => encode_sync(sync).into_bytes(),
        WireMessage::Settings(text) => to_ascii_bytes(text),
        WireMessage::AskSettings(sender) => sender.to_string().into_bytes(),
        WireMessage::ConfigAction(action) => vec![action.code()],
    }
}

/// Decode a payload received on a known channel.
pub fn decode(channel: Channel, payload: &[u8]) -> Result<WireMessage, CodecError> {
    match channel {
        Channel::Sync => decode_sync(ascii_text(payload)?).map(WireMessage::Sync),
        Channel::Settings => Ok(WireMessage::Settings(ascii_text(payload)?.to_owned())),
        Channel::AskSettings => decode_ask_settings(ascii_text(payload)?),
        Channel::Config => decode_config_action(payload),
    }
}

/// Decode a payload received on a raw numeric channel id.
pub fn decode_raw(channel_id: u16, payload: &[u8]) -> Result<WireMessage, CodecError> {
    let channel = Channel::from_id(channel_id).ok_or(CodecError::UnknownChannel(channel_id))?;
    decode(channel, payload)
}

/// Encode a sync message as its `;`-separated text form.
pub fn encode_sync(message: &SyncMessage) -> String {
    match message {
        SyncMessage::Create(create) => {
            let c = create.params.center;
            format!(
                "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
                message.type_code(),
                create.id,
                c.x,
                c.y,
                c.z,
                create.params.radius,
                create.params.strength,
            )
        }
        SyncMessage::Remove(remove) => {
            format!("{}{SEPARATOR}{}", message.type_code(), remove.id)
        }
    }
}

/// Decode the `;`-separated text form of a sync message.
pub fn decode_sync(text: &str) -> Result<SyncMessage, CodecError> {
    let tokens: Vec<&str> = text.split(SEPARATOR).map(str::trim).collect();
    let type_token = tokens.first().copied().unwrap_or_default();
    if type_token.is_empty() && tokens.len() <= 1 {
        return Err(CodecError::Empty);
    }
    let type_code: i64 = type_token
        .parse()
        .map_err(|_err| CodecError::InvalidType(type_token.to_owned()))?;

    match type_code {
        0 => decode_create(&tokens).map(SyncMessage::Create),
        1 => decode_remove(&tokens).map(SyncMessage::Remove),
        other => Err(CodecError::UnknownType(other)),
    }
}

fn decode_create(tokens: &[&str]) -> Result<CreateField, CodecError> {
    let [_, id, x, y, z, radius, strength] = tokens else {
        return Err(CodecError::Arity {
            kind: "create",
            expected: CREATE_ARITY,
            actual: tokens.len(),
        });
    };

    let id = FieldId::new(parse_number::<u64>("id", id)?);
    let center = DVec3::new(
        parse_float::<f64>("x", x)?,
        parse_float::<f64>("y", y)?,
        parse_float::<f64>("z", z)?,
    );
    let radius = parse_number::<i32>("radius", radius)?;
    let strength = parse_float::<f32>("strength", strength)?;

    Ok(CreateField {
        id,
        params: FieldParams {
            center,
            radius,
            strength,
        },
    })
}

fn decode_remove(tokens: &[&str]) -> Result<RemoveField, CodecError> {
    let [_, id] = tokens else {
        return Err(CodecError::Arity {
            kind: "remove",
            expected: REMOVE_ARITY,
            actual: tokens.len(),
        });
    };
    Ok(RemoveField {
        id: FieldId::new(parse_number::<u64>("id", id)?),
    })
}

fn decode_ask_settings(text: &str) -> Result<WireMessage, CodecError> {
    let sender = parse_number::<u64>("sender", text.trim())?;
    Ok(WireMessage::AskSettings(ParticipantId::new(sender)))
}

fn decode_config_action(payload: &[u8]) -> Result<WireMessage, CodecError> {
    let [code] = *payload else {
        return Err(if payload.is_empty() {
            CodecError::Empty
        } else {
            CodecError::Arity {
                kind: "config action",
                expected: CONFIG_ACTION_LEN,
                actual: payload.len(),
            }
        });
    };
    ConfigAction::from_code(code)
        .map(WireMessage::ConfigAction)
        .ok_or(CodecError::UnknownConfigAction(code))
}

fn parse_number<T: FromStr>(field: &'static str, token: &str) -> Result<T, CodecError> {
    token.parse().map_err(|_err| CodecError::InvalidNumber {
        field,
        value: token.to_owned(),
    })
}

/// Floats additionally reject NaN and infinities, which `FromStr` accepts.
fn parse_float<T>(field: &'static str, token: &str) -> Result<T, CodecError>
where
    T: FromStr + Into<f64> + Copy,
{
    let value: T = parse_number(field, token)?;
    if value.into().is_finite() {
        Ok(value)
    } else {
        Err(CodecError::InvalidNumber {
            field,
            value: token.to_owned(),
        })
    }
}

fn ascii_text(payload: &[u8]) -> Result<&str, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }
    if !payload.is_ascii() {
        return Err(CodecError::NotAscii);
    }
    std::str::from_utf8(payload).map_err(|_err| CodecError::NotAscii)
}

/// Non-ASCII characters are replaced by `?`, matching the legacy encoder.
fn to_ascii_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(b'?'))
        .collect()
}
