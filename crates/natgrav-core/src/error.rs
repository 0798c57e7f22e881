//! Error and anomaly types shared across the session core.
//!
//! Three outcomes are kept apart on purpose:
//!
//! - [`ValidationError`] -- the caller asked for something invalid. Nothing
//!   changed and the caller gets the message back synchronously.
//! - [`CollaboratorFailure`] -- the host world or the persistence layer
//!   could not do its part. The current operation is aborted and logged and
//!   no partial state is left behind.
//! - [`Anomaly`] -- a logical inconsistency that was corrected in place
//!   (duplicate create, remove of an unknown id). Not an error at all; it is
//!   reported and logged at `warn`.

use natgrav_types::{AsteroidId, FieldId};

use crate::store::StoreError;

/// A rejected request. The previous state is retained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The setting name is not part of the schema.
    #[error("The '{key}' setting does not exist.")]
    UnknownSetting {
        /// The name that was looked up.
        key: String,
    },

    /// The value could not be parsed for the setting's type.
    #[error("'{key}' has an invalid value: '{value}'.")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// The raw value that failed to parse.
        value: String,
    },

    /// A settings line did not have the `key<sep>value` shape.
    #[error("Invalid setting: '{line}'")]
    MalformedLine {
        /// The offending line.
        line: String,
    },

    /// A command argument could not be parsed.
    #[error("Invalid parameter, not {expected}: '{value}'.")]
    InvalidArgument {
        /// What kind of value was expected (`"an integer"`, `"a float"`).
        expected: &'static str,
        /// The raw argument.
        value: String,
    },

    /// A command was used with the wrong shape.
    #[error("Invalid format, use: {usage}")]
    Usage {
        /// The correct usage line.
        usage: &'static str,
    },

    /// The command verb is not known.
    #[error("Unknown parameter: {command}")]
    UnknownCommand {
        /// The unrecognised command text.
        command: String,
    },

    /// The invoking participant is not elevated.
    #[error("Only admins can use this command.")]
    NotAdmin,

    /// The command needs a controlled observer, which a dedicated host lacks.
    #[error("Can't {action} as the dedicated server!")]
    DedicatedHost {
        /// What was attempted.
        action: &'static str,
    },

    /// The observer is not inside any asteroid's bounds.
    #[error("You're not within an asteroid's boundary box.")]
    NotInAsteroid,

    /// The asteroid already owns a field.
    #[error("The asteroid you're near ('{asteroid}') already has natural gravity.")]
    AsteroidHasField {
        /// Storage name of the asteroid.
        asteroid: String,
    },

    /// The asteroid does not own a field.
    #[error("The asteroid you're near ('{asteroid}') does not have natural gravity.")]
    AsteroidLacksField {
        /// Storage name of the asteroid.
        asteroid: String,
    },

    /// No field with this id is registered.
    #[error("no gravity field with id {id}")]
    UnknownField {
        /// The id that was looked up.
        id: FieldId,
    },
}

/// A failure of an external collaborator. Aborts the current operation.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorFailure {
    /// The anchor template the world spawns fields from is missing.
    #[error("can't find anchor template: {name}")]
    AnchorTemplateMissing {
        /// Template name that was looked up.
        name: String,
    },

    /// The world accepted the spawn request but produced no object.
    #[error("anchor spawn for field {id} produced no object")]
    AnchorSpawnFailed {
        /// The requested field id.
        id: FieldId,
    },

    /// The asteroid disappeared or its voxel storage could not be read.
    #[error("unable to read voxel content of asteroid {asteroid}: {reason}")]
    ContentRead {
        /// The asteroid being sampled.
        asteroid: AsteroidId,
        /// Description of the failure.
        reason: String,
    },

    /// Reading or writing the settings file failed.
    #[error("config persistence failed: {source}")]
    Persistence {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

/// A logical inconsistency that was corrected automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// A create arrived for an id that already existed; the old field was
    /// replaced by the new parameters.
    DuplicateCreateReplaced {
        /// The replaced field.
        id: FieldId,
    },

    /// A remove arrived for an id that does not exist; nothing changed.
    UnknownFieldRemoved {
        /// The id named by the remove.
        id: FieldId,
    },

    /// Two fields shared an exact center; the higher id was dropped.
    DuplicateCenterRemoved {
        /// The field that was dropped.
        removed: FieldId,
        /// The surviving field at the same center.
        kept: FieldId,
    },

    /// The backing anchor of a field was destroyed by the host world.
    AnchorLost {
        /// The field that was dropped from the registry.
        id: FieldId,
    },
}

impl core::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateCreateReplaced { id } => {
                write!(f, "field {id} already existed, removed and re-added")
            }
            Self::UnknownFieldRemoved { id } => write!(f, "remove for unknown field {id}"),
            Self::DuplicateCenterRemoved { removed, kept } => {
                write!(f, "field {removed} duplicates the center of field {kept}")
            }
            Self::AnchorLost { id } => write!(f, "anchor of field {id} no longer exists"),
        }
    }
}
