//! The `/ng` chat command surface.
//!
//! Commands are case-insensitive. Everything except `/ng`, `/ng settings`
//! needs an elevated caller: the host itself, or a participant the host
//! world lists as an administrator. Every reply, success or failure, is
//! also shown through the [`Presenter`](crate::world::Presenter).

use natgrav_protocol::ConfigAction;
use natgrav_types::constants::{RADIUS_MAX, RADIUS_MIN, STRENGTH_MAX, STRENGTH_MIN};
use natgrav_types::{DVec3, FieldId, ParticipantId};
use tracing::{debug, info_span};

use crate::error::{CollaboratorFailure, ValidationError};
use crate::field::GravityField;
use crate::session::{GravitySession, SessionIo};
use crate::spatial::{asteroid_containing, derive_field_params, derive_radius, derive_strength, size_metric};
use crate::world::AsteroidSnapshot;

/// Command prefix.
pub const COMMAND_PREFIX: &str = "/ng";

/// Sender name on command replies.
pub const REPLY_SENDER: &str = "[NG]";

const SET_USAGE: &str = "/ng set <setting> <value>";

/// Who typed the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// The invoking participant.
    pub participant: ParticipantId,
    /// Listed as an administrator by the host world.
    pub is_admin: bool,
}

/// A parsed `/ng` command. Arguments are kept raw and validated when the
/// command runs, after the privilege checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/ng` alone.
    Help,
    /// `/ng settings`.
    Settings,
    /// `/ng info`.
    Info,
    /// `/ng set [<setting> <value>]`. Empty arguments list the settings.
    Set {
        /// Everything after `set`.
        args: String,
    },
    /// `/ng config save|reload|reset`.
    Config(ConfigAction),
    /// `/ng create`.
    Create,
    /// `/ng on` or `/ng off`.
    Toggle(bool),
    /// `/ng radius <int|reset>`.
    Radius(String),
    /// `/ng strength <float|reset>`.
    Strength(String),
    /// `/ng remove`.
    Remove,
    /// Anything else after the prefix.
    Unknown(String),
}

impl Command {
    /// Parse chat text. `None` when the text is not a `/ng` command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let prefix = text.get(..COMMAND_PREFIX.len())?;
        if !prefix.eq_ignore_ascii_case(COMMAND_PREFIX) {
            return None;
        }
        let rest = text.get(COMMAND_PREFIX.len()..)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }

        let rest = rest.trim().to_lowercase();
        if rest.is_empty() {
            return Some(Self::Help);
        }
        if rest == "settings" {
            return Some(Self::Settings);
        }
        if rest.starts_with("info") {
            return Some(Self::Info);
        }
        if let Some(args) = rest.strip_prefix("set") {
            return Some(Self::Set {
                args: args.trim().to_owned(),
            });
        }
        if let Some(verb) = rest.strip_prefix("config") {
            let action = match verb.trim() {
                "save" => Some(ConfigAction::Save),
                "reload" => Some(ConfigAction::Load),
                "reset" => Some(ConfigAction::Reset),
                _ => None,
            };
            return Some(action.map_or_else(|| Self::Unknown(rest), Self::Config));
        }
        if rest.starts_with("create") {
            return Some(Self::Create);
        }
        if let Some(arg) = rest.strip_prefix("radius") {
            return Some(Self::Radius(arg.trim().to_owned()));
        }
        if let Some(arg) = rest.strip_prefix("strength") {
            return Some(Self::Strength(arg.trim().to_owned()));
        }
        if rest == "on" || rest == "off" {
            return Some(Self::Toggle(rest == "on"));
        }
        if rest.starts_with("remove") {
            return Some(Self::Remove);
        }
        Some(Self::Unknown(rest))
    }
}

/// A command that could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The request was invalid; nothing changed.
    #[error("{source}")]
    Rejected {
        /// Why it was rejected.
        #[from]
        source: ValidationError,
    },

    /// The world or the persistence layer failed.
    #[error("Failed: {source}")]
    Failed {
        /// The underlying failure.
        #[from]
        source: CollaboratorFailure,
    },
}

/// The help text. Admin commands are listed only for elevated callers.
pub fn help_text(elevated: bool) -> String {
    let mut lines = Vec::new();
    if elevated {
        lines.push("/ng create".to_owned());
        lines.push("/ng <on/off>".to_owned());
        lines.push(format!("/ng radius <{RADIUS_MIN}-{RADIUS_MAX}/reset>"));
        lines.push(format!("/ng strength <{STRENGTH_MIN:.2}-{STRENGTH_MAX:.2}/reset>"));
        lines.push("/ng remove".to_owned());
        lines.push("/ng info".to_owned());
        lines.push("/ng config save".to_owned());
        lines.push("/ng config reload".to_owned());
        lines.push("/ng config reset".to_owned());
        lines.push(SET_USAGE.to_owned());
    }
    lines.push("/ng settings - shows mod settings".to_owned());
    lines.join("\n")
}

/// Parse and run chat text.
///
/// Returns `None` when the text is not a `/ng` command. Otherwise the reply
/// text or the error is returned and also shown to the local player.
pub fn run_command(
    session: &mut GravitySession,
    io: &mut SessionIo<'_>,
    identity: Identity,
    text: &str,
) -> Option<Result<String, CommandError>> {
    let command = Command::parse(text)?;
    let _span = info_span!("command", participant = %identity.participant).entered();
    debug!(?command, "Running command");

    let result = execute(session, io, identity, command);
    let reply = result
        .as_ref()
        .map_or_else(ToString::to_string, Clone::clone);
    io.presenter.message(REPLY_SENDER, &reply);
    Some(result)
}

/// Run an already parsed command.
pub fn execute(
    session: &mut GravitySession,
    io: &mut SessionIo<'_>,
    identity: Identity,
    command: Command,
) -> Result<String, CommandError> {
    let elevated = session.is_authoritative() || identity.is_admin;
    let require_elevated = || {
        if elevated {
            Ok(())
        } else {
            Err(ValidationError::NotAdmin)
        }
    };

    match command {
        Command::Help => Ok(help_text(elevated)),
        Command::Settings => Ok(session.store().wire_text()),
        Command::Info => {
            require_elevated()?;
            Ok(info_text(session, io))
        }
        Command::Set { args } => {
            require_elevated()?;
            if args.is_empty() {
                return Ok(session.store().wire_text());
            }
            let (name, value) = args
                .split_once(' ')
                .ok_or(ValidationError::Usage { usage: SET_USAGE })?;
            let (key, value) = session.set_setting(io, name, value)?;
            Ok(format!("Set '{key}' to '{value}'"))
        }
        Command::Config(action) => {
            require_elevated()?;
            session.config_action(io, action)?;
            Ok(match action {
                ConfigAction::Save => "Config saved.",
                ConfigAction::Load => "Config reloaded.",
                ConfigAction::Reset => "Config reset to defaults (but not saved).",
            }
            .to_owned())
        }
        Command::Create => {
            if session.config().dedicated {
                return Err(ValidationError::DedicatedHost {
                    action: "create asteroids",
                }
                .into());
            }
            require_elevated()?;
            let asteroid = enclosing_asteroid(io)?;
            if session.field_for_asteroid(&asteroid).is_some() {
                return Err(ValidationError::AsteroidHasField {
                    asteroid: asteroid.storage_name,
                }
                .into());
            }
            let params = derive_field_params(io.world, &asteroid, session.settings())?;
            let id = session.create_field(io, params)?;
            let stored = session
                .registry()
                .get(id)
                .map_or(params, |field| field.params());
            Ok(format!(
                "Added natural gravity to the '{}' asteroid, radius={}, strength={}, at:{}.",
                asteroid.storage_name,
                stored.radius,
                stored.strength,
                format_point(stored.center)
            ))
        }
        Command::Toggle(on) => {
            let (_, id) = edit_target(session, io, elevated)?;
            session.set_field_enabled(io, id, on)?;
            Ok(format!("Asteroid's gravity turned {}.", if on { "ON" } else { "OFF" }))
        }
        Command::Radius(arg) => {
            let (asteroid, id) = edit_target(session, io, elevated)?;
            if arg == "reset" {
                let radius = derive_radius(asteroid.size, session.settings());
                let radius = session.set_field_radius(io, id, i64::from(radius))?;
                return Ok(format!("Reset the range to the calculated value: {radius}."));
            }
            let radius: i64 = arg.parse().map_err(|_err| ValidationError::InvalidArgument {
                expected: "an integer",
                value: arg.clone(),
            })?;
            let radius = session.set_field_radius(io, id, radius)?;
            Ok(format!("Radius set to: '{radius}'."))
        }
        Command::Strength(arg) => {
            let (asteroid, id) = edit_target(session, io, elevated)?;
            if arg == "reset" {
                let strength = derive_strength(asteroid.size, session.settings());
                let strength = session.set_field_strength(io, id, strength)?;
                return Ok(format!("Reset the strength to the calculated value: {strength}."));
            }
            let strength = arg
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| ValidationError::InvalidArgument {
                    expected: "a float",
                    value: arg.clone(),
                })?;
            let strength = session.set_field_strength(io, id, strength)?;
            Ok(format!("Strength set to: '{strength}'."))
        }
        Command::Remove => {
            let (asteroid, id) = edit_target(session, io, elevated)?;
            session.remove_field(io, id)?;
            Ok(format!("Removed natural gravity from '{}'.", asteroid.storage_name))
        }
        Command::Unknown(rest) => Err(ValidationError::UnknownCommand { command: rest }.into()),
    }
}

/// The asteroid around the observer and its field, for the edit commands.
fn edit_target(
    session: &GravitySession,
    io: &SessionIo<'_>,
    elevated: bool,
) -> Result<(AsteroidSnapshot, FieldId), ValidationError> {
    if session.config().dedicated {
        return Err(ValidationError::DedicatedHost {
            action: "edit asteroids",
        });
    }
    if !elevated {
        return Err(ValidationError::NotAdmin);
    }
    let asteroid = enclosing_asteroid(io)?;
    let id = session
        .field_for_asteroid(&asteroid)
        .map(GravityField::id)
        .ok_or_else(|| ValidationError::AsteroidLacksField {
            asteroid: asteroid.storage_name.clone(),
        })?;
    Ok((asteroid, id))
}

fn info_text(session: &GravitySession, io: &SessionIo<'_>) -> String {
    let mut lines = vec![format!("Gravity points: {}.", session.registry().len())];
    if session.config().dedicated {
        lines.push("Can't see extra info as the dedicated server!".to_owned());
        return lines.join("\n");
    }

    let Ok(asteroid) = enclosing_asteroid(io) else {
        lines.push(ValidationError::NotInAsteroid.to_string());
        return lines.join("\n");
    };
    lines.push(format!(
        "Name: {}; Boundary size: {}",
        asteroid.storage_name,
        size_metric(asteroid.size)
    ));
    lines.push(session.field_for_asteroid(&asteroid).map_or_else(
        || "The asteroid doesn't have natural gravity.".to_owned(),
        |field| {
            format!(
                "Enabled: {}; Radius: {}; Strength: {}; Center: {}.",
                field.is_enabled(),
                field.radius(),
                field.strength(),
                format_point(field.center())
            )
        },
    ));
    lines.join("\n")
}

/// The asteroid whose bounds contain the local observer.
fn enclosing_asteroid(io: &SessionIo<'_>) -> Result<AsteroidSnapshot, ValidationError> {
    let observer = io.world.observer().ok_or(ValidationError::NotInAsteroid)?;
    asteroid_containing(io.world.asteroids(), observer.position).ok_or(ValidationError::NotInAsteroid)
}

fn format_point(point: DVec3) -> String {
    format!("X:{} Y:{} Z:{}", point.x, point.y, point.z)
}
