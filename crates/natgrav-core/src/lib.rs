//! Gravity fields, tick scheduling, settings and session replication for
//! Natural Gravity.
//!
//! One [`GravitySession`] per participant owns every piece of gravity state.
//! The host world drives it once per simulation step and once per received
//! payload, and it reaches the world, the network and the settings file
//! only through collaborator traits.
//!
//! # Modules
//!
//! - [`config`] -- Per-process [`SessionConfig`] loaded from YAML.
//! - [`error`] -- Validation errors, collaborator failures and anomalies.
//! - [`settings`] -- The replicated [`GlobalSettings`] schema and its text form.
//! - [`store`] -- Authoritative settings store and file persistence.
//! - [`field`] -- A single [`GravityField`].
//! - [`registry`] -- The id-keyed [`FieldRegistry`] and dedup sweep.
//! - [`spatial`] -- Membership, asteroid scan and parameter derivation.
//! - [`force`] -- The per-step pull on members and the observer.
//! - [`scheduler`] -- Warm-up and the two refresh cadences.
//! - [`world`] -- [`World`] and [`Presenter`] collaborator traits.
//! - [`replication`] -- [`Transport`] and the host/follower roles.
//! - [`session`] -- [`GravitySession`], the entry points.
//! - [`commands`] -- The `/ng` chat commands.
//! - [`sandbox`] -- An in-memory [`World`] for tests and the demo engine.
//! - [`loopback`] -- An in-process session network.
//!
//! [`SessionConfig`]: config::SessionConfig
//! [`GlobalSettings`]: settings::GlobalSettings
//! [`GravityField`]: field::GravityField
//! [`FieldRegistry`]: registry::FieldRegistry
//! [`World`]: world::World
//! [`Presenter`]: world::Presenter
//! [`Transport`]: replication::Transport
//! [`GravitySession`]: session::GravitySession

pub mod commands;
pub mod config;
pub mod error;
pub mod field;
pub mod force;
pub mod loopback;
pub mod registry;
pub mod replication;
pub mod sandbox;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod spatial;
pub mod store;
pub mod world;

pub use commands::{Command, CommandError, Identity, run_command};
pub use config::{ConfigError, SessionConfig};
pub use error::{Anomaly, CollaboratorFailure, ValidationError};
pub use replication::{RoleKind, Transport};
pub use session::{GravitySession, MessageOutcome, SessionIo, StepReport};
pub use settings::{GlobalSettings, SettingKey};
