//! Shared type definitions for the Natural Gravity session subsystem.
//!
//! This crate is the single source of truth for the identifiers, geometry
//! and field parameters exchanged between the protocol codec, the session
//! core and the engine binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe `u64` wrappers for fields, bodies, asteroids and
//!   session participants
//! - [`geometry`] -- Axis-aligned boxes and re-exported vector types
//! - [`field`] -- [`FieldParams`] and the absolute radius/strength bounds
//! - [`constants`] -- Physical and scheduling constants

pub mod constants;
pub mod field;
pub mod geometry;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use field::{FieldParams, clamp_radius, clamp_strength};
pub use geometry::{Aabb, DVec3, IVec3};
pub use ids::{AsteroidId, BodyId, FieldId, ParticipantId};
