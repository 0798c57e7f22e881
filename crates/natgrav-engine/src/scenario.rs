//! The demo scenario: what the sandbox worlds contain and what the players
//! type, read from the `scenario` section of `natgrav.yaml`.

use std::path::Path;

use natgrav_core::sandbox::{SandboxWorld, VoxelShape};
use natgrav_core::world::ObserverSnapshot;
use natgrav_types::{DVec3, IVec3};
use serde::Deserialize;

use crate::error::EngineError;

/// Everything the demo run needs besides the session configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Simulation steps to run.
    #[serde(default = "default_steps")]
    pub steps: u64,

    /// Wall-clock pacing between steps.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    /// Number of follower participants next to the host.
    #[serde(default = "default_followers")]
    pub followers: u64,

    /// Seed for field ids and for delivery scrambling.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Chance that a message is delivered twice. Zero keeps delivery in
    /// send order.
    #[serde(default)]
    pub duplicate_probability: f64,

    /// Directory holding the host's settings file.
    #[serde(default = "default_settings_dir")]
    pub settings_dir: String,

    /// Where the local player stands, if anywhere.
    #[serde(default)]
    pub observer: Option<DVec3>,

    /// Asteroids placed in every world.
    #[serde(default)]
    pub asteroids: Vec<AsteroidSpec>,

    /// Loose bodies placed in every world.
    #[serde(default)]
    pub bodies: Vec<BodySpec>,

    /// Chat commands typed during the run.
    #[serde(default)]
    pub commands: Vec<ScriptedCommand>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_interval_ms: default_step_interval_ms(),
            followers: default_followers(),
            seed: default_seed(),
            duplicate_probability: 0.0,
            settings_dir: default_settings_dir(),
            observer: None,
            asteroids: Vec::new(),
            bodies: Vec::new(),
            commands: Vec::new(),
        }
    }
}

/// One asteroid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AsteroidSpec {
    /// Storage name, matched against `asteroid_prefix`.
    pub name: String,
    /// World position of the minimum corner.
    pub corner: DVec3,
    /// Storage size in voxels.
    pub size: IVec3,
    /// Which voxels hold content.
    #[serde(default)]
    pub shape: ShapeSpec,
}

/// YAML form of [`VoxelShape`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeSpec {
    /// Every voxel.
    #[default]
    Solid,
    /// An axis-aligned block of voxels.
    Block {
        /// Inclusive lower voxel.
        min: IVec3,
        /// Exclusive upper voxel.
        max: IVec3,
    },
    /// A ball of voxels.
    Ball {
        /// Center in voxel units.
        center: DVec3,
        /// Radius in voxels.
        radius: f64,
    },
    /// Nothing at all.
    Empty,
}

impl From<ShapeSpec> for VoxelShape {
    fn from(spec: ShapeSpec) -> Self {
        match spec {
            ShapeSpec::Solid => Self::Solid,
            ShapeSpec::Block { min, max } => Self::Block { min, max },
            ShapeSpec::Ball { center, radius } => Self::Ball { center, radius },
            ShapeSpec::Empty => Self::Empty,
        }
    }
}

/// One dynamic body.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BodySpec {
    /// Starting position.
    pub position: DVec3,
    /// Mass in kilograms.
    pub mass: f64,
}

/// A chat line typed at a given step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptedCommand {
    /// Step at which the line is typed.
    pub step: u64,
    /// Index of the typing participant. 0 is the host.
    #[serde(default)]
    pub participant: usize,
    /// Whether the host world lists the typist as an administrator.
    #[serde(default)]
    pub admin: bool,
    /// The chat line.
    pub text: String,
}

impl ScenarioConfig {
    /// Read the `scenario` section of a YAML file. A missing file or a
    /// missing section gives the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scenario`] if the file cannot be read or the
    /// section does not parse.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Scenario {
            message: format!("failed to read config file: {e}"),
        })?;
        Self::parse(&contents)
    }

    /// Parse the `scenario` section of a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scenario`] if the document or the section is
    /// malformed.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| EngineError::Scenario {
            message: format!("failed to parse config YAML: {e}"),
        })?;

        raw.get("scenario").map_or_else(
            || Ok(Self::default()),
            |section| {
                serde_yml::from_value(section.clone()).map_err(|e| EngineError::Scenario {
                    message: format!("failed to parse scenario section: {e}"),
                })
            },
        )
    }

    /// Fill a fresh world with the scenario's asteroids and bodies.
    pub fn populate(&self, world: &mut SandboxWorld, with_observer: bool) {
        for asteroid in &self.asteroids {
            world.add_asteroid(&asteroid.name, asteroid.corner, asteroid.size, asteroid.shape.into());
        }
        for body in &self.bodies {
            world.add_body(body.position, body.mass);
        }
        if with_observer {
            world.set_observer(self.observer.map(|position| ObserverSnapshot {
                position,
                is_character: true,
                jetpack_enabled: true,
                dampeners_enabled: false,
            }));
        }
    }
}

const fn default_steps() -> u64 {
    600
}

const fn default_step_interval_ms() -> u64 {
    16
}

const fn default_followers() -> u64 {
    1
}

const fn default_seed() -> u64 {
    7
}

fn default_settings_dir() -> String {
    String::from(".")
}
