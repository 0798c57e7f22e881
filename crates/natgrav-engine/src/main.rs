//! Demo driver for the Natural Gravity session subsystem.
//!
//! Runs one host and a number of followers in a single process. Each
//! participant owns a sandbox world built from the same scenario, and the
//! participants talk over a loopback network that can reorder and
//! duplicate deliveries across senders.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load the session configuration and the scenario from `natgrav.yaml`
//! 3. Build the loopback network and one node per participant
//! 4. Start every session (the host loads its settings file, followers ask
//!    the host for the settings)
//! 5. Step all nodes at the configured pace, typing scripted commands
//! 6. Log whether every participant ended with the same fields

mod error;
mod node;
mod scenario;

use std::path::Path;
use std::time::Duration;

use natgrav_core::loopback::LoopbackNetwork;
use natgrav_core::sandbox::SandboxWorld;
use natgrav_core::store::{ConfigPersistence, FileConfigPersistence, MemoryConfigPersistence};
use natgrav_core::{GravitySession, RoleKind, SessionConfig};
use natgrav_types::ParticipantId;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::node::Node;
use crate::scenario::ScenarioConfig;

/// Config file read from the working directory.
const CONFIG_PATH: &str = "natgrav.yaml";

/// Steps between progress summaries.
const SUMMARY_EVERY: u64 = 120;

/// Participant id of the host. Followers count up from here.
const HOST_ID: u64 = 1;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("natgrav-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    let scenario = ScenarioConfig::from_file(Path::new(CONFIG_PATH))?;
    info!(
        skip_ticks = config.skip_ticks,
        skip_extra_ticks = config.skip_extra_ticks,
        warmup_ticks = config.warmup_ticks,
        dedicated = config.dedicated,
        followers = scenario.followers,
        asteroids = scenario.asteroids.len(),
        steps = scenario.steps,
        "Configuration loaded"
    );

    // 3. Build the network and the nodes.
    let net = LoopbackNetwork::new(ParticipantId::new(HOST_ID));
    let mut nodes = build_nodes(&net, &config, &scenario);
    info!(participants = nodes.len(), "Session assembled");

    // 4. Start every session and let the settings handshake finish.
    for node in &mut nodes {
        node.start();
    }
    pump_all(&net, &mut nodes, None);

    // 5. Run the step loop.
    run(&net, &mut nodes, &scenario).await?;

    // 6. Log the result.
    let converged = log_summary(&nodes);
    for node in &mut nodes {
        node.teardown();
    }
    info!(converged, "natgrav-engine shutdown complete");

    Ok(())
}

/// Load the session configuration from `natgrav.yaml`.
fn load_config() -> Result<SessionConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(SessionConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(SessionConfig::default())
    }
}

/// One host and `scenario.followers` followers, each with its own world.
fn build_nodes(net: &LoopbackNetwork, config: &SessionConfig, scenario: &ScenarioConfig) -> Vec<Node> {
    let mut nodes = Vec::new();
    for index in 0..=scenario.followers {
        let id = ParticipantId::new(HOST_ID.saturating_add(index));
        let is_host = index == 0;

        let (kind, session_config, persistence): (_, _, Box<dyn ConfigPersistence>) = if is_host {
            (
                RoleKind::Host,
                config.clone(),
                Box::new(FileConfigPersistence::new(&scenario.settings_dir)),
            )
        } else {
            (
                RoleKind::Follower,
                SessionConfig {
                    dedicated: false,
                    ..config.clone()
                },
                Box::new(MemoryConfigPersistence::new()),
            )
        };

        // The player sits at the host unless the host is dedicated, in
        // which case the first follower plays.
        let plays = if config.dedicated { index == 1 } else { is_host };
        let mut world = SandboxWorld::with_template(config.anchor_name.clone());
        scenario.populate(&mut world, plays);

        let session = GravitySession::with_seed(kind, session_config, scenario.seed.wrapping_add(index));
        nodes.push(Node::new(session, world, net.join(id), persistence));
    }
    nodes
}

/// Step every node `scenario.steps` times, paced by a tokio interval.
async fn run(net: &LoopbackNetwork, nodes: &mut [Node], scenario: &ScenarioConfig) -> Result<(), EngineError> {
    let mut ticker = tokio::time::interval(Duration::from_millis(scenario.step_interval_ms.max(1)));
    let mut scrambler = (scenario.duplicate_probability > 0.0).then(|| Scrambler {
        rng: SmallRng::seed_from_u64(scenario.seed),
        duplicate_probability: scenario.duplicate_probability,
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    for step in 0..scenario.steps {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut shutdown => {
                result?;
                warn!(step, "Shutdown requested");
                return Ok(());
            }
        }

        for command in scenario.commands.iter().filter(|command| command.step == step) {
            let Some(node) = nodes.get_mut(command.participant) else {
                warn!(participant = command.participant, "Scripted command for unknown participant");
                continue;
            };
            if node.command(command.admin, &command.text).is_none() {
                debug!(text = %command.text, "Scripted line is not a command");
            }
        }

        for node in nodes.iter_mut() {
            let report = node.step();
            if !report.created.is_empty() || !report.anomalies.is_empty() || report.failures > 0 {
                debug!(
                    participant = %node.id(),
                    created = report.created.len(),
                    anomalies = report.anomalies.len(),
                    failures = report.failures,
                    "Step finished"
                );
            }
        }
        pump_all(net, nodes, scrambler.as_mut());

        if step.checked_rem(SUMMARY_EVERY) == Some(0) {
            for node in nodes.iter() {
                info!(
                    step,
                    participant = %node.id(),
                    role = %node.session().role(),
                    fields = node.session().registry().len(),
                    queued = node.session().scan_queue_len(),
                    "Progress"
                );
            }
        }
    }
    Ok(())
}

/// Adversarial delivery: senders interleaved at random, some messages
/// delivered twice.
struct Scrambler {
    rng: SmallRng,
    duplicate_probability: f64,
}

/// Deliver messages until the network is quiet. With a scrambler, every
/// round is scrambled first.
fn pump_all(net: &LoopbackNetwork, nodes: &mut [Node], mut scrambler: Option<&mut Scrambler>) {
    const MAX_ROUNDS: usize = 64;

    for _ in 0..MAX_ROUNDS {
        if net.pending() == 0 {
            return;
        }
        if let Some(scrambler) = scrambler.as_deref_mut() {
            net.scramble(&mut scrambler.rng, scrambler.duplicate_probability);
        }
        for node in nodes.iter_mut() {
            node.pump();
        }
    }
    warn!(pending = net.pending(), "Network did not settle");
}

/// Log each participant's fields. Returns whether all participants agree.
fn log_summary(nodes: &[Node]) -> bool {
    let reference = nodes.first().map(Node::fields).unwrap_or_default();
    let mut converged = true;
    for node in nodes {
        let fields = node.fields();
        for (id, params) in &fields {
            info!(
                participant = %node.id(),
                field_id = %id,
                radius = params.radius,
                strength = params.strength,
                x = params.center.x,
                y = params.center.y,
                z = params.center.z,
                "Final field"
            );
        }
        if fields != reference {
            warn!(participant = %node.id(), "Participant disagrees with the host");
            converged = false;
        }
    }
    converged
}
