//! Planner configuration.
//!
//! Every value has a default, so an empty TOML document is a valid configuration.
//! Angles are in radians, distances in world units, durations in milliseconds.

use crate::error::Result;
use serde::Deserialize;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level planner configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub path: PathConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub jobs: JobConfig,
    #[serde(default)]
    pub world: WorldConfig,
    /// Directory for exploration dumps. Nothing is written when unset.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

impl PlannerConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Data-parallel worker pool settings.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads (default: 6)
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Base seed for the per-worker samplers. Seeded from entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            seed: None,
        }
    }
}

/// Discretisation of straight-line path checks.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PathConfig {
    /// Largest positional increment between two checked poses (default: 0.005)
    #[serde(default = "default_positional_step")]
    pub positional_step: f64,

    /// Largest rotational increment between two checked poses (default: 0.05)
    #[serde(default = "default_rotational_step")]
    pub rotational_step: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            positional_step: default_positional_step(),
            rotational_step: default_rotational_step(),
        }
    }
}

/// Expanding space tree parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct ExplorerConfig {
    /// Parents selected per round (default: 36)
    #[serde(default = "default_max_new_samples")]
    pub max_new_samples: usize,

    /// Minimum positional step of a local sample (default: 0.005)
    #[serde(default = "default_sample_min_positional")]
    pub sample_min_positional: f64,

    /// Maximum positional step of a local sample (default: 0.015)
    #[serde(default = "default_sample_max_positional")]
    pub sample_max_positional: f64,

    /// Minimum rotational step of a local sample (default: 0.05 pi)
    #[serde(default = "default_sample_min_rotational")]
    pub sample_min_rotational: f64,

    /// Maximum rotational step of a local sample (default: 0.3 pi)
    #[serde(default = "default_sample_max_rotational")]
    pub sample_max_rotational: f64,

    /// Positional radius of the rating search (default: 0.05)
    #[serde(default = "default_cluster_positional")]
    pub cluster_positional: f64,

    /// Rotational radius of the rating search (default: 0.4 pi)
    #[serde(default = "default_cluster_rotational")]
    pub cluster_rotational: f64,

    /// Slack added to the positional sampling window and its ceiling (default: 0.05)
    #[serde(default = "default_search_distance_offset")]
    pub search_distance_offset: f64,

    /// Composite distance below which a node matches the target (default: 0.5)
    #[serde(default = "default_match_distance")]
    pub match_distance: f64,

    /// Wall-clock budget of one exploration in milliseconds (default: 3000)
    #[serde(default = "default_max_runtime_ms")]
    pub max_runtime_ms: u64,

    /// Node-count cap of one exploration (default: 32768)
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Growth factor of the sampling windows (default: 1.1)
    #[serde(default = "default_domain_grow_factor")]
    pub domain_grow_factor: f64,

    /// Rounds between positional window growths (default: 4)
    #[serde(default = "default_increase_step")]
    pub positional_increase_step: usize,

    /// Rounds between rotational window growths (default: 4)
    #[serde(default = "default_increase_step")]
    pub rotational_increase_step: usize,

    /// Rotational window at the start of a search (default: 0.1 pi)
    #[serde(default = "default_initial_rotation_limit")]
    pub initial_rotation_limit: f64,

    /// Probability of a local sample instead of a target-biased one (default: 0.4)
    #[serde(default = "default_biased_sample_probability")]
    pub biased_sample_probability: f64,

    /// Positional reach of a target-biased step (default: 0.075)
    #[serde(default = "default_target_step")]
    pub target_step: f64,

    /// Rotational reach of a target-biased step (default: 0.3 pi)
    #[serde(default = "default_target_rotation")]
    pub target_rotation: f64,

    /// Half-angle of the target-biased sampling cone (default: 50 degrees)
    #[serde(default = "default_cone_half_angle")]
    pub cone_half_angle: f64,

    /// Leaf capacity of the rating index (default: 1024)
    #[serde(default = "default_leaf_capacity")]
    pub leaf_capacity: usize,
}

impl ExplorerConfig {
    pub fn max_runtime(&self) -> Duration {
        Duration::from_millis(self.max_runtime_ms)
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_new_samples: default_max_new_samples(),
            sample_min_positional: default_sample_min_positional(),
            sample_max_positional: default_sample_max_positional(),
            sample_min_rotational: default_sample_min_rotational(),
            sample_max_rotational: default_sample_max_rotational(),
            cluster_positional: default_cluster_positional(),
            cluster_rotational: default_cluster_rotational(),
            search_distance_offset: default_search_distance_offset(),
            match_distance: default_match_distance(),
            max_runtime_ms: default_max_runtime_ms(),
            max_nodes: default_max_nodes(),
            domain_grow_factor: default_domain_grow_factor(),
            positional_increase_step: default_increase_step(),
            rotational_increase_step: default_increase_step(),
            initial_rotation_limit: default_initial_rotation_limit(),
            biased_sample_probability: default_biased_sample_probability(),
            target_step: default_target_step(),
            target_rotation: default_target_rotation(),
            cone_half_angle: default_cone_half_angle(),
            leaf_capacity: default_leaf_capacity(),
        }
    }
}

/// Local repair sampling (`World::new_local_closest`).
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct RepairConfig {
    /// Samples drawn per request (default: 32)
    #[serde(default = "default_repair_samples")]
    pub samples: usize,

    /// Attempts per sample before it is given up (default: 16)
    #[serde(default = "default_repair_max_tries")]
    pub max_tries: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            samples: default_repair_samples(),
            max_tries: default_repair_max_tries(),
        }
    }
}

/// Planning job lifecycle.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct JobConfig {
    /// Time granted to a job to observe an abort (default: 100)
    #[serde(default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,

    /// Consecutive collision-free candidates needed to pick a target (default: 1)
    #[serde(default = "default_min_matchee_section")]
    pub min_matchee_section: usize,
}

impl JobConfig {
    pub fn abort_grace(&self) -> Duration {
        Duration::from_millis(self.abort_grace_ms)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            abort_grace_ms: default_abort_grace_ms(),
            min_matchee_section: default_min_matchee_section(),
        }
    }
}

/// Movement history settings.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WorldConfig {
    /// Positional half-extent of the world tree index domain (default: 1000.0)
    #[serde(default = "default_world_extent")]
    pub extent: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            extent: default_world_extent(),
        }
    }
}

// Default value functions
fn default_threads() -> usize {
    6
}
fn default_positional_step() -> f64 {
    0.005
}
fn default_rotational_step() -> f64 {
    0.05
}
fn default_max_new_samples() -> usize {
    6 * 6
}
fn default_sample_min_positional() -> f64 {
    0.005
}
fn default_sample_max_positional() -> f64 {
    0.015
}
fn default_sample_min_rotational() -> f64 {
    0.05 * PI
}
fn default_sample_max_rotational() -> f64 {
    0.3 * PI
}
fn default_cluster_positional() -> f64 {
    0.05
}
fn default_cluster_rotational() -> f64 {
    0.4 * PI
}
fn default_search_distance_offset() -> f64 {
    0.05
}
fn default_match_distance() -> f64 {
    0.5
}
fn default_max_runtime_ms() -> u64 {
    3000
}
fn default_max_nodes() -> usize {
    1 << 15
}
fn default_domain_grow_factor() -> f64 {
    1.1
}
fn default_increase_step() -> usize {
    4
}
fn default_initial_rotation_limit() -> f64 {
    0.1 * PI
}
fn default_biased_sample_probability() -> f64 {
    0.4
}
fn default_target_step() -> f64 {
    0.075
}
fn default_target_rotation() -> f64 {
    0.3 * PI
}
fn default_cone_half_angle() -> f64 {
    50f64.to_radians()
}
fn default_leaf_capacity() -> usize {
    1024
}
fn default_repair_samples() -> usize {
    32
}
fn default_repair_max_tries() -> usize {
    16
}
fn default_abort_grace_ms() -> u64 {
    100
}
fn default_min_matchee_section() -> usize {
    1
}
fn default_world_extent() -> f64 {
    1000.0
}
