//! Error types for the planner.

use crate::configuration::Configuration;
use crate::planner::JobId;
use thiserror::Error;

/// Planner error type.
///
/// Cancellation, node-cap termination and fallback solutions are outcomes of an
/// exploration (see [`crate::Exploration`]) and never show up here.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("movable object {0} does not exist")]
    UnknownMovable(usize),

    #[error("planning job {0} does not exist")]
    UnknownJob(JobId),

    #[error("move rejected: recorded position {current:?} does not match requested start {requested:?}")]
    PositionMismatch {
        current: Configuration,
        requested: Configuration,
    },

    #[error("join rejected: recorded position {position:?} does not match exploration root {root:?}")]
    JoinMismatch {
        position: Configuration,
        root: Configuration,
    },

    #[error("exploration run {expected} was superseded by run {found}")]
    StaleExploration { expected: u64, found: u64 },

    #[error("exploration has no solution to join")]
    NoSolution,

    #[error("no target candidates given")]
    EmptyCandidates,

    #[error("planning job {0} panicked")]
    JobPanicked(JobId),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
