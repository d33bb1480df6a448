//! # estplan
//!
//! `estplan` is a sampling-based motion planner for rigid bodies. It searches
//! collision-free paths through the 6-DoF configuration space with an
//! expanding space tree and keeps a persistent movement history per object.
//!
//! ## Features
//!
//! - **Density-guided search**: new samples grow from the least crowded nodes,
//!   rated by a 7-D KD-tree with a combined positional / rotational radius.
//! - **Data-parallel rounds**: sampling, collision filtering and target
//!   matching run on a shared `rayon` pool.
//! - **Job orchestration**: explorations run as cancellable background jobs
//!   whose results are spliced into the object's movement history.
//! - **Pluggable collision checks**: anything implementing [`CollisionOracle`]
//!   can drive the explorer; [`World`] is a primitive-shape implementation.
//!
//! ## Main Interface
//!
//! The primary entry point is the [`Planner`] struct, which owns the [`World`]
//! and runs planning jobs against it.

mod bounds;
mod collision;
mod config;
mod configuration;
mod dump;
mod error;
mod explorer;
pub mod geometries;
mod kdtree;
mod node;
mod planner;
mod sampler;
mod world;
mod world_tree;

pub use bounds::BoundingBox;
pub use bounds::ConfigBox;
pub use collision::CollisionOracle;
pub use collision::MAX_PATH_STEPS;
pub use collision::discretize;
pub use config::ExplorerConfig;
pub use config::JobConfig;
pub use config::PathConfig;
pub use config::PlannerConfig;
pub use config::RepairConfig;
pub use config::WorkerConfig;
pub use config::WorldConfig;
pub use configuration::CONFIGURATION_AXES;
pub use configuration::Configuration;
pub use configuration::DistancePair;
pub use configuration::rotation_angle;
pub use dump::ExplorationDump;
pub use dump::exploration_file_name;
pub use error::PlannerError;
pub use error::Result;
pub use explorer::Exploration;
pub use explorer::Explorer;
pub use explorer::ExplorerSnapshot;
pub use explorer::Solution;
pub use kdtree::ConfigKdTree;
pub use kdtree::DEFAULT_LEAF_CAPACITY;
pub use kdtree::Rated;
pub use kdtree::RatedPoint;
pub use node::TreeNode;
pub use node::path_to_root;
pub use planner::FetchedPath;
pub use planner::JobId;
pub use planner::JobStatus;
pub use planner::Planner;
pub use sampler::Sampler;
pub use sampler::WorkerPool;
pub use world::ObjectKind;
pub use world::World;
pub use world_tree::POSE_TOLERANCE;
pub use world_tree::WorldTree;
pub use world_tree::WorldTreeSnapshot;

pub use glam::{DQuat, DVec3};
