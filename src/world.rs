//! Object registry and reference collision oracle.
//!
//! Static obstacles are primitive [`Shape`]s, movable objects are sphere-set
//! [`Body`]s. Each movable owns the explorer and movement history used to plan
//! for it. Ids are slot offsets; a new object takes the first freed slot of its
//! kind.

use crate::collision::CollisionOracle;
use crate::config::{PathConfig, PlannerConfig};
use crate::configuration::Configuration;
use crate::error::{PlannerError, Result};
use crate::explorer::Explorer;
use crate::geometries::{Body, Shape};
use crate::sampler::{Sampler, WorkerPool};
use crate::world_tree::WorldTree;
use log::debug;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Movable,
    Static,
}

struct MovableObject {
    body: Body,
    bounding_radius: f64,
    explorer: Arc<Explorer>,
    world_tree: Arc<WorldTree>,
}

struct StaticObject {
    shape: Box<dyn Shape>,
    pose: Configuration,
}

pub struct World {
    config: Arc<PlannerConfig>,
    pool: Arc<WorkerPool>,
    movables: RwLock<Vec<Option<MovableObject>>>,
    statics: RwLock<Vec<Option<StaticObject>>>,
}

impl World {
    pub fn new(config: Arc<PlannerConfig>, pool: Arc<WorkerPool>) -> Self {
        Self {
            config,
            pool,
            movables: RwLock::new(Vec::new()),
            statics: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Arc<PlannerConfig> {
        &self.config
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Registers a movable object whose movement history starts at `pose`.
    pub fn add_movable(&self, body: Body, pose: Configuration) -> usize {
        let mut movables = self.movables.write();
        let id = free_slot(&movables);
        let world_tree = WorldTree::new(id, &self.config);
        world_tree.initialize(pose);
        let object = MovableObject {
            bounding_radius: body.bounding_radius(),
            body,
            explorer: Arc::new(Explorer::new(id, self.config.clone(), self.pool.clone())),
            world_tree: Arc::new(world_tree),
        };
        place(&mut movables, id, object);
        debug!("added movable {}", id);
        id
    }

    pub fn add_static(&self, shape: impl Shape + 'static, pose: Configuration) -> usize {
        let mut statics = self.statics.write();
        let id = free_slot(&statics);
        let object = StaticObject {
            shape: Box::new(shape),
            pose,
        };
        place(&mut statics, id, object);
        debug!("added static {}", id);
        id
    }

    /// Frees a slot; returns `false` if it was not occupied.
    ///
    /// A removed movable's active exploration is cancelled.
    pub fn remove(&self, kind: ObjectKind, id: usize) -> bool {
        match kind {
            ObjectKind::Movable => {
                let removed = self.movables.write().get_mut(id).and_then(Option::take);
                match removed {
                    Some(object) => {
                        object.explorer.cancel();
                        true
                    }
                    None => false,
                }
            }
            ObjectKind::Static => self
                .statics
                .write()
                .get_mut(id)
                .and_then(Option::take)
                .is_some(),
        }
    }

    pub fn has_movable(&self, id: usize) -> bool {
        matches!(self.movables.read().get(id), Some(Some(_)))
    }

    pub fn has_static(&self, id: usize) -> bool {
        matches!(self.statics.read().get(id), Some(Some(_)))
    }

    pub fn movable_count(&self) -> usize {
        self.movables.read().iter().flatten().count()
    }

    pub fn static_count(&self) -> usize {
        self.statics.read().iter().flatten().count()
    }

    pub fn explorer(&self, id: usize) -> Result<Arc<Explorer>> {
        match self.movables.read().get(id) {
            Some(Some(object)) => Ok(object.explorer.clone()),
            _ => Err(PlannerError::UnknownMovable(id)),
        }
    }

    pub fn world_tree(&self, id: usize) -> Result<Arc<WorldTree>> {
        match self.movables.read().get(id) {
            Some(Some(object)) => Ok(object.world_tree.clone()),
            _ => Err(PlannerError::UnknownMovable(id)),
        }
    }

    /// Removes every object, cancelling active explorations.
    pub fn clear(&self) {
        let movables = std::mem::take(&mut *self.movables.write());
        for object in movables.into_iter().flatten() {
            object.explorer.cancel();
        }
        self.statics.write().clear();
    }

    /// `true` if `movable` collides at any of `poses`.
    pub fn collides_any(&self, movable: usize, poses: &[Configuration]) -> bool {
        self.pool
            .install(|| poses.par_iter().any(|pose| self.collides(movable, pose)))
    }

    /// Repair sample for a blocked segment.
    ///
    /// Draws target-biased changes around the midpoint of `start` and `end`
    /// until the segment from `start` is free, and returns the free sample
    /// closest to `end`.
    pub fn new_local_closest(
        &self,
        movable: usize,
        start: &Configuration,
        end: &Configuration,
    ) -> Option<Configuration> {
        if !self.has_movable(movable) {
            return None;
        }
        let repair = self.config.repair;
        let center = start.midpoint(end);
        self.pool.install(|| {
            (0..repair.samples)
                .into_par_iter()
                .map_init(
                    || self.pool.sampler(),
                    |sampler, _| {
                        (0..=repair.max_tries)
                            .map(|_| self.repair_candidate(sampler, &center, start, end))
                            .find(|candidate| {
                                self.is_collision_free_path(movable, start, candidate)
                            })
                    },
                )
                .flatten()
                .map(|candidate| (candidate.distance(end), candidate))
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, candidate)| candidate)
        })
    }

    fn repair_candidate(
        &self,
        sampler: &mut Sampler,
        center: &Configuration,
        start: &Configuration,
        end: &Configuration,
    ) -> Configuration {
        let cfg = &self.config.explorer;
        sampler.target_change(
            center,
            end.position - start.position,
            cfg.cone_half_angle,
            cfg.target_step,
            cfg.target_rotation,
        )
    }
}

impl CollisionOracle for World {
    fn collides(&self, movable: usize, pose: &Configuration) -> bool {
        let movables = self.movables.read();
        let Some(Some(object)) = movables.get(movable) else {
            return true;
        };
        let statics = self.statics.read();

        object.body.spheres.iter().any(|sphere| {
            let center = pose.position + pose.rotation * sphere.center;
            statics.iter().flatten().any(|obstacle| {
                let offset = center - obstacle.pose.position;
                if offset.length() >= obstacle.shape.bounding_radius() + sphere.radius {
                    return false;
                }
                let local = obstacle.pose.rotation.inverse() * offset;
                obstacle.shape.signed_distance(local) < sphere.radius
            })
        })
    }

    fn bounding_radius(&self, movable: usize) -> f64 {
        match self.movables.read().get(movable) {
            Some(Some(object)) => object.bounding_radius,
            _ => 0.0,
        }
    }

    fn path_resolution(&self) -> PathConfig {
        self.config.path
    }
}

fn free_slot<T>(slots: &[Option<T>]) -> usize {
    slots
        .iter()
        .position(Option::is_none)
        .unwrap_or(slots.len())
}

fn place<T>(slots: &mut Vec<Option<T>>, id: usize, object: T) {
    if id == slots.len() {
        slots.push(Some(object));
    } else {
        slots[id] = Some(object);
    }
}
