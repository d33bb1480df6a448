use crate::config::PathConfig;
use crate::configuration::Configuration;

/// Collision oracle consulted by the planner.
///
/// Implementations must be safe to query from many worker threads at once.
pub trait CollisionOracle: Send + Sync {
    /// `true` if the movable object placed at `pose` intersects anything.
    /// Unknown objects report a collision.
    fn collides(&self, movable: usize, pose: &Configuration) -> bool;

    /// Radius of a ball around the object's origin enclosing its geometry.
    fn bounding_radius(&self, movable: usize) -> f64;

    /// Step sizes used to discretise straight-line motions.
    fn path_resolution(&self) -> PathConfig {
        PathConfig::default()
    }

    /// `true` if every pose on the straight line from `from` to `to`, both
    /// ends included, is free at the path resolution.
    fn is_collision_free_path(
        &self,
        movable: usize,
        from: &Configuration,
        to: &Configuration,
    ) -> bool {
        discretize(from, to, self.path_resolution())
            .all(|pose| !self.collides(movable, &pose))
    }
}

/// Upper bound on the segments a single path check is split into.
pub const MAX_PATH_STEPS: usize = 1 << 24;

/// Poses along the straight line from `from` to `to`, endpoints included, such
/// that consecutive poses are at most one step apart in both components.
///
/// Paths needing more than [`MAX_PATH_STEPS`] segments are checked at the
/// coarser spacing of exactly that many.
pub fn discretize<'a>(
    from: &'a Configuration,
    to: &'a Configuration,
    resolution: PathConfig,
) -> impl Iterator<Item = Configuration> + 'a {
    let distance = from.pair_distance(to);
    let positional = step_count(distance.positional, resolution.positional_step);
    let rotational = step_count(distance.rotational, resolution.rotational_step);
    let steps = positional.max(rotational).saturating_add(1).min(MAX_PATH_STEPS);
    (0..=steps).map(move |i| from.interpolate(to, i as f64 / steps as f64))
}

fn step_count(distance: f64, step: f64) -> usize {
    if step > 0.0 && distance.is_finite() {
        (distance / step) as usize
    } else {
        0
    }
}
