//! Random configuration sampling and the per-worker sampler pool.

use crate::configuration::Configuration;
use crate::error::Result;
use glam::{DQuat, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::f64::consts::{PI, TAU};
use std::sync::atomic::{AtomicU64, Ordering};

/// Seedable random source for configurations.
///
/// A sampler is not shared between threads; see [`WorkerPool`].
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform in `[min, max)`; `min` when the range is empty.
    pub fn uniform_range(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        min + (max - min) * self.uniform()
    }

    /// Uniform point on the unit sphere.
    pub fn unit_vector(&mut self) -> DVec3 {
        let z = 2.0 * self.uniform() - 1.0;
        let phi = TAU * self.uniform();
        let r = (1.0 - z * z).max(0.0).sqrt();
        DVec3::new(r * phi.cos(), r * phi.sin(), z)
    }

    /// Uniform point in the unit ball, excluding the ball of radius `min_fraction`.
    pub fn in_ball(&mut self, min_fraction: f64) -> DVec3 {
        let min3 = min_fraction.clamp(0.0, 1.0).powi(3);
        let r = (min3 + self.uniform() * (1.0 - min3)).cbrt();
        self.unit_vector() * r
    }

    /// Rotation about a uniformly random axis by an angle in `[min_angle, angle)`,
    /// biased towards the upper end.
    pub fn limited_rotation(&mut self, min_angle: f64, angle: f64) -> DQuat {
        let axis = self.unit_vector();
        let theta = self.uniform().sqrt() * (angle - min_angle).max(0.0) + min_angle;
        DQuat::from_axis_angle(axis, theta)
    }

    /// Uniformly distributed unit quaternion.
    pub fn unit_quaternion(&mut self) -> DQuat {
        let u0 = self.uniform();
        let u1 = TAU * self.uniform();
        let u2 = TAU * self.uniform();
        let r1 = (1.0 - u0).sqrt();
        let r2 = u0.sqrt();
        DQuat::from_xyzw(r1 * u1.sin(), r1 * u1.cos(), r2 * u2.sin(), r2 * u2.cos())
    }

    /// Uniform point in the disk of the given radius in the xy-plane.
    pub fn in_disk(&mut self, radius: f64) -> DVec3 {
        let r = radius * self.uniform().sqrt();
        let phi = TAU * self.uniform();
        DVec3::new(r * phi.cos(), r * phi.sin(), 0.0)
    }

    /// Uniform point in a solid cone along +z with apex at `z_offset`.
    pub fn in_cone(&mut self, half_angle: f64, z_offset: f64, height: f64) -> DVec3 {
        let h = height * self.uniform().cbrt();
        let radius = half_angle.clamp(0.0, 0.5 * PI - 1e-9).tan() * h;
        self.in_disk(radius) + DVec3::new(0.0, 0.0, z_offset + h)
    }

    /// Local perturbation of `around`.
    ///
    /// The translation has a uniform direction and a length in
    /// `[min_distance, max_distance)`; the rotation is a limited rotation
    /// applied on top of the current orientation.
    pub fn configuration_around(
        &mut self,
        around: &Configuration,
        min_distance: f64,
        max_distance: f64,
        min_angle: f64,
        max_angle: f64,
    ) -> Configuration {
        let fraction = if max_distance > 0.0 {
            (min_distance / max_distance).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let offset = self.in_ball(fraction) * max_distance.max(0.0);
        let change = Configuration::new(offset, self.limited_rotation(min_angle, max_angle));
        around.compose(&change)
    }

    /// Step from `from` roughly towards `direction`.
    ///
    /// The translation is drawn from a cone of `half_angle` around the
    /// direction reaching `step` past the start and `step` behind it; a zero
    /// direction is treated as +z.
    pub fn target_change(
        &mut self,
        from: &Configuration,
        direction: DVec3,
        half_angle: f64,
        step: f64,
        rotation: f64,
    ) -> Configuration {
        let align = if direction.length_squared() > 0.0 {
            DQuat::from_rotation_arc(DVec3::Z, direction.normalize())
        } else {
            DQuat::IDENTITY
        };
        let offset = align * self.in_cone(half_angle, -step, 2.0 * step);
        let change = Configuration::new(offset, self.limited_rotation(0.0, rotation));
        from.compose(&change)
    }
}

/// Data-parallel thread pool that hands out independent sampler streams.
///
/// Parallel loops take one [`Sampler`] per rayon task through `map_init`, so
/// no sampler is ever shared. With a fixed seed, stream `n` is seeded from
/// `seed + n`; streams are numbered in the order they are requested.
pub struct WorkerPool {
    pool: ThreadPool,
    seed: Option<u64>,
    streams: AtomicU64,
}

impl WorkerPool {
    pub fn new(threads: usize, seed: Option<u64>) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("estplan-worker-{}", i))
            .build()?;
        Ok(Self {
            pool,
            seed,
            streams: AtomicU64::new(0),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the pool.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// A fresh sampler on the next stream.
    pub fn sampler(&self) -> Sampler {
        let stream = self.streams.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => Sampler::new(seed.wrapping_add(stream)),
            None => Sampler::from_entropy(),
        }
    }
}
