use crate::configuration::{CONFIGURATION_AXES, Configuration};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Generic axis-aligned bounding box for N-dimensional space.
///
/// The default box is inverted (`min = +inf`, `max = -inf`) so that growing it
/// with [`BoundingBox::extend`] starts from nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

/// Index box over the 7-D configuration space.
pub type ConfigBox = BoundingBox<CONFIGURATION_AXES>;

impl<const D: usize> Default for BoundingBox<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; D],
            max: [f64::NEG_INFINITY; D],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..D).any(|i| self.min[i] > self.max[i])
    }

    /// Side length along `axis`; negative for an empty box.
    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    pub fn extend_point(&mut self, point: &[f64; D]) {
        for i in 0..D {
            if point[i] < self.min[i] {
                self.min[i] = point[i];
            }
            if point[i] > self.max[i] {
                self.max[i] = point[i];
            }
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut result = *self;
        for i in 0..D {
            result.min[i] = result.min[i].min(other.min[i]);
            result.max[i] = result.max[i].max(other.max[i]);
        }
        result
    }

    pub fn contains_point(&self, point: &[f64; D]) -> bool {
        (0..D).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    pub fn contains_box(&self, other: &Self) -> bool {
        other.is_empty() || (0..D).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }

    /// Splits at `value` along `axis` into a lower and an upper half.
    pub fn split(&self, axis: usize, value: f64) -> (Self, Self) {
        let mut lower = *self;
        let mut upper = *self;
        lower.max[axis] = value;
        upper.min[axis] = value;
        (lower, upper)
    }
}

impl ConfigBox {
    /// Box around `center` spanning `positional` on each position axis and the
    /// full `[-1, 1]` range on every quaternion axis.
    pub fn around(center: &Configuration, positional: f64) -> Self {
        let mut min = [-1.0; CONFIGURATION_AXES];
        let mut max = [1.0; CONFIGURATION_AXES];
        for axis in 0..3 {
            min[axis] = center.coord(axis) - positional;
            max[axis] = center.coord(axis) + positional;
        }
        Self::new(min, max)
    }

    pub fn extend(&mut self, config: &Configuration) {
        self.extend_point(&config.coords());
    }

    pub fn contains(&self, config: &Configuration) -> bool {
        self.contains_point(&config.coords())
    }
}

impl<const D: usize> Serialize for BoundingBox<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BoundingBox", 2)?;
        state.serialize_field("min", &self.min[..])?;
        state.serialize_field("max", &self.max[..])?;
        state.end()
    }
}
