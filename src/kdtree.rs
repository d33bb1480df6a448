use crate::bounds::ConfigBox;
use crate::configuration::{CONFIGURATION_AXES, Configuration, DistancePair};
use log::debug;
use serde::Serialize;
use std::f64::consts::PI;

/// Default number of points a leaf holds before it is split.
pub const DEFAULT_LEAF_CAPACITY: usize = 1024;

// Normalised extent below which an axis is not worth splitting.
const MIN_SPLIT_EXTENT: f64 = 1e-12;
// Relative slack on pruning bounds, so rounding never prunes a boundary match.
const PRUNE_SLACK: f64 = 1e-9;
const ROOT: usize = 0;

/// A record the index can rate: a configuration plus a match counter.
pub trait Rated {
    fn configuration(&self) -> &Configuration;
    fn rating(&self) -> usize;
    fn rating_mut(&mut self) -> &mut usize;
}

/// The minimal [`Rated`] record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RatedPoint {
    pub config: Configuration,
    pub rating: usize,
}

impl RatedPoint {
    pub fn new(config: Configuration) -> Self {
        Self { config, rating: 0 }
    }
}

impl Rated for RatedPoint {
    fn configuration(&self) -> &Configuration {
        &self.config
    }

    fn rating(&self) -> usize {
        self.rating
    }

    fn rating_mut(&mut self) -> &mut usize {
        &mut self.rating
    }
}

#[derive(Clone, Debug, Serialize)]
enum KdNodeKind {
    Leaf {
        points: Vec<usize>,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug, Serialize)]
struct KdNode {
    bounds: ConfigBox,
    kind: KdNodeKind,
}

/// Incrementally built KD-tree over 7-D configurations.
///
/// The tree never owns the records. It indexes a caller-owned, append-only
/// sequence by offset and picks up new records on [`ConfigKdTree::revalidate`].
/// Each record is rated on insertion: every indexed record within the tree's
/// distance pair of the newcomer gains one point, and the newcomer starts with
/// the number of such matches. Ratings therefore approximate local density.
///
/// Nodes live in a flat arena; node 0 is the root.
#[derive(Clone, Debug, Serialize)]
pub struct ConfigKdTree {
    domain: ConfigBox,
    distances: DistancePair,
    leaf_capacity: usize,
    nodes: Vec<KdNode>,
    size: usize,
}

impl ConfigKdTree {
    /// Creates an empty tree.
    ///
    /// # Arguments
    ///
    /// * `domain` - Reference box. Split axes are chosen by extent relative to it.
    /// * `distances` - Positional / rotational radius used for rating.
    /// * `leaf_capacity` - Points a leaf may hold before it is split (at least 1).
    pub fn new(domain: ConfigBox, distances: DistancePair, leaf_capacity: usize) -> Self {
        let mut tree = Self {
            domain,
            distances,
            leaf_capacity: leaf_capacity.max(1),
            nodes: Vec::new(),
            size: 0,
        };
        tree.clear();
        tree
    }

    pub fn with_default_capacity(domain: ConfigBox, distances: DistancePair) -> Self {
        Self::new(domain, distances, DEFAULT_LEAF_CAPACITY)
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn domain(&self) -> &ConfigBox {
        &self.domain
    }

    pub fn distances(&self) -> DistancePair {
        self.distances
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drops every indexed record and resets the topology to one empty leaf.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(KdNode {
            bounds: self.domain,
            kind: KdNodeKind::Leaf { points: Vec::new() },
        });
        self.size = 0;
    }

    /// Indexes and rates every record appended to `data` since the last call.
    ///
    /// Returns the number of records picked up; zero when nothing is pending.
    pub fn revalidate<T: Rated>(&mut self, data: &mut [T]) -> usize {
        debug_assert!(data.len() >= self.size, "indexed sequence shrank");
        let start = self.size;
        while self.size < data.len() {
            let index = self.size;
            let config = *data[index].configuration();

            let matches = self.range_search(data, &config, self.distances);
            for &i in &matches {
                *data[i].rating_mut() += 1;
            }
            *data[index].rating_mut() = matches.len();

            self.insert(index, &config, data);
            self.size += 1;
        }
        self.size - start
    }

    /// Indexed records within the tree's own distance pair of `query`.
    pub fn matches<T: Rated>(&self, data: &[T], query: &Configuration) -> Vec<usize> {
        self.range_search(data, query, self.distances)
    }

    /// Indexed records whose positional distance to `query` is below
    /// `limits.positional` and whose rotational distance is below
    /// `limits.rotational`.
    ///
    /// `q` and `-q` describe the same orientation, so the tree is searched once
    /// per representative. The first pass owns the hemisphere `q . p >= 0`, the
    /// second the open hemisphere `-q . p > 0`; every record is reported at most once.
    pub fn range_search<T: Rated>(
        &self,
        data: &[T],
        query: &Configuration,
        limits: DistancePair,
    ) -> Vec<usize> {
        let mut found = Vec::new();
        let chord = chord_limit(limits.rotational);
        for negated in [false, true] {
            let query = if negated {
                query.with_negated_rotation()
            } else {
                *query
            };
            let coords = query.coords();
            let search = Search {
                data,
                query,
                coords,
                limits,
                chord,
                open_hemisphere: negated,
            };
            let mut near = coords;
            self.visit(ROOT, &search, &mut near, &mut found);
        }
        found
    }

    /// Iterates over leaves as `(box, point offsets)`.
    pub fn leaves(&self) -> impl Iterator<Item = (&ConfigBox, &[usize])> + '_ {
        self.nodes.iter().filter_map(|node| match &node.kind {
            KdNodeKind::Leaf { points } => Some((&node.bounds, points.as_slice())),
            KdNodeKind::Split { .. } => None,
        })
    }

    /// Checks the structural invariants: every box contains its children's
    /// boxes, every leaf point lies in its leaf box and every indexed record
    /// appears in exactly one leaf.
    pub fn is_consistent<T: Rated>(&self, data: &[T]) -> bool {
        let mut seen = vec![0usize; self.size];
        for node in &self.nodes {
            match &node.kind {
                KdNodeKind::Leaf { points } => {
                    for &i in points {
                        if i >= self.size || i >= data.len() {
                            return false;
                        }
                        if !node.bounds.contains(data[i].configuration()) {
                            return false;
                        }
                        seen[i] += 1;
                    }
                }
                KdNodeKind::Split { left, right, .. } => {
                    if !node.bounds.contains_box(&self.nodes[*left].bounds)
                        || !node.bounds.contains_box(&self.nodes[*right].bounds)
                    {
                        return false;
                    }
                }
            }
        }
        seen.iter().all(|&count| count == 1)
    }

    fn visit<T: Rated>(
        &self,
        node: usize,
        search: &Search<'_, T>,
        near: &mut [f64; CONFIGURATION_AXES],
        found: &mut Vec<usize>,
    ) {
        match &self.nodes[node].kind {
            KdNodeKind::Leaf { points } => {
                for &i in points {
                    if search.accepts(search.data[i].configuration()) {
                        found.push(i);
                    }
                }
            }
            KdNodeKind::Split {
                axis,
                value,
                left,
                right,
            } => {
                let (axis, value) = (*axis, *value);
                let (first, second) = if search.coords[axis] <= value {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                self.visit(first, search, near, found);

                // `near` is the closest point of the far cell's region seen so far.
                let backup = near[axis];
                near[axis] = value;
                if search.may_reach(near) {
                    self.visit(second, search, near, found);
                }
                near[axis] = backup;
            }
        }
    }

    fn insert<T: Rated>(&mut self, index: usize, config: &Configuration, data: &[T]) {
        let coords = config.coords();
        let mut node = ROOT;
        loop {
            self.nodes[node].bounds.extend_point(&coords);
            match &self.nodes[node].kind {
                KdNodeKind::Split {
                    axis,
                    value,
                    left,
                    right,
                } => {
                    node = if coords[*axis] <= *value { *left } else { *right };
                }
                KdNodeKind::Leaf { .. } => break,
            }
        }

        let overflow = match &mut self.nodes[node].kind {
            KdNodeKind::Leaf { points } => {
                points.push(index);
                points.len() > self.leaf_capacity
            }
            KdNodeKind::Split { .. } => false,
        };
        if overflow {
            self.grow_subtree(node, data);
        }
    }

    fn grow_subtree<T: Rated>(&mut self, leaf: usize, data: &[T]) {
        let threshold = (self.leaf_capacity / 2).max(1);
        let mut pending = vec![leaf];

        while let Some(node) = pending.pop() {
            let bounds = self.nodes[node].bounds;
            let Some(axis) = self.split_axis(&bounds) else {
                debug!(
                    "kd-tree leaf {} keeps {} coincident points",
                    node,
                    self.leaf_len(node)
                );
                continue;
            };
            let value = 0.5 * (bounds.min[axis] + bounds.max[axis]);

            let points = match &mut self.nodes[node].kind {
                KdNodeKind::Leaf { points } => std::mem::take(points),
                KdNodeKind::Split { .. } => continue,
            };
            let (lower, upper): (Vec<usize>, Vec<usize>) = points
                .into_iter()
                .partition(|&i| data[i].configuration().coord(axis) <= value);

            let (lower_box, upper_box) = bounds.split(axis, value);
            let left = self.push_leaf(lower_box, lower);
            let right = self.push_leaf(upper_box, upper);
            self.nodes[node].kind = KdNodeKind::Split {
                axis,
                value,
                left,
                right,
            };

            for child in [left, right] {
                if self.leaf_len(child) > threshold {
                    pending.push(child);
                }
            }
        }
    }

    // Axis with the largest extent relative to the domain, so position and
    // quaternion axes compete on equal terms.
    fn split_axis(&self, bounds: &ConfigBox) -> Option<usize> {
        let mut best = None;
        let mut best_extent = MIN_SPLIT_EXTENT;
        for axis in 0..CONFIGURATION_AXES {
            let domain_extent = self.domain.extent(axis);
            let scale = if domain_extent.is_finite() && domain_extent > 0.0 {
                domain_extent
            } else {
                1.0
            };
            let extent = bounds.extent(axis) / scale;
            if extent.is_finite() && extent > best_extent {
                best_extent = extent;
                best = Some(axis);
            }
        }
        best
    }

    fn push_leaf(&mut self, bounds: ConfigBox, points: Vec<usize>) -> usize {
        self.nodes.push(KdNode {
            bounds,
            kind: KdNodeKind::Leaf { points },
        });
        self.nodes.len() - 1
    }

    fn leaf_len(&self, node: usize) -> usize {
        match &self.nodes[node].kind {
            KdNodeKind::Leaf { points } => points.len(),
            KdNodeKind::Split { .. } => 0,
        }
    }
}

struct Search<'a, T> {
    data: &'a [T],
    query: Configuration,
    coords: [f64; CONFIGURATION_AXES],
    limits: DistancePair,
    chord: f64,
    open_hemisphere: bool,
}

impl<T> Search<'_, T> {
    fn accepts(&self, candidate: &Configuration) -> bool {
        let dot = self.query.rotation.dot(candidate.rotation);
        let in_hemisphere = if self.open_hemisphere {
            dot > 0.0
        } else {
            dot >= 0.0
        };
        if !in_hemisphere {
            return false;
        }
        self.query.positional_distance(candidate) < self.limits.positional
            && self.query.rotational_distance(candidate) < self.limits.rotational
    }

    // Lower bounds on both distances from the query to the region behind `near`.
    fn may_reach(&self, near: &[f64; CONFIGURATION_AXES]) -> bool {
        let mut positional = 0.0;
        for axis in 0..3 {
            let d = near[axis] - self.coords[axis];
            positional += d * d;
        }
        let mut chord = 0.0;
        for axis in 3..CONFIGURATION_AXES {
            let d = near[axis] - self.coords[axis];
            chord += d * d;
        }
        positional.sqrt() < self.limits.positional * (1.0 + PRUNE_SLACK)
            && chord.sqrt() < self.chord * (1.0 + PRUNE_SLACK)
    }
}

/// Largest 4-D chord `|q - p|` between unit quaternions in the same hemisphere
/// whose rotation angle is still below `angle`.
fn chord_limit(angle: f64) -> f64 {
    if angle >= PI {
        f64::INFINITY
    } else {
        (2.0 - 2.0 * (0.5 * angle.max(0.0)).cos()).sqrt()
    }
}
