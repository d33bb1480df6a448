//! Expanding space tree search between two configurations.

use crate::bounds::ConfigBox;
use crate::collision::CollisionOracle;
use crate::config::PlannerConfig;
use crate::configuration::{Configuration, DistancePair};
use crate::dump::{self, ExplorationDump};
use crate::kdtree::ConfigKdTree;
use crate::node::{TreeNode, path_to_root};
use crate::sampler::{Sampler, WorkerPool};
use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

/// A path found by an exploration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Solution {
    /// Offset of the solution node in the exploration's node sequence.
    pub node: usize,
    /// Configurations from the root (first) to the solution node (last).
    pub path: Vec<Configuration>,
    /// Exploration run that produced the path.
    pub run: u64,
}

/// Outcome of [`Explorer::explore`].
#[derive(Clone, Debug, PartialEq)]
pub enum Exploration {
    /// A node within the match distance was connected to the target.
    Solved(Solution),
    /// No exact match; the node closest to the target was used instead.
    FallbackSolved(Solution),
    Cancelled,
}

impl Exploration {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Exploration::Solved(solution) | Exploration::FallbackSolved(solution) => Some(solution),
            Exploration::Cancelled => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, Exploration::Solved(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Exploration::Cancelled)
    }

    /// The solution path, empty when cancelled.
    pub fn path(&self) -> &[Configuration] {
        match self.solution() {
            Some(solution) => &solution.path,
            None => &[],
        }
    }
}

/// Node sequence and bookkeeping of the most recent run.
#[derive(Debug, Default)]
pub(crate) struct ExplorerState {
    pub(crate) nodes: Vec<TreeNode>,
    pub(crate) index: Option<ConfigKdTree>,
    pub(crate) solution: Option<usize>,
    pub(crate) complete: bool,
    pub(crate) run: u64,
}

/// Copy of an explorer's last run.
#[derive(Clone, Debug, Serialize)]
pub struct ExplorerSnapshot {
    pub run: u64,
    pub nodes: Vec<TreeNode>,
    /// Nodes picked up by the rating index.
    pub indexed: usize,
    pub solution: Option<usize>,
    pub complete: bool,
}

/// Expanding space tree planner bound to one movable object.
///
/// Each run rebuilds the tree from scratch. The state lock is held for the
/// whole run, so runs on the same explorer are serialised and a snapshot
/// waits for the active run to finish.
///
/// Runs are bound to a cancellation epoch. [`Explorer::preempt`] moves to a new
/// epoch, which cancels every run bound to an older one, including runs that
/// are still waiting for the state lock.
pub struct Explorer {
    movable: usize,
    session: u64,
    config: Arc<PlannerConfig>,
    pool: Arc<WorkerPool>,
    epoch: AtomicU64,
    latest_run: AtomicU64,
    state: Mutex<ExplorerState>,
}

// Sampling windows around the search center.
#[derive(Clone, Copy, Debug)]
struct Windows {
    positional: f64,
    rotational: f64,
    positional_ceiling: f64,
}

impl Windows {
    fn admits(&self, center: &Configuration, config: &Configuration) -> bool {
        center.positional_distance(config) <= self.positional
            && center.rotational_distance(config) <= self.rotational
    }
}

impl Explorer {
    pub fn new(movable: usize, config: Arc<PlannerConfig>, pool: Arc<WorkerPool>) -> Self {
        Self {
            movable,
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            config,
            pool,
            epoch: AtomicU64::new(0),
            latest_run: AtomicU64::new(0),
            state: Mutex::new(ExplorerState::default()),
        }
    }

    pub fn movable(&self) -> usize {
        self.movable
    }

    /// Requests that the active run, if any, stops at its next checkpoint.
    pub fn cancel(&self) {
        self.preempt();
    }

    /// Cancels all runs bound to earlier epochs and returns the new epoch,
    /// for use with [`Explorer::explore_in_epoch`].
    pub fn preempt(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of the most recent run; 0 before the first one.
    ///
    /// Never waits for an active run; a run is counted as soon as it starts.
    pub fn last_run(&self) -> u64 {
        self.latest_run.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ExplorerSnapshot {
        let state = self.state.lock();
        ExplorerSnapshot {
            run: state.run,
            nodes: state.nodes.clone(),
            indexed: state.index.as_ref().map_or(0, ConfigKdTree::len),
            solution: state.solution,
            complete: state.complete,
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ExplorerState> {
        self.state.lock()
    }

    /// Searches for a path from `root` towards `target`.
    ///
    /// With `exact`, a node only matches if it lies within the match distance
    /// of the target and the straight segment to the target is free. Without
    /// it, the search stops as soon as a node comes within half the match
    /// distance and the closest node is returned.
    pub fn explore(
        &self,
        oracle: &dyn CollisionOracle,
        root: &Configuration,
        target: &Configuration,
        exact: bool,
    ) -> Exploration {
        let never = AtomicBool::new(false);
        self.explore_cancellable(oracle, root, target, exact, &never)
    }

    /// [`Explorer::explore`] that additionally stops once `token` is set.
    pub fn explore_cancellable(
        &self,
        oracle: &dyn CollisionOracle,
        root: &Configuration,
        target: &Configuration,
        exact: bool,
        token: &AtomicBool,
    ) -> Exploration {
        let epoch = self.epoch.load(Ordering::Acquire);
        self.explore_in_epoch(oracle, root, target, exact, token, epoch)
    }

    /// [`Explorer::explore_cancellable`] bound to `epoch`.
    ///
    /// The run is cancelled as soon as the explorer has moved past `epoch`. A
    /// run cancelled before it starts leaves the previous run's state alone.
    pub fn explore_in_epoch(
        &self,
        oracle: &dyn CollisionOracle,
        root: &Configuration,
        target: &Configuration,
        exact: bool,
        token: &AtomicBool,
        epoch: u64,
    ) -> Exploration {
        let cancelled =
            || token.load(Ordering::Acquire) || self.epoch.load(Ordering::Acquire) != epoch;
        if cancelled() {
            return Exploration::Cancelled;
        }

        let mut state = self.state.lock();
        if cancelled() {
            return Exploration::Cancelled;
        }
        state.nodes.clear();
        state.index = None;
        state.solution = None;
        state.complete = false;
        state.run += 1;
        let run = state.run;
        self.latest_run.store(run, Ordering::Release);

        let cfg = &self.config.explorer;
        let bounding = oracle.bounding_radius(self.movable);
        let center = root.midpoint(target);
        let half = center.positional_distance(root);
        let positional_ceiling = half + 0.5 * bounding + cfg.search_distance_offset;
        let mut windows = Windows {
            positional: (half * cfg.domain_grow_factor + cfg.search_distance_offset)
                .min(positional_ceiling),
            rotational: cfg.initial_rotation_limit.min(PI),
            positional_ceiling,
        };

        let domain = ConfigBox::around(&center, positional_ceiling);
        let mut index = ConfigKdTree::new(
            domain,
            DistancePair::new(cfg.cluster_positional, cfg.cluster_rotational),
            cfg.leaf_capacity,
        );
        let mut nodes = vec![TreeNode::root(*root)];
        index.revalidate(&mut nodes);

        info!(
            "exploration {}/{} of movable {} started (exact: {})",
            self.session, run, self.movable, exact
        );

        let started = Instant::now();
        let mut rounds = 0usize;
        let mut found = None;
        let mut aborted = false;

        while started.elapsed() < cfg.max_runtime() && nodes.len() < cfg.max_nodes {
            if cancelled() {
                aborted = true;
                break;
            }

            if rounds > 0 {
                self.grow_windows(&mut windows, rounds);
            }
            rounds += 1;

            let parents = k_smallest(&nodes, cfg.max_new_samples.max(1));
            let candidates: Vec<TreeNode> = self.pool.install(|| {
                parents
                    .par_iter()
                    .map_init(
                        || self.pool.sampler(),
                        |sampler, &parent| {
                            let config = self.sample(sampler, &nodes[parent].config, target);
                            TreeNode::child(config, parent)
                        },
                    )
                    .collect()
            });
            if cancelled() {
                aborted = true;
                break;
            }

            let survivors: Vec<TreeNode> = self.pool.install(|| {
                candidates
                    .into_par_iter()
                    .filter(|candidate| {
                        windows.admits(&center, &candidate.config)
                            && oracle.is_collision_free_path(
                                self.movable,
                                &nodes[candidate.parent].config,
                                &candidate.config,
                            )
                    })
                    .collect()
            });
            if cancelled() {
                aborted = true;
                break;
            }

            let previous = nodes.len();
            nodes.extend(survivors);
            index.revalidate(&mut nodes);
            if cancelled() {
                aborted = true;
                break;
            }

            if exact {
                found = self.pool.install(|| {
                    (previous..nodes.len()).into_par_iter().find_first(|&i| {
                        nodes[i].config.scaled_distance(target, bounding) < cfg.match_distance
                            && oracle.is_collision_free_path(self.movable, target, &nodes[i].config)
                    })
                });
                if found.is_some() {
                    break;
                }
            } else if nodes[previous..]
                .iter()
                .any(|node| node.config.distance(target) < 0.5 * cfg.match_distance)
            {
                break;
            }
        }

        if aborted || cancelled() {
            debug!(
                "exploration {}/{} of movable {} cancelled after {} rounds",
                self.session, run, self.movable, rounds
            );
            state.nodes = nodes;
            state.index = Some(index);
            return Exploration::Cancelled;
        }

        let complete = found.is_some();
        let node = found.unwrap_or_else(|| closest_node(&nodes, target, bounding));
        let path = path_to_root(&nodes, node)
            .into_iter()
            .map(|i| nodes[i].config)
            .collect();

        info!(
            "exploration {}/{} of movable {} finished: {} after {} rounds, {} nodes, {:?}",
            self.session,
            run,
            self.movable,
            if complete { "solved" } else { "fallback" },
            rounds,
            nodes.len(),
            started.elapsed()
        );

        if let Some(dir) = &self.config.dump_dir {
            let dump = ExplorationDump {
                session: self.session,
                run,
                movable: self.movable,
                root: *root,
                target: *target,
                exact,
                complete,
                solution: node,
                nodes: &nodes,
                index: &index,
            };
            let path = dir.join(dump::exploration_file_name(self.session, run));
            if let Err(e) = dump::write_json(&path, &dump) {
                warn!("failed to write exploration dump {}: {}", path.display(), e);
            }
        }

        state.nodes = nodes;
        state.index = Some(index);
        state.solution = Some(node);
        state.complete = complete;

        let solution = Solution { node, path, run };
        if complete {
            Exploration::Solved(solution)
        } else {
            Exploration::FallbackSolved(solution)
        }
    }

    fn grow_windows(&self, windows: &mut Windows, round: usize) {
        let cfg = &self.config.explorer;
        if round % cfg.positional_increase_step.max(1) == 0 {
            windows.positional =
                (windows.positional * cfg.domain_grow_factor).min(windows.positional_ceiling);
        }
        if round % cfg.rotational_increase_step.max(1) == 0 {
            windows.rotational = (windows.rotational * cfg.domain_grow_factor).min(PI);
        }
    }

    fn sample(
        &self,
        sampler: &mut Sampler,
        start: &Configuration,
        target: &Configuration,
    ) -> Configuration {
        let cfg = &self.config.explorer;
        if sampler.uniform() < cfg.biased_sample_probability {
            sampler.configuration_around(
                start,
                cfg.sample_min_positional,
                cfg.sample_max_positional,
                cfg.sample_min_rotational,
                cfg.sample_max_rotational,
            )
        } else {
            sampler.target_change(
                start,
                target.position - start.position,
                cfg.cone_half_angle,
                cfg.target_step,
                cfg.target_rotation,
            )
        }
    }
}

/// Offsets of the `k` lowest-rated nodes, ties broken by offset.
fn k_smallest(nodes: &[TreeNode], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    let k = k.min(order.len());
    if k < order.len() {
        order.select_nth_unstable_by_key(k, |&i| (nodes[i].rating, i));
        order.truncate(k);
    }
    order.sort_unstable_by_key(|&i| (nodes[i].rating, i));
    order
}

fn closest_node(nodes: &[TreeNode], target: &Configuration, bounding: f64) -> usize {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (i, node.config.scaled_distance(target, bounding)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn node(x: f64, rating: usize) -> TreeNode {
        let mut node = TreeNode::root(Configuration::from_position(DVec3::new(x, 0.0, 0.0)));
        node.rating = rating;
        node
    }

    #[test]
    fn test_k_smallest_orders_by_rating_then_offset() {
        let nodes = vec![node(0.0, 3), node(1.0, 1), node(2.0, 1), node(3.0, 0), node(4.0, 5)];
        assert_eq!(k_smallest(&nodes, 3), vec![3, 1, 2]);
        assert_eq!(k_smallest(&nodes, 10), vec![3, 1, 2, 0, 4]);
    }

    #[test]
    fn test_closest_node_prefers_first_minimum() {
        let nodes = vec![node(0.0, 0), node(2.0, 0), node(2.0, 0)];
        let target = Configuration::from_position(DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(closest_node(&nodes, &target, 1.0), 1);
    }

    #[test]
    fn test_windows_grow_independently() {
        let mut config = PlannerConfig::default();
        config.explorer.positional_increase_step = 2;
        config.explorer.rotational_increase_step = 3;
        let pool = Arc::new(WorkerPool::new(1, Some(0)).expect("pool builds"));
        let explorer = Explorer::new(0, Arc::new(config), pool);
        let mut windows = Windows {
            positional: 1.0,
            rotational: 1.0,
            positional_ceiling: 1.15,
        };
        explorer.grow_windows(&mut windows, 2);
        assert!((windows.positional - 1.1).abs() < 1e-12);
        assert_eq!(windows.rotational, 1.0);
        explorer.grow_windows(&mut windows, 3);
        assert!((windows.rotational - 1.1).abs() < 1e-12);
        explorer.grow_windows(&mut windows, 4);
        assert_eq!(windows.positional, 1.15);
    }
}
