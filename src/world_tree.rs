use crate::bounds::ConfigBox;
use crate::config::PlannerConfig;
use crate::configuration::{Configuration, DistancePair};
use crate::error::{PlannerError, Result};
use crate::explorer::Explorer;
use crate::kdtree::ConfigKdTree;
use crate::node::{TreeNode, path_to_root};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

/// Distance below which two poses are considered the same realised pose.
pub const POSE_TOLERANCE: f64 = 1e-10;

struct WorldTreeState {
    nodes: Vec<TreeNode>,
    index: ConfigKdTree,
    position: usize,
}

impl WorldTreeState {
    fn push(&mut self, node: TreeNode) -> usize {
        self.nodes.push(node);
        self.index.revalidate(&mut self.nodes);
        self.nodes.len() - 1
    }

    fn current(&self) -> Option<Configuration> {
        self.nodes.get(self.position).map(|node| node.config)
    }
}

/// Serialisable copy of a world tree.
#[derive(Clone, Debug, Serialize)]
pub struct WorldTreeSnapshot {
    pub movable: usize,
    pub position: usize,
    pub nodes: Vec<TreeNode>,
}

/// Persistent movement history of one movable object.
///
/// Nodes are realised poses. `position` marks the node of the object's current
/// pose; moves and joins may only start from it.
pub struct WorldTree {
    movable: usize,
    state: Mutex<WorldTreeState>,
}

impl WorldTree {
    pub fn new(movable: usize, config: &PlannerConfig) -> Self {
        let domain = ConfigBox::around(&Configuration::IDENTITY, config.world.extent);
        let distances = DistancePair::new(
            config.explorer.cluster_positional,
            config.explorer.cluster_rotational,
        );
        Self {
            movable,
            state: Mutex::new(WorldTreeState {
                nodes: Vec::new(),
                index: ConfigKdTree::new(domain, distances, config.explorer.leaf_capacity),
                position: 0,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Current pose, `None` while the tree is empty.
    pub fn position(&self) -> Option<Configuration> {
        self.state.lock().current()
    }

    pub fn position_index(&self) -> usize {
        self.state.lock().position
    }

    /// Seeds an empty tree with `root`; returns `false` if it already has nodes.
    pub fn initialize(&self, root: Configuration) -> bool {
        let mut state = self.state.lock();
        if !state.nodes.is_empty() {
            return false;
        }
        state.position = state.push(TreeNode::root(root));
        true
    }

    /// Records a realised move from `start` to `end` and returns the new
    /// position node. An empty tree is first seeded with `start`.
    pub fn move_from_to_insert(&self, start: &Configuration, end: &Configuration) -> Result<usize> {
        let mut state = self.state.lock();
        if state.nodes.is_empty() {
            state.position = state.push(TreeNode::root(*start));
        }

        let current = state.nodes[state.position].config;
        if !current.is_near(start, POSE_TOLERANCE) {
            warn!(
                "movable {}: move rejected, at {:?} but move starts at {:?}",
                self.movable, current, start
            );
            return Err(PlannerError::PositionMismatch {
                current,
                requested: *start,
            });
        }

        let parent = state.position;
        state.position = state.push(TreeNode::child(*end, parent));
        debug!("movable {}: moved to node {}", self.movable, state.position);
        Ok(state.position)
    }

    /// Splices the result of exploration `run` into the history.
    ///
    /// The explorer's root is identified with the current position node; all
    /// other explorer nodes are appended in order and the position advances to
    /// the image of the explorer's solution node. Nothing changes on failure.
    pub fn join(&self, explorer: &Explorer, run: u64) -> Result<usize> {
        // A newer run holds the explorer lock until it ends; reject without waiting.
        let latest = explorer.last_run();
        if latest != run {
            return Err(PlannerError::StaleExploration {
                expected: run,
                found: latest,
            });
        }

        let explored = explorer.lock_state();
        let mut state = self.state.lock();

        if explored.run != run {
            return Err(PlannerError::StaleExploration {
                expected: run,
                found: explored.run,
            });
        }
        let (Some(solution), Some(root)) = (explored.solution, explored.nodes.first()) else {
            return Err(PlannerError::NoSolution);
        };

        if state.nodes.is_empty() {
            state.position = state.push(TreeNode::root(root.config));
        }
        let current = state.nodes[state.position].config;
        if !current.is_near(&root.config, POSE_TOLERANCE) {
            error!(
                "movable {}: join rejected, position {:?} but exploration root {:?}",
                self.movable, current, root.config
            );
            return Err(PlannerError::JoinMismatch {
                position: current,
                root: root.config,
            });
        }

        let anchor = state.position;
        let offset = state.nodes.len();
        let image = |i: usize| if i == 0 { anchor } else { offset + i - 1 };

        state.nodes.extend(
            explored.nodes[1..]
                .iter()
                .map(|node| TreeNode::child(node.config, image(node.parent))),
        );
        let WorldTreeState { nodes, index, .. } = &mut *state;
        index.revalidate(nodes);
        state.position = image(solution);

        info!(
            "movable {}: joined run {} ({} nodes), position now node {}",
            self.movable,
            run,
            explored.nodes.len() - 1,
            state.position
        );
        Ok(state.position)
    }

    /// Offsets of history nodes within the clustering distances of `config`.
    pub fn nearby(&self, config: &Configuration) -> Vec<usize> {
        let state = self.state.lock();
        state.index.matches(&state.nodes, config)
    }

    /// Poses from the first recorded pose to the current one.
    pub fn path_to_position(&self) -> Vec<Configuration> {
        let state = self.state.lock();
        path_to_root(&state.nodes, state.position)
            .into_iter()
            .map(|i| state.nodes[i].config)
            .collect()
    }

    pub fn snapshot(&self) -> WorldTreeSnapshot {
        let state = self.state.lock();
        WorldTreeSnapshot {
            movable: self.movable,
            position: state.position,
            nodes: state.nodes.clone(),
        }
    }
}
