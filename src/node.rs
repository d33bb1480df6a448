use crate::configuration::Configuration;
use crate::kdtree::Rated;
use serde::Serialize;

/// A vertex of an exploration tree or of the movement history.
///
/// `parent` is an offset into the owning sequence; it equals the node's own
/// offset for a root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    pub config: Configuration,
    pub rating: usize,
    pub parent: usize,
}

impl TreeNode {
    pub fn root(config: Configuration) -> Self {
        Self {
            config,
            rating: 0,
            parent: 0,
        }
    }

    pub fn child(config: Configuration, parent: usize) -> Self {
        Self {
            config,
            rating: 0,
            parent,
        }
    }
}

impl Rated for TreeNode {
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

/// Offsets from the root down to `node`, root first.
///
/// Stops at the first self-parented node, and after `nodes.len()` steps should
/// the parent links ever form a cycle.
pub fn path_to_root(nodes: &[TreeNode], node: usize) -> Vec<usize> {
    let mut path = Vec::new();
    if node >= nodes.len() {
        return path;
    }
    let mut current = node;
    for _ in 0..nodes.len() {
        path.push(current);
        let parent = nodes[current].parent;
        if parent == current || parent >= nodes.len() {
            break;
        }
        current = parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_path_to_root_follows_parents() {
        let c = |x: f64| Configuration::from_position(DVec3::new(x, 0.0, 0.0));
        let nodes = vec![
            TreeNode::root(c(0.0)),
            TreeNode::child(c(1.0), 0),
            TreeNode::child(c(2.0), 0),
            TreeNode::child(c(3.0), 2),
        ];
        assert_eq!(path_to_root(&nodes, 3), vec![0, 2, 3]);
        assert_eq!(path_to_root(&nodes, 0), vec![0]);
        assert!(path_to_root(&nodes, 9).is_empty());
    }
}
