use super::{NodeId, Tree, DEFAULT_BRANCH_LENGTH};

/// Path distance between leaves of a fixed, already-rooted tree.
///
/// Depths are taken once at construction, so the oracle must be built after
/// rooting and before pruning. Queries have no side effects.
pub struct DistanceOracle {
    depths: Vec<f64>,
    levels: Vec<usize>,
    parents: Vec<Option<NodeId>>,
}

impl DistanceOracle {
    pub fn new(tree: &Tree) -> Self {
        let mut depths = vec![0.0; tree.nodes.len()];
        let mut levels = vec![0; tree.nodes.len()];
        let parents: Vec<Option<NodeId>> = tree.nodes.iter().map(|node| node.parent).collect();

        let mut stack = vec![tree.root];
        while let Some(id) = stack.pop() {
            for &child in &tree.node(id).children {
                depths[child] = depths[id]
                    + tree.node(child).length.unwrap_or(DEFAULT_BRANCH_LENGTH);
                levels[child] = levels[id] + 1;
                stack.push(child);
            }
        }

        Self {
            depths,
            levels,
            parents,
        }
    }

    /// Sum of branch lengths along the unique path between `a` and `b`.
    pub fn distance(&self, a: NodeId, b: NodeId) -> f64 {
        let lca = self.lowest_common_ancestor(a, b);
        self.depths[a] + self.depths[b] - 2.0 * self.depths[lca]
    }

    fn lowest_common_ancestor(&self, mut a: NodeId, mut b: NodeId) -> NodeId {
        while self.levels[a] > self.levels[b] {
            match self.parents[a] {
                Some(parent) => a = parent,
                None => break,
            }
        }
        while self.levels[b] > self.levels[a] {
            match self.parents[b] {
                Some(parent) => b = parent,
                None => break,
            }
        }
        while a != b {
            match (self.parents[a], self.parents[b]) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                }
                _ => break,
            }
        }
        a
    }
}
