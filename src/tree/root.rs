use log::warn;

use super::{NodeId, Tree, TreeNode, DEFAULT_BRANCH_LENGTH};

/// How the tree should be rooted before clustering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rooting {
    Midpoint,
    Outgroup(String),
}

impl Rooting {
    /// `"midpoint"` (any case) or the empty string select midpoint rooting;
    /// anything else names an outgroup node.
    pub fn from_setting(setting: &str) -> Self {
        let trimmed = setting.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("midpoint") {
            Rooting::Midpoint
        } else {
            Rooting::Outgroup(trimmed.to_string())
        }
    }
}

/// Root `tree` according to `rooting` and return the rerooted tree.
///
/// An outgroup name that does not resolve to a node, or that names the
/// current root, falls back to midpoint rooting rather than failing.
pub fn root_tree(tree: &Tree, rooting: &Rooting) -> Tree {
    match rooting {
        Rooting::Outgroup(name) => match tree.find_by_name(name) {
            Some(id) if !tree.node(id).is_root() => {
                let length = tree.node(id).length.unwrap_or(DEFAULT_BRANCH_LENGTH);
                reroot_on_edge(tree, id, length / 2.0, length / 2.0)
            }
            Some(_) => {
                warn!("outgroup {name:?} is the current root; using midpoint rooting");
                midpoint_root(tree)
            }
            None => {
                warn!("outgroup {name:?} not found in tree; using midpoint rooting");
                midpoint_root(tree)
            }
        },
        Rooting::Midpoint => midpoint_root(tree),
    }
}

/// Place the root at the point balancing the two halves of the longest
/// tip-to-tip path.
fn midpoint_root(tree: &Tree) -> Tree {
    let adjacency = build_adjacency(tree);
    let start = match tree.nodes.iter().find(|node| node.is_leaf()) {
        Some(node) => node.id,
        None => return tree.clone(),
    };

    let (first_leaf, _, _) = farthest_leaf(&adjacency, start);
    let (_, diameter, path) = farthest_leaf(&adjacency, first_leaf);

    if path.len() < 2 || diameter <= f64::EPSILON {
        return tree.clone();
    }

    let half = diameter / 2.0;
    let mut traversed = 0.0;
    for window in path.windows(2) {
        let (a, b) = (window[0], window[1]);
        let length = edge_length(tree, a, b);
        if traversed + length >= half {
            let offset = half - traversed;
            // The edge exists in the rooted arena one way or the other;
            // express the split relative to its child end.
            return if tree.node(b).parent == Some(a) {
                reroot_on_edge(tree, b, length - offset, offset)
            } else {
                reroot_on_edge(tree, a, offset, length - offset)
            };
        }
        traversed += length;
    }

    tree.clone()
}

/// Insert a virtual root on the edge above `child`, with `child_len` on the
/// child side and `parent_len` on the parent side, then reorient every
/// parent/child relation away from the new root.
fn reroot_on_edge(tree: &Tree, child: NodeId, child_len: f64, parent_len: f64) -> Tree {
    let parent = match tree.node(child).parent {
        Some(parent) => parent,
        None => return tree.clone(),
    };

    let mut nodes = tree.nodes.clone();
    let new_root = nodes.len();
    nodes.push(TreeNode::new(new_root, None, None));

    // Undirected adjacency, skipping the edge being split.
    let mut adjacency: Vec<Vec<(NodeId, f64)>> = vec![Vec::new(); nodes.len()];
    for node in &tree.nodes {
        if let Some(p) = node.parent {
            if node.id == child && p == parent {
                continue;
            }
            let length = node.length.unwrap_or(DEFAULT_BRANCH_LENGTH);
            adjacency[node.id].push((p, length));
            adjacency[p].push((node.id, length));
        }
    }
    adjacency[new_root].push((child, child_len));
    adjacency[child].push((new_root, child_len));
    adjacency[new_root].push((parent, parent_len));
    adjacency[parent].push((new_root, parent_len));

    orient(&mut nodes, new_root, None, &adjacency);

    Tree {
        root: new_root,
        nodes,
    }
}

fn orient(
    nodes: &mut [TreeNode],
    node: NodeId,
    parent: Option<(NodeId, f64)>,
    adjacency: &[Vec<(NodeId, f64)>],
) {
    let neighbors: Vec<(NodeId, f64)> = adjacency[node]
        .iter()
        .filter(|(next, _)| Some(*next) != parent.map(|(id, _)| id))
        .copied()
        .collect();

    nodes[node].parent = parent.map(|(id, _)| id);
    nodes[node].length = parent.map(|(_, length)| length);
    nodes[node].children = neighbors.iter().map(|(id, _)| *id).collect();

    for (next, length) in neighbors {
        orient(nodes, next, Some((node, length)), adjacency);
    }
}

fn build_adjacency(tree: &Tree) -> Vec<Vec<(NodeId, f64)>> {
    let mut adjacency = vec![Vec::new(); tree.nodes.len()];
    for node in &tree.nodes {
        if let Some(parent) = node.parent {
            let length = node.length.unwrap_or(DEFAULT_BRANCH_LENGTH);
            adjacency[node.id].push((parent, length));
            adjacency[parent].push((node.id, length));
        }
    }
    adjacency
}

fn edge_length(tree: &Tree, a: NodeId, b: NodeId) -> f64 {
    if tree.node(b).parent == Some(a) {
        tree.node(b).length.unwrap_or(DEFAULT_BRANCH_LENGTH)
    } else {
        tree.node(a).length.unwrap_or(DEFAULT_BRANCH_LENGTH)
    }
}

/// Farthest leaf from `start` over the undirected tree, with the path to it.
fn farthest_leaf(
    adjacency: &[Vec<(NodeId, f64)>],
    start: NodeId,
) -> (NodeId, f64, Vec<NodeId>) {
    fn dfs(
        node: NodeId,
        parent: Option<NodeId>,
        distance: f64,
        adjacency: &[Vec<(NodeId, f64)>],
        parents: &mut [Option<NodeId>],
        best: &mut (NodeId, f64),
    ) {
        parents[node] = parent;
        let mut descended = false;
        for &(next, weight) in &adjacency[node] {
            if Some(next) == parent {
                continue;
            }
            descended = true;
            dfs(next, Some(node), distance + weight, adjacency, parents, best);
        }
        if !descended && parent.is_some() && distance > best.1 {
            *best = (node, distance);
        }
    }

    let mut parents: Vec<Option<NodeId>> = vec![None; adjacency.len()];
    let mut best = (start, -1.0);
    dfs(start, None, 0.0, adjacency, &mut parents, &mut best);

    if best.1 < 0.0 {
        return (start, 0.0, vec![start]);
    }

    let mut path = vec![best.0];
    let mut current = best.0;
    while let Some(parent) = parents[current] {
        current = parent;
        path.push(current);
    }
    path.reverse();

    (best.0, best.1, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::distance::DistanceOracle;

    fn leaf_id(tree: &Tree, name: &str) -> NodeId {
        tree.find_by_name(name).unwrap()
    }

    fn depth(tree: &Tree, mut id: NodeId) -> f64 {
        let mut total = 0.0;
        while let Some(parent) = tree.node(id).parent {
            total += tree.node(id).length.unwrap_or(DEFAULT_BRANCH_LENGTH);
            id = parent;
        }
        total
    }

    #[test]
    fn midpoint_balances_longest_path() {
        let tree = Tree::from_newick("((A:1,B:5):1,C:2);").unwrap();
        let rooted = root_tree(&tree, &Rooting::Midpoint);
        // diameter is B..C = 8, so both ends sit 4 from the new root
        assert!((depth(&rooted, leaf_id(&rooted, "B")) - 4.0).abs() < 1e-9);
        assert!((depth(&rooted, leaf_id(&rooted, "C")) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rerooting_preserves_leaf_distances() {
        let tree = Tree::from_newick("((A:0.3,B:0.9):0.2,(C:0.4,D:1.1):0.6);").unwrap();
        let before = DistanceOracle::new(&tree);
        let rooted = root_tree(&tree, &Rooting::Midpoint);
        let after = DistanceOracle::new(&rooted);

        for a in ["A", "B", "C", "D"] {
            for b in ["A", "B", "C", "D"] {
                let d0 = before.distance(leaf_id(&tree, a), leaf_id(&tree, b));
                let d1 = after.distance(leaf_id(&rooted, a), leaf_id(&rooted, b));
                assert!((d0 - d1).abs() < 1e-9, "{a}..{b}: {d0} vs {d1}");
            }
        }
    }

    #[test]
    fn named_outgroup_splits_its_branch() {
        let tree = Tree::from_newick("((A:1,B:1):1,C:4);").unwrap();
        let rooted = root_tree(&tree, &Rooting::Outgroup("C".into()));
        let c = leaf_id(&rooted, "C");
        assert_eq!(rooted.node(c).parent, Some(rooted.root));
        assert!((rooted.node(c).length.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_outgroup_falls_back_to_midpoint() {
        let tree = Tree::from_newick("((A:1,B:5):1,C:2);").unwrap();
        let rooted = root_tree(&tree, &Rooting::Outgroup("NodeX".into()));
        // same outcome as explicit midpoint rooting, no error raised
        assert!((depth(&rooted, leaf_id(&rooted, "B")) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rooting_setting_parses() {
        assert_eq!(Rooting::from_setting("midpoint"), Rooting::Midpoint);
        assert_eq!(Rooting::from_setting(""), Rooting::Midpoint);
        assert_eq!(
            Rooting::from_setting("NodeA"),
            Rooting::Outgroup("NodeA".into())
        );
    }
}
