use std::collections::HashSet;

use super::{NodeId, Tree, TreeNode, DEFAULT_BRANCH_LENGTH};

/// Remove every leaf whose name is not in `keep`, preserving the root-to-leaf
/// path length of each survivor.
///
/// Internal nodes left with a single surviving child are spliced out and
/// their branch length folded into the child's edge. The root is never
/// spliced, so depths measured from it are unchanged.
pub fn prune_to(tree: &Tree, keep: &HashSet<String>) -> Tree {
    let mut marked = vec![false; tree.nodes.len()];
    mark_kept(tree, tree.root, keep, &mut marked);

    let mut nodes = Vec::new();
    let root_length = tree.node(tree.root).length;
    let root = build(tree, &marked, tree.root, None, root_length, &mut nodes);
    Tree { root, nodes }
}

fn mark_kept(tree: &Tree, id: NodeId, keep: &HashSet<String>, marked: &mut [bool]) -> bool {
    let node = tree.node(id);
    let hit = if node.is_leaf() {
        node.name.as_deref().is_some_and(|name| keep.contains(name))
    } else {
        let mut any = false;
        for &child in &node.children {
            if mark_kept(tree, child, keep, marked) {
                any = true;
            }
        }
        any
    };
    marked[id] = hit;
    hit
}

fn build(
    tree: &Tree,
    marked: &[bool],
    mut old_id: NodeId,
    parent: Option<NodeId>,
    mut length: Option<f64>,
    nodes: &mut Vec<TreeNode>,
) -> NodeId {
    loop {
        let node = tree.node(old_id);
        let kept: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|&child| marked[child])
            .collect();

        // Degree-1 internal below the root: splice, folding its length
        // into the surviving child's edge.
        if parent.is_some() && !node.is_leaf() && kept.len() == 1 {
            let child = kept[0];
            let child_length = tree.node(child).length.unwrap_or(DEFAULT_BRANCH_LENGTH);
            let own_length = length.unwrap_or(DEFAULT_BRANCH_LENGTH);
            length = Some(own_length + child_length);
            old_id = child;
            continue;
        }

        let new_id = nodes.len();
        let mut new_node = TreeNode::new(new_id, node.name.clone(), length);
        new_node.parent = parent;
        nodes.push(new_node);

        for &child in &kept {
            let child_length = tree.node(child).length;
            let built = build(tree, marked, child, Some(new_id), child_length, nodes);
            nodes[new_id].children.push(built);
        }

        return new_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn depth(tree: &Tree, name: &str) -> f64 {
        let mut id = tree.find_by_name(name).unwrap();
        let mut total = 0.0;
        while let Some(parent) = tree.node(id).parent {
            total += tree.node(id).length.unwrap_or(DEFAULT_BRANCH_LENGTH);
            id = parent;
        }
        total
    }

    #[test]
    fn keeps_only_requested_leaves() {
        let tree = Tree::from_newick("((A:1,B:1):1,(C:1,D:1):1);").unwrap();
        let pruned = prune_to(&tree, &keep(&["A", "C"]));
        let names: Vec<_> = pruned
            .leaves_in_order()
            .iter()
            .map(|&id| pruned.node(id).name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn preserves_root_to_leaf_distances() {
        let tree =
            Tree::from_newick("(((A:0.1,B:0.2):0.3,C:0.7):0.4,(D:0.5,E:0.6):0.8);").unwrap();
        let survivors = ["A", "D"];
        let before: Vec<f64> = survivors.iter().map(|name| depth(&tree, name)).collect();

        let pruned = prune_to(&tree, &keep(&survivors));
        let after: Vec<f64> = survivors.iter().map(|name| depth(&pruned, name)).collect();

        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() < 1e-9, "depth changed: {b} -> {a}");
        }
    }

    #[test]
    fn collapses_chains_left_by_pruning() {
        let tree = Tree::from_newick("(((A:1,B:1):1,C:1):1,D:1);").unwrap();
        let pruned = prune_to(&tree, &keep(&["A", "D"]));

        for node in &pruned.nodes {
            if !node.is_leaf() && !node.is_root() {
                assert!(
                    node.children.len() >= 2,
                    "internal node {} not collapsed",
                    node.id
                );
            }
        }
        // A's path (1+1+1) survives as a single spliced edge under the root
        assert!((depth(&pruned, "A") - 3.0).abs() < 1e-9);
    }

    #[test]
    fn pruning_everything_but_leaves_is_noop_on_depths() {
        let tree = Tree::from_newick("((A:1,B:2):3,C:4);").unwrap();
        let pruned = prune_to(&tree, &keep(&["A", "B", "C"]));
        for name in ["A", "B", "C"] {
            assert!((depth(&tree, name) - depth(&pruned, name)).abs() < 1e-9);
        }
        assert_eq!(pruned.leaf_count(), 3);
    }
}
