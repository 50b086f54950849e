use std::collections::HashSet;

use anyhow::{anyhow, bail, Result};
use phylotree::tree::Tree as PhyloTree;

pub mod distance;
pub mod prune;
pub mod root;

pub type NodeId = usize;

pub const DEFAULT_BRANCH_LENGTH: f64 = 1.0;

/// Rooted phylogenetic tree with an explicit node list.
///
/// Node ids are indices into `nodes`. The tree is parsed once per render,
/// rerooted and ladderized in place, pruned after clustering, and discarded.
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeId,
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Parse a Newick tree into an arena.
    ///
    /// Leaf names are required and must be unique; they key every side table
    /// downstream.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let phylo = PhyloTree::from_newick(newick)
            .map_err(|err| anyhow!("failed to parse newick tree: {err}"))?;

        let root = phylo
            .get_root()
            .map_err(|err| anyhow!("newick tree has no root: {err}"))?;

        let mut nodes = Vec::with_capacity(phylo.size());
        for idx in 0..phylo.size() {
            let node = phylo
                .get(&idx)
                .map_err(|err| anyhow!("newick tree has a gap at node {idx}: {err}"))?;
            let mut tree_node = TreeNode::new(node.id, node.name.clone(), node.parent_edge);
            tree_node.parent = node.parent;
            tree_node.children = node.children.clone();
            nodes.push(tree_node);
        }

        let tree = Self { root, nodes };
        tree.validate_leaf_names()?;
        Ok(tree)
    }

    fn validate_leaf_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in self.nodes.iter().filter(|node| node.is_leaf()) {
            match &node.name {
                None => bail!("tree contains an unnamed leaf (node {})", node.id),
                Some(name) => {
                    if !seen.insert(name.as_str()) {
                        bail!("tree contains duplicate leaf name: {name}");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Leaves in tree order: depth-first, children in their current order.
    /// Clustering and marker layout both depend on this order being stable.
    pub fn leaves_in_order(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                order.push(id);
            }
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Find any node (leaf or internal) by name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.name.as_deref() == Some(name))
            .map(|node| node.id)
    }

    /// Number of leaf descendants for each node.
    fn clade_sizes(&self) -> Vec<usize> {
        fn fill(node_id: NodeId, nodes: &[TreeNode], sizes: &mut [usize]) -> usize {
            let node = &nodes[node_id];
            if node.is_leaf() {
                sizes[node_id] = 1;
                return 1;
            }
            let mut size = 0;
            for &child_id in &node.children {
                size += fill(child_id, nodes, sizes);
            }
            sizes[node_id] = size;
            size
        }

        let mut sizes = vec![0; self.nodes.len()];
        fill(self.root, &self.nodes, &mut sizes);
        sizes
    }

    /// Reorder every node's children by clade size, smallest first.
    /// The sort is stable, so ties keep their parse order.
    pub fn ladderize(&mut self) {
        let sizes = self.clade_sizes();
        for node in &mut self.nodes {
            if node.children.len() > 1 {
                node.children.sort_by(|&a, &b| sizes[a].cmp(&sizes[b]));
            }
        }
    }

    /// Serialize back to Newick, e.g. for the render scene.
    pub fn to_newick(&self) -> String {
        fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
            let node = &tree.nodes[id];
            if !node.children.is_empty() {
                out.push('(');
                for (i, &child) in node.children.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_node(tree, child, out);
                }
                out.push(')');
            }
            if let Some(name) = &node.name {
                out.push_str(name);
            }
            if let Some(length) = node.length {
                out.push(':');
                out.push_str(&format!("{length}"));
            }
        }

        let mut out = String::new();
        write_node(self, self.root, &mut out);
        out.push(';');
        out
    }
}

/// Node within a phylogenetic tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub length: Option<f64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn new(id: NodeId, name: Option<String>, length: Option<f64>) -> Self {
        Self {
            id,
            name,
            length,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_newick() {
        let tree = Tree::from_newick("(A:0.1,B:0.2);").unwrap();
        assert_eq!(tree.leaf_count(), 2);
        assert!(tree.node(tree.root).is_root());
    }

    #[test]
    fn rejects_duplicate_leaf_names() {
        let err = Tree::from_newick("(A:0.1,(A:0.2,B:0.3):0.1);").unwrap_err();
        assert!(err.to_string().contains("duplicate leaf name"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Tree::from_newick("not a tree").is_err());
    }

    #[test]
    fn leaves_follow_child_order() {
        let tree = Tree::from_newick("((A:1,B:1):1,(C:1,(D:1,E:1):1):1);").unwrap();
        let names: Vec<_> = tree
            .leaves_in_order()
            .iter()
            .map(|&id| tree.node(id).name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn ladderize_puts_small_clades_first() {
        let mut tree = Tree::from_newick("((A:1,B:1,C:1):1,D:1,(E:1,F:1):1);").unwrap();
        tree.ladderize();
        let names: Vec<_> = tree
            .leaves_in_order()
            .iter()
            .map(|&id| tree.node(id).name.clone().unwrap())
            .collect();
        // singleton leaf, then the pair, then the triple
        assert_eq!(names, vec!["D", "E", "F", "A", "B", "C"]);
    }

    #[test]
    fn newick_round_trip_preserves_topology() {
        let tree = Tree::from_newick("((A:1,B:2):0.5,C:3);").unwrap();
        let rewritten = Tree::from_newick(&tree.to_newick()).unwrap();
        assert_eq!(rewritten.leaf_count(), 3);
        assert_eq!(
            tree.leaves_in_order().len(),
            rewritten.leaves_in_order().len()
        );
    }
}
