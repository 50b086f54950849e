use std::collections::{HashMap, HashSet};

use log::info;

use crate::classify::{LeafAnnotation, TypeTable};
use crate::tree::distance::DistanceOracle;
use crate::tree::Tree;

/// Absorption counts for one leading leaf.
///
/// `cross` and `mismatch` are indexed by type slot (declared types in table
/// order, unmatched sentinel last). `mismatch` counts absorbed leaves whose
/// classification differs from the leading leaf's, including same-type ones.
#[derive(Debug, Clone)]
pub struct ClusterRecord {
    pub weight: u32,
    pub cross: Vec<u32>,
    pub mismatch: Vec<u32>,
}

impl ClusterRecord {
    fn new(slots: usize) -> Self {
        Self {
            weight: 0,
            cross: vec![0; slots],
            mismatch: vec![0; slots],
        }
    }

    /// Leaves absorbed into this leading leaf.
    pub fn absorbed(&self) -> u32 {
        self.weight + self.cross.iter().sum::<u32>()
    }
}

/// Output of the clustering pass: one record per retained leaf, keyed by
/// leaf name. Leaves without a record were absorbed and will be pruned.
#[derive(Debug)]
pub struct Clustering {
    pub records: HashMap<String, ClusterRecord>,
}

impl Clustering {
    pub fn retained_names(&self) -> HashSet<String> {
        self.records.keys().cloned().collect()
    }
}

/// Single-pass greedy clone collapse.
///
/// Leaves are visited in tree order; the first unsettled leaf of a cluster
/// becomes its leading leaf and absorbs every later unsettled leaf within
/// `threshold` of it (inclusive). Absorption is judged against the leading
/// leaf only, not all pairs, so the grouping is traversal-order dependent.
pub fn collapse_clones(
    tree: &Tree,
    oracle: &DistanceOracle,
    annotations: &HashMap<String, LeafAnnotation>,
    types: &TypeTable,
    threshold: f64,
) -> Clustering {
    let leaves = tree.leaves_in_order();
    let mut settled = vec![false; tree.nodes.len()];
    let mut records = HashMap::new();

    for &leaf in &leaves {
        if settled[leaf] {
            continue;
        }
        let Some(name) = tree.node(leaf).name.as_deref() else {
            continue;
        };
        let me = annotations[name];
        let my_slot = me.type_slot(types);
        let mut record = ClusterRecord::new(types.slots());

        for &other in &leaves {
            if other == leaf || settled[other] {
                continue;
            }
            let distance = oracle.distance(leaf, other);
            if distance > threshold {
                continue;
            }
            settled[other] = true;

            let Some(other_name) = tree.node(other).name.as_deref() else {
                continue;
            };
            let them = annotations[other_name];
            let their_slot = them.type_slot(types);
            if their_slot == my_slot {
                record.weight += 1;
            } else {
                record.cross[their_slot] += 1;
            }
            if them.classification != me.classification {
                record.mismatch[their_slot] += 1;
            }
        }

        settled[leaf] = true;
        records.insert(name.to_string(), record);
    }

    info!(
        "clone collapse: {} leaves -> {} retained (threshold {threshold})",
        leaves.len(),
        records.len()
    );

    Clustering { records }
}
