use std::collections::HashMap;

use serde::Serialize;

use crate::classify::{Classification, ClassificationRule, LeafAnnotation, TypeTable};
use crate::cluster::Clustering;
use crate::tree::Tree;

/// Outline family of a marker. The default classification draws round
/// markers, the alternate one squares; fill color always comes from the
/// sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeFamily {
    Round,
    Square,
}

impl ShapeFamily {
    pub fn of(classification: Classification) -> Self {
        match classification {
            Classification::Default => ShapeFamily::Round,
            Classification::Alternate => ShapeFamily::Square,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ShapeFamily::Round => ShapeFamily::Square,
            ShapeFamily::Square => ShapeFamily::Round,
        }
    }
}

/// One stacked marker. Columns increase monotonically within a stack so the
/// renderer can never overlap markers; pixel geometry is the renderer's
/// concern.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerDraw {
    pub column: usize,
    pub family: ShapeFamily,
    pub color: String,
    pub type_label: String,
}

/// The retained leaf's own tip glyph.
#[derive(Debug, Clone, Serialize)]
pub struct NodeGlyph {
    pub family: ShapeFamily,
    pub color: String,
}

/// Draw plan for one retained leaf: the tip glyph plus one stacked marker
/// per absorbed leaf.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerStack {
    pub leaf: String,
    pub glyph: NodeGlyph,
    pub stack: Vec<MarkerDraw>,
}

impl MarkerStack {
    /// Glyph plus stack; equals 1 + leaves absorbed into this leaf.
    pub fn total_markers(&self) -> usize {
        1 + self.stack.len()
    }
}

/// Compute marker stacks for every retained leaf, in pruned-tree order.
///
/// Per leaf: own-type markers first (same classification, then opposite),
/// then each other declared type in table order, each split into the leading
/// leaf's family and the opposite family via the mismatch counts. The
/// unmatched sentinel column appears only when unmatched leaves exist
/// anywhere in the tree.
pub fn layout_markers(
    pruned: &Tree,
    annotations: &HashMap<String, LeafAnnotation>,
    clustering: &Clustering,
    types: &TypeTable,
    include_unmatched: bool,
) -> Vec<MarkerStack> {
    let mut stacks = Vec::new();

    for id in pruned.leaves_in_order() {
        let Some(name) = pruned.node(id).name.as_deref() else {
            continue;
        };
        let Some(record) = clustering.records.get(name) else {
            continue;
        };
        let annotation = annotations[name];
        let own = annotation.type_slot(types);
        let own_family = ShapeFamily::of(annotation.classification);

        let mut stack = Vec::with_capacity(record.absorbed() as usize);
        let mut column = 0;
        let mut push = |stack: &mut Vec<MarkerDraw>, count: u32, family: ShapeFamily, slot: usize| {
            for _ in 0..count {
                stack.push(MarkerDraw {
                    column,
                    family,
                    color: types.color_of(slot).to_string(),
                    type_label: types.label_of(slot).to_string(),
                });
                column += 1;
            }
        };

        // own-type clones, split by classification
        let own_mismatch = record.mismatch[own];
        push(&mut stack, record.weight - own_mismatch, own_family, own);
        push(&mut stack, own_mismatch, own_family.opposite(), own);

        // cross-type absorptions in table order, unmatched sentinel last
        for slot in 0..types.slots() {
            if slot == own {
                continue;
            }
            if slot == types.unmatched_slot() && !include_unmatched {
                continue;
            }
            let mismatch = record.mismatch[slot];
            push(&mut stack, record.cross[slot] - mismatch, own_family, slot);
            push(&mut stack, mismatch, own_family.opposite(), slot);
        }

        stacks.push(MarkerStack {
            leaf: name.to_string(),
            glyph: NodeGlyph {
                family: own_family,
                color: types.color_of(own).to_string(),
            },
            stack,
        });
    }

    stacks
}

/// Legend entry; swatch family mirrors how the original tool drew its legend
/// (round swatches per type, black round/square pair for the classification
/// axis).
#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
    pub family: ShapeFamily,
}

pub fn build_legend(
    types: &TypeTable,
    include_unmatched: bool,
    classes: Option<&ClassificationRule>,
) -> Vec<LegendEntry> {
    let mut entries = Vec::new();
    for slot in 0..types.rules.len() {
        entries.push(LegendEntry {
            label: types.label_of(slot).to_string(),
            color: types.color_of(slot).to_string(),
            family: ShapeFamily::Round,
        });
    }
    if include_unmatched {
        entries.push(LegendEntry {
            label: types.label_of(types.unmatched_slot()).to_string(),
            color: types.color_of(types.unmatched_slot()).to_string(),
            family: ShapeFamily::Round,
        });
    }
    if let Some(rule) = classes {
        entries.push(LegendEntry {
            label: rule.alternate_label.clone(),
            color: "black".into(),
            family: ShapeFamily::Square,
        });
        entries.push(LegendEntry {
            label: rule.default_label.clone(),
            color: "black".into(),
            family: ShapeFamily::Round,
        });
    }
    entries
}
