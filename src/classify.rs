use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::tree::Tree;

/// Label and color used for leaves no type rule matches.
pub const UNMATCHED_LABEL: &str = "Undefined Sequence";
pub const UNMATCHED_COLOR: &str = "black";

/// One sequence-type rule before compilation, as read from the type table.
#[derive(Debug, Clone)]
pub struct TypeRuleSpec {
    pub label: String,
    pub pattern: String,
    pub color: String,
    pub shape: String,
}

/// The optional binary classification axis, as read from its table.
#[derive(Debug, Clone)]
pub struct ClassificationSpec {
    pub alternate_label: String,
    pub alternate_pattern: String,
    pub default_label: String,
}

/// Compiled sequence-type rule. `shape` stays verbatim; only the shape
/// patcher interprets it.
#[derive(Debug)]
pub struct TypeRule {
    pub label: String,
    pub pattern: Regex,
    pub color: String,
    pub shape: String,
}

/// Ordered rule table. Type slots are indices into `rules`, with one extra
/// trailing slot for the unmatched sentinel.
#[derive(Debug)]
pub struct TypeTable {
    pub rules: Vec<TypeRule>,
}

impl TypeTable {
    pub fn compile(specs: &[TypeRuleSpec]) -> Result<Self> {
        if specs.is_empty() {
            bail!("sequence type table is empty");
        }
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.label.trim().is_empty()
                || spec.pattern.trim().is_empty()
                || spec.color.trim().is_empty()
                || spec.shape.trim().is_empty()
            {
                bail!("sequence type table row {:?} has an empty cell", spec.label);
            }
            let pattern = Regex::new(&spec.pattern)
                .with_context(|| format!("invalid pattern for type {:?}", spec.label))?;
            rules.push(TypeRule {
                label: spec.label.clone(),
                pattern,
                color: spec.color.clone(),
                shape: spec.shape.clone(),
            });
        }
        Ok(Self { rules })
    }

    /// Number of type slots including the unmatched sentinel.
    pub fn slots(&self) -> usize {
        self.rules.len() + 1
    }

    pub fn unmatched_slot(&self) -> usize {
        self.rules.len()
    }

    pub fn label_of(&self, slot: usize) -> &str {
        self.rules
            .get(slot)
            .map(|rule| rule.label.as_str())
            .unwrap_or(UNMATCHED_LABEL)
    }

    pub fn color_of(&self, slot: usize) -> &str {
        self.rules
            .get(slot)
            .map(|rule| rule.color.as_str())
            .unwrap_or(UNMATCHED_COLOR)
    }

    /// First rule whose pattern matches anywhere in the leaf name wins.
    pub fn match_leaf(&self, leaf_name: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| rule.pattern.is_match(leaf_name))
    }
}

/// Secondary binary axis: governs marker outline family, independent of the
/// type color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Default,
    Alternate,
}

#[derive(Debug)]
pub struct ClassificationRule {
    pub alternate_label: String,
    pub default_label: String,
    pattern: Regex,
}

impl ClassificationRule {
    pub fn compile(spec: &ClassificationSpec) -> Result<Self> {
        if spec.alternate_label.trim().is_empty() || spec.alternate_pattern.trim().is_empty() {
            bail!("classification table has an empty cell");
        }
        let pattern = Regex::new(&spec.alternate_pattern).with_context(|| {
            format!(
                "invalid pattern for classification {:?}",
                spec.alternate_label
            )
        })?;
        Ok(Self {
            alternate_label: spec.alternate_label.clone(),
            default_label: spec.default_label.clone(),
            pattern,
        })
    }

    pub fn classify(&self, leaf_name: &str) -> Classification {
        if self.pattern.is_match(leaf_name) {
            Classification::Alternate
        } else {
            Classification::Default
        }
    }
}

/// Per-leaf annotation produced by the classifier. Weight and absorption
/// state live in the cluster table, keyed by the same leaf name.
#[derive(Debug, Clone, Copy)]
pub struct LeafAnnotation {
    /// Slot in the type table; `None` is the unmatched sentinel.
    pub seq_type: Option<usize>,
    pub classification: Classification,
}

impl LeafAnnotation {
    pub fn type_slot(&self, table: &TypeTable) -> usize {
        self.seq_type.unwrap_or_else(|| table.unmatched_slot())
    }
}

/// Classify every leaf of the tree. Pure per leaf: same table, same answer.
pub fn annotate_leaves(
    tree: &Tree,
    types: &TypeTable,
    classes: Option<&ClassificationRule>,
) -> HashMap<String, LeafAnnotation> {
    let mut annotations = HashMap::new();
    for id in tree.leaves_in_order() {
        let Some(name) = tree.node(id).name.as_deref() else {
            continue;
        };
        let seq_type = types.match_leaf(name);
        let classification = classes
            .map(|rule| rule.classify(name))
            .unwrap_or(Classification::Default);
        annotations.insert(
            name.to_string(),
            LeafAnnotation {
                seq_type,
                classification,
            },
        );
    }
    annotations
}

/// True when at least one leaf carries the unmatched sentinel; the marker
/// layout and legend only show the sentinel column in that case.
pub fn any_unmatched(annotations: &HashMap<String, LeafAnnotation>) -> bool {
    annotations.values().any(|a| a.seq_type.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(label: &str, pattern: &str, color: &str) -> TypeRuleSpec {
        TypeRuleSpec {
            label: label.into(),
            pattern: pattern.into(),
            color: color.into(),
            shape: "Circle".into(),
        }
    }

    #[test]
    fn first_match_wins_in_table_order() {
        let table = TypeTable::compile(&[
            spec("Wildtype", "WT", "#FFA600"),
            spec("Mutant", "Mut", "#63BFCF"),
        ])
        .unwrap();
        // "Mut" also appears in the name, but the earlier rule matches first
        assert_eq!(table.match_leaf("sample_WT_01_Mut"), Some(0));
        assert_eq!(table.match_leaf("sample_Mut_02"), Some(1));
        assert_eq!(table.match_leaf("sample_none"), None);
    }

    #[test]
    fn classification_is_independent_of_type() {
        let rule = ClassificationRule::compile(&ClassificationSpec {
            alternate_label: "Plasma".into(),
            alternate_pattern: "PLA".into(),
            default_label: "PBMC".into(),
        })
        .unwrap();
        assert_eq!(rule.classify("seq_PLA_1"), Classification::Alternate);
        assert_eq!(rule.classify("seq_PBMC_1"), Classification::Default);
    }

    #[test]
    fn annotation_is_idempotent() {
        let tree = Tree::from_newick("((s_WT_1:1,s_WT_2:1):1,s_other:1);").unwrap();
        let table = TypeTable::compile(&[spec("Wildtype", "WT", "#FFA600")]).unwrap();

        let first = annotate_leaves(&tree, &table, None);
        let second = annotate_leaves(&tree, &table, None);
        for (name, annotation) in &first {
            assert_eq!(annotation.seq_type, second[name].seq_type);
        }
        assert_eq!(first["s_WT_1"].seq_type, Some(0));
        assert!(first["s_other"].seq_type.is_none());
        assert!(any_unmatched(&first));
    }

    #[test]
    fn empty_cells_are_rejected() {
        let err = TypeTable::compile(&[spec("Wildtype", "", "#FFA600")]).unwrap_err();
        assert!(err.to_string().contains("empty cell"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(TypeTable::compile(&[spec("Broken", "AUB(", "#DC3F93")]).is_err());
    }

    #[test]
    fn unmatched_slot_maps_to_sentinel_color() {
        let table = TypeTable::compile(&[spec("Rebound", "22", "#FFA600")]).unwrap();
        assert_eq!(table.color_of(table.unmatched_slot()), UNMATCHED_COLOR);
        assert_eq!(table.label_of(table.unmatched_slot()), UNMATCHED_LABEL);
    }
}
