use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::classify::{ClassificationSpec, TypeRuleSpec};

#[derive(Debug, Deserialize)]
struct TypeRow {
    #[serde(rename = "SeqType")]
    seq_type: String,
    #[serde(rename = "Parser")]
    parser: String,
    #[serde(rename = "Color")]
    color: String,
    #[serde(rename = "Shape")]
    shape: String,
}

/// Read the ordered sequence-type table. Row order is match priority.
pub fn load_type_rules(path: &Path) -> Result<Vec<TypeRuleSpec>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open type table: {}", path.display()))?;

    let mut specs = Vec::new();
    for row in reader.deserialize() {
        let row: TypeRow =
            row.with_context(|| format!("malformed type table row in {}", path.display()))?;
        specs.push(TypeRuleSpec {
            label: row.seq_type,
            pattern: row.parser,
            color: row.color,
            shape: row.shape,
        });
    }

    if specs.is_empty() {
        bail!("type table {} has no rows", path.display());
    }
    Ok(specs)
}

#[derive(Debug, Deserialize)]
struct ClassificationRow {
    #[serde(rename = "Classification")]
    classification: String,
    #[serde(rename = "Parser")]
    parser: String,
}

/// Read the binary classification table: first row is the alternate
/// (square) class with its pattern, second row the default (round) class
/// whose pattern cell is a placeholder and is ignored.
pub fn load_classification(path: &Path) -> Result<ClassificationSpec> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open classification table: {}", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: ClassificationRow = row.with_context(|| {
            format!("malformed classification table row in {}", path.display())
        })?;
        rows.push(row);
    }

    if rows.len() != 2 {
        bail!(
            "classification table {} must have exactly two rows, found {}",
            path.display(),
            rows.len()
        );
    }

    let default = rows.pop().map(|row| row.classification);
    let alternate = rows.pop();
    let (Some(default_label), Some(alternate)) = (default, alternate) else {
        bail!("classification table {} is incomplete", path.display());
    };

    Ok(ClassificationSpec {
        alternate_label: alternate.classification,
        alternate_pattern: alternate.parser,
        default_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_type_rows_in_order() {
        let file = write_csv(
            "SeqType,Parser,Color,Shape\n\
             Rebound,22,#FFA600,Circle\n\
             Control IgG Outgrowth,UDB,#63BFCF,Triangle\n",
        );
        let specs = load_type_rules(file.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].label, "Rebound");
        assert_eq!(specs[1].pattern, "UDB");
        assert_eq!(specs[1].shape, "Triangle");
    }

    #[test]
    fn empty_type_table_is_rejected() {
        let file = write_csv("SeqType,Parser,Color,Shape\n");
        assert!(load_type_rules(file.path()).is_err());
    }

    #[test]
    fn reads_classification_pair() {
        let file = write_csv(
            "Classification,Parser,Shape\n\
             Plasma,PLA,Square\n\
             PBMC,Default (Do Not Edit),Circle\n",
        );
        let spec = load_classification(file.path()).unwrap();
        assert_eq!(spec.alternate_label, "Plasma");
        assert_eq!(spec.alternate_pattern, "PLA");
        assert_eq!(spec.default_label, "PBMC");
    }

    #[test]
    fn classification_needs_exactly_two_rows() {
        let file = write_csv("Classification,Parser\nPlasma,PLA\n");
        let err = load_classification(file.path()).unwrap_err();
        assert!(err.to_string().contains("exactly two rows"));
    }
}
