use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::warn;

use crate::tree::Tree;

pub mod tables;

/// Load the tree to render from a Newick-family file
/// (`.tre`/`.nwk`/`.tree`/`.newick`/`.nhx`).
///
/// A file may hold several `;`-terminated trees; one render consumes one
/// tree, so only the first is used.
pub fn load_tree(path: &Path) -> Result<Tree> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read tree file: {}", path.display()))?;

    let mut statements = raw
        .split_inclusive(';')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty() && chunk.ends_with(';'));

    let Some(first) = statements.next() else {
        bail!("tree file did not contain any trees: {}", path.display());
    };

    let extra = statements.count();
    if extra > 0 {
        warn!(
            "{} contains {extra} additional tree(s); rendering the first only",
            path.display()
        );
    }

    Tree::from_newick(&normalise_newick(first))
}

fn normalise_newick(raw: &str) -> String {
    let mut cleaned = raw.trim().trim_end_matches(';').trim().to_owned();
    cleaned.push(';');
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tree(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_first_tree() {
        let file = write_tree("(A:0.1,B:0.2);\n(C:0.3,D:0.4);\n");
        let tree = load_tree(file.path()).unwrap();
        assert_eq!(tree.leaf_count(), 2);
        assert!(tree.find_by_name("A").is_some());
    }

    #[test]
    fn missing_semicolon_means_no_tree() {
        let file = write_tree("(A:0.1,B:0.2)");
        assert!(load_tree(file.path()).is_err());
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = write_tree("   \n");
        let err = load_tree(file.path()).unwrap_err();
        assert!(err.to_string().contains("did not contain any trees"));
    }

    #[test]
    fn parse_failure_is_fatal() {
        let file = write_tree("((A:0.1,B;");
        assert!(load_tree(file.path()).is_err());
    }
}
