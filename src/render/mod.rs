use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::markers::{LegendEntry, MarkerStack};

pub mod command;

/// Fixed output names inside the output directory. The vector image is the
/// one the shape patcher rewrites.
pub const VECTOR_FILENAME: &str = "tree-file.svg";
pub const RASTER_FILENAME: &str = "tree-file.png";
pub const SCENE_FILENAME: &str = "tree-scene.json";

/// Everything the external rendering engine needs to draw one styled tree:
/// the pruned topology, per-leaf glyphs and marker stacks, the legend, and
/// the display settings. Base-tree layout is entirely the engine's job.
#[derive(Debug, Serialize)]
pub struct RenderScene {
    pub newick: String,
    pub leaves: Vec<MarkerStack>,
    pub legend: Vec<LegendEntry>,
    pub branch_scale: f64,
    pub show_leaf_names: bool,
}

/// Seam to the external rendering engine. Implementations must have written
/// both images to stable storage before returning, since the patch step
/// reads the vector file back from disk.
pub trait RenderEngine {
    fn render(&self, scene: &RenderScene, vector: &Path, raster: &Path) -> Result<()>;
}

/// Write the scene description next to the images so the engine seam stays
/// inspectable.
pub fn write_scene(scene: &RenderScene, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(scene).context("failed to serialize render scene")?;
    fs::write(path, json).with_context(|| format!("failed to write scene: {}", path.display()))
}
