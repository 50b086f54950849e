use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;

use crate::classify::{self, ClassificationRule, TypeTable};
use crate::cluster;
use crate::io::{self, tables};
use crate::markers;
use crate::patch;
use crate::render::{self, command::CommandEngine, RenderEngine};
use crate::tree::distance::DistanceOracle;
use crate::tree::prune;
use crate::tree::root::{self, Rooting};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "clonetree",
    about = "Collapses clonal sequences in a phylogenetic tree into stacked markers and renders the result."
)]
pub struct AppConfig {
    /// Tree file to load (Newick family: .tre/.nwk/.tree/.newick/.nhx).
    #[arg(value_name = "TREE_FILE")]
    pub tree_path: PathBuf,

    /// Sequence type table CSV with columns SeqType, Parser, Color, Shape.
    #[arg(short = 't', long = "types", value_name = "FILE")]
    pub types_path: PathBuf,

    /// Optional binary classification table CSV (Classification, Parser).
    #[arg(long = "classes", value_name = "FILE")]
    pub classes_path: Option<PathBuf>,

    /// Branch length display scale.
    #[arg(long, default_value_t = 10_000.0)]
    pub scale: f64,

    /// Clonality distance threshold; leaves within it collapse (inclusive).
    #[arg(long, default_value_t = 1e-6)]
    pub threshold: f64,

    /// Show the leading leaf's sequence name next to its markers.
    #[arg(long)]
    pub show_leaf_names: bool,

    /// Outgroup node name, or "midpoint".
    #[arg(long, default_value = "midpoint")]
    pub outgroup: String,

    /// Directory receiving tree-scene.json, tree-file.svg and tree-file.png.
    #[arg(short = 'o', long = "out-dir", value_name = "DIR", default_value = "data")]
    pub out_dir: PathBuf,

    /// External rendering command; invoked with the scene JSON, vector and
    /// raster output paths. Without it only the scene is written.
    #[arg(long = "render-with", value_name = "COMMAND")]
    pub render_with: Option<String>,
}

pub struct CloneTreeApp;

impl CloneTreeApp {
    /// One render: one tree, one settings bundle, no state kept across runs.
    pub fn run(config: &AppConfig) -> Result<()> {
        ensure!(config.scale > 0.0, "branch length scale must be positive");
        ensure!(
            config.threshold >= 0.0,
            "clonality threshold must be non-negative"
        );

        let specs = tables::load_type_rules(&config.types_path)?;
        let types = TypeTable::compile(&specs)?;
        let classes = match &config.classes_path {
            Some(path) => {
                let spec = tables::load_classification(path)?;
                Some(ClassificationRule::compile(&spec)?)
            }
            None => None,
        };

        let tree = io::load_tree(&config.tree_path)?;
        info!(
            "loaded tree with {} leaves from {}",
            tree.leaf_count(),
            config.tree_path.display()
        );

        let rooting = Rooting::from_setting(&config.outgroup);
        let mut tree = root::root_tree(&tree, &rooting);
        tree.ladderize();

        let annotations = classify::annotate_leaves(&tree, &types, classes.as_ref());
        let oracle = DistanceOracle::new(&tree);
        let clustering =
            cluster::collapse_clones(&tree, &oracle, &annotations, &types, config.threshold);

        let pruned = prune::prune_to(&tree, &clustering.retained_names());
        let include_unmatched = classify::any_unmatched(&annotations);
        let stacks =
            markers::layout_markers(&pruned, &annotations, &clustering, &types, include_unmatched);
        let total_markers: usize = stacks.iter().map(|stack| stack.total_markers()).sum();
        info!(
            "{} retained leaves carry {total_markers} markers",
            stacks.len()
        );
        let legend = markers::build_legend(&types, include_unmatched, classes.as_ref());

        let scene = render::RenderScene {
            newick: pruned.to_newick(),
            leaves: stacks,
            legend,
            branch_scale: config.scale,
            show_leaf_names: config.show_leaf_names,
        };

        fs::create_dir_all(&config.out_dir).with_context(|| {
            format!(
                "failed to create output directory: {}",
                config.out_dir.display()
            )
        })?;
        render::write_scene(&scene, &config.out_dir.join(render::SCENE_FILENAME))?;

        if let Some(program) = &config.render_with {
            let vector = config.out_dir.join(render::VECTOR_FILENAME);
            let raster = config.out_dir.join(render::RASTER_FILENAME);
            CommandEngine::new(program.clone()).render(&scene, &vector, &raster)?;

            let requests: Vec<(String, String)> = types
                .rules
                .iter()
                .map(|rule| (rule.color.clone(), rule.shape.clone()))
                .collect();
            patch::patch_file(&vector, &requests)?;
            info!("render written to {}", vector.display());
        } else {
            info!("no render engine configured; scene only");
        }

        Ok(())
    }
}
