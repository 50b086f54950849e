use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::info;
use tempfile::NamedTempFile;

use super::{RenderEngine, RenderScene};

/// Adapter for an external rendering command.
///
/// The command is invoked as `<program> <scene.json> <vector.svg>
/// <raster.png>` and must create both output files before exiting.
pub struct CommandEngine {
    program: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RenderEngine for CommandEngine {
    fn render(&self, scene: &RenderScene, vector: &Path, raster: &Path) -> Result<()> {
        let mut scene_file =
            NamedTempFile::new().context("failed to create scene file for render engine")?;
        let json =
            serde_json::to_string_pretty(scene).context("failed to serialize render scene")?;
        scene_file
            .write_all(json.as_bytes())
            .context("failed to write scene file for render engine")?;
        scene_file.flush()?;

        info!("invoking render engine: {}", self.program);
        let status = Command::new(&self.program)
            .arg(scene_file.path())
            .arg(vector)
            .arg(raster)
            .status()
            .with_context(|| format!("failed to launch render engine {:?}", self.program))?;

        if !status.success() {
            bail!("render engine {:?} exited with {status}", self.program);
        }
        if !vector.exists() {
            bail!(
                "render engine did not produce the vector image: {}",
                vector.display()
            );
        }
        if !raster.exists() {
            bail!(
                "render engine did not produce the raster image: {}",
                raster.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_scene() -> RenderScene {
        RenderScene {
            newick: "(A:1,B:2);".into(),
            leaves: Vec::new(),
            legend: Vec::new(),
            branch_scale: 10000.0,
            show_leaf_names: false,
        }
    }

    #[test]
    fn missing_program_is_an_error() {
        let engine = CommandEngine::new("/nonexistent/render-engine");
        let dir = tempfile::tempdir().unwrap();
        let err = engine
            .render(
                &empty_scene(),
                &dir.path().join("out.svg"),
                &dir.path().join("out.png"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }

    #[cfg(unix)]
    #[test]
    fn engine_outputs_are_required() {
        use std::os::unix::fs::PermissionsExt;

        // a fake engine that exits cleanly but writes nothing
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("noop-engine.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = CommandEngine::new(script.to_string_lossy().to_string());
        let err = engine
            .render(
                &empty_scene(),
                &dir.path().join("out.svg"),
                &dir.path().join("out.png"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("did not produce"));
    }

    #[cfg(unix)]
    #[test]
    fn successful_engine_run_passes_all_paths() {
        use std::os::unix::fs::PermissionsExt;

        // copies the scene into the vector slot and touches the raster slot
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("copy-engine.sh");
        std::fs::write(&script, "#!/bin/sh\ncp \"$1\" \"$2\"\n: > \"$3\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let vector = dir.path().join("out.svg");
        let raster = dir.path().join("out.png");
        let engine = CommandEngine::new(script.to_string_lossy().to_string());
        engine.render(&empty_scene(), &vector, &raster).unwrap();

        let copied = std::fs::read_to_string(&vector).unwrap();
        assert!(copied.contains("(A:1,B:2);"));
        assert!(raster.exists());
    }
}
