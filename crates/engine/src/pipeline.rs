//! Packaging pipeline – export → transform → assemble → package/make.
//!
//! Stages run strictly in sequence and fail fast. Each stage maps to a
//! distinct process-exit code so automation can tell failures apart; a
//! missing external binary overrides to its own code regardless of stage.

use crate::config::OrchestratorConfig;
use crate::error::{EngineError, EngineResult};
use crate::manifest::{
    filter_available, read_project_metadata, select_makers, write_workspace_manifest, Maker,
};
use crate::project::{ProjectLayout, AUTOLINK_SCRIPT_NAME, RESOURCES_FILE_NAME, WORKSPACE_DIR_NAME};
use crate::resources::materialize;
use crate::runner::{run, run_capture, CommandOptions};
use crate::scaffold::ensure_scaffold;
use crate::transform::transform_entry_html;
use crate::workspace::{copy_missing, remove_all};
use std::fs;

/// Exit code for a missing required binary, regardless of stage.
pub const EXIT_MISSING_BINARY: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prebuild,
    Autolink,
    WorkspaceReset,
    Export,
    Transform,
    Assemble,
    Package,
    Make,
}

impl Stage {
    pub fn exit_code(&self) -> i32 {
        match self {
            Stage::Prebuild | Stage::Autolink => 3,
            Stage::WorkspaceReset => 1,
            Stage::Export | Stage::Transform => 4,
            Stage::Assemble | Stage::Package | Stage::Make => 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage:?} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: EngineError,
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        if matches!(self.source, EngineError::MissingBinary { .. }) {
            EXIT_MISSING_BINARY
        } else {
            self.stage.exit_code()
        }
    }
}

fn stage<T>(stage: Stage, result: EngineResult<T>) -> Result<T, PipelineError> {
    result.map_err(|source| PipelineError { stage, source })
}

/// Run the full packaging pipeline. `make_tokens` selects distributable
/// formats; an empty list means "package only", deliberately.
pub async fn run_package(
    config: &OrchestratorConfig,
    layout: &ProjectLayout,
    make_tokens: &[String],
) -> Result<(), PipelineError> {
    // Maker selection happens up front because the synthesized manifest
    // needs the final set during assembly.
    let makers = filter_available(select_makers(make_tokens));

    // 1. Prebuild-ensure: scaffold exists, developer files untouched.
    stage(Stage::Prebuild, ensure_scaffold(layout))?;

    // 2. Resource linking: optional extras, never fatal.
    if let Err(e) = run_autolink(layout).await {
        tracing::warn!(error = %e, "resource linking failed; packaging continues without native extras");
    }

    // 3. Workspace reset: a dirty workspace would silently corrupt the run.
    let workspace = layout.workspace_dir();
    stage(Stage::WorkspaceReset, remove_all(&workspace))?;
    stage(
        Stage::WorkspaceReset,
        fs::create_dir_all(&workspace).map_err(|e| EngineError::workspace(&workspace, e)),
    )?;

    // 4. Web export, gated on a confirmed capability.
    stage(Stage::Export, export_web(config, layout).await)?;

    // 5. Post-export transform: entry HTML must load from a file context.
    stage(Stage::Transform, transform_entry_html(&layout.web_entry_html()))?;

    // 6. Workspace assembly.
    stage(Stage::Assemble, assemble_workspace(layout, &makers))?;

    // 7. Package always runs so packaging hooks execute even when no
    //    distributable was requested.
    let opts = CommandOptions::in_dir(&workspace);
    let package_args = with_arg(&config.packager.args, "package");
    stage(
        Stage::Package,
        run(&config.packager.bin, &package_args, &opts).await,
    )?;

    // 8. Make, only on explicit request.
    if make_tokens.is_empty() {
        tracing::info!("no maker tokens requested; leaving the packaged app without distributables");
        return Ok(());
    }
    if makers.is_empty() {
        tracing::warn!(tokens = ?make_tokens, "no requested maker is usable; skipping make");
        return Ok(());
    }
    let targets: Vec<&str> = makers.iter().map(|m| m.module).collect();
    let mut make_args = with_arg(&config.packager.args, "make");
    make_args.push("--targets".to_string());
    make_args.push(targets.join(","));
    stage(Stage::Make, run(&config.packager.bin, &make_args, &opts).await)?;

    tracing::info!(out = %layout.distributables_dir().display(), "distributables written");
    Ok(())
}

/// Invoke the project's autolink collaborator to regenerate the bridge file
/// and resource manifest. A missing script means the project opted out.
pub async fn run_autolink(layout: &ProjectLayout) -> EngineResult<()> {
    let script = layout.autolink_script();
    if !script.is_file() {
        tracing::warn!(script = %script.display(), "no autolink script; skipping resource linking");
        return Ok(());
    }
    let args = vec![script.to_string_lossy().into_owned()];
    let opts = CommandOptions::in_dir(layout.root());
    run("node", &args, &opts).await
}

/// Probe the export tool for the export capability, then invoke it with a
/// fixed argument form. No capability means no guessing: the user is told
/// the exact command to run manually.
async fn export_web(config: &OrchestratorConfig, layout: &ProjectLayout) -> EngineResult<()> {
    let help_args = with_arg(&config.exporter.args, "--help");
    let opts = CommandOptions::in_dir(layout.root());
    let probe = run_capture(&config.exporter.bin, &help_args, &opts).await?;

    if !probe.output.contains("export") {
        return Err(EngineError::CapabilityUnavailable {
            tool: config.exporter.display(),
            capability: "export".to_string(),
            hint: format!(
                "run `{} export` manually and re-run packaging",
                config.exporter.display()
            ),
        });
    }

    let out_dir = layout.web_export_dir();
    let mut args = with_arg(&config.exporter.args, "export");
    args.extend([
        "--platform".to_string(),
        "web".to_string(),
        "--output-dir".to_string(),
        out_dir.to_string_lossy().into_owned(),
    ]);
    run(&config.exporter.bin, &args, &opts).await
}

fn assemble_workspace(layout: &ProjectLayout, makers: &[&Maker]) -> EngineResult<()> {
    // Entry-point files from the scaffold, skip-existing so the freshly
    // exported web tree and any pre-placed files win. The workspace lives
    // inside the scaffold, so it must exclude itself from the copy.
    copy_missing(
        &layout.scaffold_dir(),
        &layout.workspace_dir(),
        &[WORKSPACE_DIR_NAME, RESOURCES_FILE_NAME, AUTOLINK_SCRIPT_NAME],
    )?;

    materialize(
        &layout.resources_manifest(),
        layout.root(),
        &layout.workspace_dir(),
    )?;

    let meta = read_project_metadata(layout.root())?;
    write_workspace_manifest(&layout.workspace_manifest(), &meta, makers)
}

fn with_arg(base: &[String], arg: &str) -> Vec<String> {
    let mut args = base.to_vec();
    args.push(arg.to_string());
    args
}
