//! Maker selection and the synthesized packaging-workspace manifest.
//!
//! The workspace `package.json` is generated fresh from the project's own
//! metadata on every run – nothing is inherited from the tool's templates,
//! so two runs over the same project produce identical manifests.

use crate::error::{EngineError, EngineResult};
use crate::runner::resolve_binary;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A known distributable format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Maker {
    /// Short token users pass via `--make`.
    pub id: &'static str,
    /// Maker module name written into the synthesized manifest.
    pub module: &'static str,
    /// Binary that must be on PATH for this maker to work, if any.
    pub requires: Option<&'static str>,
}

pub const KNOWN_MAKERS: &[Maker] = &[
    Maker {
        id: "zip",
        module: "@electron-forge/maker-zip",
        requires: None,
    },
    Maker {
        id: "deb",
        module: "@electron-forge/maker-deb",
        requires: None,
    },
    Maker {
        id: "squirrel",
        module: "@electron-forge/maker-squirrel",
        requires: None,
    },
    Maker {
        id: "rpm",
        module: "@electron-forge/maker-rpm",
        requires: Some("rpmbuild"),
    },
];

/// Fuzzy-match requested tokens against known maker identifiers
/// (case-insensitive substring, either direction). Unknown tokens are
/// logged and dropped; an empty result is a valid "package only" selection.
pub fn select_makers(tokens: &[String]) -> Vec<&'static Maker> {
    let mut selected: Vec<&'static Maker> = Vec::new();
    for token in tokens {
        let t = token.trim().to_lowercase();
        if t.is_empty() {
            continue;
        }
        let hit = KNOWN_MAKERS
            .iter()
            .find(|m| m.id.contains(&t) || t.contains(m.id));
        match hit {
            Some(maker) if !selected.iter().any(|s| s.id == maker.id) => selected.push(maker),
            Some(_) => {}
            None => tracing::warn!(token = %token, "no maker matches token; ignoring it"),
        }
    }
    selected
}

/// Drop makers whose required toolchain is absent, with a logged reason.
pub fn filter_available(makers: Vec<&'static Maker>) -> Vec<&'static Maker> {
    makers
        .into_iter()
        .filter(|m| match m.requires {
            Some(bin) => match resolve_binary(bin) {
                Ok(_) => true,
                Err(_) => {
                    tracing::warn!(
                        maker = m.id,
                        missing = bin,
                        "required toolchain not found; dropping maker from this run"
                    );
                    false
                }
            },
            None => true,
        })
        .collect()
}

/// Project metadata as read from the project's own `package.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// Read name/version/description from the project manifest, falling back to
/// the directory name when the project has no `package.json`.
pub fn read_project_metadata(project_root: &Path) -> EngineResult<ProjectMetadata> {
    let manifest = project_root.join("package.json");
    if !manifest.exists() {
        let name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
        tracing::warn!(
            path = %manifest.display(),
            "project has no package.json; synthesizing metadata from the directory name"
        );
        return Ok(ProjectMetadata {
            name,
            version: "0.1.0".to_string(),
            description: String::new(),
        });
    }
    let data = fs::read_to_string(&manifest).map_err(|e| EngineError::workspace(&manifest, e))?;
    let meta: ProjectMetadata = serde_json::from_str(&data)?;
    Ok(meta)
}

/// Render the synthesized workspace manifest.
pub fn render_workspace_manifest(meta: &ProjectMetadata, makers: &[&Maker]) -> String {
    let maker_entries: Vec<serde_json::Value> = makers
        .iter()
        .map(|m| serde_json::json!({ "name": m.module, "config": {} }))
        .collect();

    let manifest = serde_json::json!({
        "name": meta.name,
        "productName": meta.name,
        "version": meta.version,
        "description": meta.description,
        "main": "main.js",
        "config": {
            "forge": {
                "packagerConfig": { "asar": false },
                "makers": maker_entries,
            }
        }
    });
    // json! output is always serializable
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

/// Write the synthesized manifest into the workspace.
pub fn write_workspace_manifest(
    workspace_manifest: &Path,
    meta: &ProjectMetadata,
    makers: &[&Maker],
) -> EngineResult<()> {
    let body = render_workspace_manifest(meta, makers);
    fs::write(workspace_manifest, body).map_err(|e| EngineError::workspace(workspace_manifest, e))
}
