//! Resource manifest resolver – materializes the autolink collaborator's
//! declarative `{from, to}` list into the packaging workspace.
//!
//! Native-module resources are optional extras: a missing manifest means no
//! extras are needed, and a missing source entry is a warning, not an error.

use crate::error::EngineResult;
use crate::workspace::copy_missing;
use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Relative to the project root.
    pub from: String,
    /// Relative to the packaging workspace root.
    pub to: String,
}

/// Copy every resolvable entry from `manifest_path` into the workspace.
/// Returns the number of entries placed.
pub fn materialize(
    manifest_path: &Path,
    project_root: &Path,
    workspace_root: &Path,
) -> EngineResult<usize> {
    if !manifest_path.exists() {
        tracing::debug!(path = %manifest_path.display(), "no resource manifest; nothing to link");
        return Ok(0);
    }

    let data = fs::read_to_string(manifest_path)
        .map_err(|e| EngineError::workspace(manifest_path, e))?;
    let entries: Vec<ResourceEntry> = serde_json::from_str(&data)?;

    let mut placed = 0;
    for entry in &entries {
        let src = project_root.join(&entry.from);
        if !src.exists() {
            tracing::warn!(
                from = %entry.from,
                "resource source does not exist; skipping entry"
            );
            continue;
        }

        let dst = workspace_root.join(&entry.to);
        if let Some(parent) = dst.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(dest = %dst.display(), error = %e, "cannot create resource destination; skipping entry");
                continue;
            }
        }

        if src.is_dir() {
            copy_missing(&src, &dst, &[])?;
        } else if dst.exists() {
            tracing::debug!(dest = %dst.display(), "resource destination already present; keeping it");
        } else if let Err(e) = fs::copy(&src, &dst) {
            tracing::warn!(
                from = %src.display(),
                dest = %dst.display(),
                error = %e,
                "resource copy failed; skipping entry"
            );
            continue;
        }
        placed += 1;
    }

    tracing::info!(placed, total = entries.len(), "resource manifest materialized");
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("deskpack_res_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_absent_manifest_is_ok() {
        let root = temp_root("absent");
        let placed = materialize(&root.join("resources.json"), &root, &root.join("ws")).unwrap();
        assert_eq!(placed, 0);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_source_warns_and_creates_nothing() {
        let root = temp_root("missing_src");
        let manifest = root.join("resources.json");
        write(
            &manifest,
            r#"[{"from": "node_modules/foo/foo.node", "to": "native/foo.node"}]"#,
        );

        let ws = root.join("ws");
        let placed = materialize(&manifest, &root, &ws).unwrap();
        assert_eq!(placed, 0);
        assert!(!ws.join("native/foo.node").exists());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_entries_are_placed_with_parents() {
        let root = temp_root("place");
        write(&root.join("assets/icon.png"), "png-bytes");
        write(&root.join("native/mod/lib.node"), "node-bytes");
        let manifest = root.join("resources.json");
        write(
            &manifest,
            r#"[
                {"from": "assets/icon.png", "to": "res/icon.png"},
                {"from": "native/mod", "to": "res/mod"}
            ]"#,
        );

        let ws = root.join("ws");
        let placed = materialize(&manifest, &root, &ws).unwrap();
        assert_eq!(placed, 2);
        assert_eq!(fs::read_to_string(ws.join("res/icon.png")).unwrap(), "png-bytes");
        assert_eq!(
            fs::read_to_string(ws.join("res/mod/lib.node")).unwrap(),
            "node-bytes"
        );
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_existing_workspace_content_is_preserved() {
        let root = temp_root("preserve");
        write(&root.join("assets/icon.png"), "from-project");
        let ws = root.join("ws");
        write(&ws.join("res/icon.png"), "already-in-workspace");
        let manifest = root.join("resources.json");
        write(&manifest, r#"[{"from": "assets/icon.png", "to": "res/icon.png"}]"#);

        materialize(&manifest, &root, &ws).unwrap();
        assert_eq!(
            fs::read_to_string(ws.join("res/icon.png")).unwrap(),
            "already-in-workspace"
        );
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_malformed_manifest_is_an_error() {
        let root = temp_root("malformed");
        let manifest = root.join("resources.json");
        write(&manifest, "not json");
        let err = materialize(&manifest, &root, &root.join("ws")).unwrap_err();
        assert!(matches!(err, EngineError::Manifest(_)));
        let _ = fs::remove_dir_all(&root);
    }
}
