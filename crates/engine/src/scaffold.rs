//! Prebuild – idempotent creation of the developer-owned scaffold.
//!
//! Templates are embedded in the binary, staged to a temp directory, and
//! applied with copy-missing semantics so repeated runs never clobber a
//! developer's edits. The generated bridge file is excluded outright.

use crate::error::{EngineError, EngineResult};
use crate::project::{ProjectLayout, BRIDGE_FILE_NAME};
use crate::workspace::{copy_missing, remove_all, CopyStats};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const TEMPLATES: &[(&str, &str)] = &[
    ("main.js", include_str!("../templates/main.js")),
    ("preload.js", include_str!("../templates/preload.js")),
    ("autolink.js", include_str!("../templates/autolink.js")),
];

/// Ensure the scaffold directory exists and holds every template file the
/// developer has not already provided. Returns the copy stats so callers can
/// report what was created versus kept.
pub fn ensure_scaffold(layout: &ProjectLayout) -> EngineResult<CopyStats> {
    // Unique per invocation so concurrent callers never share a staging tree.
    static STAGING_SEQ: AtomicUsize = AtomicUsize::new(0);
    let staging = std::env::temp_dir().join(format!(
        "deskpack-scaffold-{}-{}",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    remove_all(&staging)?;

    for (rel, content) in TEMPLATES {
        let path = staging.join(rel);
        write_template(&path, content)?;
    }

    let scaffold = layout.scaffold_dir();
    let stats = copy_missing(&staging, &scaffold, &[BRIDGE_FILE_NAME]);
    // Staging cleanup is best-effort.
    let _ = fs::remove_dir_all(&staging);
    let stats = stats?;

    tracing::info!(
        scaffold = %scaffold.display(),
        created = stats.copied,
        kept = stats.skipped,
        "scaffold ensured"
    );
    Ok(stats)
}

fn write_template(path: &Path, content: &str) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::workspace(parent, e))?;
    }
    fs::write(path, content).map_err(|e| EngineError::workspace(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_project(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("deskpack_scaffold_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_prebuild_creates_entry_point() {
        let root = temp_project("create");
        let layout = ProjectLayout::new(&root);
        let stats = ensure_scaffold(&layout).unwrap();
        assert_eq!(stats.copied, TEMPLATES.len());
        assert!(layout.shell_entry().is_file());
        assert!(layout.autolink_script().is_file());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_prebuild_preserves_developer_edits() {
        let root = temp_project("preserve");
        let layout = ProjectLayout::new(&root);
        ensure_scaffold(&layout).unwrap();

        fs::write(layout.shell_entry(), "// my custom shell\n").unwrap();
        let stats = ensure_scaffold(&layout).unwrap();
        assert_eq!(stats.copied, 0);
        assert_eq!(
            fs::read_to_string(layout.shell_entry()).unwrap(),
            "// my custom shell\n"
        );
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_prebuild_never_touches_bridge_file() {
        let root = temp_project("bridge");
        let layout = ProjectLayout::new(&root);
        fs::create_dir_all(layout.scaffold_dir()).unwrap();
        fs::write(layout.bridge_file(), "// generated elsewhere\n").unwrap();

        ensure_scaffold(&layout).unwrap();
        assert_eq!(
            fs::read_to_string(layout.bridge_file()).unwrap(),
            "// generated elsewhere\n"
        );
        let _ = fs::remove_dir_all(&root);
    }
}
