//! Fixed on-disk layout of a deskpack project.
//!
//! The scaffold directory is developer-owned and only ever written to
//! additively; the packaging workspace underneath it is disposable and
//! recreated on every packaging run.

use std::path::{Path, PathBuf};

/// Name of the bridge file regenerated by the autolink collaborator. It is
/// excluded from scaffold copies so template content never clobbers it.
pub const BRIDGE_FILE_NAME: &str = "bridge.gen.js";

/// Name of the declarative resource manifest produced by autolink.
pub const RESOURCES_FILE_NAME: &str = "resources.json";

/// Name of the project-local autolink script.
pub const AUTOLINK_SCRIPT_NAME: &str = "autolink.js";

/// Directory name of the packaging workspace inside the scaffold.
pub const WORKSPACE_DIR_NAME: &str = "pack";

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The editable, developer-owned scaffold directory.
    pub fn scaffold_dir(&self) -> PathBuf {
        self.root.join("desktop")
    }

    pub fn bridge_file(&self) -> PathBuf {
        self.scaffold_dir().join(BRIDGE_FILE_NAME)
    }

    pub fn resources_manifest(&self) -> PathBuf {
        self.scaffold_dir().join(RESOURCES_FILE_NAME)
    }

    pub fn autolink_script(&self) -> PathBuf {
        self.scaffold_dir().join(AUTOLINK_SCRIPT_NAME)
    }

    /// Disposable packaging workspace, recreated on every `package` run.
    pub fn workspace_dir(&self) -> PathBuf {
        self.scaffold_dir().join(WORKSPACE_DIR_NAME)
    }

    /// Where the web exporter writes the static site.
    pub fn web_export_dir(&self) -> PathBuf {
        self.workspace_dir().join("web")
    }

    pub fn web_entry_html(&self) -> PathBuf {
        self.web_export_dir().join("index.html")
    }

    /// Final distributables, as produced by the maker.
    pub fn distributables_dir(&self) -> PathBuf {
        self.workspace_dir().join("out").join("make")
    }

    pub fn workspace_manifest(&self) -> PathBuf {
        self.workspace_dir().join("package.json")
    }

    /// The project's own package metadata.
    pub fn project_manifest(&self) -> PathBuf {
        self.root.join("package.json")
    }

    /// Shell entry point inside the scaffold (unless overridden).
    pub fn shell_entry(&self) -> PathBuf {
        self.scaffold_dir().join("main.js")
    }

    /// Control socket for the dev session's IPC surface.
    pub fn control_socket(&self) -> PathBuf {
        self.root.join(".deskpack").join("control.sock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new("/proj");
        assert_eq!(layout.scaffold_dir(), PathBuf::from("/proj/desktop"));
        assert_eq!(
            layout.bridge_file(),
            PathBuf::from("/proj/desktop/bridge.gen.js")
        );
        assert_eq!(layout.workspace_dir(), PathBuf::from("/proj/desktop/pack"));
        assert_eq!(
            layout.web_entry_html(),
            PathBuf::from("/proj/desktop/pack/web/index.html")
        );
        assert_eq!(
            layout.distributables_dir(),
            PathBuf::from("/proj/desktop/pack/out/make")
        );
    }

    #[test]
    fn test_workspace_is_inside_scaffold() {
        // Scaffold copies into the workspace must exclude WORKSPACE_DIR_NAME
        // or the copy would recurse into its own destination.
        let layout = ProjectLayout::new("/proj");
        assert!(layout.workspace_dir().starts_with(layout.scaffold_dir()));
    }
}
