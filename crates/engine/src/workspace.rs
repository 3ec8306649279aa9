//! Idempotent file-tree primitives for scaffolding and workspace assembly.
//!
//! One recursive walk parameterized by a copy policy backs both `copy_all`
//! and `copy_missing`. Per-entry I/O errors are logged and that entry is
//! skipped; an unreadable root is fatal because the caller cannot reason
//! about a partially-walked tree.

use crate::error::{EngineError, EngineResult};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPolicy {
    /// Unconditional copy; existing destination files are overwritten.
    Overwrite,
    /// Never overwrite: existing destination files are kept, existing
    /// directories are recursed into to fill in missing children.
    SkipExisting,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Unconditional recursive copy. Intended for first-time scaffolding where
/// `dest` is known not to exist.
pub fn copy_all(source: &Path, dest: &Path) -> EngineResult<CopyStats> {
    copy_tree(source, dest, CopyPolicy::Overwrite, &[])
}

/// Recursive copy that never overwrites an existing destination file.
/// Entries whose file name matches `exclude` are skipped unconditionally.
///
/// This is the backbone of the "developer edits are sacred" policy: both
/// prebuild and packaging-workspace assembly go through it.
pub fn copy_missing(source: &Path, dest: &Path, exclude: &[&str]) -> EngineResult<CopyStats> {
    copy_tree(source, dest, CopyPolicy::SkipExisting, exclude)
}

/// Recursive delete that tolerates a non-existent path as a no-op.
pub fn remove_all(path: &Path) -> EngineResult<()> {
    if !path.exists() {
        return Ok(());
    }
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| EngineError::workspace(path, e))
}

fn copy_tree(
    source: &Path,
    dest: &Path,
    policy: CopyPolicy,
    exclude: &[&str],
) -> EngineResult<CopyStats> {
    if !source.exists() {
        return Err(EngineError::workspace(
            source,
            io::Error::new(io::ErrorKind::NotFound, "copy source does not exist"),
        ));
    }
    fs::create_dir_all(dest).map_err(|e| EngineError::workspace(dest, e))?;

    let mut stats = CopyStats::default();
    walk(source, dest, policy, exclude, &mut stats)?;
    Ok(stats)
}

fn walk(
    source: &Path,
    dest: &Path,
    policy: CopyPolicy,
    exclude: &[&str],
    stats: &mut CopyStats,
) -> EngineResult<()> {
    let entries = fs::read_dir(source).map_err(|e| EngineError::workspace(source, e))?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %source.display(), error = %e, "skipping unreadable entry");
                stats.failed += 1;
                continue;
            }
        };
        let name = entry.file_name();
        if exclude.iter().any(|x| name.as_os_str() == std::ffi::OsStr::new(x)) {
            tracing::debug!(entry = %entry.path().display(), "excluded from copy");
            stats.skipped += 1;
            continue;
        }

        let src_child = entry.path();
        let dst_child = dest.join(&name);
        let src_is_dir = src_child.is_dir();

        if src_is_dir {
            if dst_child.exists() && !dst_child.is_dir() {
                // Type mismatch: log and skip without reconciling.
                tracing::warn!(
                    source = %src_child.display(),
                    dest = %dst_child.display(),
                    "destination exists as a file where source is a directory; skipping"
                );
                stats.skipped += 1;
                continue;
            }
            if let Err(e) = fs::create_dir_all(&dst_child) {
                tracing::warn!(dir = %dst_child.display(), error = %e, "cannot create directory; skipping subtree");
                stats.failed += 1;
                continue;
            }
            walk(&src_child, &dst_child, policy, exclude, stats)?;
        } else {
            if dst_child.exists() {
                if dst_child.is_dir() {
                    tracing::warn!(
                        source = %src_child.display(),
                        dest = %dst_child.display(),
                        "destination exists as a directory where source is a file; skipping"
                    );
                    stats.skipped += 1;
                    continue;
                }
                if policy == CopyPolicy::SkipExisting {
                    tracing::debug!(path = %dst_child.display(), "keeping existing file");
                    stats.skipped += 1;
                    continue;
                }
            }
            match fs::copy(&src_child, &dst_child) {
                Ok(_) => stats.copied += 1,
                Err(e) => {
                    tracing::warn!(
                        source = %src_child.display(),
                        dest = %dst_child.display(),
                        error = %e,
                        "copy failed; skipping entry"
                    );
                    stats.failed += 1;
                }
            }
        }
    }
    Ok(())
}
