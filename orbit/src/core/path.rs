//! Lexical path resolution against a working directory.

use std::path::{Component, Path, PathBuf};

/// Resolve `target` against `base` without touching the filesystem.
///
/// Absolute targets are taken as-is. `.` components are dropped and `..`
/// pops the previous component (never above the root).
pub fn resolve(base: &Path, target: impl AsRef<Path>) -> PathBuf {
    let joined = base.join(target.as_ref());
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if resolved.file_name().is_some() {
                    resolved.pop();
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}
