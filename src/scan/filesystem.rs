use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Depth-first listing of regular files under `root`, siblings in file-name
/// order. Symlinks are followed as long as they resolve inside `root`. Each
/// directory is walked once per canonical identity; when several links reach
/// the same directory the first one in traversal order wins.
pub fn list_files(root: &Path, exclude_dirs: &[String]) -> Vec<PathBuf> {
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut visited = HashSet::new();

    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| admit(entry, &canonical_root, exclude_dirs, &mut visited))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                if let Some(ancestor) = err.loop_ancestor() {
                    tracing::debug!(
                        ancestor = %ancestor.display(),
                        "skipping symlink cycle"
                    );
                } else {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                }
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

fn admit(
    entry: &DirEntry,
    canonical_root: &Path,
    exclude_dirs: &[String],
    visited: &mut HashSet<PathBuf>,
) -> bool {
    let is_dir = entry.file_type().is_dir();
    if is_excluded_dir(entry, exclude_dirs) {
        return false;
    }
    // Plain files below an admitted directory cannot leave the tree.
    if !is_dir && !entry.path_is_symlink() {
        return true;
    }

    let canonical = match entry.path().canonicalize() {
        Ok(path) => path,
        Err(err) => {
            tracing::warn!(path = %entry.path().display(), error = %err, "skipping unresolvable entry");
            return false;
        }
    };
    if !canonical.starts_with(canonical_root) {
        tracing::warn!(
            path = %entry.path().display(),
            target = %canonical.display(),
            "skipping link that leaves the tree"
        );
        return false;
    }
    if is_dir && !visited.insert(canonical) {
        tracing::debug!(path = %entry.path().display(), "skipping directory already walked");
        return false;
    }
    true
}

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| exclude_dirs.iter().any(|dir| dir == name))
}

/// Path of `path` relative to `root`, always with forward slashes.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
