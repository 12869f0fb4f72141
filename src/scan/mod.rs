pub mod filesystem;

use crate::error::{CheckerError, Result};
use crate::types::config::DiscoverySettings;
use std::path::{Path, PathBuf};

/// File suffixes eligible for the corpus, stored with a leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAllowlist {
    extensions: Vec<String>,
    case_insensitive: bool,
}

impl ExtensionAllowlist {
    pub fn new<I, S>(extensions: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for extension in extensions {
            let trimmed = extension.as_ref().trim().trim_start_matches('.');
            if trimmed.is_empty() {
                continue;
            }
            let entry = if case_insensitive {
                format!(".{}", trimmed.to_lowercase())
            } else {
                format!(".{trimmed}")
            };
            if !normalized.contains(&entry) {
                normalized.push(entry);
            }
        }
        Self {
            extensions: normalized,
            case_insensitive,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let candidate = if self.case_insensitive {
            format!(".{}", extension.to_lowercase())
        } else {
            format!(".{extension}")
        };
        self.extensions.contains(&candidate)
    }
}

impl From<&DiscoverySettings> for ExtensionAllowlist {
    fn from(settings: &DiscoverySettings) -> Self {
        Self::new(&settings.extensions, settings.case_insensitive)
    }
}

/// Walks `root` and returns every file whose extension is allowlisted, in
/// traversal order. Zero matches is not an error.
pub fn discover(
    root: &Path,
    allowlist: &ExtensionAllowlist,
    exclude_dirs: &[String],
) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CheckerError::PathNotFound(root.display().to_string()));
    }

    let files = filesystem::list_files(root, exclude_dirs);
    let total = files.len();
    let matched = files
        .into_iter()
        .filter(|path| allowlist.matches(path))
        .collect::<Vec<_>>();

    tracing::info!(
        root = %root.display(),
        total,
        matched = matched.len(),
        "discovered source files"
    );
    Ok(matched)
}
