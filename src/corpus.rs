use crate::error::{CheckerError, Result};
use crate::scan::filesystem::relative_display;
use crate::types::config::{AggregateOptions, ReadErrorPolicy};
use crate::types::summary::SourceFile;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const BOUNDARY_PREFIX: &str = "corpus-";
const BOUNDARY_HEX_LEN: usize = 16;

/// Path-annotated concatenation of every aggregated file, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub files: Vec<SourceFile>,
    pub boundary: String,
    pub text: String,
    /// Unreadable files dropped under the `skip` policy.
    pub skipped: Vec<String>,
    /// Files left out because the byte budget was exhausted.
    pub truncated: Vec<String>,
}

impl Corpus {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len_bytes(&self) -> usize {
        self.text.len()
    }
}

/// Reads `paths` (in parallel) and concatenates them under per-file headers.
///
/// Under [`ReadErrorPolicy::Abort`] the first unreadable file in discovery
/// order fails the whole aggregation; under [`ReadErrorPolicy::Skip`] it is
/// logged and listed in [`Corpus::skipped`].
pub fn aggregate(root: &Path, paths: &[PathBuf], options: &AggregateOptions) -> Result<Corpus> {
    let reads = paths
        .par_iter()
        .map(|path| (path, std::fs::read_to_string(path)))
        .collect::<Vec<_>>();

    let mut files = Vec::with_capacity(reads.len());
    let mut skipped = Vec::new();
    for (path, read) in reads {
        match read {
            Ok(content) => files.push(SourceFile {
                path: relative_display(root, path),
                content,
            }),
            Err(source) => match options.on_read_error {
                ReadErrorPolicy::Abort => {
                    return Err(CheckerError::Read {
                        path: path.clone(),
                        source,
                    });
                }
                ReadErrorPolicy::Skip => {
                    let relative = relative_display(root, path);
                    tracing::warn!(path = %relative, error = %source, "skipping unreadable file");
                    skipped.push(relative);
                }
            },
        }
    }

    let boundary = select_boundary(&files);
    let mut text = String::new();
    let mut included = Vec::with_capacity(files.len());
    let mut truncated = Vec::new();
    for file in files {
        if !truncated.is_empty() {
            truncated.push(file.path);
            continue;
        }
        let block = render_block(&boundary, &file);
        if let Some(limit) = options.max_corpus_bytes {
            if text.len() + block.len() > limit {
                truncated.push(file.path);
                continue;
            }
        }
        text.push_str(&block);
        included.push(file);
    }

    if !truncated.is_empty() {
        tracing::warn!(
            omitted = truncated.len(),
            limit = ?options.max_corpus_bytes,
            "corpus byte budget exhausted"
        );
    }
    tracing::info!(
        files = included.len(),
        bytes = text.len(),
        skipped = skipped.len(),
        "aggregated corpus"
    );

    Ok(Corpus {
        files: included,
        boundary,
        text,
        skipped,
        truncated,
    })
}

/// Header line that opens one file's block.
pub fn header_line(boundary: &str, path: &str) -> String {
    // JSON quoting keeps newlines or quotes in a path on one line.
    let quoted = serde_json::to_string(path).unwrap_or_else(|_| format!("\"{path}\""));
    format!("===== {boundary} file={quoted} =====")
}

fn render_block(boundary: &str, file: &SourceFile) -> String {
    let mut block = String::with_capacity(file.content.len() + 64);
    block.push('\n');
    block.push_str(&header_line(boundary, &file.path));
    block.push('\n');
    block.push_str(&file.content);
    block.push('\n');
    block
}

/// First salted content digest that appears in no file verbatim.
fn select_boundary(files: &[SourceFile]) -> String {
    let mut salt: u32 = 0;
    loop {
        let candidate = boundary_candidate(files, salt);
        if !files.iter().any(|file| file.content.contains(&candidate)) {
            return candidate;
        }
        salt = salt.wrapping_add(1);
    }
}

fn boundary_candidate(files: &[SourceFile], salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.to_le_bytes());
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.content.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{BOUNDARY_PREFIX}{}", &digest[..BOUNDARY_HEX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_tree(dir: &Path) -> Vec<PathBuf> {
        fs::create_dir_all(dir.join("src")).expect("src should create");
        fs::write(dir.join("main.js"), "console.log('hi');\n").expect("write main");
        fs::write(dir.join("src/util.js"), "export const x = 1;").expect("write util");
        vec![dir.join("main.js"), dir.join("src/util.js")]
    }

    #[test]
    fn aggregate_annotates_each_file_in_order() {
        let dir = TempDir::new().expect("temp dir should be created");
        let paths = write_tree(dir.path());

        let corpus = aggregate(dir.path(), &paths, &AggregateOptions::default())
            .expect("aggregate should succeed");

        let main_header = header_line(&corpus.boundary, "main.js");
        let util_header = header_line(&corpus.boundary, "src/util.js");
        let expected = format!(
            "\n{main_header}\nconsole.log('hi');\n\n\n{util_header}\nexport const x = 1;\n"
        );
        assert_eq!(corpus.text, expected);
        assert_eq!(
            corpus
                .files
                .iter()
                .map(|file| file.path.as_str())
                .collect::<Vec<_>>(),
            vec!["main.js", "src/util.js"]
        );
    }

    #[test]
    fn aggregate_is_byte_identical_across_runs() {
        let dir = TempDir::new().expect("temp dir should be created");
        let paths = write_tree(dir.path());
        let options = AggregateOptions::default();

        let first = aggregate(dir.path(), &paths, &options).expect("first run");
        let second = aggregate(dir.path(), &paths, &options).expect("second run");
        assert_eq!(first.text, second.text);
        assert_eq!(first.boundary, second.boundary);
    }

    #[test]
    fn header_never_collides_with_file_text() {
        let dir = TempDir::new().expect("temp dir should be created");
        let sneaky = dir.path().join("sneaky.py");
        fs::write(
            &sneaky,
            "// File: other.py\n===== corpus-0000000000000000 file=\"fake.py\" =====\n",
        )
        .expect("write sneaky");

        let corpus = aggregate(dir.path(), &[sneaky], &AggregateOptions::default())
            .expect("aggregate should succeed");

        assert_eq!(corpus.text.matches(&corpus.boundary).count(), 1);
        assert!(corpus.boundary.starts_with(BOUNDARY_PREFIX));
    }

    #[test]
    fn boundary_skips_candidates_present_in_content() {
        let mut files = vec![SourceFile {
            path: "a.rs".to_string(),
            content: String::new(),
        }];
        let first = boundary_candidate(&files, 0);
        files[0].content = first.clone();
        let chosen = select_boundary(&files);
        assert!(!files[0].content.contains(&chosen));
    }

    #[test]
    fn header_quotes_unusual_paths() {
        let header = header_line("corpus-abc", "weird\nname.rs");
        assert_eq!(header, "===== corpus-abc file=\"weird\\nname.rs\" =====");
        assert_eq!(header.lines().count(), 1);
    }

    #[test]
    fn abort_policy_fails_on_first_unreadable_file() {
        let dir = TempDir::new().expect("temp dir should be created");
        let mut paths = write_tree(dir.path());
        let binary = dir.path().join("blob.js");
        fs::write(&binary, [0xff, 0xfe, 0x00, 0x80]).expect("write blob");
        paths.insert(1, binary.clone());

        let err = aggregate(dir.path(), &paths, &AggregateOptions::default())
            .expect_err("invalid utf-8 should abort");
        match err {
            CheckerError::Read { path, .. } => assert_eq!(path, binary),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn skip_policy_drops_unreadable_files() {
        let dir = TempDir::new().expect("temp dir should be created");
        let mut paths = write_tree(dir.path());
        paths.push(dir.path().join("vanished.js"));

        let options = AggregateOptions {
            on_read_error: ReadErrorPolicy::Skip,
            max_corpus_bytes: None,
        };
        let corpus = aggregate(dir.path(), &paths, &options).expect("skip should continue");
        assert_eq!(corpus.files.len(), 2);
        assert_eq!(corpus.skipped, vec!["vanished.js".to_string()]);
        assert!(!corpus.text.contains("vanished.js"));
    }

    #[test]
    fn byte_budget_omits_whole_trailing_files() {
        let dir = TempDir::new().expect("temp dir should be created");
        let paths = write_tree(dir.path());
        let unbounded = aggregate(dir.path(), &paths, &AggregateOptions::default())
            .expect("aggregate should succeed");
        let first_block_len = render_block(&unbounded.boundary, &unbounded.files[0]).len();

        let options = AggregateOptions {
            on_read_error: ReadErrorPolicy::Abort,
            max_corpus_bytes: Some(first_block_len + 1),
        };
        let corpus = aggregate(dir.path(), &paths, &options).expect("aggregate should succeed");
        assert_eq!(corpus.files.len(), 1);
        assert_eq!(corpus.truncated, vec!["src/util.js".to_string()]);
        assert_eq!(corpus.len_bytes(), first_block_len);
    }

    #[test]
    fn empty_path_list_yields_empty_corpus() {
        let dir = TempDir::new().expect("temp dir should be created");
        let corpus = aggregate(dir.path(), &[], &AggregateOptions::default())
            .expect("aggregate should succeed");
        assert!(corpus.is_empty());
        assert!(corpus.text.is_empty());
    }
}
