//! Single-file or whole-directory processing for SBOM commands.
//!
//! `convert-to-purl` and `validate-sbom` accept either `--file` or `--dir`.
//! In directory mode every top-level `*.json` file is processed and failures
//! are collected instead of stopping at the first one.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files handled and `(file, error)` pairs for those that failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub processed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn collected failures into one error listing each file.
    pub fn into_result(self, action: &str) -> Result<Vec<PathBuf>> {
        if self.failed.is_empty() {
            return Ok(self.processed);
        }
        let mut msg = format!(
            "{} failed for {} of {} files:",
            action,
            self.failed.len(),
            self.failed.len() + self.processed.len()
        );
        for (path, err) in &self.failed {
            msg.push_str(&format!("\n  {}: {}", path.display(), err));
        }
        bail!(msg)
    }
}

/// Top-level `*.json` files in `dir`, sorted by path.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Apply `op` to `file`, or to every JSON file in `dir`.
///
/// A single file's error is returned directly. Directory mode always
/// returns the full outcome.
pub fn for_each_sbom<F>(file: Option<&Path>, dir: Option<&Path>, mut op: F) -> Result<BatchOutcome>
where
    F: FnMut(&Path) -> Result<()>,
{
    let mut outcome = BatchOutcome::default();

    match (file, dir) {
        (Some(file), None) => {
            op(file)?;
            outcome.processed.push(file.to_path_buf());
        }
        (None, Some(dir)) => {
            for path in json_files(dir)? {
                match op(&path) {
                    Ok(()) => outcome.processed.push(path),
                    Err(e) => outcome.failed.push((path, format!("{:#}", e))),
                }
            }
        }
        (Some(_), Some(_)) => bail!("--file and --dir are mutually exclusive"),
        (None, None) => bail!("either --file or --dir must be specified"),
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_files_top_level_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("a.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested/c.json"), "{}").unwrap();

        let files = json_files(tmp.path()).unwrap();
        assert_eq!(
            files,
            vec![tmp.path().join("a.json"), tmp.path().join("b.json")]
        );
    }

    #[test]
    fn test_directory_mode_collects_failures() {
        let tmp = tempfile::TempDir::new().unwrap();
        for name in ["a.json", "bad.json", "c.json"] {
            std::fs::write(tmp.path().join(name), "{}").unwrap();
        }

        let outcome = for_each_sbom(None, Some(tmp.path()), |p| {
            if p.ends_with("bad.json") {
                bail!("nope");
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(outcome.processed.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert!(!outcome.is_success());

        let err = outcome.into_result("validation").unwrap_err().to_string();
        assert!(err.contains("validation failed for 1 of 3 files"));
        assert!(err.contains("bad.json: nope"));
    }

    #[test]
    fn test_file_mode_returns_error_directly() {
        let err = for_each_sbom(Some(Path::new("x.json")), None, |_| bail!("broken"))
            .unwrap_err();
        assert_eq!(err.to_string(), "broken");
    }

    #[test]
    fn test_requires_a_target() {
        assert!(for_each_sbom(None, None, |_| Ok(())).is_err());
    }
}
