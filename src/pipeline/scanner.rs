use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::PipelineError;

/// A file produced by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub absolute: PathBuf,
    /// Path relative to the output root, `/`-separated on every platform.
    pub relative: String,
}

/// Every regular file under `root`, depth-first in traversal order.
pub fn scan(root: &Path) -> Result<Vec<ScannedFile>, PipelineError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let context = format!("scanning {}", root.display());
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            PipelineError::io(context, io)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PipelineError::io("resolving output path", std::io::Error::other(e)))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(ScannedFile {
            absolute: entry.path().to_path_buf(),
            relative,
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_empty_tree() {
        let dir = tempdir().unwrap();
        assert!(scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_lists_files_only_with_relative_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("assets/fonts")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("index.html"), "<html/>").unwrap();
        fs::write(root.join("assets/app.js"), "1").unwrap();
        fs::write(root.join("assets/fonts/a.woff2"), "f").unwrap();

        let files = scan(root).unwrap();
        let relative: BTreeSet<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(
            relative,
            BTreeSet::from(["assets/app.js", "assets/fonts/a.woff2", "index.html"])
        );
        for file in &files {
            assert_eq!(file.absolute, root.join(&file.relative));
        }
    }

    #[test]
    fn test_scan_missing_root_is_io_error() {
        let dir = tempdir().unwrap();
        let err = scan(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
