//! Passthrough copy of static assets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Copies configured paths from the input tree to the output tree unchanged.
#[derive(Debug, Clone)]
pub struct Passthrough {
    input_dir: PathBuf,
    output_dir: PathBuf,
    paths: Vec<String>,
}

impl Passthrough {
    pub fn new(input_dir: &Path, output_dir: &Path, paths: &[String]) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            paths: paths.to_vec(),
        }
    }

    /// Whether `relative` (to the input dir) is covered by a passthrough entry.
    pub fn covers(&self, relative: &Path) -> bool {
        self.paths.iter().any(|p| relative.starts_with(p.trim_matches('/')))
    }

    /// Copy every configured path and return the number of files copied.
    ///
    /// Paths that do not exist are logged and skipped.
    pub fn copy_all(&self) -> io::Result<usize> {
        let mut copied = 0;

        for entry in &self.paths {
            let relative = entry.trim_matches('/');
            let source = self.input_dir.join(relative);

            if !source.exists() {
                tracing::warn!("Passthrough path not found: {}", source.display());
                continue;
            }

            for file in WalkDir::new(&source)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let rel = file
                    .path()
                    .strip_prefix(&self.input_dir)
                    .unwrap_or(file.path());
                let target = self.output_dir.join(rel);

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(file.path(), &target)?;
                copied += 1;
            }

            tracing::debug!("Copied passthrough {}", relative);
        }

        Ok(copied)
    }
}
