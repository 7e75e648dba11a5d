// File helpers for saved logs and report output

use std::io;
use std::path::{Path, PathBuf};

/// File utilities for report and log output
pub struct FileUtils;

impl FileUtils {
    /// Replace characters that are unsafe in a file name with '_'
    pub fn sanitize_file_name(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            String::from("unnamed")
        } else {
            cleaned
        }
    }

    /// Create `dir` and its parents, returning it
    pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        Ok(dir.to_path_buf())
    }
}
