//! Local binary lookup
//!
//! Resolves user-supplied paths against the working directory and the
//! configured binary directory, and enumerates candidate images.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A binary image found in the binary directory
#[derive(Debug, Clone, PartialEq)]
pub struct LocalBinary {
    /// File name only
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl LocalBinary {
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// Resolve a binary path
///
/// Tries, in order: the input as given (absolute, or existing relative to the
/// working directory), the input inside `bin_dir`, then both again with
/// `extension` appended when the input does not already end with it.
/// Returns the input unchanged when nothing exists; callers check existence.
pub fn resolve_binary_path(input: &str, bin_dir: &Path, extension: &str) -> PathBuf {
    let direct = PathBuf::from(input);
    if direct.is_absolute() || direct.exists() {
        return direct;
    }

    let in_dir = bin_dir.join(input);
    if in_dir.exists() {
        debug!(path = %in_dir.display(), "Resolved binary in default directory");
        return in_dir;
    }

    if !extension.is_empty() && !input.ends_with(extension) {
        let with_ext = format!("{}{}", input, extension);

        let direct = PathBuf::from(&with_ext);
        if direct.exists() {
            return direct;
        }

        let in_dir = bin_dir.join(&with_ext);
        if in_dir.exists() {
            debug!(path = %in_dir.display(), "Resolved binary in default directory with extension");
            return in_dir;
        }
    }

    PathBuf::from(input)
}

/// List files in `bin_dir` ending with `extension`, sorted by name
///
/// A missing directory yields an empty list.
pub fn list_binaries(bin_dir: &Path, extension: &str) -> std::io::Result<Vec<LocalBinary>> {
    if !bin_dir.is_dir() {
        warn!(dir = %bin_dir.display(), "Binary directory does not exist");
        return Ok(Vec::new());
    }

    let mut binaries = Vec::new();
    for entry in std::fs::read_dir(bin_dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(extension) {
            continue;
        }
        binaries.push(LocalBinary {
            name,
            path: entry.path(),
            size: metadata.len(),
        });
    }

    binaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(binaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_absolute_is_returned_as_is() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.bin");
        let resolved = resolve_binary_path(missing.to_str().unwrap(), Path::new("/unused"), ".bin");
        assert_eq!(resolved, missing);
    }

    #[test]
    fn test_resolve_in_default_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("fwreg_only_here_a1.bin"), b"x").unwrap();

        let resolved = resolve_binary_path("fwreg_only_here_a1.bin", temp_dir.path(), ".bin");
        assert_eq!(resolved, temp_dir.path().join("fwreg_only_here_a1.bin"));
    }

    #[test]
    fn test_resolve_appends_extension() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("fwreg_only_here_b2.bin"), b"x").unwrap();

        let resolved = resolve_binary_path("fwreg_only_here_b2", temp_dir.path(), ".bin");
        assert_eq!(resolved, temp_dir.path().join("fwreg_only_here_b2.bin"));
    }

    /// Removes a file created in the working directory when dropped
    struct CwdFile(PathBuf);

    impl CwdFile {
        fn create(name: &str) -> Self {
            std::fs::write(name, b"x").unwrap();
            Self(PathBuf::from(name))
        }
    }

    impl Drop for CwdFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_resolve_relative_to_working_dir() {
        let _file = CwdFile::create("fwreg_cwd_test_d4.bin");
        let temp_dir = TempDir::new().unwrap();
        // Also present in the default directory; the working directory wins
        std::fs::write(temp_dir.path().join("fwreg_cwd_test_d4.bin"), b"y").unwrap();

        let resolved = resolve_binary_path("fwreg_cwd_test_d4.bin", temp_dir.path(), ".bin");
        assert_eq!(resolved, PathBuf::from("fwreg_cwd_test_d4.bin"));
    }

    #[test]
    fn test_resolve_extension_in_working_dir() {
        let _file = CwdFile::create("fwreg_cwd_test_e5.bin");
        let temp_dir = TempDir::new().unwrap();
        // The default-directory copy only matches after the extension is added
        std::fs::write(temp_dir.path().join("fwreg_cwd_test_e5.bin"), b"y").unwrap();

        let resolved = resolve_binary_path("fwreg_cwd_test_e5", temp_dir.path(), ".bin");
        assert_eq!(resolved, PathBuf::from("fwreg_cwd_test_e5.bin"));
    }

    #[test]
    fn test_resolve_unmatched_returns_input() {
        let temp_dir = TempDir::new().unwrap();
        let resolved = resolve_binary_path("fwreg_missing_c3", temp_dir.path(), ".bin");
        assert_eq!(resolved, PathBuf::from("fwreg_missing_c3"));

        let resolved = resolve_binary_path("fwreg_missing_c3.bin", temp_dir.path(), ".bin");
        assert_eq!(resolved, PathBuf::from("fwreg_missing_c3.bin"));
    }

    #[test]
    fn test_list_binaries_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("stm32_b.bin"), vec![0u8; 2048]).unwrap();
        std::fs::write(temp_dir.path().join("esp32_a.bin"), vec![0u8; 512]).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(temp_dir.path().join("dir.bin")).unwrap();

        let binaries = list_binaries(temp_dir.path(), ".bin").unwrap();
        let names: Vec<&str> = binaries.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["esp32_a.bin", "stm32_b.bin"]);
        assert_eq!(binaries[0].size, 512);
        assert!((binaries[1].size_kb() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_list_binaries_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let binaries = list_binaries(&temp_dir.path().join("absent"), ".bin").unwrap();
        assert!(binaries.is_empty());
    }
}
