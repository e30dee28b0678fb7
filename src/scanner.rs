use anyhow::{bail, Result};
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// File scanner for collecting the source files of one module.
///
/// A module is either a single `.rs` file or a directory, in which case the directory is walked
/// recursively. The `target` directory and hidden directories (those starting with `.`) are
/// skipped.
///
/// # Example
///
/// ```no_run
/// use lambdagen::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project/src/employees"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of a scanning operation.
///
/// Contains the list of discovered Rust files and any warnings encountered during scanning.
pub struct ScanResult {
    /// Paths to all discovered `.rs` files, sorted
    pub rust_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for a module directory or file.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Collects all `.rs` files belonging to the module.
    ///
    /// Files are returned in sorted order so that declarations are processed in the same order
    /// on every run. Inaccessible entries are recorded as warnings and scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the module path does not exist, or names a file that is not a `.rs`
    /// file.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.exists() {
            bail!("Module path does not exist: {}", self.root_path.display());
        }

        if self.root_path.is_file() {
            if !is_rust_file(&self.root_path) {
                bail!("Module path is not a Rust file: {}", self.root_path.display());
            }
            return Ok(ScanResult {
                rust_files: vec![self.root_path.clone()],
                warnings: Vec::new(),
            });
        }

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_target = file_name == "target";

                !is_hidden && !is_target
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_rust_file(path) {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        rust_files.sort();

        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }
}

fn is_rust_file(path: &std::path::Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("rs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_module_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("mod.rs"), "pub mod handlers;").unwrap();
        fs::write(root.join("handlers.rs"), "pub fn test() {}").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.rust_files.len(), 2);
        assert!(result.warnings.is_empty());

        let file_names: Vec<String> = result
            .rust_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        // sorted
        assert_eq!(file_names, vec!["handlers.rs".to_string(), "mod.rs".to_string()]);
    }

    #[test]
    fn test_scan_single_file_module() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("employees.rs");
        fs::write(&file, "pub struct Employees;").unwrap();

        let result = FileScanner::new(file.clone()).scan().unwrap();
        assert_eq!(result.rust_files, vec![file]);
    }

    #[test]
    fn test_scan_rejects_non_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();

        assert!(FileScanner::new(file).scan().is_err());
    }

    #[test]
    fn test_scan_missing_module() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileScanner::new(temp_dir.path().join("nope")).scan();

        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("does not exist"));
    }

    #[test]
    fn test_scan_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("api/v1")).unwrap();
        fs::write(root.join("mod.rs"), "pub mod api;").unwrap();
        fs::write(root.join("api/mod.rs"), "pub mod v1;").unwrap();
        fs::write(root.join("api/v1/users.rs"), "struct User {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.rust_files.len(), 3);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_skips_target_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("target")).unwrap();
        fs::write(root.join("target/build.rs"), "fn main() {}").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.rs"), "// config").unwrap();
        fs::write(root.join("lib.rs"), "pub fn f() {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.rust_files.len(), 1);
        assert_eq!(
            result.rust_files[0].file_name().unwrap().to_string_lossy(),
            "lib.rs"
        );
    }
}
