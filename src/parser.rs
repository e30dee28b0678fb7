use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// AST (Abstract Syntax Tree) parser for Rust source files.
///
/// The `AstParser` uses the `syn` crate to parse Rust source code into an abstract syntax tree.
/// Each parsed file also records the Rust module path it is compiled as, which is where the
/// generated entry points will find its items.
///
/// # Example
///
/// ```no_run
/// use lambdagen::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/employees.rs"), "my_crate::employees").unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path of the file, e.g. `my_crate::employees`
    pub namespace: String,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// Parses in-memory source; used for fixtures and tests.
    pub fn from_source(path: impl Into<PathBuf>, namespace: impl Into<String>, source: &str) -> Result<Self> {
        let path = path.into();
        let syntax_tree = syn::parse_file(source).map_err(|e| Error::Source {
            file: path.clone(),
            message: format!("Failed to parse Rust syntax: {}", e),
        })?;

        Ok(Self {
            path,
            namespace: namespace.into(),
            syntax_tree,
        })
    }
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the file cannot be read or contains invalid Rust syntax.
    pub fn parse_file(path: &Path, namespace: &str) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| Error::Source {
            file: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;

        let parsed = ParsedFile::from_source(path, namespace, &content)?;

        debug!("Successfully parsed file: {} as {}", path.display(), namespace);
        Ok(parsed)
    }

    /// Parses every file of a module, stopping at the first failure.
    ///
    /// A module is only analysed when all of its files parse: a missing file could hide the
    /// initializer or a request-config struct.
    pub fn parse_module(paths: &[PathBuf], crate_name: &str, src_root: &Path) -> Result<Vec<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        paths
            .iter()
            .map(|path| Self::parse_file(path, &module_namespace(crate_name, src_root, path)))
            .collect()
    }
}

/// Derives the Rust module path of a source file from its location under `src_root`.
///
/// `mod.rs`, `lib.rs` and `main.rs` name their parent module. Files outside `src_root` are
/// treated as if they lived at the crate root.
pub fn module_namespace(crate_name: &str, src_root: &Path, file: &Path) -> String {
    let Ok(relative) = file.strip_prefix(src_root) else {
        return crate_name.to_string();
    };

    let mut segments = vec![crate_name.to_string()];
    let components: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    let last = components.len().saturating_sub(1);
    for (idx, component) in components.iter().enumerate() {
        if idx < last {
            segments.push(component.clone());
            continue;
        }

        let stem = component.strip_suffix(".rs").unwrap_or(component);
        let is_parent_file = stem == "mod" || (idx == 0 && (stem == "lib" || stem == "main"));
        if !is_parent_file {
            segments.push(stem.to_string());
        }
    }

    segments.join("::")
}
