use crate::annotation::DEFAULT_NAMESPACE;
use crate::codegen::FailurePolicy;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Output directory used when none is given
pub const DEFAULT_OUTPUT_DIR: &str = "lambda";

/// Settings for one generator run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root of the crate whose modules are scanned
    pub project_root: PathBuf,
    /// Directory under the project root that receives generated units
    pub output_dir: String,
    /// Annotation namespace, `lambdagen` unless overridden
    pub namespace: String,
    /// Library crate name used as the first segment of every generated path
    pub crate_name: String,
    pub failure_policy: FailurePolicy,
    /// Run `rustfmt` over generated entry points
    pub format: bool,
}

impl GeneratorConfig {
    pub fn new(project_root: impl Into<PathBuf>, crate_name: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            crate_name: crate_name.into(),
            failure_policy: FailurePolicy::default(),
            format: true,
        }
    }

    pub fn src_root(&self) -> PathBuf {
        self.project_root.join("src")
    }

    pub fn output_root(&self) -> PathBuf {
        self.project_root.join(&self.output_dir)
    }

    /// Resolves a module identifier against the project root
    pub fn module_path(&self, module: &str) -> PathBuf {
        self.project_root.join(module)
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<PackageSection>,
    lib: Option<LibSection>,
}

#[derive(Debug, Deserialize)]
struct PackageSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LibSection {
    name: Option<String>,
}

/// Reads the library crate name from `<project_root>/Cargo.toml`.
///
/// `[lib] name` wins over `[package] name`; dashes become underscores as rustc does.
pub fn read_crate_name(project_root: &Path) -> Result<String> {
    let manifest_path = project_root.join("Cargo.toml");
    debug!("Reading crate name from {}", manifest_path.display());

    let content = fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read manifest: {}", manifest_path.display()))?;
    crate_name_from_manifest(&content).with_context(|| format!("Invalid manifest: {}", manifest_path.display()))
}

fn crate_name_from_manifest(content: &str) -> Result<String> {
    let manifest: Manifest = toml::from_str(content)?;

    let name = manifest
        .lib
        .and_then(|lib| lib.name)
        .or(manifest.package.map(|package| package.name));

    match name {
        Some(name) => Ok(name.replace('-', "_")),
        None => bail!("manifest has neither [lib] name nor [package] name"),
    }
}
