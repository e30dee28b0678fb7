//! Route descriptors for deployment tooling.
//!
//! Every rendered handler gets a `spec.json` next to its entry point:
//!
//! ```json
//! {"method":"GET","path":"/hr/employees/{id}"}
//! ```

use crate::error::{Error, Result};
use crate::model::{HandlerDefinition, ServiceDefinition};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the descriptor inside a handler's output directory
pub const DESCRIPTOR_FILE: &str = "spec.json";

/// Method and effective path of one handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub method: String,
    pub path: String,
}

impl RouteDescriptor {
    pub fn new(service: &ServiceDefinition, handler: &HandlerDefinition) -> Self {
        Self {
            method: handler.method.as_str().to_string(),
            path: service.effective_path(handler),
        }
    }
}

/// Serializes a descriptor to compact JSON followed by a newline.
pub fn serialize(descriptor: &RouteDescriptor) -> Result<String> {
    let json = serde_json::to_string(descriptor).map_err(|e| Error::Render {
        unit: format!("{} {}", descriptor.method, descriptor.path),
        message: format!("Failed to serialize route descriptor: {}", e),
    })?;
    Ok(format!("{}\n", json))
}

/// Writes the descriptor into `dir`.
pub fn write_descriptor(dir: &Path, descriptor: &RouteDescriptor) -> Result<()> {
    let content = serialize(descriptor)?;
    write_to_file(&content, &dir.join(DESCRIPTOR_FILE))
}

/// Writes string content to a file, creating parent directories as needed.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory or the file cannot be written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    fs::write(path, content).map_err(|e| Error::io(path, e))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
