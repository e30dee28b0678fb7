use std::path::PathBuf;

/// Result type alias for the generator
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the generator.
///
/// How far an error reaches depends on where it is raised:
/// - `Parse`, `Validation` and `UnsupportedType` on a single declaration exclude that declaration only
/// - a missing or ambiguous initializer, `DuplicateRoute`, `DuplicateOutput` and `Source` abort the module
/// - `Io` and `Render` abort the whole run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed annotation grammar
    #[error("parse error in `{declaration}`: {message}")]
    Parse { declaration: String, message: String },

    /// Structural contract violated (initializer, receiver, signature, field roles)
    #[error("validation error in `{declaration}`: {message}")]
    Validation { declaration: String, message: String },

    /// Request variable type outside {string, integer, boolean}
    #[error("unsupported type `{type_name}` on field `{field}`")]
    UnsupportedType { field: String, type_name: String },

    /// Two handlers claim the same method and effective path
    #[error("route {method} {path} is already mapped")]
    DuplicateRoute { method: String, path: String },

    /// Two handlers resolve to the same output location
    #[error("output location `{location}` is already registered")]
    DuplicateOutput { location: String },

    /// A source file could not be read or parsed
    #[error("source error in {}: {message}", file.display())]
    Source { file: PathBuf, message: String },

    /// Filesystem failure while writing artifacts
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Code synthesis produced something that is not a valid program
    #[error("render error for `{unit}`: {message}")]
    Render { unit: String, message: String },
}

impl Error {
    pub fn parse(declaration: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            declaration: declaration.into(),
            message: message.into(),
        }
    }

    pub fn validation(declaration: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            declaration: declaration.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
