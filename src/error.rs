use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while reading, reconstructing or writing a
/// session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed index or configuration text, or an unreadable index file.
    #[error("malformed index file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// Hierarchy parents that never resolve, or ordinals that are not a
    /// contiguous `1..=N` permutation.
    #[error("corrupt session: {0}")]
    CorruptSession(String),

    /// A measurement data file could not be located (strict mode).
    #[error("could not find file: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Recorded and recomputed content hashes disagree (strict mode).
    #[error("file hashes don't match for: {}", .0.display())]
    HashMismatch(PathBuf),

    /// A measurement that is neither file-backed nor a hierarchy child.
    #[error("measurement '{0}' must be backed by a data file or be a hierarchy child")]
    InvalidMeasurement(String),

    /// A title, name or directory the index grammar cannot carry: `#` starts
    /// a comment and every entry is a single line.
    #[error("cannot record {what} '{value}' of '{title}' in a session index: '#' and line breaks are not allowed")]
    Unrepresentable {
        title: String,
        what: &'static str,
        value: String,
    },

    /// Operations that exist in the interface but are deliberately not
    /// implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("failed to load event data from {}: {source}", path.display())]
    Data {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("reading {}: {source}", path.display())]
    ReadMask {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("writing {}: {source}", path.display())]
    WriteMask {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
