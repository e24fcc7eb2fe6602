use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while turning a directory of annotation
/// files into a unified table.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("cannot access {}: {source}", .path.display())]
    FilesystemAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no files in {} matched the filter", .directory.display())]
    NoMatchingFiles { directory: PathBuf },

    #[error("cannot derive a donor identifier from '{filename}' (expected <prefix>_<donor>-<tag>...)")]
    MalformedFilename { filename: String },

    #[error("{}: corrupt gzip stream: {source}", .path.display())]
    Decompression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("missing columns: {}", .columns.join(", "))]
    MissingColumn { columns: Vec<String> },
}

pub type Result<T> = std::result::Result<T, LoaderError>;

impl LoaderError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LoaderError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Split a `csv` failure into decompression (the underlying reader
    /// failed) and parse (the text itself is bad) errors.
    pub(crate) fn from_csv(path: impl Into<PathBuf>, err: csv::Error) -> Self {
        let path = path.into();
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(source) => LoaderError::Decompression { path, source },
                other => LoaderError::Parse {
                    path,
                    message: format!("{other:?}"),
                },
            }
        } else {
            LoaderError::Parse {
                path,
                message: err.to_string(),
            }
        }
    }
}
