//! Error types for lydroid
//!
//! Every component error converts into [`LyDroidError`], whose variant decides
//! the process exit code reported by the CLI.

use thiserror::Error;

/// Main error type for lydroid
#[derive(Error, Debug)]
pub enum LyDroidError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Environment(String),

    #[error("{0}")]
    FileNotFound(String),

    #[error("{0}")]
    NotSupported(String),

    #[error("{0}")]
    Directory(String),

    #[error("{0}")]
    Generic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for lydroid operations
pub type Result<T> = std::result::Result<T, LyDroidError>;

/// Broad classification used for exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Environment,
    FileNotFound,
    NotSupported,
    Directory,
    Generic,
}

impl ErrorKind {
    /// Process exit code for this kind on the current platform
    pub fn exit_code(self) -> i32 {
        if cfg!(windows) {
            match self {
                ErrorKind::FileNotFound => 2,
                ErrorKind::Environment => 10,
                ErrorKind::NotSupported => 50,
                ErrorKind::InvalidArgument => 87,
                ErrorKind::Directory => 267,
                ErrorKind::Generic => 1,
            }
        } else {
            // sysexits.h
            match self {
                ErrorKind::InvalidArgument => 64,
                ErrorKind::FileNotFound => 66,
                ErrorKind::NotSupported => 69,
                ErrorKind::Directory => 73,
                ErrorKind::Environment => 78,
                ErrorKind::Generic => 1,
            }
        }
    }
}

impl LyDroidError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LyDroidError::InvalidArgument(_) | LyDroidError::TomlParse(_) => ErrorKind::InvalidArgument,
            LyDroidError::Environment(_) => ErrorKind::Environment,
            LyDroidError::FileNotFound(_) => ErrorKind::FileNotFound,
            LyDroidError::NotSupported(_) => ErrorKind::NotSupported,
            LyDroidError::Directory(_) => ErrorKind::Directory,
            LyDroidError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            LyDroidError::Generic(_) | LyDroidError::Io(_) | LyDroidError::Json(_) => ErrorKind::Generic,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        LyDroidError::InvalidArgument(msg.into())
    }

    pub fn environment(msg: impl Into<String>) -> Self {
        LyDroidError::Environment(msg.into())
    }

    pub fn file_not_found(msg: impl Into<String>) -> Self {
        LyDroidError::FileNotFound(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        LyDroidError::NotSupported(msg.into())
    }

    pub fn directory(msg: impl Into<String>) -> Self {
        LyDroidError::Directory(msg.into())
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        LyDroidError::Generic(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_verbatim() {
        let err = LyDroidError::invalid_argument("--android-sdk-platform must be at least 28");
        assert_eq!(err.to_string(), "--android-sdk-platform must be at least 28");
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::InvalidArgument,
            ErrorKind::Environment,
            ErrorKind::FileNotFound,
            ErrorKind::NotSupported,
            ErrorKind::Directory,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
        assert_eq!(ErrorKind::Generic.exit_code(), 1);
    }

    #[test]
    fn test_missing_file_io_error_maps_to_file_not_found() {
        let err: LyDroidError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}
