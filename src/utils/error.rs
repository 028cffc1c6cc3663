//! Error Handling Module
//!
//! Defines the error type for the CIFAR-10 library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for CIFAR-10 operations
#[derive(Error, Debug)]
pub enum Cifar10Error {
    /// A batch file did not follow the CIFAR-10 binary layout
    #[error("Malformed batch file '{0}': {1}")]
    MalformedBatch(PathBuf, String),

    /// Label outside the class range
    #[error("Label {label} is out of range for {num_classes} classes")]
    InvalidLabel { label: usize, num_classes: usize },

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with model operations (construction, checkpoints)
    #[error("Model error: {0}")]
    Model(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Download or archive extraction failure
    #[error("Download error: {0}")]
    Download(String),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for Cifar10Error {
    fn from(err: serde_json::Error) -> Self {
        Cifar10Error::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Cifar10Error {
    fn from(err: image::ImageError) -> Self {
        Cifar10Error::Image(err.to_string())
    }
}

/// Convenience Result type for CIFAR-10 operations
pub type Result<T> = std::result::Result<T, Cifar10Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Cifar10Error::Dataset("test error".to_string());
        assert_eq!(format!("{}", err), "Dataset error: test error");
    }

    #[test]
    fn test_invalid_label_display() {
        let err = Cifar10Error::InvalidLabel {
            label: 12,
            num_classes: 10,
        };
        assert_eq!(err.to_string(), "Label 12 is out of range for 10 classes");
    }

    #[test]
    fn test_malformed_batch_mentions_path() {
        let err = Cifar10Error::MalformedBatch(
            PathBuf::from("/data/data_batch_1.bin"),
            "truncated".to_string(),
        );
        assert!(err.to_string().contains("data_batch_1.bin"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Cifar10Error = io_err.into();
        assert!(matches!(err, Cifar10Error::Io(_)));
    }
}
