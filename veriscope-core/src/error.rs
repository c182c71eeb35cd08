//! Error types for Veriscope

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(String),

    #[error("Inference timed out for frame {frame} after {elapsed_ms}ms")]
    InferenceTimeout { frame: u64, elapsed_ms: u64 },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Source("stream closed".to_string());
        assert!(err.to_string().contains("Source error"));
        assert!(err.to_string().contains("stream closed"));
    }

    #[test]
    fn test_inference_timeout_display() {
        let err = Error::InferenceTimeout {
            frame: 42,
            elapsed_ms: 800,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("800"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(_) => {}
            _ => panic!("Expected Serialization error"),
        }
    }
}
