use thiserror::Error;

/// Errors surfaced by camera, media, and preview operations.
///
/// Connection-level request failures (non-200, timeouts, refused
/// connections) are logged and collapsed into absence by
/// [`crate::connection::ConnectionSession::request`]; this type covers the
/// operations that need to report a distinct cause to the caller.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: String },

    #[error("{0} already running")]
    Busy(String),

    #[error("transcoder binary not found: {0}")]
    TranscoderMissing(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ble")]
    #[error("bluetooth error: {0}")]
    Ble(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_value() {
        let err = CameraError::Unsupported {
            what: "resolution",
            value: "8k".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported resolution: 8k");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CameraError = io.into();
        assert!(matches!(err, CameraError::Io(_)));
    }
}
