use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for SharedError {
    fn from(value: io::Error) -> Self {
        SharedError::Transport(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_surface_as_transport_errors() {
        let err = SharedError::from(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        assert!(matches!(err, SharedError::Transport(_)));
        assert_eq!(err.to_string(), "transport error: unplugged");
    }

    #[test]
    fn config_errors_keep_their_message() {
        let err = SharedError::Config("baud rate must be non-zero".into());
        assert_eq!(err.to_string(), "configuration error: baud rate must be non-zero");
    }
}
