//! Error types shared by the codec and the transfer layer.

use thiserror::Error;

/// Result type for fountain code operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while encoding, parsing or decoding droplets.
///
/// None of these are fatal: a malformed or out-of-range droplet is dropped by
/// the caller, and a stream mismatch only means the decode graph has to start
/// over for the new stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Encoder or table construction was given unusable parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A wire string could not be parsed into a droplet.
    #[error("malformed droplet: {0}")]
    Format(String),

    /// A droplet parsed but violates the acceptance limits of the receiver.
    #[error("rejected droplet: {0}")]
    InvalidDroplet(String),

    /// A droplet belongs to a different stream than the active decode graph.
    #[error("stream mismatch: graph has {expected} chunks, droplet has {found}")]
    StreamMismatch {
        /// Chunk count of the active graph.
        expected: usize,
        /// Chunk count carried by the droplet.
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Format("expected 4 fields, got 2".to_string());
        assert_eq!(err.to_string(), "malformed droplet: expected 4 fields, got 2");

        let err = Error::StreamMismatch {
            expected: 3,
            found: 7,
        };
        assert_eq!(
            err.to_string(),
            "stream mismatch: graph has 3 chunks, droplet has 7"
        );
    }
}
