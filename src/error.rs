//! Error types for vp9dec

use thiserror::Error;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vp9dec
///
/// Every parse failure surfaces as `Corrupted` rather than a panic; buffer
/// dimensioning problems surface as `AllocationFailure`. `NeedsMoreInput`
/// is the normal "decoder drained" signal, not a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The bitstream is malformed
    #[error("Corrupted bitstream: {0}")]
    Corrupted(String),

    /// A frame or intermediate buffer could not be dimensioned
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// The decoder has no frame queued; feed another sample
    #[error("Needs more input")]
    NeedsMoreInput,
}

impl Error {
    /// Create a corrupted-bitstream error
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        Error::Corrupted(msg.into())
    }

    /// Create an allocation failure error
    pub fn allocation<S: Into<String>>(msg: S) -> Self {
        Error::AllocationFailure(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::corrupted("bad sync code");
        assert_eq!(e.to_string(), "Corrupted bitstream: bad sync code");
        assert_eq!(Error::NeedsMoreInput.to_string(), "Needs more input");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(Error::NeedsMoreInput, Error::NeedsMoreInput);
        assert_ne!(
            Error::corrupted("a"),
            Error::allocation("a"),
        );
    }
}
