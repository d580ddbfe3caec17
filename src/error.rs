use core::fmt;

/// Result alias for `coarsen`.
pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable errors returned by the clustering entry points.
///
/// Violations of internal contracts (out-of-range ids, inconsistent graphs)
/// panic instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Length of a per-node input does not match the graph.
    DimensionMismatch {
        /// Expected length (the node count).
        expected: usize,
        /// Found length.
        found: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
