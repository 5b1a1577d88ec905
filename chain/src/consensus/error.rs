use std::fmt;

/// Errors that can occur while applying or querying blocks.
#[derive(Debug)]
pub enum ChainError {
    /// The block's hash already appears in the main chain or orphans.
    DuplicateBlock(String),
    /// The block's ancestor is unknown to both pools; the block is
    /// discarded.
    UnknownAncestor(String),
    /// No block exists at the requested height.
    HeightNotFound(u64),
    /// A range query with `start > end`.
    InvalidRange { start: u64, end: u64 },
    /// Snapshot I/O failure.
    Io(std::io::Error),
    /// Snapshot encode/decode failure.
    Codec(serde_json::Error),
}

impl From<std::io::Error> for ChainError {
    fn from(e: std::io::Error) -> Self {
        ChainError::Io(e)
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::Codec(e)
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::DuplicateBlock(hash) => write!(f, "duplicate block {hash}"),
            ChainError::UnknownAncestor(hash) => {
                write!(f, "unknown ancestor block {hash}")
            }
            ChainError::HeightNotFound(height) => {
                write!(f, "block at height {height} not found")
            }
            ChainError::InvalidRange { start, end } => {
                write!(f, "invalid block range {start}..={end}")
            }
            ChainError::Io(e) => write!(f, "chain snapshot I/O error: {e}"),
            ChainError::Codec(e) => write!(f, "chain snapshot codec error: {e}"),
        }
    }
}

impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn duplicate_block_display_includes_hash() {
        let err = ChainError::DuplicateBlock("abcd".to_string());
        assert_eq!(err.to_string(), "duplicate block abcd");
    }

    #[test]
    fn unknown_ancestor_display_includes_hash() {
        let err = ChainError::UnknownAncestor("ff00".to_string());
        assert_eq!(err.to_string(), "unknown ancestor block ff00");
    }

    #[test]
    fn range_errors_name_the_bounds() {
        let err = ChainError::InvalidRange { start: 5, end: 2 };
        assert_eq!(err.to_string(), "invalid block range 5..=2");

        let err = ChainError::HeightNotFound(7);
        assert_eq!(err.to_string(), "block at height 7 not found");
    }

    #[test]
    fn io_and_codec_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChainError = io.into();
        assert!(matches!(err, ChainError::Io(_)));

        let bad: Result<u64, _> = serde_json::from_str("not json");
        let err: ChainError = bad.unwrap_err().into();
        assert!(matches!(err, ChainError::Codec(_)));
    }

    #[test]
    fn chain_error_implements_std_error() {
        fn assert_is_error<E: StdError>() {}
        assert_is_error::<ChainError>();
    }
}
