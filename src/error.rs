//! Recoverable map errors.

/// Errors returned by fallible [`CuckooMap`](crate::CuckooMap) operations
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// Checked lookup of a key that is not in the map
    KeyNotFound,

    /// Requested capacity does not fit in `usize`
    CapacityOverflow,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyNotFound => f.write_str("key not found"),
            Self::CapacityOverflow => f.write_str("capacity overflow"),
        }
    }
}

impl std::error::Error for Error {}

/// Map result
pub type Result<T> = std::result::Result<T, Error>;
