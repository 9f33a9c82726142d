//! Error types shared by the encoder, the decoder and the stream wrapper.

use std::io;

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LzmaError>;

#[derive(Debug, Error)]
pub enum LzmaError {
    /// The 5 properties bytes or the 13 byte file header could not be parsed.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A coder property is outside of its documented bounds.
    #[error("{name} out of range: {value} is not in [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// The compressed stream violates an invariant of the format.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// A decoded match distance points outside of the available history.
    #[error(
        "corrupt stream: distance {distance} exceeds the history ({history} bytes, dictionary {dict_size})"
    )]
    InvalidDistance {
        distance: u32,
        history: u64,
        dict_size: u32,
    },

    /// The compressed input ended while more coded bits were required.
    #[error("truncated input: compressed stream ended before decoding finished")]
    TruncatedInput,

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LzmaError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        LzmaError::CorruptStream(message.into())
    }

    pub fn out_of_range(name: &'static str, value: u64, min: u64, max: u64) -> Self {
        LzmaError::OutOfRange {
            name,
            value,
            min,
            max,
        }
    }

    /// Maps an I/O error hit while reading compressed input. Running out of input is
    /// reported as [`LzmaError::TruncatedInput`] rather than a generic I/O failure.
    pub fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            LzmaError::TruncatedInput
        } else {
            LzmaError::Io(err)
        }
    }

    /// Returns true for errors caused by invalid compressed data.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            LzmaError::CorruptStream(_) | LzmaError::InvalidDistance { .. }
        )
    }
}

impl From<LzmaError> for io::Error {
    fn from(err: LzmaError) -> Self {
        match err {
            LzmaError::Io(err) => err,
            LzmaError::TruncatedInput => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            LzmaError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            LzmaError::OutOfRange { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            LzmaError::MalformedHeader(_)
            | LzmaError::CorruptStream(_)
            | LzmaError::InvalidDistance { .. } => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_truncated_input() {
        let err = LzmaError::from_read(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, LzmaError::TruncatedInput));

        let err = LzmaError::from_read(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, LzmaError::Io(_)));
    }

    #[test]
    fn converts_into_io_error_kinds() {
        let err: io::Error = LzmaError::Unsupported("seek").into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let err: io::Error = LzmaError::corrupt("bad").into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err: io::Error = LzmaError::out_of_range("lc", 9, 0, 8).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn out_of_range_message_names_the_property() {
        let err = LzmaError::out_of_range("lc", 9, 0, 8);
        assert_eq!(err.to_string(), "lc out of range: 9 is not in [0, 8]");
    }
}
