//! Error types for HDF5 datatype message parsing.

use core::fmt;

/// Errors that can occur when decoding or encoding a datatype message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Unexpected end of data.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// The datatype class nibble is not a known class.
    InvalidDatatypeClass(u8),
    /// The datatype version is not valid for its class.
    InvalidDatatypeVersion {
        /// Datatype class id.
        class: u8,
        /// Version found in the message.
        version: u8,
    },
    /// String padding value outside 0..=2.
    InvalidStringPadding(u8),
    /// Character set value outside 0..=1.
    InvalidCharacterSet(u8),
    /// Compound member name is not valid UTF-8.
    InvalidMemberName,
    /// The datatype has no message encoding in this crate.
    UnencodableClass(u8),
    /// Nested member, base or element types exceed the parser's limit.
    NestingTooDeep {
        /// Deepest nesting accepted.
        limit: usize,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidDatatypeClass(c) => write!(f, "invalid datatype class: {c}"),
            FormatError::InvalidDatatypeVersion { class, version } => {
                write!(f, "invalid version {version} for datatype class {class}")
            }
            FormatError::InvalidStringPadding(p) => write!(f, "invalid string padding: {p}"),
            FormatError::InvalidCharacterSet(c) => write!(f, "invalid character set: {c}"),
            FormatError::InvalidMemberName => write!(f, "compound member name is not UTF-8"),
            FormatError::UnencodableClass(c) => {
                write!(f, "datatype class {c} cannot be encoded")
            }
            FormatError::NestingTooDeep { limit } => {
                write!(f, "datatype nesting deeper than {limit} levels")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}
