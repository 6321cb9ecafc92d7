//! Errors for dynamic type introspection and packet reads.

use rustyhdf5_format::FormatError;

use crate::engine::TypeClass;

/// Errors surfaced by descriptors, decoders and table readers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A compound-only operation was called on another class.
    #[error("{op}: datatype is not compound")]
    NotCompound { op: &'static str },

    /// A member index past the end of the compound.
    #[error("member index {index} out of range for compound with {count} members")]
    MemberIndex { index: usize, count: usize },

    /// No primitive decoder matches the type.
    #[error("no decoder for {class} datatype")]
    UnsupportedType { class: TypeClass },

    /// The storage engine reported a failure.
    #[error("engine error in {op}: {detail}")]
    Engine { op: &'static str, detail: String },

    /// Reader configuration rejected before any allocation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A datatype message could not be decoded.
    #[error("datatype message: {0}")]
    Format(#[from] FormatError),
}

impl Error {
    pub(crate) fn engine(op: &'static str, detail: impl Into<String>) -> Self {
        Error::Engine {
            op,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
