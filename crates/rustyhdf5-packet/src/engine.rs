//! Seams to the storage engine.
//!
//! [`TypeEngine`] answers type introspection queries against opaque handles;
//! [`PacketTable`] exposes the indexed bulk retrieval of fixed-width
//! records. [`crate::memory`] provides pure-Rust implementations of both.

use std::fmt;

use rustyhdf5_format::{Datatype, DatatypeClass};

use crate::error::Result;

/// Opaque engine handle, `0` meaning "no handle".
pub type Hid = i64;

/// Storage class of a type as seen by the decoding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Integer,
    Float,
    String,
    Compound,
    Other,
}

impl TypeClass {
    /// Classify a decoded datatype. Variable-length strings are strings;
    /// every other variable-length type is `Other`.
    pub fn of(datatype: &Datatype) -> Self {
        match datatype.class() {
            DatatypeClass::FixedPoint => TypeClass::Integer,
            DatatypeClass::FloatingPoint => TypeClass::Float,
            DatatypeClass::String => TypeClass::String,
            DatatypeClass::VariableLength if datatype.is_vlen_string() => TypeClass::String,
            DatatypeClass::Compound => TypeClass::Compound,
            _ => TypeClass::Other,
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeClass::Integer => "integer",
            TypeClass::Float => "float",
            TypeClass::String => "string",
            TypeClass::Compound => "compound",
            TypeClass::Other => "other",
        };
        f.write_str(name)
    }
}

/// Predefined native types every engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    UShort,
    Int,
    LLong,
    Float,
    Double,
    /// NUL-terminated string held by pointer.
    VlenString,
}

/// Type introspection against engine-owned handles.
///
/// Handles returned by [`copy_type`](Self::copy_type) and
/// [`member_type`](Self::member_type) are owned by the caller and must be
/// released with [`close_type`](Self::close_type). Native handles are
/// predefined and never closed.
pub trait TypeEngine: Send + Sync {
    /// Duplicate a handle.
    fn copy_type(&self, id: Hid) -> Result<Hid>;

    fn type_class(&self, id: Hid) -> Result<TypeClass>;

    /// Storage width of one element in memory.
    fn type_size(&self, id: Hid) -> Result<usize>;

    fn member_count(&self, id: Hid) -> Result<usize>;

    fn member_class(&self, id: Hid, index: usize) -> Result<TypeClass>;

    /// New handle on the member's type.
    fn member_type(&self, id: Hid, index: usize) -> Result<Hid>;

    fn member_name(&self, id: Hid, index: usize) -> Result<String>;

    fn member_offset(&self, id: Hid, index: usize) -> Result<usize>;

    /// Structural type equality.
    fn types_equal(&self, a: Hid, b: Hid) -> Result<bool>;

    fn close_type(&self, id: Hid) -> Result<()>;

    fn native_type(&self, native: NativeType) -> Hid;

    /// Text behind a variable-length string reference, `None` when the
    /// reference is unknown.
    fn resolve_vlen_string(&self, reference: usize) -> Option<String>;
}

/// A packet table: an append-oriented sequence of fixed-width records with
/// a retrieval index for cursor-based bulk reads.
pub trait PacketTable {
    /// Ensure the retrieval index exists and position it at the first
    /// packet.
    fn create_index(&mut self) -> Result<()>;

    fn num_packets(&self) -> Result<u64>;

    /// Copy the next `count` packets at the index cursor into `buf` and
    /// advance the cursor.
    fn get_next(&mut self, count: usize, buf: &mut [u8]) -> Result<()>;

    /// Copy `count` packets starting at absolute position `start`.
    fn read_packets(&self, start: u64, count: usize, buf: &mut [u8]) -> Result<()>;

    /// Handle on the element type, owned by the table.
    fn type_handle(&self) -> Hid;
}
