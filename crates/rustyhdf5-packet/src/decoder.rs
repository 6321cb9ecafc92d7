//! Primitive decoders and the table of known native types that selects them.

use std::mem::size_of;
use std::sync::Arc;

use byteorder::{ByteOrder, NativeEndian};

use crate::descriptor::TypeDescriptor;
use crate::engine::{NativeType, TypeEngine};
use crate::error::{Error, Result};
use crate::value::Value;

/// Width of a variable-length string reference inside a record.
pub const POINTER_WIDTH: usize = size_of::<usize>();

/// Decoder for one supported native storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveDecoder {
    /// 64-bit signed integer.
    Long,
    /// 32-bit signed integer.
    Int,
    /// 32-bit float.
    Float,
    /// Pointer-width reference to a NUL-terminated string.
    Str,
}

impl PrimitiveDecoder {
    /// Bytes consumed from the cursor.
    pub fn width(self) -> usize {
        match self {
            PrimitiveDecoder::Long => 8,
            PrimitiveDecoder::Int | PrimitiveDecoder::Float => 4,
            PrimitiveDecoder::Str => POINTER_WIDTH,
        }
    }

    /// Decode one value at the start of `cursor`, returning it with the
    /// number of bytes consumed. String references resolve through
    /// `engine`; a null or unknown reference yields an empty string.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is shorter than [`width`](Self::width).
    pub fn decode<E: TypeEngine + ?Sized>(self, cursor: &[u8], engine: &E) -> (Value, usize) {
        let value = match self {
            PrimitiveDecoder::Long => Value::I64(NativeEndian::read_i64(cursor)),
            PrimitiveDecoder::Int => Value::I32(NativeEndian::read_i32(cursor)),
            PrimitiveDecoder::Float => Value::F32(NativeEndian::read_f32(cursor)),
            PrimitiveDecoder::Str => {
                let reference = read_pointer(cursor);
                if reference == 0 {
                    Value::Str(String::new())
                } else {
                    Value::Str(engine.resolve_vlen_string(reference).unwrap_or_else(|| {
                        log::trace!("dangling string reference {reference:#x}");
                        String::new()
                    }))
                }
            }
        };
        (value, self.width())
    }
}

#[cfg(target_pointer_width = "64")]
fn read_pointer(cursor: &[u8]) -> usize {
    NativeEndian::read_u64(cursor) as usize
}

#[cfg(target_pointer_width = "32")]
fn read_pointer(cursor: &[u8]) -> usize {
    NativeEndian::read_u32(cursor) as usize
}

/// Ordered table of known types and their decoders.
///
/// Lookup walks the entries in declaration order and the first type equal
/// to the candidate wins, so aliasing native types resolve to whichever was
/// declared first.
pub struct DecoderTable<E: TypeEngine> {
    entries: Vec<(TypeDescriptor<E>, PrimitiveDecoder)>,
}

impl<E: TypeEngine> DecoderTable<E> {
    /// An empty table; every type is unsupported.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The standard table: `long long`, `int`, `float`, variable-length
    /// string, in that order.
    pub fn native(engine: &Arc<E>) -> Result<Self> {
        let known = [
            (NativeType::LLong, PrimitiveDecoder::Long),
            (NativeType::Int, PrimitiveDecoder::Int),
            (NativeType::Float, PrimitiveDecoder::Float),
            (NativeType::VlenString, PrimitiveDecoder::Str),
        ];
        let mut table = Self::new();
        for (native, decoder) in known {
            let ty = TypeDescriptor::from_handle(engine, engine.native_type(native))?;
            table = table.with_entry(ty, decoder);
        }
        Ok(table)
    }

    /// Append an entry after the existing ones.
    pub fn with_entry(mut self, ty: TypeDescriptor<E>, decoder: PrimitiveDecoder) -> Self {
        self.entries.push((ty, decoder));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First decoder whose type equals `ty`.
    pub fn lookup(&self, ty: &TypeDescriptor<E>) -> Option<PrimitiveDecoder> {
        self.entries
            .iter()
            .find(|(known, _)| known.equals_type(ty))
            .map(|&(_, decoder)| decoder)
    }
}

impl<E: TypeEngine> Default for DecoderTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TypeEngine> TypeDescriptor<E> {
    /// Select the decoder for this type from `table`.
    pub fn primitive_unpacker(&self, table: &DecoderTable<E>) -> Result<PrimitiveDecoder> {
        table.lookup(self).ok_or(Error::UnsupportedType {
            class: self.class(),
        })
    }
}
