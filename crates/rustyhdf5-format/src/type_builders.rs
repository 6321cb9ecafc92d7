//! Constructors for native datatypes and a builder for compound records.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, string::ToString, vec::Vec};

use crate::datatype::{
    CharacterSet, CompoundMember, Datatype, DatatypeByteOrder, FloatLayout, StringPadding,
};

// ---- Native datatype constructors ----

fn native_integer(size: u32, signed: bool) -> Datatype {
    Datatype::FixedPoint {
        size,
        byte_order: DatatypeByteOrder::native(),
        signed,
        bit_offset: 0,
        bit_precision: (size * 8) as u16,
    }
}

/// `short` unsigned, 16 bits.
pub fn native_ushort() -> Datatype {
    native_integer(2, false)
}

/// `int`, 32 bits.
pub fn native_int() -> Datatype {
    native_integer(4, true)
}

/// `long long`, 64 bits.
pub fn native_llong() -> Datatype {
    native_integer(8, true)
}

/// `float`.
pub fn native_float() -> Datatype {
    Datatype::FloatingPoint {
        size: 4,
        byte_order: DatatypeByteOrder::native(),
        layout: FloatLayout::IEEE_F32,
    }
}

/// `double`.
pub fn native_double() -> Datatype {
    Datatype::FloatingPoint {
        size: 8,
        byte_order: DatatypeByteOrder::native(),
        layout: FloatLayout::IEEE_F64,
    }
}

/// NUL-terminated ASCII string held by reference (`char *`).
pub fn native_vlen_string() -> Datatype {
    Datatype::VariableLength {
        is_string: true,
        padding: StringPadding::NullTerminate,
        charset: CharacterSet::Ascii,
        base: Box::new(native_integer(1, false)),
    }
}

/// Fixed-length NUL-padded ASCII string of `size` bytes.
pub fn fixed_string(size: u32) -> Datatype {
    Datatype::String {
        size,
        padding: StringPadding::NullPad,
        charset: CharacterSet::Ascii,
    }
}

// ---- Compound builder ----

/// Builder for compound (record) datatypes in their in-memory layout.
///
/// Members are packed back to back unless placed with
/// [`field_at`](Self::field_at); the record size defaults to the end of the
/// last member and can be widened with [`size`](Self::size).
#[derive(Debug, Default)]
pub struct CompoundTypeBuilder {
    fields: Vec<(String, Option<u64>, Datatype)>,
    size: Option<u32>,
}

impl CompoundTypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member right after the previous one.
    pub fn field(mut self, name: &str, datatype: Datatype) -> Self {
        self.fields.push((name.to_string(), None, datatype));
        self
    }

    /// Place a member at an explicit byte offset.
    pub fn field_at(mut self, name: &str, offset: u64, datatype: Datatype) -> Self {
        self.fields.push((name.to_string(), Some(offset), datatype));
        self
    }

    pub fn i32_field(self, name: &str) -> Self {
        self.field(name, native_int())
    }

    pub fn i64_field(self, name: &str) -> Self {
        self.field(name, native_llong())
    }

    pub fn f32_field(self, name: &str) -> Self {
        self.field(name, native_float())
    }

    pub fn f64_field(self, name: &str) -> Self {
        self.field(name, native_double())
    }

    pub fn vlen_string_field(self, name: &str) -> Self {
        self.field(name, native_vlen_string())
    }

    /// Total record size, padding the tail when larger than the packed size.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Build the compound datatype.
    pub fn build(self) -> Datatype {
        let mut cursor = 0u64;
        let mut end = 0u64;
        let mut members = Vec::with_capacity(self.fields.len());
        for (name, offset, datatype) in self.fields {
            let offset = offset.unwrap_or(cursor);
            cursor = offset + datatype.memory_size() as u64;
            end = end.max(cursor);
            members.push(CompoundMember {
                name,
                offset,
                datatype,
            });
        }
        let packed = end as u32;
        Datatype::Compound {
            size: self.size.map_or(packed, |s| s.max(packed)),
            members,
        }
    }
}
