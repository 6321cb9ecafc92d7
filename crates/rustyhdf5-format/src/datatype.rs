//! HDF5 Datatype message (message type 0x0003).
//!
//! Decodes every class from 0 to 10 far enough to know how many bytes the
//! message occupies, so that compound types containing any member class can
//! be walked. Classes the packet layer can interpret (fixed-point,
//! floating-point, strings, variable-length strings, compound, opaque) keep
//! their full properties; the rest collapse to [`Datatype::Other`].

#[cfg(not(feature = "std"))]
use alloc::{borrow::ToOwned, boxed::Box, string::String, vec, vec::Vec};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Deepest nesting of member, base or element types accepted by the parser.
pub const MAX_NESTING: usize = 32;

/// Datatype class ids as stored in the low nibble of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatatypeClass {
    FixedPoint,
    FloatingPoint,
    Time,
    String,
    BitField,
    Opaque,
    Compound,
    Reference,
    Enumeration,
    VariableLength,
    Array,
}

impl DatatypeClass {
    /// Map a class id to its class.
    pub fn from_id(id: u8) -> Result<Self, FormatError> {
        Ok(match id {
            0 => DatatypeClass::FixedPoint,
            1 => DatatypeClass::FloatingPoint,
            2 => DatatypeClass::Time,
            3 => DatatypeClass::String,
            4 => DatatypeClass::BitField,
            5 => DatatypeClass::Opaque,
            6 => DatatypeClass::Compound,
            7 => DatatypeClass::Reference,
            8 => DatatypeClass::Enumeration,
            9 => DatatypeClass::VariableLength,
            10 => DatatypeClass::Array,
            _ => return Err(FormatError::InvalidDatatypeClass(id)),
        })
    }

    /// The on-disk class id.
    pub fn id(self) -> u8 {
        match self {
            DatatypeClass::FixedPoint => 0,
            DatatypeClass::FloatingPoint => 1,
            DatatypeClass::Time => 2,
            DatatypeClass::String => 3,
            DatatypeClass::BitField => 4,
            DatatypeClass::Opaque => 5,
            DatatypeClass::Compound => 6,
            DatatypeClass::Reference => 7,
            DatatypeClass::Enumeration => 8,
            DatatypeClass::VariableLength => 9,
            DatatypeClass::Array => 10,
        }
    }
}

/// Byte order of numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatatypeByteOrder {
    LittleEndian,
    BigEndian,
    Vax,
}

impl DatatypeByteOrder {
    /// Byte order of the running target.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            DatatypeByteOrder::BigEndian
        } else {
            DatatypeByteOrder::LittleEndian
        }
    }
}

/// String padding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

impl StringPadding {
    fn from_bits(val: u8) -> Result<Self, FormatError> {
        match val {
            0 => Ok(StringPadding::NullTerminate),
            1 => Ok(StringPadding::NullPad),
            2 => Ok(StringPadding::SpacePad),
            _ => Err(FormatError::InvalidStringPadding(val)),
        }
    }

    fn bits(self) -> u8 {
        match self {
            StringPadding::NullTerminate => 0,
            StringPadding::NullPad => 1,
            StringPadding::SpacePad => 2,
        }
    }
}

/// Character set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

impl CharacterSet {
    fn from_bits(val: u8) -> Result<Self, FormatError> {
        match val {
            0 => Ok(CharacterSet::Ascii),
            1 => Ok(CharacterSet::Utf8),
            _ => Err(FormatError::InvalidCharacterSet(val)),
        }
    }

    fn bits(self) -> u8 {
        match self {
            CharacterSet::Ascii => 0,
            CharacterSet::Utf8 => 1,
        }
    }
}

/// Bit layout of a floating-point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatLayout {
    pub bit_offset: u16,
    pub bit_precision: u16,
    pub exponent_location: u8,
    pub exponent_size: u8,
    pub mantissa_location: u8,
    pub mantissa_size: u8,
    pub exponent_bias: u32,
}

impl FloatLayout {
    /// IEEE 754 binary32.
    pub const IEEE_F32: FloatLayout = FloatLayout {
        bit_offset: 0,
        bit_precision: 32,
        exponent_location: 23,
        exponent_size: 8,
        mantissa_location: 0,
        mantissa_size: 23,
        exponent_bias: 127,
    };

    /// IEEE 754 binary64.
    pub const IEEE_F64: FloatLayout = FloatLayout {
        bit_offset: 0,
        bit_precision: 64,
        exponent_location: 52,
        exponent_size: 11,
        mantissa_location: 0,
        mantissa_size: 52,
        exponent_bias: 1023,
    };
}

/// A member of a compound datatype.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMember {
    /// Member name.
    pub name: String,
    /// Byte offset within one record.
    pub offset: u64,
    /// Member datatype.
    pub datatype: Datatype,
}

/// Decoded HDF5 datatype.
#[derive(Debug, Clone, PartialEq)]
pub enum Datatype {
    /// Class 0: integers.
    FixedPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        signed: bool,
        bit_offset: u16,
        bit_precision: u16,
    },
    /// Class 1: floats.
    FloatingPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        layout: FloatLayout,
    },
    /// Class 3: fixed-length strings.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 5: opaque blobs with an ASCII tag.
    Opaque { size: u32, tag: String },
    /// Class 6: compound records.
    Compound {
        size: u32,
        members: Vec<CompoundMember>,
    },
    /// Class 9: variable-length strings and sequences.
    VariableLength {
        is_string: bool,
        padding: StringPadding,
        charset: CharacterSet,
        base: Box<Datatype>,
    },
    /// Time, bitfield, reference, enumeration and array types: only the
    /// class and the stored size are retained.
    Other { class: DatatypeClass, size: u32 },
}

/// Little-endian cursor over a datatype message.
struct MessageReader<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> MessageReader<'a> {
    fn new(data: &'a [u8], depth: usize) -> Self {
        Self {
            data,
            pos: 0,
            depth,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(FormatError::UnexpectedEof {
                expected: self.pos.saturating_add(n),
                available: self.data.len(),
            }),
        }
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Unsigned integer of 1, 2 or 4 bytes.
    fn uint(&mut self, nbytes: usize) -> Result<u64, FormatError> {
        Ok(match nbytes {
            1 => self.u8()? as u64,
            2 => self.u16()? as u64,
            _ => self.u32()? as u64,
        })
    }

    /// NUL-terminated name; `pad8` skips the NUL padding up to the next
    /// multiple of eight bytes (compound v1/v2, enumeration v1/v2).
    fn name(&mut self, pad8: bool) -> Result<String, FormatError> {
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == 0).ok_or(FormatError::UnexpectedEof {
            expected: self.data.len() + 1,
            available: self.data.len(),
        })?;
        let consumed = if pad8 { (len + 1 + 7) & !7 } else { len + 1 };
        let raw = self.take(consumed)?;
        core::str::from_utf8(&raw[..len])
            .map(|s| s.to_owned())
            .map_err(|_| FormatError::InvalidMemberName)
    }

    fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.take(n).map(|_| ())
    }

    /// Parse a nested datatype at the cursor.
    fn datatype(&mut self) -> Result<Datatype, FormatError> {
        let (dt, consumed) = Datatype::parse_nested(&self.data[self.pos..], self.depth + 1)?;
        self.pos += consumed;
        Ok(dt)
    }
}

/// Width of a v3 compound member offset for the given record size.
fn offset_width(compound_size: u32) -> usize {
    match compound_size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        _ => 4,
    }
}

fn byte_order_bit(order: DatatypeByteOrder) -> u8 {
    match order {
        DatatypeByteOrder::BigEndian => 0x01,
        _ => 0x00,
    }
}

impl Datatype {
    /// Parse a datatype message, returning the datatype and the number of
    /// bytes it occupies.
    pub fn parse(data: &[u8]) -> Result<(Datatype, usize), FormatError> {
        Self::parse_nested(data, 0)
    }

    fn parse_nested(data: &[u8], depth: usize) -> Result<(Datatype, usize), FormatError> {
        if depth > MAX_NESTING {
            return Err(FormatError::NestingTooDeep { limit: MAX_NESTING });
        }
        let mut r = MessageReader::new(data, depth);
        let head = r.u8()?;
        let class_id = head & 0x0F;
        let version = head >> 4;
        let bits = r.take(3)?;
        let (bf0, bf1) = (bits[0], bits[1]);
        let size = r.u32()?;
        let class = DatatypeClass::from_id(class_id)?;

        let dt = match class {
            DatatypeClass::FixedPoint => {
                let bit_offset = r.u16()?;
                let bit_precision = r.u16()?;
                Datatype::FixedPoint {
                    size,
                    byte_order: if bf0 & 0x01 == 0 {
                        DatatypeByteOrder::LittleEndian
                    } else {
                        DatatypeByteOrder::BigEndian
                    },
                    signed: bf0 & 0x08 != 0,
                    bit_offset,
                    bit_precision,
                }
            }
            DatatypeClass::FloatingPoint => {
                let byte_order = match (bf0 & 0x40 != 0, bf0 & 0x01 != 0) {
                    (false, false) => DatatypeByteOrder::LittleEndian,
                    (false, true) => DatatypeByteOrder::BigEndian,
                    (true, _) => DatatypeByteOrder::Vax,
                };
                let layout = FloatLayout {
                    bit_offset: r.u16()?,
                    bit_precision: r.u16()?,
                    exponent_location: r.u8()?,
                    exponent_size: r.u8()?,
                    mantissa_location: r.u8()?,
                    mantissa_size: r.u8()?,
                    exponent_bias: r.u32()?,
                };
                Datatype::FloatingPoint {
                    size,
                    byte_order,
                    layout,
                }
            }
            DatatypeClass::String => Datatype::String {
                size,
                padding: StringPadding::from_bits(bf0 & 0x0F)?,
                charset: CharacterSet::from_bits(bf0 >> 4)?,
            },
            DatatypeClass::Opaque => {
                let padded = (bf0 as usize + 7) & !7;
                let raw = r.take(padded)?;
                let tag: String = raw[..bf0 as usize]
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                Datatype::Opaque { size, tag }
            }
            DatatypeClass::Compound => {
                let count = u16::from_le_bytes([bf0, bf1]) as usize;
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let member = match version {
                        3 => {
                            let name = r.name(false)?;
                            let offset = r.uint(offset_width(size))?;
                            CompoundMember {
                                name,
                                offset,
                                datatype: r.datatype()?,
                            }
                        }
                        1 | 2 => {
                            let name = r.name(true)?;
                            let offset = r.u32()? as u64;
                            if version == 1 {
                                // dimensionality, reserved, permutation,
                                // reserved, four dimension sizes
                                r.skip(1 + 3 + 4 + 4 + 16)?;
                            }
                            CompoundMember {
                                name,
                                offset,
                                datatype: r.datatype()?,
                            }
                        }
                        _ => {
                            return Err(FormatError::InvalidDatatypeVersion {
                                class: class_id,
                                version,
                            })
                        }
                    };
                    members.push(member);
                }
                Datatype::Compound { size, members }
            }
            DatatypeClass::VariableLength => {
                let is_string = bf0 & 0x0F == 1;
                let (padding, charset) = if is_string {
                    (
                        StringPadding::from_bits(bf0 >> 4)?,
                        CharacterSet::from_bits(bf1 & 0x0F)?,
                    )
                } else {
                    (StringPadding::NullTerminate, CharacterSet::Ascii)
                };
                Datatype::VariableLength {
                    is_string,
                    padding,
                    charset,
                    base: Box::new(r.datatype()?),
                }
            }
            DatatypeClass::Time => {
                r.skip(2)?;
                Datatype::Other { class, size }
            }
            DatatypeClass::BitField => {
                r.skip(4)?;
                Datatype::Other { class, size }
            }
            DatatypeClass::Reference => Datatype::Other { class, size },
            DatatypeClass::Enumeration => {
                let count = u16::from_le_bytes([bf0, bf1]) as usize;
                let base = r.datatype()?;
                for _ in 0..count {
                    r.name(version < 3)?;
                }
                let values = count.checked_mul(base.size() as usize).ok_or(
                    FormatError::UnexpectedEof {
                        expected: usize::MAX,
                        available: data.len(),
                    },
                )?;
                r.skip(values)?;
                Datatype::Other { class, size }
            }
            DatatypeClass::Array => {
                let ndims = r.u8()? as usize;
                match version {
                    2 => {
                        r.skip(3)?;
                        r.skip(ndims * 4 * 2)?;
                    }
                    3 => r.skip(ndims * 4)?,
                    _ => {
                        return Err(FormatError::InvalidDatatypeVersion {
                            class: class_id,
                            version,
                        })
                    }
                }
                r.datatype()?;
                Datatype::Other { class, size }
            }
        };
        Ok((dt, r.pos))
    }

    /// Encode the datatype as a message. Compound types use version 3.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), FormatError> {
        match self {
            Datatype::FixedPoint {
                size,
                byte_order,
                signed,
                bit_offset,
                bit_precision,
            } => {
                let bf0 = byte_order_bit(*byte_order) | if *signed { 0x08 } else { 0 };
                push_header(buf, DatatypeClass::FixedPoint, 1, [bf0, 0, 0], *size);
                buf.extend_from_slice(&bit_offset.to_le_bytes());
                buf.extend_from_slice(&bit_precision.to_le_bytes());
            }
            Datatype::FloatingPoint {
                size,
                byte_order,
                layout,
            } => {
                let order = match byte_order {
                    DatatypeByteOrder::Vax => 0x40,
                    other => byte_order_bit(*other),
                };
                // sign bit location and implied-MSB normalization
                let bf1 = (layout.bit_precision.saturating_sub(1)) as u8;
                push_header(buf, DatatypeClass::FloatingPoint, 1, [order | 0x20, bf1, 0], *size);
                buf.extend_from_slice(&layout.bit_offset.to_le_bytes());
                buf.extend_from_slice(&layout.bit_precision.to_le_bytes());
                buf.extend_from_slice(&[
                    layout.exponent_location,
                    layout.exponent_size,
                    layout.mantissa_location,
                    layout.mantissa_size,
                ]);
                buf.extend_from_slice(&layout.exponent_bias.to_le_bytes());
            }
            Datatype::String {
                size,
                padding,
                charset,
            } => {
                let bf0 = padding.bits() | (charset.bits() << 4);
                push_header(buf, DatatypeClass::String, 1, [bf0, 0, 0], *size);
            }
            Datatype::Opaque { size, tag } => {
                let tag_len = tag.len().min(u8::MAX as usize);
                push_header(buf, DatatypeClass::Opaque, 1, [tag_len as u8, 0, 0], *size);
                let padded = (tag_len + 7) & !7;
                let start = buf.len();
                buf.extend_from_slice(&tag.as_bytes()[..tag_len]);
                buf.resize(start + padded, 0);
            }
            Datatype::Compound { size, members } => {
                let count = members.len() as u16;
                let [lo, hi] = count.to_le_bytes();
                push_header(buf, DatatypeClass::Compound, 3, [lo, hi, 0], *size);
                let width = offset_width(*size);
                for member in members {
                    buf.extend_from_slice(member.name.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(&member.offset.to_le_bytes()[..width]);
                    member.datatype.encode_into(buf)?;
                }
            }
            Datatype::VariableLength {
                is_string,
                padding,
                charset,
                base,
            } => {
                let (bf0, bf1) = if *is_string {
                    (0x01 | (padding.bits() << 4), charset.bits())
                } else {
                    (0x00, 0x00)
                };
                push_header(buf, DatatypeClass::VariableLength, 1, [bf0, bf1, 0], 16);
                base.encode_into(buf)?;
            }
            Datatype::Other { class, .. } => return Err(FormatError::UnencodableClass(class.id())),
        }
        Ok(())
    }

    /// The class of this datatype.
    pub fn class(&self) -> DatatypeClass {
        match self {
            Datatype::FixedPoint { .. } => DatatypeClass::FixedPoint,
            Datatype::FloatingPoint { .. } => DatatypeClass::FloatingPoint,
            Datatype::String { .. } => DatatypeClass::String,
            Datatype::Opaque { .. } => DatatypeClass::Opaque,
            Datatype::Compound { .. } => DatatypeClass::Compound,
            Datatype::VariableLength { .. } => DatatypeClass::VariableLength,
            Datatype::Other { class, .. } => *class,
        }
    }

    /// Size stored in the message. Variable-length types report the size of
    /// their on-disk heap reference (16).
    pub fn size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size, .. }
            | Datatype::Opaque { size, .. }
            | Datatype::Compound { size, .. }
            | Datatype::Other { size, .. } => *size,
            Datatype::VariableLength { .. } => 16,
        }
    }

    /// Size of one element once read into memory. Variable-length values
    /// become a pointer-width reference.
    pub fn memory_size(&self) -> u32 {
        match self {
            Datatype::VariableLength { .. } => core::mem::size_of::<usize>() as u32,
            other => other.size(),
        }
    }

    /// True for variable-length strings.
    pub fn is_vlen_string(&self) -> bool {
        matches!(self, Datatype::VariableLength { is_string: true, .. })
    }
}

fn push_header(buf: &mut Vec<u8>, class: DatatypeClass, version: u8, bf: [u8; 3], size: u32) {
    let mut header = vec![0u8; 8];
    header[0] = class.id() | (version << 4);
    header[1..4].copy_from_slice(&bf);
    LittleEndian::write_u32(&mut header[4..8], size);
    buf.extend_from_slice(&header);
}
