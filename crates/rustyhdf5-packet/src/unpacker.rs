//! Record decoding driven by a discovered compound layout.

use std::fmt;
use std::sync::Arc;

use crate::decoder::{DecoderTable, PrimitiveDecoder};
use crate::descriptor::TypeDescriptor;
use crate::engine::{TypeClass, TypeEngine};
use crate::error::{Error, Result};
use crate::value::Value;

/// Decodes raw records of one compound type into ordered values.
///
/// Holds one slot per compound member. Members without a known decoder
/// keep an empty slot and decode to [`Value::Absent`].
///
/// Values are read sequentially: each present slot reads at the running
/// cursor and advances it by its own width, so member offsets reported by
/// the type are not consulted. An absent slot does not advance the cursor,
/// which shifts every later member when the absent one is not last.
pub struct Unpacker<E: TypeEngine> {
    slots: Vec<Option<PrimitiveDecoder>>,
    engine: Arc<E>,
}

impl<E: TypeEngine> TypeDescriptor<E> {
    /// Build an [`Unpacker`] for this compound type.
    ///
    /// Fails if the type is not compound or if any member type cannot be
    /// resolved. Members whose type has no entry in `table` get an empty
    /// slot.
    pub fn make_unpacker(&self, table: &DecoderTable<E>) -> Result<Unpacker<E>> {
        if self.class() != TypeClass::Compound {
            return Err(Error::NotCompound {
                op: "make_unpacker",
            });
        }
        let count = self.member_count()?;
        let mut slots = Vec::with_capacity(count);
        for index in 0..count {
            let member = self.member_type(index)?;
            match member.primitive_unpacker(table) {
                Ok(decoder) => slots.push(Some(decoder)),
                Err(e) => {
                    log::warn!(
                        "member {index} ({:?}) of {self}: {e}",
                        self.member_name(index)
                    );
                    slots.push(None);
                }
            }
        }
        Ok(Unpacker {
            slots,
            engine: Arc::clone(self.engine()),
        })
    }
}

impl<E: TypeEngine> Unpacker<E> {
    /// Decode one record starting at its first byte.
    ///
    /// # Panics
    ///
    /// Panics if `record` is shorter than the sum of the present slots'
    /// widths.
    pub fn unpack(&self, record: &[u8]) -> Vec<Value> {
        let mut pos = 0;
        self.slots
            .iter()
            .map(|slot| match slot {
                Some(decoder) => {
                    let (value, width) = decoder.decode(&record[pos..], self.engine.as_ref());
                    pos += width;
                    value
                }
                None => Value::Absent,
            })
            .collect()
    }

    /// Number of member slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<PrimitiveDecoder>] {
        &self.slots
    }

    /// Indices of members without a decoder.
    pub fn absent_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.is_none().then_some(i))
            .collect()
    }

    /// Bytes consumed from each record by the present slots.
    pub fn consumed_width(&self) -> usize {
        self.slots.iter().flatten().map(|d| d.width()).sum()
    }
}

impl<E: TypeEngine> fmt::Debug for Unpacker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unpacker").field("slots", &self.slots).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::POINTER_WIDTH;
    use crate::engine::NativeType;
    use crate::memory::MemoryEngine;
    use rustyhdf5_format::type_builders::native_ushort;
    use rustyhdf5_format::CompoundTypeBuilder;

    fn compound(
        engine: &Arc<MemoryEngine>,
        builder: CompoundTypeBuilder,
    ) -> TypeDescriptor<MemoryEngine> {
        TypeDescriptor::adopt(engine, engine.register(builder.build())).unwrap()
    }

    #[test]
    fn test_all_supported_members_decode() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let td = compound(
            &engine,
            CompoundTypeBuilder::new()
                .i64_field("seq")
                .i32_field("count")
                .f32_field("level")
                .vlen_string_field("label"),
        );
        let unpacker = td.make_unpacker(&table).unwrap();
        assert_eq!(unpacker.len(), 4);
        assert!(unpacker.absent_slots().is_empty());
        assert_eq!(unpacker.consumed_width(), 16 + POINTER_WIDTH);

        let label = engine.intern_string("north");
        let mut record = Vec::new();
        record.extend_from_slice(&9_000_000_000i64.to_ne_bytes());
        record.extend_from_slice(&(-12i32).to_ne_bytes());
        record.extend_from_slice(&0.25f32.to_ne_bytes());
        record.extend_from_slice(&label.to_ne_bytes());

        let values = unpacker.unpack(&record);
        assert_eq!(
            values,
            vec![
                Value::I64(9_000_000_000),
                Value::I32(-12),
                Value::F32(0.25),
                Value::Str("north".into()),
            ]
        );
        assert!(values.iter().all(|v| !v.is_absent()));
    }

    #[test]
    fn test_trailing_unsupported_members_are_absent() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let td = compound(
            &engine,
            CompoundTypeBuilder::new()
                .i32_field("id")
                .f32_field("value")
                .f64_field("ratio")
                .field("flags", native_ushort()),
        );
        let unpacker = td.make_unpacker(&table).unwrap();
        assert_eq!(unpacker.absent_slots(), vec![2, 3]);
        assert_eq!(
            unpacker.slots(),
            &[Some(PrimitiveDecoder::Int), Some(PrimitiveDecoder::Float), None, None]
        );

        let mut record = Vec::new();
        record.extend_from_slice(&7i32.to_ne_bytes());
        record.extend_from_slice(&1.5f32.to_ne_bytes());
        record.extend_from_slice(&[0u8; 10]);
        assert_eq!(
            unpacker.unpack(&record),
            vec![Value::I32(7), Value::F32(1.5), Value::Absent, Value::Absent]
        );
    }

    #[test]
    fn test_absent_slot_does_not_advance_cursor() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let td = compound(
            &engine,
            CompoundTypeBuilder::new()
                .f64_field("skipped")
                .i32_field("id"),
        );
        let unpacker = td.make_unpacker(&table).unwrap();

        let mut record = Vec::new();
        record.extend_from_slice(&[0xAB; 4]);
        record.extend_from_slice(&[0u8; 4]);
        record.extend_from_slice(&5i32.to_ne_bytes());
        let values = unpacker.unpack(&record);
        assert_eq!(values[0], Value::Absent);
        // reads the first four bytes of the double, not the i32 at offset 8
        assert_eq!(values[1], Value::I32(i32::from_ne_bytes([0xAB; 4])));
    }

    #[test]
    fn test_requires_compound() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let td =
            TypeDescriptor::from_handle(&engine, engine.native_type(NativeType::Int)).unwrap();
        assert!(matches!(
            td.make_unpacker(&table),
            Err(Error::NotCompound { .. })
        ));
    }

    #[test]
    fn test_empty_compound() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let td = compound(&engine, CompoundTypeBuilder::new());
        let unpacker = td.make_unpacker(&table).unwrap();
        assert!(unpacker.is_empty());
        assert!(unpacker.unpack(&[]).is_empty());
    }

    #[test]
    fn test_unpacker_outlives_descriptor_and_is_shareable() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let unpacker = {
            let td = compound(&engine, CompoundTypeBuilder::new().i32_field("n"));
            td.make_unpacker(&table).unwrap()
        };
        let unpacker = Arc::new(unpacker);
        let handles: Vec<_> = (0..4i32)
            .map(|i| {
                let u = Arc::clone(&unpacker);
                std::thread::spawn(move || u.unpack(&i.to_ne_bytes()))
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), vec![Value::I32(i as i32)]);
        }
    }

    #[test]
    #[should_panic]
    fn test_short_record_panics() {
        let engine = Arc::new(MemoryEngine::new());
        let table = DecoderTable::native(&engine).unwrap();
        let td = compound(&engine, CompoundTypeBuilder::new().i64_field("n"));
        let unpacker = td.make_unpacker(&table).unwrap();
        unpacker.unpack(&[0u8; 3]);
    }
}
