//! In-memory engine: a type registry keyed by handle and packet tables
//! backed by a byte vector.
//!
//! Types are held as decoded [`Datatype`] values and may be registered
//! directly or from datatype-message bytes read out of a file. Native types
//! occupy fixed, predefined handles that cannot be closed.
//! Variable-length strings live in an engine heap and are referenced from
//! records by a pointer-width id, `0` being the null reference.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use rustyhdf5_format::type_builders::{
    native_double, native_float, native_int, native_llong, native_ushort, native_vlen_string,
};
use rustyhdf5_format::{CompoundMember, Datatype};

use crate::engine::{Hid, NativeType, PacketTable, TypeClass, TypeEngine};
use crate::error::{Error, Result};

const NATIVES: [NativeType; 6] = [
    NativeType::UShort,
    NativeType::Int,
    NativeType::LLong,
    NativeType::Float,
    NativeType::Double,
    NativeType::VlenString,
];

/// First handle given to registered (non-native) types.
const FIRST_USER_HID: Hid = 0x100;

fn native_hid(native: NativeType) -> Hid {
    match native {
        NativeType::UShort => 1,
        NativeType::Int => 2,
        NativeType::LLong => 3,
        NativeType::Float => 4,
        NativeType::Double => 5,
        NativeType::VlenString => 6,
    }
}

fn native_datatype(native: NativeType) -> Datatype {
    match native {
        NativeType::UShort => native_ushort(),
        NativeType::Int => native_int(),
        NativeType::LLong => native_llong(),
        NativeType::Float => native_float(),
        NativeType::Double => native_double(),
        NativeType::VlenString => native_vlen_string(),
    }
}

struct Entry {
    datatype: Datatype,
    predefined: bool,
}

struct Registry {
    types: HashMap<Hid, Entry>,
    next_hid: Hid,
}

/// Pure-Rust [`TypeEngine`].
pub struct MemoryEngine {
    registry: Mutex<Registry>,
    strings: RwLock<Vec<String>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        let types = NATIVES
            .iter()
            .map(|&n| {
                (
                    native_hid(n),
                    Entry {
                        datatype: native_datatype(n),
                        predefined: true,
                    },
                )
            })
            .collect();
        Self {
            registry: Mutex::new(Registry {
                types,
                next_hid: FIRST_USER_HID,
            }),
            strings: RwLock::new(Vec::new()),
        }
    }

    /// Register a type and return a caller-owned handle.
    pub fn register(&self, datatype: Datatype) -> Hid {
        let mut reg = self.registry.lock();
        let hid = reg.next_hid;
        reg.next_hid += 1;
        reg.types.insert(
            hid,
            Entry {
                datatype,
                predefined: false,
            },
        );
        hid
    }

    /// Register a type from raw datatype-message bytes.
    pub fn register_message(&self, message: &[u8]) -> Result<Hid> {
        let (datatype, _) = Datatype::parse(message)?;
        Ok(self.register(datatype))
    }

    /// Store `text` on the string heap and return its reference.
    pub fn intern_string(&self, text: &str) -> usize {
        let mut strings = self.strings.write();
        strings.push(text.to_owned());
        strings.len()
    }

    /// Number of registered handles still open, natives excluded.
    pub fn open_handles(&self) -> usize {
        self.registry
            .lock()
            .types
            .values()
            .filter(|e| !e.predefined)
            .count()
    }

    /// A copy of the datatype behind `id`.
    pub fn datatype(&self, id: Hid) -> Result<Datatype> {
        self.with_type(id, "datatype", |dt| Ok(dt.clone()))
    }

    fn with_type<R>(
        &self,
        id: Hid,
        op: &'static str,
        f: impl FnOnce(&Datatype) -> Result<R>,
    ) -> Result<R> {
        let reg = self.registry.lock();
        match reg.types.get(&id) {
            Some(entry) => f(&entry.datatype),
            None => Err(Error::engine(op, format!("invalid type handle {id}"))),
        }
    }

    fn with_member<R>(
        &self,
        id: Hid,
        index: usize,
        op: &'static str,
        f: impl FnOnce(&CompoundMember) -> R,
    ) -> Result<R> {
        self.with_type(id, op, |dt| match dt {
            Datatype::Compound { members, .. } => match members.get(index) {
                Some(member) => Ok(f(member)),
                None => Err(Error::MemberIndex {
                    index,
                    count: members.len(),
                }),
            },
            _ => Err(Error::engine(op, format!("type handle {id} is not compound"))),
        })
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEngine for MemoryEngine {
    fn copy_type(&self, id: Hid) -> Result<Hid> {
        let datatype = self.datatype(id)?;
        Ok(self.register(datatype))
    }

    fn type_class(&self, id: Hid) -> Result<TypeClass> {
        self.with_type(id, "type_class", |dt| Ok(TypeClass::of(dt)))
    }

    fn type_size(&self, id: Hid) -> Result<usize> {
        self.with_type(id, "type_size", |dt| Ok(dt.memory_size() as usize))
    }

    fn member_count(&self, id: Hid) -> Result<usize> {
        self.with_type(id, "member_count", |dt| match dt {
            Datatype::Compound { members, .. } => Ok(members.len()),
            _ => Err(Error::engine("member_count", format!("type handle {id} is not compound"))),
        })
    }

    fn member_class(&self, id: Hid, index: usize) -> Result<TypeClass> {
        self.with_member(id, index, "member_class", |m| TypeClass::of(&m.datatype))
    }

    fn member_type(&self, id: Hid, index: usize) -> Result<Hid> {
        let datatype = self.with_member(id, index, "member_type", |m| m.datatype.clone())?;
        Ok(self.register(datatype))
    }

    fn member_name(&self, id: Hid, index: usize) -> Result<String> {
        self.with_member(id, index, "member_name", |m| m.name.clone())
    }

    fn member_offset(&self, id: Hid, index: usize) -> Result<usize> {
        self.with_member(id, index, "member_offset", |m| m.offset as usize)
    }

    fn types_equal(&self, a: Hid, b: Hid) -> Result<bool> {
        let reg = self.registry.lock();
        match (reg.types.get(&a), reg.types.get(&b)) {
            (Some(x), Some(y)) => Ok(x.datatype == y.datatype),
            _ => Err(Error::engine("types_equal", format!("invalid type handle {a} or {b}"))),
        }
    }

    fn close_type(&self, id: Hid) -> Result<()> {
        let mut reg = self.registry.lock();
        match reg.types.get(&id) {
            None => Err(Error::engine("close_type", format!("invalid type handle {id}"))),
            Some(entry) if entry.predefined => Err(Error::engine(
                "close_type",
                format!("type handle {id} is predefined"),
            )),
            Some(_) => {
                reg.types.remove(&id);
                Ok(())
            }
        }
    }

    fn native_type(&self, native: NativeType) -> Hid {
        native_hid(native)
    }

    fn resolve_vlen_string(&self, reference: usize) -> Option<String> {
        let index = reference.checked_sub(1)?;
        self.strings.read().get(index).cloned()
    }
}

/// [`PacketTable`] over an in-memory byte vector.
#[derive(Debug, Clone)]
pub struct MemoryPacketTable {
    type_hid: Hid,
    record_size: usize,
    data: Vec<u8>,
    cursor: Option<u64>,
}

impl MemoryPacketTable {
    /// Empty table whose record size is the element type's storage size.
    pub fn create<E: TypeEngine + ?Sized>(engine: &E, type_hid: Hid) -> Result<Self> {
        let record_size = engine.type_size(type_hid)?;
        Ok(Self::with_record_size(type_hid, record_size))
    }

    /// Empty table with an explicit record size.
    pub fn with_record_size(type_hid: Hid, record_size: usize) -> Self {
        Self {
            type_hid,
            record_size,
            data: Vec::new(),
            cursor: None,
        }
    }

    /// Append one record of exactly `record_size` bytes.
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        if record.len() != self.record_size {
            return Err(Error::engine(
                "append",
                format!(
                    "record of {} bytes in a table of {}-byte records",
                    record.len(),
                    self.record_size
                ),
            ));
        }
        self.data.extend_from_slice(record);
        Ok(())
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn len(&self) -> u64 {
        if self.record_size == 0 {
            0
        } else {
            (self.data.len() / self.record_size) as u64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn copy_out(&self, op: &'static str, start: u64, count: usize, buf: &mut [u8]) -> Result<()> {
        let len = self.len();
        let end = start.checked_add(count as u64).filter(|&end| end <= len);
        let Some(end) = end else {
            return Err(Error::engine(
                op,
                format!("packets {start}+{count} out of range for {len} packets"),
            ));
        };
        let need = count * self.record_size;
        if buf.len() < need {
            return Err(Error::engine(
                op,
                format!(
                    "buffer of {} bytes cannot hold {count} packets of {} bytes",
                    buf.len(),
                    self.record_size
                ),
            ));
        }
        let from = start as usize * self.record_size;
        let to = end as usize * self.record_size;
        buf[..need].copy_from_slice(&self.data[from..to]);
        Ok(())
    }
}

impl PacketTable for MemoryPacketTable {
    fn create_index(&mut self) -> Result<()> {
        self.cursor = Some(0);
        Ok(())
    }

    fn num_packets(&self) -> Result<u64> {
        Ok(self.len())
    }

    fn get_next(&mut self, count: usize, buf: &mut [u8]) -> Result<()> {
        let Some(cursor) = self.cursor else {
            return Err(Error::engine("get_next", "packet table has no index"));
        };
        self.copy_out("get_next", cursor, count, buf)?;
        self.cursor = Some(cursor + count as u64);
        Ok(())
    }

    fn read_packets(&self, start: u64, count: usize, buf: &mut [u8]) -> Result<()> {
        self.copy_out("read_packets", start, count, buf)
    }

    fn type_handle(&self) -> Hid {
        self.type_hid
    }
}
