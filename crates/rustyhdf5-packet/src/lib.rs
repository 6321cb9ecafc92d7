//! Dynamic compound-type introspection and packet-table record decoding.
//!
//! A [`TypeDescriptor`] wraps an engine type handle discovered at run time
//! and answers member queries. [`TypeDescriptor::make_unpacker`] turns a
//! compound type into an [`Unpacker`] that decodes raw records into ordered
//! [`Value`]s, and a [`TableReader`] streams records out of a packet table
//! through one reusable buffer.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rustyhdf5_packet::{
//!     CompoundTypeBuilder, DecoderTable, MemoryEngine, MemoryPacketTable, PacketTableExt,
//!     TableReaderConfig, TypeDescriptor, Value,
//! };
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let hid = engine.register(CompoundTypeBuilder::new().i32_field("id").f32_field("v").build());
//! let mut table = MemoryPacketTable::create(engine.as_ref(), hid).unwrap();
//! let mut record = Vec::new();
//! record.extend_from_slice(&7i32.to_ne_bytes());
//! record.extend_from_slice(&0.5f32.to_ne_bytes());
//! table.append(&record).unwrap();
//!
//! let decoders = DecoderTable::native(&engine).unwrap();
//! let unpacker = TypeDescriptor::for_table(&engine, &table)
//!     .unwrap()
//!     .make_unpacker(&decoders)
//!     .unwrap();
//!
//! let config = TableReaderConfig::default().with_record_width(8);
//! let mut reader = table.make_table_reader_with(config).unwrap();
//! for packet in reader.read(16).unwrap() {
//!     assert_eq!(unpacker.unpack(&packet), vec![Value::I32(7), Value::F32(0.5)]);
//! }
//! ```

pub mod bulk;
pub mod decoder;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod memory;
pub mod table_reader;
pub mod unpacker;
pub mod value;

pub use bulk::{read_packet_bytes, BULK_RECORD_WIDTH};
pub use decoder::{DecoderTable, PrimitiveDecoder, POINTER_WIDTH};
pub use descriptor::TypeDescriptor;
pub use engine::{Hid, NativeType, PacketTable, TypeClass, TypeEngine};
pub use error::{Error, Result};
pub use memory::{MemoryEngine, MemoryPacketTable};
pub use table_reader::{
    Packet, PacketTableExt, TableReader, TableReaderConfig, STREAM_BUFFER_CAPACITY,
    STREAM_RECORD_WIDTH,
};
pub use unpacker::Unpacker;
pub use value::Value;

pub use rustyhdf5_format::{CompoundTypeBuilder, Datatype};
