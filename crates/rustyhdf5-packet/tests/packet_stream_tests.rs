//! End-to-end tests: discover a table's layout, stream its packets and
//! decode every record.

use std::sync::Arc;

use rustyhdf5_packet::{
    CompoundTypeBuilder, DecoderTable, Error, MemoryEngine, MemoryPacketTable, PacketTableExt,
    TableReaderConfig, TypeClass, TypeDescriptor, Value, BULK_RECORD_WIDTH, POINTER_WIDTH,
    STREAM_RECORD_WIDTH,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn id_value_table(engine: &Arc<MemoryEngine>, records: i32) -> MemoryPacketTable {
    let hid = engine.register(
        CompoundTypeBuilder::new()
            .i32_field("id")
            .f32_field("value")
            .build(),
    );
    let mut table = MemoryPacketTable::create(engine.as_ref(), hid).unwrap();
    for i in 0..records {
        let mut record = Vec::with_capacity(8);
        record.extend_from_slice(&i.to_ne_bytes());
        record.extend_from_slice(&(i as f32 * 0.5).to_ne_bytes());
        table.append(&record).unwrap();
    }
    table
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[test]
fn stream_and_decode_small_records() {
    init_logging();
    let engine = Arc::new(MemoryEngine::new());
    let mut table = id_value_table(&engine, 23);

    let decoders = DecoderTable::native(&engine).unwrap();
    let td = TypeDescriptor::for_table(&engine, &table).unwrap();
    assert_eq!(td.class(), TypeClass::Compound);
    assert_eq!(td.size(), 8);
    let unpacker = td.make_unpacker(&decoders).unwrap();

    let config = TableReaderConfig::default()
        .with_record_width(8)
        .with_buffer_capacity(8 * 10);
    let mut reader = table.make_table_reader_with(config).unwrap();

    let mut pulls = Vec::new();
    let mut next_id = 0;
    loop {
        let packets = reader.read(100).unwrap();
        if packets.is_empty() {
            break;
        }
        pulls.push(packets.len());
        for packet in &packets {
            let values = unpacker.unpack(packet);
            assert_eq!(
                values,
                vec![Value::I32(next_id), Value::F32(next_id as f32 * 0.5)]
            );
            next_id += 1;
        }
    }
    assert_eq!(pulls, vec![10, 10, 3]);
    assert_eq!(next_id, 23);
    assert!(reader.read(100).unwrap().is_empty());
}

#[test]
fn stream_with_default_record_width() {
    init_logging();
    let engine = Arc::new(MemoryEngine::new());
    let hid = engine.register(
        CompoundTypeBuilder::new()
            .i64_field("seq")
            .i32_field("count")
            .f32_field("level")
            .vlen_string_field("label")
            .size(STREAM_RECORD_WIDTH as u32)
            .build(),
    );
    let mut table = MemoryPacketTable::create(engine.as_ref(), hid).unwrap();
    assert_eq!(table.record_size(), STREAM_RECORD_WIDTH);

    let labels = ["alpha", "beta", "gamma"];
    for (i, label) in labels.iter().enumerate() {
        let reference = engine.intern_string(label);
        let mut record = vec![0u8; STREAM_RECORD_WIDTH];
        record[..8].copy_from_slice(&(i as i64 * 1_000_000_000_000).to_ne_bytes());
        record[8..12].copy_from_slice(&(i as i32 - 1).to_ne_bytes());
        record[12..16].copy_from_slice(&(i as f32).to_ne_bytes());
        record[16..16 + POINTER_WIDTH].copy_from_slice(&reference.to_ne_bytes());
        table.append(&record).unwrap();
    }

    let decoders = DecoderTable::native(&engine).unwrap();
    let unpacker = TypeDescriptor::for_table(&engine, &table)
        .unwrap()
        .make_unpacker(&decoders)
        .unwrap();
    assert!(unpacker.absent_slots().is_empty());

    let mut reader = table.make_table_reader().unwrap();
    let packets = reader.read(10).unwrap();
    assert_eq!(packets.len(), 3);
    for (i, packet) in packets.iter().enumerate() {
        let values = unpacker.unpack(packet);
        assert_eq!(values[0].as_i64(), Some(i as i64 * 1_000_000_000_000));
        assert_eq!(values[1].as_i32(), Some(i as i32 - 1));
        assert_eq!(values[2].as_f32(), Some(i as f32));
        assert_eq!(values[3].as_str(), Some(labels[i]));
    }
    drop(packets);
    assert!(reader.read(10).unwrap().is_empty());
}

#[test]
fn discover_layout_from_message_bytes() {
    init_logging();
    let engine = Arc::new(MemoryEngine::new());
    let message = CompoundTypeBuilder::new()
        .i64_field("t")
        .f64_field("ratio")
        .f32_field("x")
        .build()
        .encode()
        .unwrap();
    let hid = engine.register_message(&message).unwrap();
    let td = TypeDescriptor::adopt(&engine, hid).unwrap();

    let members = td.members().unwrap();
    let mut names: Vec<_> = members.keys().cloned().collect();
    names.sort();
    assert_eq!(names, vec!["ratio", "t", "x"]);
    assert_eq!(td.member_offset(1), 8);
    assert_eq!(td.member_offset(2), 16);

    let decoders = DecoderTable::native(&engine).unwrap();
    let unpacker = td.make_unpacker(&decoders).unwrap();
    assert_eq!(unpacker.absent_slots(), vec![1]);
    assert_eq!(unpacker.consumed_width(), 12);
}

#[test]
fn non_compound_table_is_rejected() {
    let engine = Arc::new(MemoryEngine::new());
    let hid = engine.register(rustyhdf5_format::type_builders::native_int());
    let table = MemoryPacketTable::create(engine.as_ref(), hid).unwrap();
    let decoders = DecoderTable::native(&engine).unwrap();
    let td = TypeDescriptor::for_table(&engine, &table).unwrap();
    assert!(matches!(
        td.make_unpacker(&decoders),
        Err(Error::NotCompound { .. })
    ));
}

// ---------------------------------------------------------------------------
// Bulk reads
// ---------------------------------------------------------------------------

#[test]
fn bulk_read_and_decode() {
    init_logging();
    let engine = Arc::new(MemoryEngine::new());
    let hid = engine.register(
        CompoundTypeBuilder::new()
            .i64_field("seq")
            .i32_field("code")
            .size(BULK_RECORD_WIDTH as u32)
            .build(),
    );
    let mut table = MemoryPacketTable::create(engine.as_ref(), hid).unwrap();
    for i in 0..6i64 {
        let mut record = vec![0u8; BULK_RECORD_WIDTH];
        record[..8].copy_from_slice(&i.to_ne_bytes());
        record[8..12].copy_from_slice(&(i as i32 * 10).to_ne_bytes());
        table.append(&record).unwrap();
    }

    let decoders = DecoderTable::native(&engine).unwrap();
    let unpacker = TypeDescriptor::for_table(&engine, &table)
        .unwrap()
        .make_unpacker(&decoders)
        .unwrap();

    let bytes = table.read_packet_bytes(2, 3);
    assert_eq!(bytes.len(), 3 * BULK_RECORD_WIDTH);
    let decoded: Vec<_> = bytes
        .chunks_exact(BULK_RECORD_WIDTH)
        .map(|record| unpacker.unpack(record))
        .collect();
    assert_eq!(decoded[0], vec![Value::I64(2), Value::I32(20)]);
    assert_eq!(decoded[2], vec![Value::I64(4), Value::I32(40)]);

    assert!(table.read_packet_bytes(5, 2).is_empty());
}

// ---------------------------------------------------------------------------
// Handle lifetimes
// ---------------------------------------------------------------------------

#[test]
fn handles_are_released_once() {
    init_logging();
    let engine = Arc::new(MemoryEngine::new());
    let table = id_value_table(&engine, 1);
    assert_eq!(engine.open_handles(), 1);
    {
        let decoders = DecoderTable::native(&engine).unwrap();
        let mut td = TypeDescriptor::for_table(&engine, &table).unwrap();
        let _unpacker = td.make_unpacker(&decoders).unwrap();
        assert!(engine.open_handles() >= 2);
        td.close().unwrap();
        td.close().unwrap();
    }
    assert_eq!(engine.open_handles(), 1);
}

#[test]
fn reader_close_is_idempotent() {
    let engine = Arc::new(MemoryEngine::new());
    let mut table = id_value_table(&engine, 4);
    let config = TableReaderConfig::default().with_record_width(8);
    let mut reader = table.make_table_reader_with(config).unwrap();
    assert_eq!(reader.read(1).unwrap().len(), 1);
    reader.close();
    reader.close();
    assert!(reader.read(4).unwrap().is_empty());
}
