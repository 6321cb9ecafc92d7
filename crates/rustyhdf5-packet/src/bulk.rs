//! One-shot random-access packet reads.

use crate::engine::PacketTable;

/// Record width assumed by bulk reads. Independent of
/// [`STREAM_RECORD_WIDTH`](crate::table_reader::STREAM_RECORD_WIDTH).
pub const BULK_RECORD_WIDTH: usize = 24;

/// Read `count` packets starting at absolute position `start` into a fresh
/// buffer of `count * BULK_RECORD_WIDTH` bytes.
///
/// Engine failures are not reported: the buffer is dropped and the result
/// is empty.
pub fn read_packet_bytes<T: PacketTable + ?Sized>(table: &T, start: u64, count: usize) -> Vec<u8> {
    let Some(nbytes) = count.checked_mul(BULK_RECORD_WIDTH) else {
        log::debug!("bulk read of {count} packets overflows the buffer size");
        return Vec::new();
    };
    let mut buf = vec![0u8; nbytes];
    match table.read_packets(start, count, &mut buf) {
        Ok(()) => buf,
        Err(e) => {
            log::debug!("bulk read of {count} packets at {start} failed: {e}");
            Vec::new()
        }
    }
}
