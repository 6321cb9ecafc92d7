//! Sequential packet streaming through one reusable buffer.

use std::ops::Deref;

use crate::engine::PacketTable;
use crate::error::{Error, Result};

/// Default size of the stream buffer in bytes.
pub const STREAM_BUFFER_CAPACITY: usize = 1_000_000;

/// Record width assumed by the stream reader. It is not derived from the
/// table's element type; override it through [`TableReaderConfig`].
pub const STREAM_RECORD_WIDTH: usize = 32;

/// Buffer and record-width settings for a [`TableReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableReaderConfig {
    /// Bytes allocated once for the reader's lifetime.
    pub buffer_capacity: usize,
    /// Bytes per record view.
    pub record_width: usize,
}

impl Default for TableReaderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: STREAM_BUFFER_CAPACITY,
            record_width: STREAM_RECORD_WIDTH,
        }
    }
}

impl TableReaderConfig {
    pub fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    pub fn with_record_width(mut self, bytes: usize) -> Self {
        self.record_width = bytes;
        self
    }

    /// Records that fit in one pull.
    pub fn records_per_pull(&self) -> usize {
        self.buffer_capacity / self.record_width.max(1)
    }

    fn validate(&self) -> Result<()> {
        if self.record_width == 0 {
            return Err(Error::InvalidConfig("record width must be non-zero".into()));
        }
        if self.buffer_capacity < self.record_width {
            return Err(Error::InvalidConfig(format!(
                "buffer of {} bytes cannot hold one {}-byte record",
                self.buffer_capacity, self.record_width
            )));
        }
        Ok(())
    }
}

/// A view of one record inside a [`TableReader`]'s buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    data: &'a [u8],
}

impl<'a> Packet<'a> {
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl Deref for Packet<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

/// Pull-based reader over a packet table.
///
/// Every [`read`](Self::read) refills the same buffer; the returned
/// [`Packet`] views borrow the reader, so they must be dropped (or copied
/// out) before the next pull.
pub struct TableReader<'t, T: PacketTable + ?Sized> {
    source: &'t mut T,
    bytes_per_record: usize,
    buffer: Box<[u8]>,
    remain: u64,
}

impl<'t, T: PacketTable + ?Sized> TableReader<'t, T> {
    /// Index the table, count its packets and allocate the buffer.
    pub fn new(source: &'t mut T, config: TableReaderConfig) -> Result<Self> {
        config.validate()?;
        source.create_index()?;
        let remain = source.num_packets()?;
        log::debug!(
            "table reader: {remain} packets, {} bytes/record, {} per pull",
            config.record_width,
            config.records_per_pull()
        );
        Ok(Self {
            source,
            bytes_per_record: config.record_width,
            buffer: vec![0u8; config.buffer_capacity].into_boxed_slice(),
            remain,
        })
    }

    /// Read up to `num` packets. Fewer are returned when the buffer cannot
    /// hold `num` records or fewer remain; an empty result means the table
    /// is exhausted.
    pub fn read(&mut self, num: usize) -> Result<Vec<Packet<'_>>> {
        let per = self.bytes_per_record;
        let fit = self.buffer.len() / per;
        let num = num.min(fit).min(usize::try_from(self.remain).unwrap_or(usize::MAX));
        if num == 0 {
            return Ok(Vec::new());
        }
        let filled = &mut self.buffer[..num * per];
        self.source.get_next(num, filled)?;
        self.remain -= num as u64;
        log::trace!("pulled {num} packets, {} remaining", self.remain);
        Ok(self.buffer[..num * per]
            .chunks_exact(per)
            .map(|data| Packet { data })
            .collect())
    }

    /// Packets not yet delivered.
    pub fn remaining(&self) -> u64 {
        self.remain
    }

    pub fn record_width(&self) -> usize {
        self.bytes_per_record
    }

    /// Buffer size in bytes; `0` after [`close`](Self::close).
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Release the buffer early. Later pulls return nothing; calling it again
    /// is a no-op.
    pub fn close(&mut self) {
        if !self.buffer.is_empty() {
            self.buffer = Box::default();
        }
        self.remain = 0;
    }
}

/// Packet-table conveniences mirroring the engine's table calls.
pub trait PacketTableExt: PacketTable {
    /// Stream reader with the default buffer and record width.
    fn make_table_reader(&mut self) -> Result<TableReader<'_, Self>> {
        TableReader::new(self, TableReaderConfig::default())
    }

    fn make_table_reader_with(
        &mut self,
        config: TableReaderConfig,
    ) -> Result<TableReader<'_, Self>> {
        TableReader::new(self, config)
    }

    /// One-shot read of `count` packets from `start`; empty on failure.
    /// See [`crate::bulk::read_packet_bytes`].
    fn read_packet_bytes(&self, start: u64, count: usize) -> Vec<u8> {
        crate::bulk::read_packet_bytes(self, start, count)
    }
}

impl<T: PacketTable + ?Sized> PacketTableExt for T {}
