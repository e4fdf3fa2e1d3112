//! Per-object I/O descriptors
//!
//! Data-slot buffers borrow the caller's buffer for the lifetime of the
//! request. Parity buffers are views into one arena allocated per
//! translate call, so they are released exactly once when the last
//! operation referencing them is dropped.

use bytes::{Bytes, BytesMut};

// =============================================================================
// Write Operations
// =============================================================================

/// Payload of a write operation.
#[derive(Debug, Clone)]
pub enum WriteBuffer<'a> {
    /// Slice of the caller's buffer
    Data(&'a [u8]),
    /// Parity computed by the translator
    Parity(Bytes),
}

/// One object write against one OSD slot.
#[derive(Debug, Clone)]
pub struct WriteOperation<'a> {
    /// Position of the object within the file's object sequence
    pub object_number: u64,
    /// OSD slot(s) within the line
    pub osd_offsets: Vec<usize>,
    /// Number of bytes to write
    pub req_size: usize,
    /// Byte offset inside the object
    pub req_offset: usize,
    /// Bytes to write
    pub data: WriteBuffer<'a>,
}

impl<'a> WriteOperation<'a> {
    /// Write of a slice of the caller's buffer.
    pub fn data(object_number: u64, osd_offset: usize, req_offset: usize, data: &'a [u8]) -> Self {
        Self {
            object_number,
            osd_offsets: vec![osd_offset],
            req_size: data.len(),
            req_offset,
            data: WriteBuffer::Data(data),
        }
    }

    /// Write of a translator-owned parity stripe.
    pub fn parity(object_number: u64, osd_offset: usize, parity: Bytes) -> Self {
        Self {
            object_number,
            osd_offsets: vec![osd_offset],
            req_size: parity.len(),
            req_offset: 0,
            data: WriteBuffer::Parity(parity),
        }
    }

    /// Whether this operation writes a parity object.
    pub fn is_parity(&self) -> bool {
        matches!(self.data, WriteBuffer::Parity(_))
    }

    /// The OSD slot this operation targets.
    pub fn osd_offset(&self) -> usize {
        self.osd_offsets[0]
    }

    /// Bytes to write.
    pub fn payload(&self) -> &[u8] {
        match &self.data {
            WriteBuffer::Data(data) => *data,
            WriteBuffer::Parity(parity) => &parity[..],
        }
    }

    /// Payload as `Bytes`; parity payloads are shared, data payloads copied.
    pub fn to_bytes(&self) -> Bytes {
        match &self.data {
            WriteBuffer::Data(data) => Bytes::copy_from_slice(data),
            WriteBuffer::Parity(parity) => parity.clone(),
        }
    }
}

// =============================================================================
// Read Operations
// =============================================================================

/// Destination of a read operation.
#[derive(Debug)]
pub enum ReadBuffer<'a> {
    /// Slice of the caller's destination buffer
    Data(&'a mut [u8]),
    /// Translator-owned staging space for a parity object
    Parity(BytesMut),
}

/// One object read against one OSD slot.
#[derive(Debug)]
pub struct ReadOperation<'a> {
    /// Position of the object within the file's object sequence
    pub object_number: u64,
    /// OSD slot(s) within the line
    pub osd_offsets: Vec<usize>,
    /// Number of bytes to read
    pub req_size: usize,
    /// Byte offset inside the object
    pub req_offset: usize,
    /// Where the bytes go
    pub buffer: ReadBuffer<'a>,
}

impl<'a> ReadOperation<'a> {
    /// Read directly into a slice of the caller's buffer.
    pub fn data(
        object_number: u64,
        osd_offset: usize,
        req_offset: usize,
        buffer: &'a mut [u8],
    ) -> Self {
        Self {
            object_number,
            osd_offsets: vec![osd_offset],
            req_size: buffer.len(),
            req_offset,
            buffer: ReadBuffer::Data(buffer),
        }
    }

    /// Read into translator-owned parity staging space.
    pub fn parity(object_number: u64, osd_offset: usize, staging: BytesMut) -> Self {
        Self {
            object_number,
            osd_offsets: vec![osd_offset],
            req_size: staging.len(),
            req_offset: 0,
            buffer: ReadBuffer::Parity(staging),
        }
    }

    /// Whether this operation reads a parity object.
    pub fn is_parity(&self) -> bool {
        matches!(self.buffer, ReadBuffer::Parity(_))
    }

    /// The OSD slot this operation targets.
    pub fn osd_offset(&self) -> usize {
        self.osd_offsets[0]
    }

    /// Current buffer contents.
    pub fn buffer(&self) -> &[u8] {
        match &self.buffer {
            ReadBuffer::Data(data) => &data[..],
            ReadBuffer::Parity(staging) => &staging[..],
        }
    }

    /// Buffer the dispatcher fills.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        match &mut self.buffer {
            ReadBuffer::Data(data) => &mut data[..],
            ReadBuffer::Parity(staging) => &mut staging[..],
        }
    }

    /// Copy received object bytes in; anything the OSD did not return is
    /// zero-filled, matching the OSD's implicit zero padding.
    pub fn fill(&mut self, received: &[u8]) -> usize {
        let dst = self.buffer_mut();
        let n = received.len().min(dst.len());
        dst[..n].copy_from_slice(&received[..n]);
        dst[n..].fill(0);
        n
    }
}

/// Result of translating a read request.
#[derive(Debug)]
pub struct TranslatedRead<'a> {
    /// Operations in dispatch order
    pub operations: Vec<ReadOperation<'a>>,
    /// How many leading operations must succeed for a clean read
    pub required_reads: usize,
}
