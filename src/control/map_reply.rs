//! The map-reply message, answering a map-request.

use bytes::{Buf, BufMut};
use tracing::trace;

use super::{
    header::Header, map_record::MapRecord, offset_wire_count, DecodeError, EncodeError,
};
use crate::nonce::Nonce;

/// Flag bit indicating the reply answers an RLOC probe.
pub const REPLY_FLAG_PROBE: u8 = 0b100;
/// Flag bit indicating the sender runs the echo-nonce algorithm.
pub const REPLY_FLAG_ECHO_NONCE_ALG: u8 = 0b010;
/// Flag bit indicating the reply carries security material.
pub const REPLY_FLAG_SECURITY: u8 = 0b001;

/// Mask to apply to map-reply flags, leaving only valid flags.
pub(super) const FLAG_MASK: u8 = 0b111;

/// Map-reply message body with its header flags.
///
/// The record list stores its wire count minus one, so a reply always
/// carries at least one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReply {
    /// Flags set on the reply, see the `REPLY_FLAG_*` constants.
    flags: u8,
    /// Nonce copied from the map-request being answered.
    nonce: Nonce,
    /// The EID-to-locator records answering the request.
    records: Vec<MapRecord>,
}

impl MapReply {
    /// Create a new `MapReply`. Unknown flag bits are discarded.
    pub fn new(flags: u8, nonce: Nonce, records: Vec<MapRecord>) -> Self {
        Self {
            flags: flags & FLAG_MASK,
            nonce,
            records,
        }
    }

    /// The raw flag bits of this reply.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Whether the reply answers an RLOC probe.
    pub fn probe(&self) -> bool {
        self.flags & REPLY_FLAG_PROBE != 0
    }

    /// Whether the sender runs the echo-nonce algorithm.
    pub fn echo_nonce_alg(&self) -> bool {
        self.flags & REPLY_FLAG_ECHO_NONCE_ALG != 0
    }

    /// Whether the reply carries security material.
    pub fn security(&self) -> bool {
        self.flags & REPLY_FLAG_SECURITY != 0
    }

    /// The [`Nonce`] echoed from the request.
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// The records answering the request.
    pub fn records(&self) -> &[MapRecord] {
        &self.records
    }

    /// Calculates the size on the wire of this `MapReply`, header included.
    pub fn wire_size(&self) -> usize {
        12 + self.records.iter().map(MapRecord::wire_size).sum::<usize>()
    }

    /// Construct a `MapReply` body from wire bytes, after the header has
    /// been read.
    pub(super) fn from_bytes(src: &mut bytes::BytesMut, flags: u8) -> Result<Self, DecodeError> {
        if src.remaining() < 10 {
            return Err(DecodeError::Truncated);
        }
        // Read the reserved byte, we assume this is 0.
        let _ = src.get_u8();
        // The count is stored minus one on the wire.
        let record_count = src.get_u8() as usize + 1;
        let nonce = src.get_u64().into();

        // Bound the allocation before trusting the declared count.
        if src.remaining() < record_count * MapRecord::MIN_WIRE_SIZE {
            return Err(DecodeError::Truncated);
        }
        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            records.push(MapRecord::from_bytes(src)?);
        }

        trace!(record_count, "Read map-reply body");

        Ok(Self {
            flags,
            nonce,
            records,
        })
    }

    /// Encode this `MapReply`, header included. The record count is
    /// re-derived from the actual list length.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        let record_count = offset_wire_count(self.records.len())?;

        Header::Reply { flags: self.flags }.write_bytes(dst);
        dst.put_u8(0);
        dst.put_u8(record_count);
        dst.put_u64(self.nonce.into());
        for record in &self.records {
            record.write_bytes(dst)?;
        }

        Ok(())
    }
}
