//! The map-notify message, acknowledging a map-register.

use bytes::{Buf, BufMut};
use tracing::trace;

use super::{header::Header, map_record::MapRecord, DecodeError, EncodeError};
use crate::nonce::Nonce;

/// Map-notify message body.
///
/// Unlike the other three message types, the record count is stored as-is on
/// the wire, without the minus-one offset. The asymmetry is part of the wire
/// format and deliberately not smoothed over, a notify may carry zero
/// records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapNotify {
    /// Nonce copied from the map-register being acknowledged.
    nonce: Nonce,
    /// Identifier of the key the authentication data was computed with.
    key_id: u16,
    /// Opaque authentication data, carried through unverified.
    authentication_data: Vec<u8>,
    /// The records being acknowledged.
    records: Vec<MapRecord>,
}

impl MapNotify {
    /// Create a new `MapNotify`.
    pub fn new(
        nonce: Nonce,
        key_id: u16,
        authentication_data: Vec<u8>,
        records: Vec<MapRecord>,
    ) -> Self {
        Self {
            nonce,
            key_id,
            authentication_data,
            records,
        }
    }

    /// The [`Nonce`] echoed from the registration.
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// The identifier of the key the authentication data was computed with.
    pub fn key_id(&self) -> u16 {
        self.key_id
    }

    /// The opaque authentication data.
    pub fn authentication_data(&self) -> &[u8] {
        &self.authentication_data
    }

    /// The records being acknowledged.
    pub fn records(&self) -> &[MapRecord] {
        &self.records
    }

    /// Calculates the size on the wire of this `MapNotify`, header included.
    pub fn wire_size(&self) -> usize {
        15 + self.authentication_data.len()
            + self.records.iter().map(MapRecord::wire_size).sum::<usize>()
    }

    /// Construct a `MapNotify` body from wire bytes, after the header has
    /// been read.
    pub(super) fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        if src.remaining() < 13 {
            return Err(DecodeError::Truncated);
        }
        // The count is stored as-is, no minus-one offset here.
        let record_count = src.get_u8() as usize;
        let nonce = src.get_u64().into();
        let key_id = src.get_u16();
        let authentication_length = src.get_u16() as usize;

        if src.remaining() < authentication_length {
            return Err(DecodeError::Truncated);
        }
        let authentication_data = src[..authentication_length].to_vec();
        src.advance(authentication_length);

        // Bound the allocation before trusting the declared count.
        if src.remaining() < record_count * MapRecord::MIN_WIRE_SIZE {
            return Err(DecodeError::Truncated);
        }
        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            records.push(MapRecord::from_bytes(src)?);
        }

        trace!(record_count, "Read map-notify body");

        Ok(Self {
            nonce,
            key_id,
            authentication_data,
            records,
        })
    }

    /// Encode this `MapNotify`, header included. The record count and the
    /// authentication length are re-derived from the actual field lengths.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        let record_count = u8::try_from(self.records.len())
            .map_err(|_| EncodeError::InvalidRecordCount(self.records.len()))?;
        let authentication_length = u16::try_from(self.authentication_data.len())
            .map_err(|_| EncodeError::AuthenticationTooLong(self.authentication_data.len()))?;

        Header::Notify.write_bytes(dst);
        dst.put_u8(record_count);
        dst.put_u64(self.nonce.into());
        dst.put_u16(self.key_id);
        dst.put_u16(authentication_length);
        dst.put_slice(&self.authentication_data);
        for record in &self.records {
            record.write_bytes(dst)?;
        }

        Ok(())
    }
}
