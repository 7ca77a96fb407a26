//! The map-request message, soliciting mappings for EID prefixes.

use bytes::{Buf, BufMut};
use tracing::trace;

use super::{
    afi::{Address, AFI_UNSPECIFIED},
    header::Header,
    offset_wire_count, DecodeError, EncodeError,
};
use crate::nonce::Nonce;

/// Flag bit indicating the sender is authoritative.
pub const REQUEST_FLAG_AUTHORITATIVE: u8 = 0b10_0000;
/// Flag bit indicating a map-reply record is piggybacked on the request.
pub const REQUEST_FLAG_MAP_REPLY_INCLUDED: u8 = 0b01_0000;
/// Flag bit indicating the request is an RLOC probe.
pub const REQUEST_FLAG_PROBE: u8 = 0b00_1000;
/// Flag bit indicating a solicit-map-request.
pub const REQUEST_FLAG_SMR: u8 = 0b00_0100;
/// Flag bit indicating the sender is a proxy ITR.
pub const REQUEST_FLAG_PITR: u8 = 0b00_0010;
/// Flag bit indicating the request was invoked by a received SMR.
pub const REQUEST_FLAG_SMR_INVOKED: u8 = 0b00_0001;

/// Mask to apply to map-request flags, leaving only valid flags.
pub(super) const FLAG_MASK: u8 = 0b11_1111;

/// One requested EID prefix inside a [`MapRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// Prefix length of the requested EID, in bits.
    eid_mask_len: u8,
    /// The requested EID prefix.
    eid: Address,
}

impl RequestRecord {
    /// Smallest possible size on the wire: reserved byte, mask length and an
    /// unspecified address.
    pub(super) const MIN_WIRE_SIZE: usize = 4;

    /// Create a new `RequestRecord`.
    pub fn new(eid_mask_len: u8, eid: Address) -> Self {
        Self { eid_mask_len, eid }
    }

    /// The prefix length of the requested EID, in bits.
    pub fn eid_mask_len(&self) -> u8 {
        self.eid_mask_len
    }

    /// The requested EID prefix [`Address`].
    pub fn eid(&self) -> &Address {
        &self.eid
    }

    /// Calculates the size on the wire of this `RequestRecord`.
    pub fn wire_size(&self) -> usize {
        2 + self.eid.wire_size()
    }

    /// Construct a `RequestRecord` from wire bytes.
    pub fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        if src.remaining() < 2 {
            return Err(DecodeError::Truncated);
        }
        // Read the reserved byte, we assume this is 0.
        let _ = src.get_u8();
        let eid_mask_len = src.get_u8();
        let eid = Address::from_bytes(src)?;

        Ok(Self { eid_mask_len, eid })
    }

    /// Encode this `RequestRecord` as part of a message.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        dst.put_u8(0);
        dst.put_u8(self.eid_mask_len);
        self.eid.write_bytes(dst)
    }
}

/// Map-request message body with its header flags.
///
/// The two record lists store their wire counts minus one, so a request
/// always carries at least one ITR address and one request record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    /// Flags set on the request, see the `REQUEST_FLAG_*` constants.
    flags: u8,
    /// Nonce echoed by the matching map-reply.
    nonce: Nonce,
    /// EID of the request originator, absent when the source AFI is 0.
    source: Option<Address>,
    /// Locators of the requesting ITR a reply can be addressed to.
    itr_rlocs: Vec<Address>,
    /// The EID prefixes being requested.
    records: Vec<RequestRecord>,
}

impl MapRequest {
    /// Create a new `MapRequest`. Unknown flag bits are discarded, and an
    /// unspecified source address is normalized to an absent one.
    pub fn new(
        flags: u8,
        nonce: Nonce,
        source: Option<Address>,
        itr_rlocs: Vec<Address>,
        records: Vec<RequestRecord>,
    ) -> Self {
        Self {
            flags: flags & FLAG_MASK,
            nonce,
            source: source.filter(|address| !address.is_unspecified()),
            itr_rlocs,
            records,
        }
    }

    /// The raw flag bits of this request.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Whether the sender is authoritative.
    pub fn authoritative(&self) -> bool {
        self.flags & REQUEST_FLAG_AUTHORITATIVE != 0
    }

    /// Whether a map-reply record is piggybacked on the request.
    pub fn map_reply_included(&self) -> bool {
        self.flags & REQUEST_FLAG_MAP_REPLY_INCLUDED != 0
    }

    /// Whether the request is an RLOC probe.
    pub fn probe(&self) -> bool {
        self.flags & REQUEST_FLAG_PROBE != 0
    }

    /// Whether the request is a solicit-map-request.
    pub fn smr(&self) -> bool {
        self.flags & REQUEST_FLAG_SMR != 0
    }

    /// Whether the sender is a proxy ITR.
    pub fn pitr(&self) -> bool {
        self.flags & REQUEST_FLAG_PITR != 0
    }

    /// Whether the request was invoked by a received solicit-map-request.
    pub fn smr_invoked(&self) -> bool {
        self.flags & REQUEST_FLAG_SMR_INVOKED != 0
    }

    /// The [`Nonce`] of this request.
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// The source EID of the request originator, if one was supplied.
    pub fn source(&self) -> Option<&Address> {
        self.source.as_ref()
    }

    /// The ITR locators a reply can be addressed to.
    pub fn itr_rlocs(&self) -> &[Address] {
        &self.itr_rlocs
    }

    /// The requested EID prefixes.
    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    /// Calculates the size on the wire of this `MapRequest`, header
    /// included.
    pub fn wire_size(&self) -> usize {
        let source_size = match &self.source {
            Some(address) => address.wire_size(),
            // An absent source still writes its AFI.
            None => 2,
        };
        12 + source_size
            + self.itr_rlocs.iter().map(Address::wire_size).sum::<usize>()
            + self
                .records
                .iter()
                .map(RequestRecord::wire_size)
                .sum::<usize>()
    }

    /// Construct a `MapRequest` body from wire bytes, after the header has
    /// been read.
    pub(super) fn from_bytes(src: &mut bytes::BytesMut, flags: u8) -> Result<Self, DecodeError> {
        if src.remaining() < 10 {
            return Err(DecodeError::Truncated);
        }
        // Both counts are stored minus one on the wire.
        let itr_rloc_count = src.get_u8() as usize + 1;
        let record_count = src.get_u8() as usize + 1;
        let nonce = src.get_u64().into();

        let source_address = Address::from_bytes(src)?;
        let source = if source_address.is_unspecified() {
            None
        } else {
            Some(source_address)
        };

        // Bound the allocations before trusting the declared counts. An ITR
        // entry is at least a bare AFI.
        if src.remaining() < itr_rloc_count * 2 {
            return Err(DecodeError::Truncated);
        }
        let mut itr_rlocs = Vec::with_capacity(itr_rloc_count);
        for _ in 0..itr_rloc_count {
            itr_rlocs.push(Address::from_bytes(src)?);
        }

        if src.remaining() < record_count * RequestRecord::MIN_WIRE_SIZE {
            return Err(DecodeError::Truncated);
        }
        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            records.push(RequestRecord::from_bytes(src)?);
        }

        trace!(itr_rloc_count, record_count, "Read map-request body");

        Ok(Self {
            flags,
            nonce,
            source,
            itr_rlocs,
            records,
        })
    }

    /// Encode this `MapRequest`, header included. Both counts are re-derived
    /// from the actual list lengths.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        let itr_rloc_count = offset_wire_count(self.itr_rlocs.len())?;
        let record_count = offset_wire_count(self.records.len())?;

        Header::Request { flags: self.flags }.write_bytes(dst);
        dst.put_u8(itr_rloc_count);
        dst.put_u8(record_count);
        dst.put_u64(self.nonce.into());
        match &self.source {
            Some(address) => address.write_bytes(dst)?,
            None => dst.put_u16(AFI_UNSPECIFIED),
        }
        for itr_rloc in &self.itr_rlocs {
            itr_rloc.write_bytes(dst)?;
        }
        for record in &self.records {
            record.write_bytes(dst)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use bytes::Buf;

    use super::{MapRequest, RequestRecord};
    use crate::control::{DecodeError, EncodeError};

    #[test]
    fn encoding() {
        let mut buf = bytes::BytesMut::new();

        let request = MapRequest {
            flags: super::REQUEST_FLAG_SMR,
            nonce: 2.into(),
            source: None,
            itr_rlocs: vec![Ipv4Addr::new(10, 0, 0, 1).into()],
            records: vec![RequestRecord::new(32, Ipv4Addr::new(192, 0, 2, 1).into())],
        };

        request
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map-request");

        assert_eq!(buf.len(), 28);
        assert_eq!(
            buf[..28],
            [
                0b0001_0001, 0b0000_0000, // header, smr flag
                0, 0, // both counts stored minus one
                0, 0, 0, 0, 0, 0, 0, 2, // nonce
                0, 0, // unspecified source AFI
                0, 1, 10, 0, 0, 1, // itr rloc
                0, 32, 0, 1, 192, 0, 2, 1, // request record
            ]
        );
    }

    #[test]
    fn decoding() {
        let mut buf = bytes::BytesMut::from(
            &[
                1, // two itr rlocs
                0, // one record
                0, 0, 0, 0, 0, 0, 0, 42, // nonce
                0, 1, 203, 0, 113, 7, // source
                0, 1, 10, 0, 0, 1, // itr rloc 1
                0, 2, 0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                1, // itr rloc 2
                0, 24, 0, 1, 192, 0, 2, 0, // request record
            ][..],
        );

        let request = MapRequest::from_bytes(&mut buf, 0).expect("Can decode a valid map-request");
        assert_eq!(buf.remaining(), 0);

        assert_eq!(u64::from(request.nonce()), 42);
        assert_eq!(
            request.source(),
            Some(&Ipv4Addr::new(203, 0, 113, 7).into())
        );
        // Wire counts are stored minus one.
        assert_eq!(request.itr_rlocs().len(), 2);
        assert_eq!(
            request.itr_rlocs()[1],
            Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1).into()
        );
        assert_eq!(request.records().len(), 1);
        assert_eq!(request.records()[0].eid_mask_len(), 24);
    }

    #[test]
    fn absent_source_is_none() {
        let mut buf = bytes::BytesMut::from(
            &[
                0, 0, // counts
                0, 0, 0, 0, 0, 0, 0, 1, // nonce
                0, 0, // unspecified source AFI
                0, 1, 10, 0, 0, 1, // itr rloc
                0, 32, 0, 1, 192, 0, 2, 1, // request record
            ][..],
        );

        let request = MapRequest::from_bytes(&mut buf, 0).expect("Can decode a valid map-request");
        assert!(request.source().is_none());
    }

    #[test]
    fn truncated_itr_list() {
        // ITR count claims four entries, only one fits.
        let mut buf = bytes::BytesMut::from(
            &[
                3, 0, // counts
                0, 0, 0, 0, 0, 0, 0, 1, // nonce
                0, 0, // source AFI
                0, 1, 10, 0, 0, 1, // single itr rloc
            ][..],
        );

        assert_eq!(
            MapRequest::from_bytes(&mut buf, 0),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn encode_rejects_empty_lists() {
        let request = MapRequest::new(
            0,
            1.into(),
            None,
            vec![],
            vec![RequestRecord::new(32, Ipv4Addr::new(192, 0, 2, 1).into())],
        );

        let mut buf = bytes::BytesMut::new();
        assert_eq!(
            request.write_bytes(&mut buf),
            Err(EncodeError::InvalidRecordCount(0))
        );
    }

    #[test]
    fn roundtrip() {
        let mut buf = bytes::BytesMut::new();

        let request = MapRequest::new(
            super::REQUEST_FLAG_PROBE | super::REQUEST_FLAG_AUTHORITATIVE,
            crate::nonce::Nonce::random(),
            Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 7).into()),
            vec![
                Ipv4Addr::new(10, 0, 0, 1).into(),
                Ipv4Addr::new(10, 0, 0, 2).into(),
            ],
            vec![RequestRecord::new(
                48,
                Ipv6Addr::new(0x2001, 0xdb8, 1, 0, 0, 0, 0, 0).into(),
            )],
        );
        request
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map-request");

        // Strip the header the way the dispatcher would.
        let header = crate::control::Header::from_bytes(&mut buf)
            .expect("Can decode an encoded header");
        let flags = match header {
            crate::control::Header::Request { flags } => flags,
            _ => panic!("Wrong header type"),
        };
        let decoded =
            MapRequest::from_bytes(&mut buf, flags).expect("Can decode an encoded map-request");

        assert_eq!(request, decoded);
        assert_eq!(buf.remaining(), 0);
    }
}
