//! A single EID-prefix-to-locator-set record, the unit exchanged in
//! map-reply, map-register and map-notify messages.

use bytes::{Buf, BufMut};
use tracing::trace;

use super::{
    afi::{Address, AddressFamily},
    locator_record::LocatorRecord,
    DecodeError, EncodeError,
};

/// Action code telling the receiver a mapping carries no special handling.
pub const ACTION_NO_ACTION: u8 = 0;
/// Action code telling the receiver to natively forward matching packets.
pub const ACTION_NATIVE_FORWARD: u8 = 1;
/// Action code telling the receiver to send a map-request.
pub const ACTION_SEND_MAP_REQUEST: u8 = 2;
/// Action code telling the receiver to drop matching packets.
pub const ACTION_DROP: u8 = 3;

/// Mask to apply to the 3-bit action code. Values outside the named set are
/// preserved, not rejected.
const ACTION_MASK: u8 = 0b111;
/// Mask to apply to the 12-bit map version number.
const VERSION_MASK: u16 = 0x0fff;

/// One EID-prefix-to-locator-set binding.
///
/// The locator count is never stored: it is re-derived from the locator list
/// on encode, so the wire count and the list length cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRecord {
    /// Lifetime of the record in seconds.
    ttl: u32,
    /// Prefix length of the EID, in bits.
    eid_prefix_len: u8,
    /// 3-bit action code, see the `ACTION_*` constants.
    action: u8,
    /// Whether the sender is authoritative for the EID prefix.
    authoritative: bool,
    /// 12-bit mapping version number.
    map_version: u16,
    /// The EID prefix address.
    eid: Address,
    /// The candidate locators for the EID prefix.
    locators: Vec<LocatorRecord>,
}

impl MapRecord {
    /// Smallest possible size on the wire: the fixed fields plus an
    /// unspecified EID and no locators.
    pub(super) const MIN_WIRE_SIZE: usize = 12;

    /// Create a new `MapRecord`. The action code and version number are
    /// masked to their wire width.
    pub fn new(
        ttl: u32,
        eid_prefix_len: u8,
        action: u8,
        authoritative: bool,
        map_version: u16,
        eid: Address,
        locators: Vec<LocatorRecord>,
    ) -> Self {
        Self {
            ttl,
            eid_prefix_len,
            action: action & ACTION_MASK,
            authoritative,
            map_version: map_version & VERSION_MASK,
            eid,
            locators,
        }
    }

    /// The record lifetime in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// The EID prefix length in bits.
    pub fn eid_prefix_len(&self) -> u8 {
        self.eid_prefix_len
    }

    /// The raw 3-bit action code.
    pub fn action(&self) -> u8 {
        self.action
    }

    /// Whether the sender is authoritative for this mapping.
    pub fn authoritative(&self) -> bool {
        self.authoritative
    }

    /// The 12-bit mapping version number.
    pub fn map_version(&self) -> u16 {
        self.map_version
    }

    /// The EID prefix [`Address`].
    pub fn eid(&self) -> &Address {
        &self.eid
    }

    /// The locators bound to the EID prefix.
    pub fn locators(&self) -> &[LocatorRecord] {
        &self.locators
    }

    /// Calculates the size on the wire of this `MapRecord`.
    pub fn wire_size(&self) -> usize {
        10 + self.eid.wire_size()
            + self
                .locators
                .iter()
                .map(LocatorRecord::wire_size)
                .sum::<usize>()
    }

    /// Construct a `MapRecord` from wire bytes, including exactly as many
    /// locator records as the decoded locator count declares.
    pub fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        if src.remaining() < 10 {
            return Err(DecodeError::Truncated);
        }
        let ttl = src.get_u32();
        let locator_count = src.get_u8() as usize;
        let eid_prefix_len = src.get_u8();
        // 3-bit action, authoritative bit, 16 reserved bits, then the 12-bit
        // version number.
        let packed = src.get_u32();
        let action = (packed >> 29) as u8 & ACTION_MASK;
        let authoritative = packed & (1 << 28) != 0;
        let map_version = (packed as u16) & VERSION_MASK;

        let eid = Address::from_bytes(src)?;

        // A prefix length exceeding the EID family's bit width cannot name a
        // real prefix.
        let max_prefix_len = match eid.family() {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
            _ => u8::MAX,
        };
        if eid_prefix_len > max_prefix_len {
            return Err(DecodeError::MalformedRecord);
        }

        // Bound the allocation before trusting the declared count.
        if src.remaining() < locator_count * LocatorRecord::MIN_WIRE_SIZE {
            return Err(DecodeError::Truncated);
        }
        let mut locators = Vec::with_capacity(locator_count);
        for _ in 0..locator_count {
            locators.push(LocatorRecord::from_bytes(src)?);
        }

        trace!(locator_count, "Read map record");

        Ok(Self {
            ttl,
            eid_prefix_len,
            action,
            authoritative,
            map_version,
            eid,
            locators,
        })
    }

    /// Encode this `MapRecord` as part of a message. The locator count is
    /// re-derived from the locator list, never supplied by the caller.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        let locator_count = self.locators.len();
        if locator_count > u8::MAX as usize {
            return Err(EncodeError::InvalidRecordCount(locator_count));
        }

        dst.put_u32(self.ttl);
        dst.put_u8(locator_count as u8);
        dst.put_u8(self.eid_prefix_len);
        let packed = (((self.action & ACTION_MASK) as u32) << 29)
            | ((self.authoritative as u32) << 28)
            | (self.map_version & VERSION_MASK) as u32;
        dst.put_u32(packed);
        self.eid.write_bytes(dst)?;
        for locator in &self.locators {
            locator.write_bytes(dst)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use bytes::Buf;

    use super::{LocatorRecord, MapRecord};
    use crate::control::{locator_record::LOCATOR_FLAG_ROUTE, DecodeError};

    #[test]
    fn encoding() {
        let mut buf = bytes::BytesMut::new();

        let record = MapRecord {
            ttl: 86400,
            eid_prefix_len: 24,
            action: super::ACTION_NO_ACTION,
            authoritative: true,
            map_version: 7,
            eid: Ipv4Addr::new(192, 0, 2, 0).into(),
            locators: vec![LocatorRecord::new(
                1,
                100,
                255,
                0,
                LOCATOR_FLAG_ROUTE,
                Ipv4Addr::new(198, 51, 100, 1).into(),
            )],
        };

        record
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map record");

        assert_eq!(buf.len(), 28);
        assert_eq!(
            buf[..28],
            [
                0, 1, 81, 128, // ttl
                1,  // locator count, derived from the list
                24, // eid prefix length
                0b0001_0000, 0, 0, 7, // action, authoritative, version
                0, 1, 192, 0, 2, 0, // eid
                1, 100, 255, 0, 0, 1, 0, 1, 198, 51, 100, 1, // locator
            ]
        );
    }

    #[test]
    fn decoding() {
        let mut buf = bytes::BytesMut::from(
            &[
                0, 0, 1, 44, // ttl 300
                2,  // two locators
                32, // prefix length
                0b0101_0000, 0, 0x0f, 0xff, // action 2, authoritative, version 0xfff
                0, 1, 192, 0, 2, 1, // eid
                1, 100, 255, 0, 0, 1, 0, 1, 198, 51, 100, 1, // locator 1
                2, 50, 255, 0, 0, 0, 0, 0, // locator 2, unspecified address
            ][..],
        );

        let record = MapRecord::from_bytes(&mut buf).expect("Can decode a valid map record");
        assert_eq!(buf.remaining(), 0);

        assert_eq!(record.ttl(), 300);
        assert_eq!(record.eid_prefix_len(), 32);
        assert_eq!(record.action(), super::ACTION_SEND_MAP_REQUEST);
        assert!(record.authoritative());
        assert_eq!(record.map_version(), 0xfff);
        assert_eq!(*record.eid(), Ipv4Addr::new(192, 0, 2, 1).into());
        // The decoded list length always equals the wire locator count.
        assert_eq!(record.locators().len(), 2);
        assert!(record.locators()[1].locator().is_unspecified());
    }

    #[test]
    fn truncated_locator_list() {
        // Locator count claims 2 but only one locator's worth of bytes
        // remains.
        let mut buf = bytes::BytesMut::from(
            &[
                0, 0, 1, 44, // ttl
                2,  // locator count
                32, // prefix length
                0, 0, 0, 0, // action/authoritative/version
                0, 1, 10, 0, 0, 0, // eid
                1, 100, 255, 0, 0, 1, 0, 1, 192, 168, 1, 1, // one locator only
            ][..],
        );

        assert_eq!(
            MapRecord::from_bytes(&mut buf),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn rejects_oversized_prefix_length() {
        // Prefix length 64 on an IPv4 EID.
        let mut buf = bytes::BytesMut::from(
            &[
                0, 0, 1, 44, 0, 64, 0, 0, 0, 0, // fixed fields
                0, 1, 10, 0, 0, 0, // eid
            ][..],
        );

        assert_eq!(
            MapRecord::from_bytes(&mut buf),
            Err(DecodeError::MalformedRecord)
        );
    }

    #[test]
    fn roundtrip() {
        let mut buf = bytes::BytesMut::new();

        let record = MapRecord::new(
            300,
            24,
            super::ACTION_DROP,
            false,
            1912,
            Ipv4Addr::new(203, 0, 113, 0).into(),
            vec![
                LocatorRecord::new(1, 50, 255, 0, LOCATOR_FLAG_ROUTE, Ipv4Addr::new(10, 0, 0, 1).into()),
                LocatorRecord::new(2, 50, 255, 0, 0, Ipv4Addr::new(10, 0, 0, 2).into()),
            ],
        );
        record
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map record");
        let decoded = MapRecord::from_bytes(&mut buf).expect("Can decode an encoded map record");

        assert_eq!(record, decoded);
        assert_eq!(buf.remaining(), 0);
    }
}
