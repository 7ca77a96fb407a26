//! The map-register message, installing records at a map server.

use bytes::{Buf, BufMut};
use tracing::trace;

use super::{
    header::Header, map_record::MapRecord, offset_wire_count, DecodeError, EncodeError,
};
use crate::nonce::Nonce;

/// Map-register message body with its header flags.
///
/// The authentication data is carried as an opaque byte string at the length
/// the message declares; validating it is the receiver's business, not the
/// codec's. The record list stores its wire count minus one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRegister {
    /// Whether the registering device asks the map server to proxy-reply.
    proxy_map_reply: bool,
    /// Whether the registering device wants a map-notify acknowledgment.
    want_map_notify: bool,
    /// Nonce echoed by the matching map-notify.
    nonce: Nonce,
    /// Identifier of the key the authentication data was computed with.
    key_id: u16,
    /// Opaque authentication data, carried through unverified.
    authentication_data: Vec<u8>,
    /// The records being registered.
    records: Vec<MapRecord>,
}

impl MapRegister {
    /// Create a new `MapRegister`.
    pub fn new(
        proxy_map_reply: bool,
        want_map_notify: bool,
        nonce: Nonce,
        key_id: u16,
        authentication_data: Vec<u8>,
        records: Vec<MapRecord>,
    ) -> Self {
        Self {
            proxy_map_reply,
            want_map_notify,
            nonce,
            key_id,
            authentication_data,
            records,
        }
    }

    /// Whether the registering device asks for proxy map-replies.
    pub fn proxy_map_reply(&self) -> bool {
        self.proxy_map_reply
    }

    /// Whether the registering device wants a map-notify back.
    pub fn want_map_notify(&self) -> bool {
        self.want_map_notify
    }

    /// The [`Nonce`] of this registration.
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

    /// The records being registered.
    pub fn records(&self) -> &[MapRecord] {
        &self.records
    }

    /// Calculates the size on the wire of this `MapRegister`, header
    /// included.
    pub fn wire_size(&self) -> usize {
        16 + self.authentication_data.len()
            + self.records.iter().map(MapRecord::wire_size).sum::<usize>()
    }

    /// Construct a `MapRegister` body from wire bytes, after the header has
    /// been read.
    pub(super) fn from_bytes(
        src: &mut bytes::BytesMut,
        proxy_map_reply: bool,
        want_map_notify: bool,
    ) -> Result<Self, DecodeError> {
        if src.remaining() < 13 {
            return Err(DecodeError::Truncated);
        }
        // The count is stored minus one on the wire.
        let record_count = src.get_u8() as usize + 1;
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

        trace!(record_count, "Read map-register body");

        Ok(Self {
            proxy_map_reply,
            want_map_notify,
            nonce,
            key_id,
            authentication_data,
            records,
        })
    }

    /// Encode this `MapRegister`, header included. The record count and the
    /// authentication length are re-derived from the actual field lengths.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        let record_count = offset_wire_count(self.records.len())?;
        let authentication_length = u16::try_from(self.authentication_data.len())
            .map_err(|_| EncodeError::AuthenticationTooLong(self.authentication_data.len()))?;

        Header::Register {
            proxy_map_reply: self.proxy_map_reply,
            want_map_notify: self.want_map_notify,
        }
        .write_bytes(dst);
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

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use bytes::Buf;

    use super::{MapRecord, MapRegister};
    use crate::control::{DecodeError, Message};

    fn record() -> MapRecord {
        MapRecord::new(
            86400,
            24,
            0,
            true,
            0,
            Ipv4Addr::new(192, 0, 2, 0).into(),
            vec![],
        )
    }

    #[test]
    fn encoding() {
        let mut buf = bytes::BytesMut::new();

        let register = MapRegister::new(
            false,
            true,
            0x1122_3344_5566_7788.into(),
            1,
            vec![0xaa, 0xbb, 0xcc, 0xdd],
            vec![record()],
        );

        register
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map-register");

        assert_eq!(buf.len(), 36);
        assert_eq!(
            buf[..20],
            [
                0b0011_0000, 0, 1, // 3-byte header, want-map-notify
                0, // one record, stored minus one
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, // nonce
                0, 1, // key id
                0, 4, // authentication length, derived from the data
                0xaa, 0xbb, 0xcc, 0xdd, // authentication data
            ]
        );
    }

    #[test]
    fn authentication_data_is_carried_opaque() {
        let mut buf = bytes::BytesMut::new();

        // Bytes which are not meaningful in any authentication scheme must
        // still travel unchanged.
        let register = MapRegister::new(
            true,
            false,
            1.into(),
            0xffff,
            (0..32).collect(),
            vec![record()],
        );
        register
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map-register");

        let decoded = Message::from_bytes(&mut buf).expect("Can decode an encoded map-register");
        let decoded = match decoded {
            Message::Register(register) => register,
            other => panic!("Decoded wrong message type {other:?}"),
        };
        assert_eq!(decoded.authentication_data(), (0..32).collect::<Vec<u8>>());
        assert!(decoded.proxy_map_reply());
        assert!(!decoded.want_map_notify());
    }

    #[test]
    fn truncated_authentication_data() {
        let mut buf = bytes::BytesMut::from(
            &[
                0, // record count
                0, 0, 0, 0, 0, 0, 0, 1, // nonce
                0, 1, // key id
                0, 16, // authentication length
                1, 2, 3, 4, // only 4 bytes of authentication data
            ][..],
        );

        assert_eq!(
            MapRegister::from_bytes(&mut buf, false, false),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn roundtrip() {
        let mut buf = bytes::BytesMut::new();

        let register = MapRegister::new(
            true,
            true,
            crate::nonce::Nonce::random(),
            2,
            vec![0x5a; 20],
            vec![record(), record()],
        );
        register
            .write_bytes(&mut buf)
            .expect("Can encode a consistent map-register");

        let decoded = Message::from_bytes(&mut buf).expect("Can decode an encoded map-register");
        assert_eq!(Message::Register(register), decoded);
        assert_eq!(buf.remaining(), 0);
    }
}
