//! This module contains the control-plane message types and their wire
//! codecs.
//!
//! The wire format follows the LISP control-plane layout: a 4-bit message
//! type discriminant packed into the first byte, a type-dependent flag and
//! reserved bit region, and bodies built from AFI-prefixed addresses and
//! counted record lists. For reference, the message layouts are based on
//! [RFC 6830](https://datatracker.ietf.org/doc/html/rfc6830#section-6.1).

use std::io;

use bytes::Buf;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

pub use self::{
    afi::{Address, AddressFamily},
    encapsulated::{EncapsulatedControl, InnerIpVersion},
    header::Header,
    locator_record::LocatorRecord,
    map_notify::MapNotify,
    map_record::MapRecord,
    map_reply::MapReply,
    map_request::{MapRequest, RequestRecord},
    map_register::MapRegister,
};

pub mod afi;
pub mod encapsulated;
pub mod header;
pub mod locator_record;
pub mod map_notify;
pub mod map_record;
pub mod map_reply;
pub mod map_request;
pub mod map_register;

/// UDP port carrying control traffic. A packet with this source or
/// destination port holds a control message.
pub const CONTROL_PORT: u16 = 4342;
/// UDP port carrying encapsulated data traffic. Not interpreted by this
/// crate, listed for completeness of the transport contract.
pub const DATA_PORT: u16 = 4341;

/// Message type discriminant for a [`MapRequest`].
const TYPE_MAP_REQUEST: u8 = 1;
/// Message type discriminant for a [`MapReply`].
const TYPE_MAP_REPLY: u8 = 2;
/// Message type discriminant for a [`MapRegister`].
const TYPE_MAP_REGISTER: u8 = 3;
/// Message type discriminant for a [`MapNotify`].
const TYPE_MAP_NOTIFY: u8 = 4;
/// Message type discriminant for an [`EncapsulatedControl`].
const TYPE_ENCAPSULATED: u8 = 8;

/// Check whether a UDP packet with the given ports carries control traffic.
pub fn is_control_traffic(source_port: u16, destination_port: u16) -> bool {
    source_port == CONTROL_PORT || destination_port == CONTROL_PORT
}

/// An error while decoding a control message from wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes are available than a field or declared count requires.
    Truncated,
    /// A record carries internally inconsistent fields.
    MalformedRecord,
    /// An address family which cannot be decoded here, with its raw AFI.
    UnsupportedAddressFamily(u16),
    /// A header type discriminant outside the known set.
    UnknownMessageType(u8),
}

/// An error while encoding a control message to wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// An address whose byte length does not match its declared family.
    InvalidAddress {
        /// The family the address claims.
        family: AddressFamily,
        /// The actual stored byte length.
        len: usize,
    },
    /// A record list whose length cannot be expressed in its wire count
    /// field, either empty where at least one entry is required or longer
    /// than the count byte can hold.
    InvalidRecordCount(usize),
    /// Authentication data longer than the 16-bit length field can declare.
    AuthenticationTooLong(usize),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => f.write_str("insufficient bytes to decode message"),
            Self::MalformedRecord => f.write_str("record fields are internally inconsistent"),
            Self::UnsupportedAddressFamily(afi) => {
                f.write_fmt(format_args!("unsupported address family {afi}"))
            }
            Self::UnknownMessageType(t) => {
                f.write_fmt(format_args!("unknown message type {t}"))
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress { family, len } => f.write_fmt(format_args!(
                "address length {len} does not match family {family}"
            )),
            Self::InvalidRecordCount(count) => f.write_fmt(format_args!(
                "record list length {count} cannot be expressed on the wire"
            )),
            Self::AuthenticationTooLong(len) => f.write_fmt(format_args!(
                "authentication data length {len} exceeds the wire length field"
            )),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Derive the wire value for a count field which stores the real count minus
/// one. Map-request, map-reply and map-register lists use this encoding, so
/// they can never be empty on the wire.
fn offset_wire_count(len: usize) -> Result<u8, EncodeError> {
    if len == 0 || len > 256 {
        return Err(EncodeError::InvalidRecordCount(len));
    }
    Ok((len - 1) as u8)
}

/// A complete control message of any type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A map-request, soliciting a mapping for one or more EID prefixes.
    Request(MapRequest),
    /// A map-reply, answering a request with EID-to-locator records.
    Reply(MapReply),
    /// A map-register, installing records at a map server.
    Register(MapRegister),
    /// A map-notify, acknowledging a registration.
    Notify(MapNotify),
    /// An encapsulated control message wrapping a fresh IP packet.
    Encapsulated(EncapsulatedControl),
}

impl Message {
    /// Construct a `Message` from wire bytes, dispatching on the type
    /// discriminant in the header.
    ///
    /// When the discriminant is outside the known set this fails with
    /// [`DecodeError::UnknownMessageType`] without consuming any body bytes.
    pub fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        match Header::from_bytes(src)? {
            Header::Request { flags } => {
                MapRequest::from_bytes(src, flags).map(Message::Request)
            }
            Header::Reply { flags } => MapReply::from_bytes(src, flags).map(Message::Reply),
            Header::Register {
                proxy_map_reply,
                want_map_notify,
            } => MapRegister::from_bytes(src, proxy_map_reply, want_map_notify)
                .map(Message::Register),
            Header::Notify => MapNotify::from_bytes(src).map(Message::Notify),
            Header::Encapsulated { security } => {
                EncapsulatedControl::from_bytes(src, security).map(Message::Encapsulated)
            }
            Header::Reserved { message_type, .. } => {
                trace!(message_type, "Dropping message with unknown type");
                Err(DecodeError::UnknownMessageType(message_type))
            }
        }
    }

    /// Encode this `Message`, header included, to wire bytes.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        match self {
            Message::Request(request) => request.write_bytes(dst),
            Message::Reply(reply) => reply.write_bytes(dst),
            Message::Register(register) => register.write_bytes(dst),
            Message::Notify(notify) => notify.write_bytes(dst),
            Message::Encapsulated(ecm) => ecm.write_bytes(dst),
        }
    }

    /// Calculates the size on the wire of this `Message`, header included.
    pub fn wire_size(&self) -> usize {
        match self {
            Message::Request(request) => request.wire_size(),
            Message::Reply(reply) => reply.wire_size(),
            Message::Register(register) => register.wire_size(),
            Message::Notify(notify) => notify.wire_size(),
            Message::Encapsulated(ecm) => ecm.wire_size(),
        }
    }
}

impl From<MapRequest> for Message {
    fn from(value: MapRequest) -> Self {
        Message::Request(value)
    }
}

impl From<MapReply> for Message {
    fn from(value: MapReply) -> Self {
        Message::Reply(value)
    }
}

impl From<MapRegister> for Message {
    fn from(value: MapRegister) -> Self {
        Message::Register(value)
    }
}

impl From<MapNotify> for Message {
    fn from(value: MapNotify) -> Self {
        Message::Notify(value)
    }
}

impl From<EncapsulatedControl> for Message {
    fn from(value: EncapsulatedControl) -> Self {
        Message::Encapsulated(value)
    }
}

/// A codec which can send and receive whole control messages on the wire.
///
/// Intended for datagram transports (`UdpFramed` over port
/// [`CONTROL_PORT`]), where every buffer handed to [`Decoder::decode`] holds
/// exactly one message. Over a byte stream the decoder waits for more bytes
/// on a truncated buffer, but an encapsulated control message then swallows
/// everything buffered behind it as its inner packet.
#[derive(Debug, Clone)]
pub struct Codec {}

impl Codec {
    /// Create a new `Codec`.
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Codec {
    type Item = Message;

    type Error = io::Error;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Parse a copy so a partial message leaves the buffer untouched
        // until the rest arrives.
        let mut buf = src.clone();
        match Message::from_bytes(&mut buf) {
            Ok(message) => {
                let consumed = src.len() - buf.len();
                src.advance(consumed);
                trace!("Read control message");
                Ok(Some(message))
            }
            Err(DecodeError::Truncated) => {
                trace!("Insufficient bytes to read a control message");
                Ok(None)
            }
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

impl Encoder<Message> for Codec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.wire_size());
        item.write_bytes(dst)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}
