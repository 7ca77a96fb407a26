//! The type-and-flags header leading every control message.
//!
//! The first 4 bits of a message select its type, and only then is the
//! meaning of the following bits known. The register and encapsulated
//! layouts declare more flag and reserved bits than fit in the nominal
//! 16-bit header, so the header wire length itself depends on the
//! discriminant: 2 bytes for most types, 3 for map-register, 4 for an
//! encapsulated control message.

use bytes::{Buf, BufMut};

use super::{
    DecodeError, TYPE_ENCAPSULATED, TYPE_MAP_NOTIFY, TYPE_MAP_REGISTER, TYPE_MAP_REPLY,
    TYPE_MAP_REQUEST,
};

/// Mask leaving only the 12 bits after the type discriminant.
const RESERVED_MASK: u16 = 0x0fff;

/// Bit in the first register header byte holding the proxy-map-reply flag.
const REGISTER_FLAG_PROXY: u8 = 0b0000_1000;
/// Bit in the third register header byte holding the want-map-notify flag.
const REGISTER_FLAG_WANT_NOTIFY: u8 = 0b0000_0001;
/// Bit in the encapsulated header holding the security flag.
const ECM_FLAG_SECURITY: u32 = 1 << 27;

/// The leading header of a control message: the type discriminant plus the
/// flag and reserved bits whose layout it selects.
///
/// Message flags are carried here on the wire but owned by the message
/// types; the variants only transport them between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// A map-request header with its 6-bit flag set.
    Request {
        /// Raw request flags, see the `REQUEST_FLAG_*` constants.
        flags: u8,
    },
    /// A map-reply header with its 3-bit flag set.
    Reply {
        /// Raw reply flags, see the `REPLY_FLAG_*` constants.
        flags: u8,
    },
    /// A map-register header. Its two flag bits straddle 18 reserved bits,
    /// pushing the header to 3 bytes.
    Register {
        /// Whether the registering device asks for proxy map-replies.
        proxy_map_reply: bool,
        /// Whether the registering device wants a map-notify back.
        want_map_notify: bool,
    },
    /// A map-notify header, carrying no flags.
    Notify,
    /// An encapsulated control message header, 4 bytes wide.
    Encapsulated {
        /// Whether the encapsulated payload carries security material.
        security: bool,
    },
    /// A header with an unassigned type discriminant. The remaining 12 bits
    /// are preserved raw so the header survives a re-encode.
    Reserved {
        /// The unrecognized discriminant.
        message_type: u8,
        /// The 12 bits following the discriminant, unparsed.
        reserved: u16,
    },
}

impl Header {
    /// The type discriminant of this `Header`.
    pub fn message_type(&self) -> u8 {
        match self {
            Header::Request { .. } => TYPE_MAP_REQUEST,
            Header::Reply { .. } => TYPE_MAP_REPLY,
            Header::Register { .. } => TYPE_MAP_REGISTER,
            Header::Notify => TYPE_MAP_NOTIFY,
            Header::Encapsulated { .. } => TYPE_ENCAPSULATED,
            Header::Reserved { message_type, .. } => *message_type,
        }
    }

    /// Calculates the size on the wire of this `Header`, which depends on
    /// the type discriminant.
    pub fn wire_size(&self) -> usize {
        match self {
            Header::Register { .. } => 3,
            Header::Encapsulated { .. } => 4,
            _ => 2,
        }
    }

    /// Construct a `Header` from wire bytes.
    ///
    /// An unassigned discriminant is not an error at this level, it decodes
    /// to [`Header::Reserved`]; only insufficient bytes fail.
    pub fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        if src.remaining() < 2 {
            return Err(DecodeError::Truncated);
        }

        match src[0] >> 4 {
            TYPE_MAP_REQUEST => {
                let raw = src.get_u16();
                Ok(Header::Request {
                    flags: ((raw >> 6) & super::map_request::FLAG_MASK as u16) as u8,
                })
            }
            TYPE_MAP_REPLY => {
                let raw = src.get_u16();
                Ok(Header::Reply {
                    flags: ((raw >> 9) & super::map_reply::FLAG_MASK as u16) as u8,
                })
            }
            TYPE_MAP_REGISTER => {
                if src.remaining() < 3 {
                    return Err(DecodeError::Truncated);
                }
                let first = src.get_u8();
                let _ = src.get_u8();
                let last = src.get_u8();
                Ok(Header::Register {
                    proxy_map_reply: first & REGISTER_FLAG_PROXY != 0,
                    want_map_notify: last & REGISTER_FLAG_WANT_NOTIFY != 0,
                })
            }
            TYPE_MAP_NOTIFY => {
                let _ = src.get_u16();
                Ok(Header::Notify)
            }
            TYPE_ENCAPSULATED => {
                if src.remaining() < 4 {
                    return Err(DecodeError::Truncated);
                }
                let raw = src.get_u32();
                Ok(Header::Encapsulated {
                    security: raw & ECM_FLAG_SECURITY != 0,
                })
            }
            message_type => {
                let raw = src.get_u16();
                Ok(Header::Reserved {
                    message_type,
                    reserved: raw & RESERVED_MASK,
                })
            }
        }
    }

    /// Encode this `Header` as the start of a message.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) {
        match self {
            Header::Request { flags } => {
                dst.put_u16(
                    ((TYPE_MAP_REQUEST as u16) << 12)
                        | (((flags & super::map_request::FLAG_MASK) as u16) << 6),
                );
            }
            Header::Reply { flags } => {
                dst.put_u16(
                    ((TYPE_MAP_REPLY as u16) << 12)
                        | (((flags & super::map_reply::FLAG_MASK) as u16) << 9),
                );
            }
            Header::Register {
                proxy_map_reply,
                want_map_notify,
            } => {
                let mut first = TYPE_MAP_REGISTER << 4;
                if *proxy_map_reply {
                    first |= REGISTER_FLAG_PROXY;
                }
                dst.put_u8(first);
                dst.put_u8(0);
                dst.put_u8(if *want_map_notify {
                    REGISTER_FLAG_WANT_NOTIFY
                } else {
                    0
                });
            }
            Header::Notify => dst.put_u16((TYPE_MAP_NOTIFY as u16) << 12),
            Header::Encapsulated { security } => {
                let mut raw = (TYPE_ENCAPSULATED as u32) << 28;
                if *security {
                    raw |= ECM_FLAG_SECURITY;
                }
                dst.put_u32(raw);
            }
            Header::Reserved {
                message_type,
                reserved,
            } => {
                dst.put_u16(((*message_type as u16) << 12) | (reserved & RESERVED_MASK));
            }
        }
    }
}
