//! AFI-keyed address encoding.
//!
//! Addresses in control messages are always preceded by a 16-bit address
//! family identifier which decides how many address bytes follow: none for
//! the unspecified family, 4 for IPv4, 16 for IPv6. The LCAF family (16387)
//! is a recognized enumerant but its variable-length body belongs to an
//! external decoder, so this module refuses it rather than guessing.

use core::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut};

use super::{DecodeError, EncodeError};

/// AFI value of an unspecified (absent) address.
pub const AFI_UNSPECIFIED: u16 = 0;
/// AFI value of an IPv4 address, 4 bytes follow.
pub const AFI_IPV4: u16 = 1;
/// AFI value of an IPv6 address, 16 bytes follow.
pub const AFI_IPV6: u16 = 2;
/// AFI value of the LISP canonical address format, variable length.
pub const AFI_LCAF: u16 = 16387;

/// The address family of an [`Address`], as keyed by the AFI on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// No address present.
    Unspecified,
    /// An IPv4 address.
    Ipv4,
    /// An IPv6 address.
    Ipv6,
    /// An extensible-format address, carried by an external decoder.
    Lcaf,
}

impl AddressFamily {
    /// Look up the family for a raw AFI value, if it is a known enumerant.
    pub fn from_afi(afi: u16) -> Option<Self> {
        match afi {
            AFI_UNSPECIFIED => Some(Self::Unspecified),
            AFI_IPV4 => Some(Self::Ipv4),
            AFI_IPV6 => Some(Self::Ipv6),
            AFI_LCAF => Some(Self::Lcaf),
            _ => None,
        }
    }

    /// The raw AFI value for this family.
    pub fn afi(&self) -> u16 {
        match self {
            Self::Unspecified => AFI_UNSPECIFIED,
            Self::Ipv4 => AFI_IPV4,
            Self::Ipv6 => AFI_IPV6,
            Self::Lcaf => AFI_LCAF,
        }
    }

    /// The number of address bytes following the AFI, or `None` when the
    /// length is not fixed by the family.
    pub fn address_len(&self) -> Option<usize> {
        match self {
            Self::Unspecified => Some(0),
            Self::Ipv4 => Some(4),
            Self::Ipv6 => Some(16),
            Self::Lcaf => None,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Ipv4 => "IPv4",
            Self::Ipv6 => "IPv6",
            Self::Lcaf => "LCAF",
        })
    }
}

/// An address as carried in a control message: a family tag and the address
/// bytes whose length the family dictates.
///
/// Values built through the `From` conversions or decoded from the wire are
/// always consistent. [`Address::new`] does not validate, the length is
/// checked when the address is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    family: AddressFamily,
    bytes: Vec<u8>,
}

impl Address {
    /// Create a new `Address` from a family and raw bytes. The byte length
    /// is checked against the family on encode, not here.
    pub fn new(family: AddressFamily, bytes: Vec<u8>) -> Self {
        Self { family, bytes }
    }

    /// The unspecified (absent) address.
    pub fn unspecified() -> Self {
        Self {
            family: AddressFamily::Unspecified,
            bytes: Vec::new(),
        }
    }

    /// The [`AddressFamily`] of this `Address`.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether this is the unspecified address, which stands for an absent
    /// field rather than a real zero-length address.
    pub fn is_unspecified(&self) -> bool {
        self.family == AddressFamily::Unspecified
    }

    /// The address as an [`IpAddr`], when it is a well-formed IPv4 or IPv6
    /// address.
    pub fn ip(&self) -> Option<IpAddr> {
        match self.family {
            AddressFamily::Ipv4 => {
                let octets: [u8; 4] = self.bytes.as_slice().try_into().ok()?;
                Some(Ipv4Addr::from(octets).into())
            }
            AddressFamily::Ipv6 => {
                let octets: [u8; 16] = self.bytes.as_slice().try_into().ok()?;
                Some(Ipv6Addr::from(octets).into())
            }
            _ => None,
        }
    }

    /// Calculates the size on the wire of this `Address`, AFI included.
    pub fn wire_size(&self) -> usize {
        2 + self.bytes.len()
    }

    /// Construct an `Address` from wire bytes: the 16-bit AFI followed by
    /// the family-determined number of address bytes.
    pub fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        if src.remaining() < 2 {
            return Err(DecodeError::Truncated);
        }
        let afi = src.get_u16();
        let family =
            AddressFamily::from_afi(afi).ok_or(DecodeError::UnsupportedAddressFamily(afi))?;
        let len = family
            .address_len()
            .ok_or(DecodeError::UnsupportedAddressFamily(afi))?;
        if src.remaining() < len {
            return Err(DecodeError::Truncated);
        }
        let bytes = src[..len].to_vec();
        src.advance(len);

        Ok(Self { family, bytes })
    }

    /// Encode this `Address` as part of a message: the AFI, then exactly the
    /// number of bytes the family dictates.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        let invalid = EncodeError::InvalidAddress {
            family: self.family,
            len: self.bytes.len(),
        };
        let expected = self.family.address_len().ok_or(invalid)?;
        if self.bytes.len() != expected {
            return Err(invalid);
        }
        dst.put_u16(self.family.afi());
        dst.put_slice(&self.bytes);

        Ok(())
    }
}

impl From<Ipv4Addr> for Address {
    fn from(value: Ipv4Addr) -> Self {
        Self {
            family: AddressFamily::Ipv4,
            bytes: value.octets().to_vec(),
        }
    }
}

impl From<Ipv6Addr> for Address {
    fn from(value: Ipv6Addr) -> Self {
        Self {
            family: AddressFamily::Ipv6,
            bytes: value.octets().to_vec(),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(ip) => ip.into(),
            IpAddr::V6(ip) => ip.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip() {
            Some(ip) => write!(f, "{ip}"),
            None => write!(f, "{}", self.family),
        }
    }
}
