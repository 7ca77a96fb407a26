//! A single routing-locator entry inside a map record.

use bytes::{Buf, BufMut};
use tracing::trace;

use super::{afi::Address, DecodeError, EncodeError};

/// Flag bit indicating the locator is local to the sender.
pub const LOCATOR_FLAG_LOCAL: u8 = 0b100;
/// Flag bit indicating the locator is being RLOC-probed.
pub const LOCATOR_FLAG_PROBE: u8 = 0b010;
/// Flag bit indicating the locator is routable (up).
pub const LOCATOR_FLAG_ROUTE: u8 = 0b001;

/// Mask to apply to locator flags, leaving only valid flags.
const FLAG_MASK: u8 = 0b111;

/// One candidate routing locator with its priorities and weights for load
/// balancing and failover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorRecord {
    /// Unicast priority, lower is preferred, 255 means unusable.
    priority: u8,
    /// Unicast weight among locators of equal priority.
    weight: u8,
    /// Multicast priority.
    multicast_priority: u8,
    /// Multicast weight.
    multicast_weight: u8,
    /// Flags set on the locator, see the `LOCATOR_FLAG_*` constants.
    flags: u8,
    /// The routing locator itself.
    locator: Address,
}

impl LocatorRecord {
    /// Smallest possible size on the wire: the fixed fields plus an
    /// unspecified address.
    pub(super) const MIN_WIRE_SIZE: usize = 8;

    /// Create a new `LocatorRecord`. Unknown flag bits are discarded.
    pub fn new(
        priority: u8,
        weight: u8,
        multicast_priority: u8,
        multicast_weight: u8,
        flags: u8,
        locator: Address,
    ) -> Self {
        Self {
            priority,
            weight,
            multicast_priority,
            multicast_weight,
            flags: flags & FLAG_MASK,
            locator,
        }
    }

    /// The unicast priority of this locator.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// The unicast weight of this locator.
    pub fn weight(&self) -> u8 {
        self.weight
    }

    /// The multicast priority of this locator.
    pub fn multicast_priority(&self) -> u8 {
        self.multicast_priority
    }

    /// The multicast weight of this locator.
    pub fn multicast_weight(&self) -> u8 {
        self.multicast_weight
    }

    /// The raw flag bits of this locator.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Whether the locator is local to the message sender.
    pub fn local_locator(&self) -> bool {
        self.flags & LOCATOR_FLAG_LOCAL != 0
    }

    /// Whether the locator is being probed.
    pub fn probe(&self) -> bool {
        self.flags & LOCATOR_FLAG_PROBE != 0
    }

    /// Whether the locator is routable.
    pub fn route(&self) -> bool {
        self.flags & LOCATOR_FLAG_ROUTE != 0
    }

    /// The routing locator [`Address`].
    pub fn locator(&self) -> &Address {
        &self.locator
    }

    /// Calculates the size on the wire of this `LocatorRecord`.
    pub fn wire_size(&self) -> usize {
        6 + self.locator.wire_size()
    }

    /// Construct a `LocatorRecord` from wire bytes.
    pub fn from_bytes(src: &mut bytes::BytesMut) -> Result<Self, DecodeError> {
        if src.remaining() < 6 {
            return Err(DecodeError::Truncated);
        }
        let priority = src.get_u8();
        let weight = src.get_u8();
        let multicast_priority = src.get_u8();
        let multicast_weight = src.get_u8();
        // 13 reserved bits, then the 3 flag bits.
        let flags = (src.get_u16() & FLAG_MASK as u16) as u8;
        let locator = Address::from_bytes(src)?;

        trace!("Read locator record");

        Ok(Self {
            priority,
            weight,
            multicast_priority,
            multicast_weight,
            flags,
            locator,
        })
    }

    /// Encode this `LocatorRecord` as part of a message.
    pub fn write_bytes(&self, dst: &mut bytes::BytesMut) -> Result<(), EncodeError> {
        dst.put_u8(self.priority);
        dst.put_u8(self.weight);
        dst.put_u8(self.multicast_priority);
        dst.put_u8(self.multicast_weight);
        dst.put_u16((self.flags & FLAG_MASK) as u16);
        self.locator.write_bytes(dst)
    }
}
