//! Dedicated logic for the 64-bit nonces carried in control messages.
//!
//! A map-request originator picks a fresh nonce, and the matching map-reply
//! echoes it back so the requester can correlate the answer. This codec only
//! transports the value, correlation is up to the caller.

use core::fmt;

/// A 64-bit nonce as carried in map-request, map-reply, map-register and
/// map-notify messages.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(u64);

impl Nonce {
    /// Create a new `Nonce` with the default (zero) value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a random `Nonce`, suitable for a fresh map-request.
    pub fn random() -> Self {
        Nonce(rand::random())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:#018x}", self.0))
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Nonce(value)
    }
}

impl From<Nonce> for u64 {
    fn from(value: Nonce) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::Nonce;

    #[test]
    fn conversions() {
        let nonce = Nonce::from(0xdead_beef_0102_0304);
        assert_eq!(u64::from(nonce), 0xdead_beef_0102_0304);

        assert_eq!(u64::from(Nonce::new()), 0);
    }

    #[test]
    fn displays_as_hex() {
        let nonce = Nonce::from(0x0000_0000_0000_0001);
        assert_eq!(nonce.to_string(), "0x0000000000000001");

        let nonce = Nonce::from(0xdead_beef_0102_0304);
        assert_eq!(nonce.to_string(), "0xdeadbeef01020304");
    }
}
