//! Codec for the control plane of the Locator/ID Separation Protocol (LISP).
//!
//! This crate translates between the raw bytes carried in control-plane UDP
//! payloads and structured message types: map-request, map-reply,
//! map-register, map-notify, and the encapsulated control message which wraps
//! a fresh IP packet. It does not open sockets, keep a map cache, or verify
//! authentication data; it only moves messages between their wire form and
//! their typed form, in both directions.
//!
//! The codec is stateless. Every decode builds a fresh owned value tree and
//! every encode consumes one without mutating it, so calls can be made
//! concurrently from any number of tasks.

pub mod control;
pub mod nonce;

pub use control::{Codec, DecodeError, EncodeError, Message};
pub use nonce::Nonce;
