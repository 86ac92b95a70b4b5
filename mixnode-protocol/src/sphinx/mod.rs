//! Layered packet format and single-use reply blocks.
//!
//! Packet wire format:
//! ```text
//! [header_len: 2 BE][header: header_len][payload: sealed]
//! ```
//! The header is an onion of per-hop layers, each
//! `[ephemeral_pub: 32][nonce: 24][AEAD(cmd_len: 2 || commands || inner header)]`,
//! keyed by HKDF over the X25519 exchange between the ephemeral key and the
//! hop's mix key. The payload is sealed once, end to end: forward packets use a
//! key derived from the final hop's exchange, SURB replies use the SURB's
//! payload key, which only the SURB creator retains.

pub mod commands;
pub mod packet;
pub mod path;
pub mod surb;

use crate::crypto::EncryptionError;
use thiserror::Error;

pub use commands::RoutingCommand;
pub use packet::{new_packet, unwrap_packet, Unwrapped};
pub use path::{new_path, path_to_strings, PathHop};
pub use surb::{decrypt_surb_payload, new_packet_from_surb, new_surb, SprpKey};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SphinxError {
    #[error("Topology layer {0} has no nodes")]
    EmptyLayer(usize),
    #[error("Recipient too long: {0} bytes")]
    RecipientTooLong(usize),
    #[error("Reverse path requires a SURB id")]
    MissingSurbId,
    #[error("Invalid delay parameter: {0}")]
    InvalidDelayParameter(f64),
    #[error("Path must contain at least one hop")]
    EmptyPath,
    #[error("Header too large: {0} bytes")]
    HeaderTooLarge(usize),
    #[error("SURB too large: {0} bytes")]
    SurbTooLarge(usize),
    #[error("Unknown routing command: 0x{0:02x}")]
    UnknownCommand(u8),
    #[error("Malformed packet: {0}")]
    Malformed(&'static str),
    #[error("Node not in document")]
    UnknownNode,
    #[error(transparent)]
    Crypto(#[from] EncryptionError),
}

pub type Result<T> = std::result::Result<T, SphinxError>;
