//! Single-use reply blocks.
//!
//! SURB layout (`SURB_LENGTH` bytes):
//! ```text
//! [first_hop: 32][payload_key: 32][header_len: 2 BE][header][zero padding]
//! ```
//! Whoever holds the SURB can send exactly one reply along the pre-built
//! reverse path without learning where it ends. The creator keeps the
//! [`SprpKey`] and is the only party able to read the reply once it arrives.

use super::packet::{build_header, frame};
use super::{PathHop, Result, SphinxError};
use crate::constants::{NODE_ID_LENGTH, SPRP_KEY_LENGTH, SURB_LENGTH};
use crate::crypto::{open, seal};
use crate::pki::NodeId;
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const SURB_HEADER_OFFSET: usize = NODE_ID_LENGTH + SPRP_KEY_LENGTH + 2;

/// Key protecting a SURB reply payload. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SprpKey([u8; SPRP_KEY_LENGTH]);

impl SprpKey {
    pub fn from_bytes(bytes: [u8; SPRP_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SPRP_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SprpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SprpKey(..)")
    }
}

/// Create a SURB for the reverse path `path`.
///
/// # Returns
/// The encoded SURB (exactly `SURB_LENGTH` bytes) and the key needed to
/// decrypt the reply payload.
pub fn new_surb<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    path: &[PathHop],
) -> Result<(Vec<u8>, SprpKey)> {
    let first_hop = path.first().ok_or(SphinxError::EmptyPath)?.id;
    let header = build_header(rng, path)?;

    let needed = SURB_HEADER_OFFSET + header.bytes.len();
    if needed > SURB_LENGTH {
        return Err(SphinxError::SurbTooLarge(needed));
    }

    let mut key = [0u8; SPRP_KEY_LENGTH];
    rng.fill_bytes(&mut key);
    let key = SprpKey(key);

    let mut surb = Vec::with_capacity(SURB_LENGTH);
    surb.extend_from_slice(&first_hop);
    surb.extend_from_slice(key.as_bytes());
    surb.extend_from_slice(&(header.bytes.len() as u16).to_be_bytes());
    surb.extend_from_slice(&header.bytes);
    surb.resize(SURB_LENGTH, 0);

    Ok((surb, key))
}

/// Build a reply packet from a received SURB.
///
/// # Returns
/// The first hop to send to and the packet.
pub fn new_packet_from_surb(surb: &[u8], payload: &[u8]) -> Result<(NodeId, Vec<u8>)> {
    if surb.len() != SURB_LENGTH {
        return Err(SphinxError::Malformed("SURB length"));
    }

    let mut first_hop = [0u8; NODE_ID_LENGTH];
    first_hop.copy_from_slice(&surb[..NODE_ID_LENGTH]);
    let key = &surb[NODE_ID_LENGTH..NODE_ID_LENGTH + SPRP_KEY_LENGTH];
    let header_len = u16::from_be_bytes([
        surb[SURB_HEADER_OFFSET - 2],
        surb[SURB_HEADER_OFFSET - 1],
    ]) as usize;
    let header = surb
        .get(SURB_HEADER_OFFSET..SURB_HEADER_OFFSET + header_len)
        .ok_or(SphinxError::Malformed("SURB header length"))?;

    let sealed = seal(payload, key)?;
    Ok((first_hop, frame(header, &sealed)))
}

/// Decrypt a SURB reply payload with the key retained at SURB creation.
pub fn decrypt_surb_payload(payload: &[u8], key: &SprpKey) -> Result<Vec<u8>> {
    Ok(open(payload, key.as_bytes())?)
}
