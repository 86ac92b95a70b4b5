//! SURB id layout: `[base: u64 BE][suffix: u64 BE]`.
//!
//! The base is fixed for the lifetime of the process, so replies to SURBs
//! issued by a previous run are recognisable without any persisted state.
//! The suffix is random and keys the [`SurbStore`](super::SurbStore).

use mixnode_protocol::constants::SURB_ID_LENGTH;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn make_surb_id(base: u64, suffix: u64) -> [u8; SURB_ID_LENGTH] {
    let mut id = [0u8; SURB_ID_LENGTH];
    id[..8].copy_from_slice(&base.to_be_bytes());
    id[8..].copy_from_slice(&suffix.to_be_bytes());
    id
}

/// Returns `(base, suffix)`.
pub fn split_surb_id(id: &[u8; SURB_ID_LENGTH]) -> (u64, u64) {
    let mut base = [0u8; 8];
    let mut suffix = [0u8; 8];
    base.copy_from_slice(&id[..8]);
    suffix.copy_from_slice(&id[8..]);
    (u64::from_be_bytes(base), u64::from_be_bytes(suffix))
}

/// Token base for a new process: the current UNIX time in seconds.
pub fn surb_id_base_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_layout_is_big_endian() {
        let id = make_surb_id(0x0102_0304_0506_0708, 0xA1A2_A3A4_A5A6_A7A8);
        assert_eq!(id, hex!("0102030405060708 a1a2a3a4a5a6a7a8"));
        assert_eq!(split_surb_id(&id), (0x0102_0304_0506_0708, 0xA1A2_A3A4_A5A6_A7A8));
    }

    #[test]
    fn test_base_is_recent() {
        // 2017-01-01T00:00:00Z
        assert!(surb_id_base_now() > 1_483_228_800);
    }
}
