/// Length of a node identifier (blake3 of the node's mix key).
pub const NODE_ID_LENGTH: usize = 32;

/// Length of a recipient identifier carried in the final hop's routing commands.
pub const RECIPIENT_ID_LENGTH: usize = 32;

/// Length of a SURB identifier.
pub const SURB_ID_LENGTH: usize = 16;

/// Length of the symmetric key protecting a SURB reply payload.
pub const SPRP_KEY_LENGTH: usize = 32;

/// Fixed size of an encoded SURB (first hop, payload key, header, zero padding).
pub const SURB_LENGTH: usize = 1024;

/// Length of the user-visible forward payload that follows the SURB slot.
pub const USER_FORWARD_PAYLOAD_LENGTH: usize = 2 * 1024;

/// Forward payload header: `[has_surb: 1][reserved: 1]`.
pub const FORWARD_PAYLOAD_HEADER_LENGTH: usize = 2;

/// Total plaintext length of every forward payload, with or without a SURB.
pub const FORWARD_PAYLOAD_LENGTH: usize =
    FORWARD_PAYLOAD_HEADER_LENGTH + SURB_LENGTH + USER_FORWARD_PAYLOAD_LENGTH;
