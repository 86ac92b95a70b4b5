//! Packets as seen by the decoy subsystem.

use bytes::Bytes;
use mixnode_protocol::constants::{RECIPIENT_ID_LENGTH, SURB_ID_LENGTH};
use mixnode_protocol::sphinx::Unwrapped;
use mixnode_protocol::NodeId;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

static NEXT_PACKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique packet id, for log correlation only.
pub fn next_packet_id() -> u64 {
    NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed)
}

/// A packet that reached its final hop at this node.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub id: u64,
    pub recipient: [u8; RECIPIENT_ID_LENGTH],
    /// SURB id when the packet is a SURB reply.
    pub surb_reply: Option<[u8; SURB_ID_LENGTH]>,
    pub payload: Vec<u8>,
    pub recv_at: Instant,
}

impl InboundPacket {
    pub fn surb_reply(
        recipient: [u8; RECIPIENT_ID_LENGTH],
        surb_id: [u8; SURB_ID_LENGTH],
        payload: Vec<u8>,
        recv_at: Instant,
    ) -> Self {
        Self {
            id: next_packet_id(),
            recipient,
            surb_reply: Some(surb_id),
            payload,
            recv_at,
        }
    }

    /// Build from the result of unwrapping the final layer. `None` for
    /// packets that still have to be forwarded.
    pub fn from_unwrapped(unwrapped: Unwrapped, recv_at: Instant) -> Option<Self> {
        match unwrapped {
            Unwrapped::SurbReply {
                recipient,
                surb_id,
                payload,
            } => Some(Self::surb_reply(recipient, surb_id, payload, recv_at)),
            Unwrapped::Deliver { recipient, payload } => Some(Self {
                id: next_packet_id(),
                recipient,
                surb_reply: None,
                payload,
                recv_at,
            }),
            Unwrapped::Forward { .. } => None,
        }
    }

    pub fn is_surb_reply(&self) -> bool {
        self.surb_reply.is_some()
    }
}

/// A packet ready for the connector.
#[derive(Debug, Clone)]
pub struct OutboundPacket {
    pub id: u64,
    pub raw: Bytes,
    pub next_hop: NodeId,
    pub dispatch_at: Instant,
}

impl OutboundPacket {
    pub fn new(raw: Vec<u8>, next_hop: NodeId) -> Self {
        Self {
            id: next_packet_id(),
            raw: Bytes::from(raw),
            next_hop,
            dispatch_at: Instant::now(),
        }
    }
}
