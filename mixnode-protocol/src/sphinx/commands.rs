use super::{Result, SphinxError};
use crate::constants::{NODE_ID_LENGTH, RECIPIENT_ID_LENGTH, SURB_ID_LENGTH};
use crate::pki::NodeId;
use std::fmt;

const NEXT_NODE_HOP_TAG: u8 = 0x01;
const NODE_DELAY_TAG: u8 = 0x02;
const RECIPIENT_TAG: u8 = 0x03;
const SURB_REPLY_TAG: u8 = 0x04;

/// Per-hop routing instruction, visible only to the hop that unwraps it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RoutingCommand {
    /// Forward to the given node.
    NextNodeHop { id: NodeId },
    /// Hold the packet for `delay_ms` before forwarding.
    NodeDelay { delay_ms: u32 },
    /// Deliver to a local recipient (final hop only).
    Recipient { id: [u8; RECIPIENT_ID_LENGTH] },
    /// The payload is a SURB reply identified by `id` (final hop only).
    SurbReply { id: [u8; SURB_ID_LENGTH] },
}

impl RoutingCommand {
    fn encoded_len(&self) -> usize {
        1 + match self {
            RoutingCommand::NextNodeHop { .. } => NODE_ID_LENGTH,
            RoutingCommand::NodeDelay { .. } => 4,
            RoutingCommand::Recipient { .. } => RECIPIENT_ID_LENGTH,
            RoutingCommand::SurbReply { .. } => SURB_ID_LENGTH,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            RoutingCommand::NextNodeHop { id } => {
                out.push(NEXT_NODE_HOP_TAG);
                out.extend_from_slice(id);
            }
            RoutingCommand::NodeDelay { delay_ms } => {
                out.push(NODE_DELAY_TAG);
                out.extend_from_slice(&delay_ms.to_be_bytes());
            }
            RoutingCommand::Recipient { id } => {
                out.push(RECIPIENT_TAG);
                out.extend_from_slice(id);
            }
            RoutingCommand::SurbReply { id } => {
                out.push(SURB_REPLY_TAG);
                out.extend_from_slice(id);
            }
        }
    }
}

// Recipient and SURB ids stay out of logs beyond a short prefix.
impl fmt::Debug for RoutingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingCommand::NextNodeHop { id } => write!(f, "NextNodeHop({})", hex::encode(&id[..8])),
            RoutingCommand::NodeDelay { delay_ms } => write!(f, "NodeDelay({}ms)", delay_ms),
            RoutingCommand::Recipient { .. } => write!(f, "Recipient(..)"),
            RoutingCommand::SurbReply { .. } => write!(f, "SurbReply(..)"),
        }
    }
}

/// Encode a command list as concatenated tagged records.
pub fn encode_commands(commands: &[RoutingCommand]) -> Vec<u8> {
    let mut out = Vec::with_capacity(commands.iter().map(|c| c.encoded_len()).sum());
    for cmd in commands {
        cmd.encode_into(&mut out);
    }
    out
}

/// Decode a command list produced by [`encode_commands`].
pub fn decode_commands(mut data: &[u8]) -> Result<Vec<RoutingCommand>> {
    let mut commands = Vec::new();
    while let Some((&tag, rest)) = data.split_first() {
        let (cmd, len) = match tag {
            NEXT_NODE_HOP_TAG => (
                RoutingCommand::NextNodeHop { id: take_array(rest)? },
                NODE_ID_LENGTH,
            ),
            NODE_DELAY_TAG => (
                RoutingCommand::NodeDelay {
                    delay_ms: u32::from_be_bytes(take_array(rest)?),
                },
                4,
            ),
            RECIPIENT_TAG => (
                RoutingCommand::Recipient { id: take_array(rest)? },
                RECIPIENT_ID_LENGTH,
            ),
            SURB_REPLY_TAG => (
                RoutingCommand::SurbReply { id: take_array(rest)? },
                SURB_ID_LENGTH,
            ),
            other => return Err(SphinxError::UnknownCommand(other)),
        };
        commands.push(cmd);
        data = &rest[len..];
    }
    Ok(commands)
}

fn take_array<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    data.get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or(SphinxError::Malformed("truncated routing command"))
}
