//! Layered packet construction and per-hop unwrapping.

use super::commands::{decode_commands, encode_commands};
use super::{PathHop, Result, RoutingCommand, SphinxError};
use crate::constants::{RECIPIENT_ID_LENGTH, SURB_ID_LENGTH};
use crate::crypto::{derive_key, open, seal};
use crate::pki::NodeId;
use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

const LAYER_KEY_INFO: &[u8] = b"mixnode-sphinx-layer-v1";
const PAYLOAD_KEY_INFO: &[u8] = b"mixnode-sphinx-payload-v1";

/// Length prefix for the header and for each layer's command block.
const LEN_FIELD: usize = 2;
const EPHEMERAL_KEY_SIZE: usize = 32;

/// Result of unwrapping one layer at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwrapped {
    /// Not the final hop: forward `packet` to `next_hop` after `delay_ms`.
    Forward {
        next_hop: NodeId,
        delay_ms: u32,
        packet: Vec<u8>,
    },
    /// Final hop of a forward path: `payload` is decrypted.
    Deliver {
        recipient: [u8; RECIPIENT_ID_LENGTH],
        payload: Vec<u8>,
    },
    /// Final hop of a reverse path: `payload` is still sealed under the SURB
    /// creator's key.
    SurbReply {
        recipient: [u8; RECIPIENT_ID_LENGTH],
        surb_id: [u8; SURB_ID_LENGTH],
        payload: Vec<u8>,
    },
}

/// Onion header plus the final hop's shared secret.
pub(crate) struct Header {
    pub(crate) bytes: Vec<u8>,
    pub(crate) final_secret: Zeroizing<[u8; 32]>,
}

/// Wrap the routing commands of `path` into an onion header, innermost first.
pub(crate) fn build_header<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    path: &[PathHop],
) -> Result<Header> {
    let last = path.last().ok_or(SphinxError::EmptyPath)?;

    let mut layers: Vec<(PublicKey, Zeroizing<[u8; 32]>)> = Vec::with_capacity(path.len());
    for hop in path {
        let ephemeral = StaticSecret::random_from_rng(&mut *rng);
        let shared = ephemeral.diffie_hellman(&PublicKey::from(hop.public_key));
        layers.push((PublicKey::from(&ephemeral), Zeroizing::new(*shared.as_bytes())));
    }

    let mut inner: Vec<u8> = Vec::new();
    for (hop, (ephemeral_pub, shared)) in path.iter().zip(layers.iter()).rev() {
        let commands = encode_commands(&hop.commands);
        let mut plaintext = Vec::with_capacity(LEN_FIELD + commands.len() + inner.len());
        plaintext.extend_from_slice(&(commands.len() as u16).to_be_bytes());
        plaintext.extend_from_slice(&commands);
        plaintext.extend_from_slice(&inner);

        let key = Zeroizing::new(derive_key(shared.as_slice(), LAYER_KEY_INFO)?);
        let sealed = seal(&plaintext, key.as_slice())?;

        inner = Vec::with_capacity(EPHEMERAL_KEY_SIZE + sealed.len());
        inner.extend_from_slice(ephemeral_pub.as_bytes());
        inner.extend_from_slice(&sealed);
    }

    if inner.len() > u16::MAX as usize {
        return Err(SphinxError::HeaderTooLarge(inner.len()));
    }
    debug_assert!(!last.commands.is_empty());

    let final_secret = layers
        .pop()
        .map(|(_, shared)| shared)
        .ok_or(SphinxError::EmptyPath)?;
    Ok(Header {
        bytes: inner,
        final_secret,
    })
}

/// Frame a header and a sealed payload into wire format.
pub(crate) fn frame(header: &[u8], sealed_payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEN_FIELD + header.len() + sealed_payload.len());
    out.extend_from_slice(&(header.len() as u16).to_be_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(sealed_payload);
    out
}

/// Build a forward packet along `path` carrying `payload`.
pub fn new_packet<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    path: &[PathHop],
    payload: &[u8],
) -> Result<Vec<u8>> {
    let header = build_header(rng, path)?;
    let payload_key = Zeroizing::new(derive_key(header.final_secret.as_slice(), PAYLOAD_KEY_INFO)?);
    let sealed = seal(payload, payload_key.as_slice())?;
    Ok(frame(&header.bytes, &sealed))
}

/// Unwrap one layer with the node's mix key.
pub fn unwrap_packet(mix_secret: &StaticSecret, raw: &[u8]) -> Result<Unwrapped> {
    let (len_bytes, rest) = split(raw, LEN_FIELD)?;
    let header_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    let (header, sealed_payload) = split(rest, header_len)?;
    let (ephemeral_pub, sealed_layer) = split(header, EPHEMERAL_KEY_SIZE)?;

    let ephemeral_pub: [u8; 32] = ephemeral_pub
        .try_into()
        .map_err(|_| SphinxError::Malformed("ephemeral key"))?;
    let shared = Zeroizing::new(
        *mix_secret
            .diffie_hellman(&PublicKey::from(ephemeral_pub))
            .as_bytes(),
    );
    let layer_key = Zeroizing::new(derive_key(shared.as_slice(), LAYER_KEY_INFO)?);
    let plaintext = open(sealed_layer, layer_key.as_slice())?;

    let (cmd_len, rest) = split(&plaintext, LEN_FIELD)?;
    let cmd_len = u16::from_be_bytes([cmd_len[0], cmd_len[1]]) as usize;
    let (commands, inner_header) = split(rest, cmd_len)?;
    let commands = decode_commands(commands)?;

    let mut next_hop = None;
    let mut delay_ms = 0;
    let mut recipient = None;
    let mut surb_id = None;
    for cmd in commands {
        match cmd {
            RoutingCommand::NextNodeHop { id } => next_hop = Some(id),
            RoutingCommand::NodeDelay { delay_ms: d } => delay_ms = d,
            RoutingCommand::Recipient { id } => recipient = Some(id),
            RoutingCommand::SurbReply { id } => surb_id = Some(id),
        }
    }

    match (next_hop, recipient, surb_id) {
        (Some(next_hop), None, None) => Ok(Unwrapped::Forward {
            next_hop,
            delay_ms,
            packet: frame(inner_header, sealed_payload),
        }),
        (None, Some(recipient), Some(surb_id)) => Ok(Unwrapped::SurbReply {
            recipient,
            surb_id,
            payload: sealed_payload.to_vec(),
        }),
        (None, Some(recipient), None) => {
            let payload_key = Zeroizing::new(derive_key(shared.as_slice(), PAYLOAD_KEY_INFO)?);
            Ok(Unwrapped::Deliver {
                recipient,
                payload: open(sealed_payload, payload_key.as_slice())?,
            })
        }
        _ => Err(SphinxError::Malformed("inconsistent routing commands")),
    }
}

fn split(data: &[u8], at: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < at {
        return Err(SphinxError::Malformed("truncated"));
    }
    Ok(data.split_at(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptionError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    pub(crate) fn node(seed: u8) -> (StaticSecret, PathHop) {
        let secret = StaticSecret::from([seed; 32]);
        let public = PublicKey::from(&secret);
        let hop = PathHop {
            id: crate::pki::node_id(public.as_bytes()),
            public_key: *public.as_bytes(),
            commands: Vec::new(),
        };
        (secret, hop)
    }

    #[test]
    fn test_forward_packet_unwraps_hop_by_hop() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let nodes: Vec<_> = (1..=3).map(node).collect();
        let mut path: Vec<PathHop> = nodes.iter().map(|(_, h)| h.clone()).collect();
        path[0].commands = vec![
            RoutingCommand::NodeDelay { delay_ms: 10 },
            RoutingCommand::NextNodeHop { id: path[1].id },
        ];
        path[1].commands = vec![RoutingCommand::NextNodeHop { id: path[2].id }];
        path[2].commands = vec![RoutingCommand::Recipient { id: [3u8; 32] }];

        let mut packet = new_packet(&mut rng, &path, b"decoy").unwrap();

        for (idx, (secret, _)) in nodes.iter().enumerate().take(2) {
            match unwrap_packet(secret, &packet).unwrap() {
                Unwrapped::Forward {
                    next_hop,
                    delay_ms,
                    packet: next,
                } => {
                    assert_eq!(next_hop, path[idx + 1].id);
                    assert_eq!(delay_ms, if idx == 0 { 10 } else { 0 });
                    packet = next;
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(
            unwrap_packet(&nodes[2].0, &packet).unwrap(),
            Unwrapped::Deliver {
                recipient: [3u8; 32],
                payload: b"decoy".to_vec(),
            }
        );
    }

    #[test]
    fn test_wrong_node_cannot_unwrap() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let (_, mut hop) = node(1);
        hop.commands = vec![RoutingCommand::Recipient { id: [0u8; 32] }];
        let packet = new_packet(&mut rng, &[hop], b"x").unwrap();

        let (stranger, _) = node(2);
        assert_eq!(
            unwrap_packet(&stranger, &packet),
            Err(SphinxError::Crypto(EncryptionError::DecryptionFailed))
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        assert_eq!(new_packet(&mut rng, &[], b"x"), Err(SphinxError::EmptyPath));
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let (secret, _) = node(1);
        assert!(matches!(unwrap_packet(&secret, &[0x00]), Err(SphinxError::Malformed(_))));
        assert!(matches!(unwrap_packet(&secret, &[0x00, 0x40, 1, 2]), Err(SphinxError::Malformed(_))));
    }
}
