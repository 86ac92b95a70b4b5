//! Random path selection through the stratified topology.

use super::{Result, RoutingCommand, SphinxError};
use crate::constants::{RECIPIENT_ID_LENGTH, SURB_ID_LENGTH};
use crate::pki::{Document, MixDescriptor, NodeId};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use std::time::{Duration, SystemTime};

/// One hop of a constructed path: who unwraps the layer, and what it is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHop {
    pub id: NodeId,
    pub public_key: [u8; 32],
    pub commands: Vec<RoutingCommand>,
}

impl PathHop {
    /// Delay this hop applies, if any.
    pub fn delay(&self) -> Duration {
        self.commands
            .iter()
            .find_map(|cmd| match cmd {
                RoutingCommand::NodeDelay { delay_ms } => {
                    Some(Duration::from_millis(u64::from(*delay_ms)))
                }
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Build a path from `src` to `dst`.
///
/// The path visits one uniformly chosen mix per topology layer and ends at
/// `dst`. When `is_from_client` is set, `src` is a provider and is the first
/// hop. Every mix hop is assigned an `Exp(mu)` delay clamped to
/// `mu_max_delay`. The final hop carries `recipient` and, for reverse paths
/// (`is_forward == false`), the SURB id.
///
/// # Returns
/// The hops and the expected arrival time at `dst` given `base_time`.
pub fn new_path<R: Rng + ?Sized>(
    rng: &mut R,
    doc: &Document,
    recipient: &[u8],
    src: &MixDescriptor,
    dst: &MixDescriptor,
    surb_id: Option<&[u8; SURB_ID_LENGTH]>,
    base_time: SystemTime,
    is_from_client: bool,
    is_forward: bool,
) -> Result<(Vec<PathHop>, SystemTime)> {
    if recipient.len() > RECIPIENT_ID_LENGTH {
        return Err(SphinxError::RecipientTooLong(recipient.len()));
    }
    if !is_forward && surb_id.is_none() {
        return Err(SphinxError::MissingSurbId);
    }
    if !(doc.mu.is_finite() && doc.mu > 0.0) {
        return Err(SphinxError::InvalidDelayParameter(doc.mu));
    }
    let delay_dist = Exp::new(doc.mu).map_err(|_| SphinxError::InvalidDelayParameter(doc.mu))?;

    let mut descs: Vec<&MixDescriptor> = Vec::with_capacity(doc.topology.len() + 2);
    if is_from_client {
        descs.push(src);
    }
    for (idx, layer) in doc.topology.iter().enumerate() {
        descs.push(layer.choose(rng).ok_or(SphinxError::EmptyLayer(idx))?);
    }
    descs.push(dst);

    let mut recipient_id = [0u8; RECIPIENT_ID_LENGTH];
    recipient_id[..recipient.len()].copy_from_slice(recipient);

    let max_delay = doc.mu_max_delay.min(u64::from(u32::MAX));
    let mut then = base_time;
    let mut hops = Vec::with_capacity(descs.len());
    for (idx, desc) in descs.iter().enumerate() {
        let mut commands = Vec::with_capacity(3);
        if !desc.layer.is_provider() {
            let delay_ms = (delay_dist.sample(rng) as u64).min(max_delay);
            then += Duration::from_millis(delay_ms);
            commands.push(RoutingCommand::NodeDelay {
                delay_ms: delay_ms as u32,
            });
        }

        match descs.get(idx + 1) {
            Some(next) => commands.push(RoutingCommand::NextNodeHop { id: next.id }),
            None => {
                commands.push(RoutingCommand::Recipient { id: recipient_id });
                if let (false, Some(id)) = (is_forward, surb_id) {
                    commands.push(RoutingCommand::SurbReply { id: *id });
                }
            }
        }

        hops.push(PathHop {
            id: desc.id,
            public_key: desc.mix_key,
            commands,
        });
    }

    Ok((hops, then))
}

/// Render a path one line per hop, for debug logging.
pub fn path_to_strings(doc: &Document, path: &[PathHop]) -> Result<Vec<String>> {
    path.iter()
        .enumerate()
        .map(|(idx, hop)| {
            let desc = doc.get_node(&hop.id).ok_or(SphinxError::UnknownNode)?;
            Ok(format!(
                "[{}]: {} ({}) {:?}",
                idx, desc.name, desc.layer, hop.commands
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::Layer;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn document(mu_max_delay: u64) -> Document {
        let layer = |l: u8| -> Vec<MixDescriptor> {
            (0..3u8)
                .map(|i| MixDescriptor::new(format!("mix-{}-{}", l, i), [10 * l + i + 1; 32], Layer::Mix(l)))
                .collect()
        };
        Document {
            epoch: 1,
            mu: 0.01,
            mu_max_delay,
            lambda_m: 0.01,
            lambda_m_max_delay: 1_000,
            topology: vec![layer(0), layer(1), layer(2)],
            providers: vec![MixDescriptor::new("provider", [200u8; 32], Layer::Provider)],
        }
    }

    #[test]
    fn test_forward_path_shape() {
        let doc = document(500);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let src = doc.topology[1][0].clone();
        let dst = doc.providers[0].clone();
        let base = SystemTime::UNIX_EPOCH;

        let (path, then) =
            new_path(&mut rng, &doc, b"+loop", &src, &dst, None, base, false, true).unwrap();

        assert_eq!(path.len(), 4);
        assert_eq!(path[3].id, dst.id);
        for (idx, hop) in path.iter().enumerate().take(3) {
            assert!(doc.topology[idx].iter().any(|d| d.id == hop.id));
            assert!(hop.commands.contains(&RoutingCommand::NextNodeHop { id: path[idx + 1].id }));
            assert!(hop.delay() <= Duration::from_millis(500));
        }
        let total: Duration = path.iter().map(PathHop::delay).sum();
        assert_eq!(then.duration_since(base).unwrap(), total);
        assert!(!path[3]
            .commands
            .iter()
            .any(|c| matches!(c, RoutingCommand::SurbReply { .. })));
    }

    #[test]
    fn test_reverse_path_carries_surb_id() {
        let doc = document(500);
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let src = doc.providers[0].clone();
        let dst = doc.topology[0][2].clone();
        let surb_id = [5u8; SURB_ID_LENGTH];

        let (path, _) = new_path(
            &mut rng,
            &doc,
            &[1u8; 32],
            &src,
            &dst,
            Some(&surb_id),
            SystemTime::now(),
            false,
            false,
        )
        .unwrap();

        let last = path.last().unwrap();
        assert_eq!(last.id, dst.id);
        assert!(last.commands.contains(&RoutingCommand::SurbReply { id: surb_id }));
        assert!(last.commands.contains(&RoutingCommand::Recipient { id: [1u8; 32] }));
    }

    #[test]
    fn test_reverse_path_requires_surb_id() {
        let doc = document(500);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let (src, dst) = (doc.providers[0].clone(), doc.topology[0][0].clone());
        assert_eq!(
            new_path(&mut rng, &doc, b"", &src, &dst, None, SystemTime::now(), false, false),
            Err(SphinxError::MissingSurbId)
        );
    }

    #[test]
    fn test_from_client_includes_source() {
        let doc = document(0);
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let src = doc.providers[0].clone();
        let dst = doc.providers[0].clone();
        let base = SystemTime::now();

        let (path, then) =
            new_path(&mut rng, &doc, b"", &src, &dst, None, base, true, true).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path[0].id, src.id);
        // mu_max_delay of zero pins every delay to zero.
        assert_eq!(then, base);
    }

    #[test]
    fn test_empty_layer_and_bad_parameters() {
        let mut doc = document(500);
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (src, dst) = (doc.topology[0][0].clone(), doc.providers[0].clone());

        assert_eq!(
            new_path(&mut rng, &doc, &[0u8; 33], &src, &dst, None, SystemTime::now(), false, true),
            Err(SphinxError::RecipientTooLong(33))
        );

        doc.topology[1].clear();
        assert_eq!(
            new_path(&mut rng, &doc, b"", &src, &dst, None, SystemTime::now(), false, true),
            Err(SphinxError::EmptyLayer(1))
        );

        doc.mu = 0.0;
        assert_eq!(
            new_path(&mut rng, &doc, b"", &src, &dst, None, SystemTime::now(), false, true),
            Err(SphinxError::InvalidDelayParameter(0.0))
        );
    }

    #[test]
    fn test_path_to_strings() {
        let doc = document(500);
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let (src, dst) = (doc.topology[0][0].clone(), doc.providers[0].clone());
        let (path, _) =
            new_path(&mut rng, &doc, b"", &src, &dst, None, SystemTime::now(), false, true).unwrap();

        let lines = path_to_strings(&doc, &path).unwrap();
        assert_eq!(lines.len(), path.len());
        assert!(lines[3].starts_with("[3]: provider (provider)"));

        let mut bogus = path.clone();
        bogus[0].id = [0xEE; 32];
        assert_eq!(path_to_strings(&doc, &bogus), Err(SphinxError::UnknownNode));
    }
}
