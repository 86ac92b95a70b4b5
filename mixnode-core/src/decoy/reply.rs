//! SURB reply validation.
//!
//! Every rejection is counted and logged at debug level only, and nothing is
//! reported back to the caller.

use crate::metrics::DecoyMetrics;
use crate::packet::InboundPacket;
use crate::surb::{split_surb_id, SurbTracker};
use mixnode_protocol::constants::RECIPIENT_ID_LENGTH;
use mixnode_protocol::crypto::eq_32;
use mixnode_protocol::sphinx::decrypt_surb_payload;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyOutcome {
    Accepted { id: u64 },
    InvalidRecipient,
    InvalidSurbBase(u64),
    UnknownSurb(u64),
    DecryptFailed(u64),
}

pub(crate) struct ReplyValidator {
    recipient: Zeroizing<[u8; RECIPIENT_ID_LENGTH]>,
    surb_id_base: u64,
    tracker: Arc<SurbTracker>,
    metrics: Arc<DecoyMetrics>,
}

impl ReplyValidator {
    pub(crate) fn new(
        recipient: [u8; RECIPIENT_ID_LENGTH],
        surb_id_base: u64,
        tracker: Arc<SurbTracker>,
        metrics: Arc<DecoyMetrics>,
    ) -> Self {
        Self {
            recipient: Zeroizing::new(recipient),
            surb_id_base,
            tracker,
            metrics,
        }
    }

    /// # Panics
    /// If `pkt` is not a SURB reply.
    pub(crate) fn on_packet(&self, pkt: &InboundPacket) -> ReplyOutcome {
        let surb_id = match &pkt.surb_reply {
            Some(id) => id,
            None => panic!("BUG: on_packet called with non-SURB Reply"),
        };

        let outcome = self.validate(pkt, surb_id);
        match outcome {
            ReplyOutcome::Accepted { .. } => {}
            ReplyOutcome::InvalidRecipient => {
                log::debug!("Dropping packet: {} (Invalid recipient)", pkt.id);
            }
            ReplyOutcome::InvalidSurbBase(base) => {
                log::debug!("Dropping packet: {} (Invalid SURB ID base: {})", pkt.id, base);
            }
            ReplyOutcome::UnknownSurb(id) => {
                log::debug!("Dropping packet: {} (Unknown SURB ID: 0x{:016x})", pkt.id, id);
            }
            ReplyOutcome::DecryptFailed(id) => {
                log::debug!(
                    "Dropping packet: {} (SURB ID: 0x{:016x}): payload authentication failed",
                    pkt.id,
                    id
                );
            }
        }
        if !matches!(outcome, ReplyOutcome::Accepted { .. }) {
            self.metrics.dropped_packets.inc();
        }
        outcome
    }

    fn validate(&self, pkt: &InboundPacket, surb_id: &[u8; 16]) -> ReplyOutcome {
        if !eq_32(&pkt.recipient, &self.recipient) {
            return ReplyOutcome::InvalidRecipient;
        }

        let (base, id) = split_surb_id(surb_id);
        if base != self.surb_id_base {
            return ReplyOutcome::InvalidSurbBase(base);
        }

        log::debug!("Response packet: {}", pkt.id);
        let ctx = match self.tracker.take(id) {
            Some(ctx) => ctx,
            None => return ReplyOutcome::UnknownSurb(id),
        };

        if decrypt_surb_payload(&pkt.payload, ctx.sprp_key()).is_err() {
            return ReplyOutcome::DecryptFailed(id);
        }

        let (sign, delta) = signed_delta(pkt.recv_at.into_std(), ctx.eta().into_std());
        log::debug!(
            "Response packet: {} (SURB ID: 0x{:016x}): DeltaT: {}{:?}",
            pkt.id,
            id,
            sign,
            delta
        );
        ReplyOutcome::Accepted { id }
    }
}

/// `actual - expected` as a sign and magnitude.
fn signed_delta(actual: std::time::Instant, expected: std::time::Instant) -> (&'static str, Duration) {
    if actual >= expected {
        ("+", actual - expected)
    } else {
        ("-", expected - actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surb::{make_surb_id, SurbCtx};
    use mixnode_protocol::crypto::seal;
    use mixnode_protocol::SprpKey;
    use tokio::time::Instant;

    const RECIPIENT: [u8; 32] = [0x42; 32];
    const BASE: u64 = 1_700_000_000;
    const KEY: [u8; 32] = [9u8; 32];

    fn validator() -> (ReplyValidator, Arc<SurbTracker>, Arc<DecoyMetrics>) {
        let tracker = Arc::new(SurbTracker::new());
        let metrics = Arc::new(DecoyMetrics::new().unwrap());
        let validator =
            ReplyValidator::new(RECIPIENT, BASE, Arc::clone(&tracker), Arc::clone(&metrics));
        (validator, tracker, metrics)
    }

    fn reply(recipient: [u8; 32], base: u64, id: u64, payload: Vec<u8>) -> InboundPacket {
        InboundPacket::surb_reply(recipient, make_surb_id(base, id), payload, Instant::now())
    }

    fn stored(tracker: &SurbTracker, id: u64) {
        tracker.store(SurbCtx::new(id, Instant::now(), SprpKey::from_bytes(KEY)));
    }

    #[test]
    fn test_valid_reply_retires_surb() {
        let (validator, tracker, metrics) = validator();
        stored(&tracker, 7);

        let pkt = reply(RECIPIENT, BASE, 7, seal(b"pong", &KEY).unwrap());
        assert_eq!(validator.on_packet(&pkt), ReplyOutcome::Accepted { id: 7 });
        assert!(tracker.is_empty());
        assert_eq!(metrics.dropped_packets.get(), 0);

        // A replayed reply finds nothing.
        assert_eq!(validator.on_packet(&pkt), ReplyOutcome::UnknownSurb(7));
        assert_eq!(metrics.dropped_packets.get(), 1);
    }

    #[test]
    fn test_wrong_recipient_dropped() {
        let (validator, tracker, metrics) = validator();
        stored(&tracker, 7);

        let mut other = RECIPIENT;
        other[31] ^= 1;
        let pkt = reply(other, BASE, 7, seal(b"pong", &KEY).unwrap());
        assert_eq!(validator.on_packet(&pkt), ReplyOutcome::InvalidRecipient);
        assert!(tracker.contains(7));
        assert_eq!(metrics.dropped_packets.get(), 1);
    }

    #[test]
    fn test_foreign_base_skips_lookup() {
        let (validator, tracker, metrics) = validator();
        stored(&tracker, 7);

        let pkt = reply(RECIPIENT, BASE - 1, 7, seal(b"pong", &KEY).unwrap());
        assert_eq!(validator.on_packet(&pkt), ReplyOutcome::InvalidSurbBase(BASE - 1));
        assert!(tracker.contains(7), "store must be untouched");
        tracker.assert_consistent();
        assert_eq!(metrics.dropped_packets.get(), 1);
    }

    #[test]
    fn test_unknown_surb_counts_once() {
        let (validator, tracker, metrics) = validator();
        let pkt = reply(RECIPIENT, BASE, 1234, seal(b"pong", &KEY).unwrap());
        assert_eq!(validator.on_packet(&pkt), ReplyOutcome::UnknownSurb(1234));
        assert_eq!(metrics.dropped_packets.get(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_bad_payload_still_retires_surb() {
        let (validator, tracker, metrics) = validator();
        stored(&tracker, 7);

        let pkt = reply(RECIPIENT, BASE, 7, seal(b"pong", &[1u8; 32]).unwrap());
        assert_eq!(validator.on_packet(&pkt), ReplyOutcome::DecryptFailed(7));
        assert!(!tracker.contains(7));
        assert_eq!(metrics.dropped_packets.get(), 1);
    }

    #[test]
    #[should_panic(expected = "BUG: on_packet called with non-SURB Reply")]
    fn test_non_reply_panics() {
        let (validator, _, _) = validator();
        let mut pkt = reply(RECIPIENT, BASE, 1, Vec::new());
        pkt.surb_reply = None;
        validator.on_packet(&pkt);
    }

    #[test]
    fn test_signed_delta() {
        let t = std::time::Instant::now();
        let later = t + Duration::from_millis(5);
        assert_eq!(signed_delta(later, t), ("+", Duration::from_millis(5)));
        assert_eq!(signed_delta(t, later), ("-", Duration::from_millis(5)));
    }
}
