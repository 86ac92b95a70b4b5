//! Decoy packet construction.
//!
//! A loop packet travels self -> mixes -> provider and carries a SURB whose
//! reverse path leads provider -> mixes -> self. A discard packet takes the
//! same forward route with an all-zero payload and is dropped by the
//! provider.
//!
//! Forward payload layout:
//! ```text
//! [flag: 1][reserved: 1][SURB: SURB_LENGTH][zeros: USER_FORWARD_PAYLOAD_LENGTH]
//! ```
//! `flag` is 1 when a SURB is present. Discard payloads are all zero.

use crate::config::DecoyPolicy;
use crate::error::{DecoyError, Result};
use crate::glue::Connector;
use crate::metrics::DecoyMetrics;
use crate::packet::OutboundPacket;
use crate::surb::{make_surb_id, SurbCtx, SurbTracker};
use mixnode_protocol::constants::{
    FORWARD_PAYLOAD_HEADER_LENGTH, FORWARD_PAYLOAD_LENGTH, RECIPIENT_ID_LENGTH, SURB_ID_LENGTH,
};
use mixnode_protocol::pki::{LOOP_CAPABILITY, TEST_PERIOD};
use mixnode_protocol::sphinx::{self, PathHop, SphinxError};
use mixnode_protocol::{Document, Entry, MixDescriptor};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use zeroize::Zeroizing;

/// Path selections tried per cycle before giving up.
pub const MAX_ATTEMPTS: usize = 3;

/// Forward plus reverse transit must stay under this.
const MAX_TRANSIT: Duration = Duration::from_secs(2 * TEST_PERIOD.as_secs());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Loop,
    Discard,
}

impl PacketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketKind::Loop => "loop",
            PacketKind::Discard => "discard",
        }
    }
}

/// Pick a provider running the loop service, uniformly over a random
/// permutation of all providers.
///
/// # Returns
/// The provider and its loop endpoint.
pub fn select_provider<'a, R: Rng + ?Sized>(
    rng: &mut R,
    doc: &'a Document,
) -> Result<(&'a MixDescriptor, &'a str)> {
    let mut order: Vec<usize> = (0..doc.providers.len()).collect();
    order.shuffle(rng);

    order
        .into_iter()
        .find_map(|idx| {
            let desc = &doc.providers[idx];
            desc.service_endpoint(LOOP_CAPABILITY)
                .map(|endpoint| (desc, endpoint))
        })
        .ok_or(DecoyError::NoSuitableProvider)
}

fn loop_payload(surb: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(FORWARD_PAYLOAD_LENGTH);
    payload.push(1);
    payload.resize(FORWARD_PAYLOAD_HEADER_LENGTH, 0);
    payload.extend_from_slice(surb);
    payload.resize(FORWARD_PAYLOAD_LENGTH, 0);
    payload
}

fn log_path(doc: &Document, path: &[PathHop]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match sphinx::path_to_strings(doc, path) {
        Ok(lines) => {
            for line in lines {
                log::debug!("{}", line);
            }
        }
        Err(e) => log::debug!("Failed to render path: {}", e),
    }
}

pub(crate) struct PacketBuilder {
    recipient: Zeroizing<[u8; RECIPIENT_ID_LENGTH]>,
    surb_id_base: u64,
    policy: DecoyPolicy,
    rng: ChaCha20Rng,
    tracker: Arc<SurbTracker>,
    connector: Arc<dyn Connector>,
    metrics: Arc<DecoyMetrics>,
}

impl PacketBuilder {
    pub(crate) fn new(
        recipient: [u8; RECIPIENT_ID_LENGTH],
        surb_id_base: u64,
        policy: DecoyPolicy,
        tracker: Arc<SurbTracker>,
        connector: Arc<dyn Connector>,
        metrics: Arc<DecoyMetrics>,
    ) -> Self {
        Self {
            recipient: Zeroizing::new(recipient),
            surb_id_base,
            policy,
            rng: ChaCha20Rng::from_entropy(),
            tracker,
            connector,
            metrics,
        }
    }

    /// Build and dispatch one decoy packet. Any failure abandons this cycle.
    pub(crate) fn send_decoy_packet(&mut self, ent: &Entry) {
        match self.try_send_decoy_packet(ent) {
            Ok(kind) => self
                .metrics
                .packets_sent
                .with_label_values(&[kind.as_str()])
                .inc(),
            Err(e) => log::debug!("Failed to generate decoy packet: {}", e),
        }
    }

    pub(crate) fn try_send_decoy_packet(&mut self, ent: &Entry) -> Result<PacketKind> {
        let self_desc = ent.self_descriptor();
        if self_desc.layer.is_provider() {
            return Err(DecoyError::ProviderUnsupported);
        }
        let doc = ent.document();

        let (provider, endpoint) = select_provider(&mut self.rng, doc)?;
        let kind = self.choose_kind();
        match kind {
            PacketKind::Loop => {
                self.send_loop_packet(doc, endpoint.as_bytes(), self_desc, provider)?
            }
            PacketKind::Discard => {
                self.send_discard_packet(doc, endpoint.as_bytes(), self_desc, provider)?
            }
        }
        Ok(kind)
    }

    fn choose_kind(&mut self) -> PacketKind {
        match self.policy {
            DecoyPolicy::Loop => PacketKind::Loop,
            DecoyPolicy::Discard => PacketKind::Discard,
            DecoyPolicy::Mixed { loop_probability } => {
                if self.rng.gen_bool(loop_probability) {
                    PacketKind::Loop
                } else {
                    PacketKind::Discard
                }
            }
        }
    }

    /// Fresh SURB id under this process's base. The suffix is redrawn if it
    /// collides with an outstanding SURB.
    fn make_surb_id(&mut self) -> ([u8; SURB_ID_LENGTH], u64) {
        loop {
            let suffix: u64 = self.rng.gen();
            if !self.tracker.contains(suffix) {
                return (make_surb_id(self.surb_id_base, suffix), suffix);
            }
        }
    }

    fn send_loop_packet(
        &mut self,
        doc: &Document,
        recipient: &[u8],
        src: &MixDescriptor,
        dst: &MixDescriptor,
    ) -> Result<()> {
        let (surb_id, id) = self.make_surb_id();

        for _ in 0..MAX_ATTEMPTS {
            let now = SystemTime::now();
            let (fwd_path, then) = sphinx::new_path(
                &mut self.rng,
                doc,
                recipient,
                src,
                dst,
                Some(&surb_id),
                now,
                false,
                true,
            )?;
            let (rev_path, then) = sphinx::new_path(
                &mut self.rng,
                doc,
                &self.recipient[..],
                dst,
                src,
                Some(&surb_id),
                then,
                false,
                false,
            )?;

            let transit = then.duration_since(now).unwrap_or_default();
            if transit >= MAX_TRANSIT {
                log::debug!("Loop path transit {:?} over budget, reselecting", transit);
                continue;
            }

            let (surb, key) = sphinx::new_surb(&mut OsRng, &rev_path)?;
            let payload = loop_payload(&surb);

            let ctx = SurbCtx::new(id, Instant::now() + transit, key);
            let raw = self.with_stored_surb(ctx, || {
                sphinx::new_packet(&mut OsRng, &fwd_path, &payload).map_err(DecoyError::from)
            })?;

            log_path(doc, &fwd_path);
            log_path(doc, &rev_path);
            log::debug!("Dispatching loop packet: SURB ID: 0x{:016x}", id);
            return self.dispatch(&fwd_path, raw);
        }

        Err(DecoyError::MaxAttempts)
    }

    /// Store `ctx` and run `build`. The SURB is visible to the reply path
    /// before the packet can leave, and is retired again if `build` fails.
    fn with_stored_surb<T>(&self, ctx: SurbCtx, build: impl FnOnce() -> Result<T>) -> Result<T> {
        let id = ctx.id;
        self.tracker.store(ctx);
        build().map_err(|e| {
            self.tracker.take(id);
            e
        })
    }

    fn send_discard_packet(
        &mut self,
        doc: &Document,
        recipient: &[u8],
        src: &MixDescriptor,
        dst: &MixDescriptor,
    ) -> Result<()> {
        let payload = [0u8; FORWARD_PAYLOAD_LENGTH];

        for _ in 0..MAX_ATTEMPTS {
            let now = SystemTime::now();
            let (fwd_path, then) =
                sphinx::new_path(&mut self.rng, doc, recipient, src, dst, None, now, false, true)?;

            if then.duration_since(now).unwrap_or_default() >= MAX_TRANSIT {
                continue;
            }

            let raw = sphinx::new_packet(&mut OsRng, &fwd_path, &payload)?;
            log_path(doc, &fwd_path);
            return self.dispatch(&fwd_path, raw);
        }

        Err(DecoyError::MaxAttempts)
    }

    fn dispatch(&self, path: &[PathHop], raw: Vec<u8>) -> Result<()> {
        let first = path.first().ok_or(SphinxError::EmptyPath)?;
        let pkt = OutboundPacket::new(raw, first.id);

        log::debug!(
            "Dispatching packet: {} to {}",
            pkt.id,
            hex::encode(&pkt.next_hop[..8])
        );
        self.connector.dispatch_packet(pkt);
        Ok(())
    }
}
