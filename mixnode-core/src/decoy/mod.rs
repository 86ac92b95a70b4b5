//! Decoy loop traffic source and sink.
//!
//! [`Decoy`] owns a background worker that emits decoy packets at the rate
//! set by the current topology document, and validates SURB replies handed
//! back by the packet processing path. Neither entry point reports errors:
//! every failure is absorbed into counters and debug logs.

mod builder;
mod reply;
mod scheduler;

#[cfg(test)]
pub(crate) mod testutil;

pub use builder::{select_provider, PacketKind, MAX_ATTEMPTS};
pub use scheduler::wake_interval;

use crate::config::DecoyConfig;
use crate::error::Result;
use crate::glue::Connector;
use crate::metrics::DecoyMetrics;
use crate::packet::InboundPacket;
use crate::surb::{surb_id_base_now, SurbTracker};
use builder::PacketBuilder;
use mixnode_protocol::constants::RECIPIENT_ID_LENGTH;
use mixnode_protocol::{Entry, PkiClock};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use reply::ReplyValidator;
use scheduler::Scheduler;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroize;

/// Handle to a running decoy instance. Dropping it stops the worker.
pub struct Decoy {
    doc_tx: mpsc::UnboundedSender<Arc<Entry>>,
    reply: ReplyValidator,
    tracker: Arc<SurbTracker>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Decoy {
    /// Start a decoy instance on the current tokio runtime.
    ///
    /// A fresh random recipient id and a SURB id base taken from the wall
    /// clock are bound to this instance; replies carrying anything else are
    /// dropped.
    pub fn new(
        config: DecoyConfig,
        clock: Arc<dyn PkiClock>,
        connector: Arc<dyn Connector>,
        metrics: Arc<DecoyMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        let mut recipient = [0u8; RECIPIENT_ID_LENGTH];
        getrandom::getrandom(&mut recipient)?;
        let surb_id_base = surb_id_base_now();
        Ok(Self::with_identity(
            config,
            clock,
            connector,
            metrics,
            &mut recipient,
            surb_id_base,
        ))
    }

    fn with_identity(
        config: DecoyConfig,
        clock: Arc<dyn PkiClock>,
        connector: Arc<dyn Connector>,
        metrics: Arc<DecoyMetrics>,
        recipient: &mut [u8; RECIPIENT_ID_LENGTH],
        surb_id_base: u64,
    ) -> Self {
        let tracker = Arc::new(SurbTracker::new());
        let (doc_tx, doc_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let builder = PacketBuilder::new(
            *recipient,
            surb_id_base,
            config.policy,
            Arc::clone(&tracker),
            connector,
            Arc::clone(&metrics),
        );
        let reply = ReplyValidator::new(
            *recipient,
            surb_id_base,
            Arc::clone(&tracker),
            Arc::clone(&metrics),
        );
        recipient.zeroize();

        let scheduler = Scheduler {
            config,
            clock,
            builder,
            tracker: Arc::clone(&tracker),
            metrics,
            doc_rx,
            cancel: cancel.clone(),
            rng: ChaCha20Rng::from_entropy(),
            doc_cache: None,
        };
        let worker = tokio::spawn(scheduler.run());

        Self {
            doc_tx,
            reply,
            tracker,
            cancel,
            worker: Some(worker),
        }
    }

    /// Hand a new topology document to the worker.
    pub fn on_new_document(&self, ent: Arc<Entry>) {
        if self.doc_tx.send(ent).is_err() {
            log::debug!("Decoy worker gone, dropping PKI document.");
        }
    }

    /// Validate and consume a SURB reply addressed to this instance.
    ///
    /// Safe to call from any thread concurrently with the worker.
    ///
    /// # Panics
    /// If `pkt` is not a SURB reply.
    pub fn on_packet(&self, pkt: InboundPacket) {
        self.reply.on_packet(&pkt);
    }

    /// Number of loop SURBs still awaiting a reply.
    pub fn outstanding_surbs(&self) -> usize {
        self.tracker.len()
    }

    /// Signal the worker to stop without waiting for it.
    pub fn halt(&self) {
        self.cancel.cancel();
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                log::warn!("Decoy worker terminated abnormally: {}", e);
            }
        }
    }
}

impl Drop for Decoy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
