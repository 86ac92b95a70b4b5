//! The decoy worker loop.
//!
//! One task selects over shutdown, new topology documents and a wake timer.
//! While a document for the current epoch is cached the timer is armed with
//! an `Exp(lambda_m)` interval and each expiry sends one decoy packet. Without
//! one the timer is disarmed and the task sleeps until the next document.

use super::builder::PacketBuilder;
use crate::config::DecoyConfig;
use crate::metrics::DecoyMetrics;
use crate::surb::SurbTracker;
use mixnode_protocol::{Document, Entry, PkiClock};
use rand::Rng;
use rand_distr::{Distribution, Exp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Time until the next decoy send: `Exp(lambda_m)` milliseconds clamped to
/// `lambda_m_max_delay`. A non-positive or non-finite rate yields the maximum.
pub fn wake_interval<R: Rng + ?Sized>(rng: &mut R, doc: &Document) -> Duration {
    let max = doc.lambda_m_max_delay;
    let msec = match Exp::new(doc.lambda_m) {
        Ok(dist) if doc.lambda_m.is_finite() && doc.lambda_m > 0.0 => {
            (dist.sample(rng) as u64).min(max)
        }
        _ => max,
    };
    Duration::from_millis(msec)
}

/// Absolute wake time, or `None` when `interval` overflows the clock.
fn deadline(interval: Duration) -> Option<Instant> {
    let at = Instant::now().checked_add(interval);
    if at.is_none() {
        log::debug!("Wake interval {:?} out of range, suspending.", interval);
    }
    at
}

pub(crate) struct Scheduler {
    pub(crate) config: DecoyConfig,
    pub(crate) clock: Arc<dyn PkiClock>,
    pub(crate) builder: PacketBuilder,
    pub(crate) tracker: Arc<SurbTracker>,
    pub(crate) metrics: Arc<DecoyMetrics>,
    pub(crate) doc_rx: mpsc::UnboundedReceiver<Arc<Entry>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) rng: rand_chacha::ChaCha20Rng,
    pub(crate) doc_cache: Option<Arc<Entry>>,
}

impl Scheduler {
    pub(crate) async fn run(mut self) {
        let timer = time::sleep(Duration::ZERO);
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            let mut timer_fired = false;
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    log::debug!("Terminating gracefully.");
                    return;
                }
                ent = self.doc_rx.recv() => match ent {
                    Some(ent) => {
                        if !self.accept_document(ent) {
                            continue;
                        }
                    }
                    None => {
                        log::debug!("Document channel closed, terminating.");
                        return;
                    }
                },
                _ = &mut timer, if armed => {
                    timer_fired = true;
                }
            }

            match self.on_wake(timer_fired).and_then(deadline) {
                Some(at) => {
                    timer.as_mut().reset(at);
                    armed = true;
                }
                None => armed = false,
            }
        }
    }

    /// Cache `ent` if it is usable. Rejected documents are counted and leave
    /// the schedule untouched.
    fn accept_document(&mut self, ent: Arc<Entry>) -> bool {
        if !self.config.send_decoy_traffic {
            log::debug!("Received PKI document but decoy traffic is disabled, ignoring.");
            self.metrics.documents_ignored.inc();
            return false;
        }

        let now = match self.clock.now() {
            Ok(now) => now.epoch,
            Err(e) => {
                log::debug!("Error fetching PKI epoch, ignoring {}: {}", ent.epoch(), e);
                self.metrics.documents_ignored.inc();
                return false;
            }
        };
        if ent.epoch() != now {
            log::debug!(
                "Received PKI document for non-current epoch, ignoring: {}",
                ent.epoch()
            );
            self.metrics.documents_ignored.inc();
            return false;
        }
        if self.config.is_provider {
            log::debug!("Received PKI document when Provider, ignoring (not supported).");
            self.metrics.documents_ignored.inc();
            return false;
        }

        log::debug!("Received new PKI document for epoch: {}", now);
        self.metrics
            .pki_docs_per_epoch
            .with_label_values(&[&now.to_string()])
            .inc();
        self.doc_cache = Some(ent);
        true
    }

    /// Runs after an accepted document or a timer expiry. Returns the next
    /// wake interval, or `None` to suspend until a fresh document arrives.
    fn on_wake(&mut self, timer_fired: bool) -> Option<Duration> {
        let epoch = match self.clock.now() {
            Ok(now) => now.epoch,
            Err(e) => {
                log::debug!("Error fetching PKI epoch: {}", e);
                log::debug!("Suspending operation till the next PKI document.");
                return None;
            }
        };
        let ent = match &self.doc_cache {
            Some(ent) if ent.epoch() == epoch => Arc::clone(ent),
            _ => {
                log::debug!("Suspending operation till the next PKI document.");
                return None;
            }
        };

        if timer_fired {
            self.builder.send_decoy_packet(&ent);
        }

        let interval = wake_interval(&mut self.rng, ent.document());
        log::debug!("Next wake interval: {:?}", interval);

        let stats = self
            .tracker
            .sweep(Instant::now(), self.config.decoy_slack());
        if stats.swept > 0 {
            self.metrics.surbs_swept.inc_by(stats.swept as u64);
        }
        Some(interval)
    }
}
