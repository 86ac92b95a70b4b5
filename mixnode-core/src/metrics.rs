//! Prometheus counters for the decoy subsystem.
//!
//! Each [`Decoy`](crate::Decoy) owns its own set of counters so several
//! instances (and tests) never share state. Hosts export them by registering
//! into their registry:
//!
//! ```ignore
//! let metrics = Arc::new(DecoyMetrics::new()?);
//! metrics.register(&registry)?;
//! ```
//!
//! ```promql
//! # Reply loss rate
//! rate(mixnode_decoy_surbs_swept_total[10m]) /
//!   rate(mixnode_decoy_packets_sent_total{kind="loop"}[10m])
//! ```

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

const NAMESPACE: &str = "mixnode";
const SUBSYSTEM: &str = "decoy";

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE).subsystem(SUBSYSTEM)
}

#[derive(Debug, Clone)]
pub struct DecoyMetrics {
    /// Inbound replies dropped by validation.
    pub dropped_packets: IntCounter,
    /// Topology documents rejected by the scheduler.
    pub documents_ignored: IntCounter,
    /// Accepted topology documents, labelled by epoch.
    pub pki_docs_per_epoch: IntCounterVec,
    /// SURBs whose reply never arrived.
    pub surbs_swept: IntCounter,
    /// Decoy packets handed to the connector, labelled by kind.
    pub packets_sent: IntCounterVec,
}

impl DecoyMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            dropped_packets: IntCounter::with_opts(opts(
                "dropped_packets_total",
                "Number of dropped packets",
            ))?,
            documents_ignored: IntCounter::with_opts(opts(
                "documents_ignored_total",
                "Number of ignored PKI Documents",
            ))?,
            pki_docs_per_epoch: IntCounterVec::new(
                opts("pki_docs_per_epoch_total", "Number of pki docs in an epoch"),
                &["epoch"],
            )?,
            surbs_swept: IntCounter::with_opts(opts(
                "surbs_swept_total",
                "Number of decoy SURBs swept without a reply",
            ))?,
            packets_sent: IntCounterVec::new(
                opts("packets_sent_total", "Number of decoy packets dispatched"),
                &["kind"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.dropped_packets.clone()))?;
        registry.register(Box::new(self.documents_ignored.clone()))?;
        registry.register(Box::new(self.pki_docs_per_epoch.clone()))?;
        registry.register(Box::new(self.surbs_swept.clone()))?;
        registry.register(Box::new(self.packets_sent.clone()))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn docs_for_epoch(&self, epoch: u64) -> u64 {
        self.pki_docs_per_epoch
            .with_label_values(&[&epoch.to_string()])
            .get()
    }

    #[cfg(test)]
    pub(crate) fn sent(&self, kind: &str) -> u64 {
        self.packets_sent.with_label_values(&[kind]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_gather() {
        let registry = Registry::new();
        let metrics = DecoyMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        metrics.dropped_packets.inc();
        metrics.pki_docs_per_epoch.with_label_values(&["5"]).inc();
        assert_eq!(metrics.docs_for_epoch(5), 1);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"mixnode_decoy_dropped_packets_total".to_string()));
        assert!(names.contains(&"mixnode_decoy_pki_docs_per_epoch_total".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let metrics = DecoyMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }
}
