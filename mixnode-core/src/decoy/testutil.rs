//! Fixtures shared by the decoy tests: a small three-layer network whose
//! node secrets are known, a settable epoch clock and a recording connector.

use crate::glue::Connector;
use crate::packet::OutboundPacket;
use mixnode_protocol::pki::{EpochTime, Result as PkiResult, ENDPOINT_PARAM, LOOP_CAPABILITY};
use mixnode_protocol::sphinx::{unwrap_packet, Unwrapped};
use mixnode_protocol::{Document, Entry, Layer, MixDescriptor, NodeId, PkiClock, PkiError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use x25519_dalek::{PublicKey, StaticSecret};

pub(crate) const LOOP_ENDPOINT: &str = "+loop";

pub(crate) struct Network {
    pub secrets: HashMap<NodeId, StaticSecret>,
    pub self_id: NodeId,
    pub doc: Document,
}

fn node(seed: u8, name: String, layer: Layer) -> (StaticSecret, MixDescriptor) {
    let secret = StaticSecret::from([seed; 32]);
    let desc = MixDescriptor::new(name, *PublicKey::from(&secret).as_bytes(), layer);
    (secret, desc)
}

/// Three mix layers of two nodes each plus three providers, of which the
/// first `loop_providers` run the loop service. The local node is the first
/// mix of layer 0.
pub(crate) fn network(epoch: u64, loop_providers: usize) -> Network {
    let mut secrets = HashMap::new();
    let mut seed = 1u8;

    let mut topology = Vec::new();
    for l in 0..3u8 {
        let mut layer = Vec::new();
        for i in 0..2 {
            let (secret, desc) = node(seed, format!("mix-{}-{}", l, i), Layer::Mix(l));
            seed += 1;
            secrets.insert(desc.id, secret);
            layer.push(desc);
        }
        topology.push(layer);
    }

    let mut providers = Vec::new();
    for i in 0..3 {
        let (secret, mut desc) = node(seed, format!("provider-{}", i), Layer::Provider);
        seed += 1;
        if i < loop_providers {
            desc = desc.with_service(
                LOOP_CAPABILITY,
                HashMap::from([(ENDPOINT_PARAM.to_string(), LOOP_ENDPOINT.into())]),
            );
        }
        secrets.insert(desc.id, secret);
        providers.push(desc);
    }

    let self_id = topology[0][0].id;
    Network {
        secrets,
        self_id,
        doc: Document {
            epoch,
            mu: 0.1,
            mu_max_delay: 50,
            lambda_m: 1e-9,
            lambda_m_max_delay: 1_000,
            topology,
            providers,
        },
    }
}

impl Network {
    pub fn entry(&self) -> Arc<Entry> {
        Arc::new(Entry::new(self.doc.clone(), &self.self_id).unwrap())
    }

    /// Walk `raw` through the network starting at `first_hop` until it
    /// reaches its final hop.
    pub fn route(&self, first_hop: NodeId, raw: &[u8]) -> (NodeId, Unwrapped) {
        let mut hop = first_hop;
        let mut packet = raw.to_vec();
        loop {
            match unwrap_packet(&self.secrets[&hop], &packet).unwrap() {
                Unwrapped::Forward {
                    next_hop,
                    packet: next,
                    ..
                } => {
                    hop = next_hop;
                    packet = next;
                }
                last => return (hop, last),
            }
        }
    }
}

/// Epoch source whose epoch and failure mode are set by the test.
#[derive(Default)]
pub(crate) struct MockClock {
    epoch: AtomicU64,
    fail: AtomicBool,
}

impl MockClock {
    pub fn at(epoch: u64) -> Arc<Self> {
        let clock = Self::default();
        clock.set_epoch(epoch);
        Arc::new(clock)
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::SeqCst);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl PkiClock for MockClock {
    fn now(&self) -> PkiResult<EpochTime> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PkiError::ClockBeforeEpochBase);
        }
        Ok(EpochTime {
            epoch: self.epoch.load(Ordering::SeqCst),
            elapsed: Duration::ZERO,
            till: Duration::from_secs(60),
        })
    }
}

/// Connector that keeps every packet it is handed.
#[derive(Default)]
pub(crate) struct RecordingConnector {
    packets: Mutex<Vec<OutboundPacket>>,
    on_dispatch: Option<Box<dyn Fn(&OutboundPacket) + Send + Sync>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `check` on every packet at the moment it is dispatched.
    pub fn with_hook(check: impl Fn(&OutboundPacket) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            packets: Mutex::default(),
            on_dispatch: Some(Box::new(check)),
        })
    }

    pub fn take(&self) -> Vec<OutboundPacket> {
        std::mem::take(&mut *self.packets.lock().unwrap())
    }

    pub fn count(&self) -> usize {
        self.packets.lock().unwrap().len()
    }
}

impl Connector for RecordingConnector {
    fn dispatch_packet(&self, pkt: OutboundPacket) {
        if let Some(check) = &self.on_dispatch {
            check(&pkt);
        }
        self.packets.lock().unwrap().push(pkt);
    }
}
