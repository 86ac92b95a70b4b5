//! Topology documents published by the PKI once per epoch.
//!
//! A [`Document`] lists the mix layers and the providers for one epoch, along
//! with the Poisson parameters nodes use to schedule traffic. The document
//! cache hands each component an [`Entry`]: the document plus the identity of
//! the local node within it.

pub mod epochtime;

use crate::constants::NODE_ID_LENGTH;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub use epochtime::{EpochClock, EpochTime, PkiClock, PERIOD, TEST_PERIOD};

/// Node identifier: blake3 of the node's X25519 mix key.
pub type NodeId = [u8; NODE_ID_LENGTH];

/// Name of the provider service that echoes loop traffic back through a SURB.
pub const LOOP_CAPABILITY: &str = "loop";

/// Parameter key holding a service's recipient endpoint.
pub const ENDPOINT_PARAM: &str = "endpoint";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PkiError {
    #[error("Clock is before the epoch base")]
    ClockBeforeEpochBase,
    #[error("Epoch period must be at least one millisecond")]
    InvalidPeriod,
    #[error("Local node {0} not present in document")]
    SelfNotInDocument(String),
    #[error("Document rejected: {0}")]
    InvalidDocument(String),
}

pub type Result<T> = std::result::Result<T, PkiError>;

/// Position of a node in the stratified topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Mix in the given topology layer (0-based).
    Mix(u8),
    /// Edge node hosting user mailboxes and services.
    Provider,
}

impl Layer {
    pub fn is_provider(&self) -> bool {
        matches!(self, Layer::Provider)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Mix(l) => write!(f, "mix/{}", l),
            Layer::Provider => write!(f, "provider"),
        }
    }
}

/// Public description of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixDescriptor {
    pub name: String,
    pub id: NodeId,
    /// X25519 public key used to unwrap packet layers.
    pub mix_key: [u8; 32],
    pub layer: Layer,
    /// Provider services keyed by capability, each with free-form parameters.
    #[serde(default)]
    pub kaetzchen: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl MixDescriptor {
    /// Create a descriptor; the id is derived from the mix key.
    pub fn new(name: impl Into<String>, mix_key: [u8; 32], layer: Layer) -> Self {
        Self {
            name: name.into(),
            id: node_id(&mix_key),
            mix_key,
            layer,
            kaetzchen: HashMap::new(),
        }
    }

    /// Advertise a service capability with the given parameters.
    pub fn with_service(
        mut self,
        capability: impl Into<String>,
        params: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.kaetzchen.insert(capability.into(), params);
        self
    }

    /// Endpoint string advertised for `capability`, if the service exists and
    /// its endpoint parameter is a string.
    pub fn service_endpoint(&self, capability: &str) -> Option<&str> {
        self.kaetzchen
            .get(capability)?
            .get(ENDPOINT_PARAM)?
            .as_str()
    }
}

/// Derive a node id from its mix key.
pub fn node_id(mix_key: &[u8; 32]) -> NodeId {
    *blake3::hash(mix_key).as_bytes()
}

/// Topology and traffic parameters for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub epoch: u64,
    /// Inverse of the mean per-hop delay (1/ms).
    pub mu: f64,
    /// Maximum per-hop delay (ms).
    pub mu_max_delay: u64,
    /// Inverse of the mean decoy loop inter-send time (1/ms).
    pub lambda_m: f64,
    /// Maximum decoy loop inter-send time (ms).
    pub lambda_m_max_delay: u64,
    /// Mix layers, entry first.
    pub topology: Vec<Vec<MixDescriptor>>,
    pub providers: Vec<MixDescriptor>,
}

impl Document {
    /// Look up any node (mix or provider) by id.
    pub fn get_node(&self, id: &NodeId) -> Option<&MixDescriptor> {
        self.topology
            .iter()
            .flatten()
            .chain(self.providers.iter())
            .find(|desc| &desc.id == id)
    }

    /// Parse a document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PkiError::InvalidDocument(e.to_string()))
    }
}

/// A cached document together with the local node's descriptor.
#[derive(Debug, Clone)]
pub struct Entry {
    document: Document,
    self_desc: MixDescriptor,
}

impl Entry {
    /// Build an entry, failing when the local node is not listed.
    pub fn new(document: Document, self_id: &NodeId) -> Result<Self> {
        let self_desc = document
            .get_node(self_id)
            .cloned()
            .ok_or_else(|| PkiError::SelfNotInDocument(hex::encode(&self_id[..8])))?;
        Ok(Self {
            document,
            self_desc,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.document.epoch
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Descriptor of the local node.
    pub fn self_descriptor(&self) -> &MixDescriptor {
        &self.self_desc
    }
}
