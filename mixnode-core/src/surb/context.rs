use super::eta_index::EtaHandle;
use mixnode_protocol::SprpKey;
use tokio::time::Instant;

/// One outstanding decoy SURB.
#[derive(Debug)]
pub struct SurbCtx {
    pub(crate) id: u64,
    pub(crate) eta: Instant,
    pub(crate) sprp_key: SprpKey,
    /// Node of the ETA index currently holding this context; `None` when the
    /// context is not indexed (before `store`, after `take`).
    pub(crate) eta_node: Option<EtaHandle>,
}

impl SurbCtx {
    pub fn new(id: u64, eta: Instant, sprp_key: SprpKey) -> Self {
        Self {
            id,
            eta,
            sprp_key,
            eta_node: None,
        }
    }

    /// Store key: the random suffix of the SURB id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Expected arrival time of the reply.
    pub fn eta(&self) -> Instant {
        self.eta
    }

    pub fn sprp_key(&self) -> &SprpKey {
        &self.sprp_key
    }

    pub fn is_indexed(&self) -> bool {
        self.eta_node.is_some()
    }
}
