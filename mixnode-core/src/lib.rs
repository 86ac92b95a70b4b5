//! # Mixnode Core
//!
//! Decoy loop traffic for a mix node. A [`Decoy`] instance periodically sends
//! packets that loop through the network and come back through a SURB, then
//! reconciles the returning replies against the SURBs it still expects.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`decoy`] | Worker loop, packet construction, reply validation |
//! | [`surb`] | Outstanding SURB store and ETA index |
//! | [`config`] | `DecoyConfig` and its JSON loader |
//! | [`metrics`] | Prometheus counters |
//! | [`packet`] / [`glue`] | Packets and the connector seam |

// Crate-level lint configuration: stylistic lints only.
#![allow(
    clippy::too_many_arguments,
    clippy::type_complexity,
    clippy::doc_lazy_continuation,
    clippy::len_without_is_empty
)]

pub mod config;
pub mod decoy;
pub mod error;
pub mod glue;
pub mod metrics;
pub mod packet;
pub mod surb;

pub use config::{ConfigError, DecoyConfig, DecoyPolicy};
pub use decoy::{Decoy, PacketKind};
pub use error::DecoyError;
pub use glue::Connector;
pub use metrics::DecoyMetrics;
pub use packet::{InboundPacket, OutboundPacket};
pub use surb::{SurbTracker, SweepStats};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn get_version() -> &'static str {
    VERSION
}
