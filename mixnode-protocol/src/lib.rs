//! # Mixnode Protocol
//!
//! Primitives shared by every component of a mix network node:
//!
//! - **Topology documents** published once per epoch by the PKI
//! - **Epoch clock** used to decide which document is current
//! - **Layered packets** (X25519 + XChaCha20-Poly1305 per hop) and
//!   **single-use reply blocks** (SURBs)
//! - **Constant-time helpers** for comparing secret identifiers
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pki`] | Mix descriptors, topology documents, document cache entries, epoch time |
//! | [`sphinx`] | Routing commands, path selection, packet construction, SURBs |
//! | [`crypto`] | AEAD sealing, key derivation, constant-time equality |
//! | [`constants`] | Wire lengths shared by the packet format |

// Crate-level lint configuration: stylistic lints only.
#![allow(
    clippy::too_many_arguments,
    clippy::type_complexity,
    clippy::doc_lazy_continuation
)]

// ── Public modules ──────────────────────────────────────────────────────────

/// Wire lengths for identifiers, keys and payloads.
pub mod constants;

/// AEAD sealing, key derivation and constant-time comparison.
pub mod crypto;

/// Topology documents and epoch time.
pub mod pki;

/// Layered packet format, path selection and single-use reply blocks.
pub mod sphinx;

// ── Re-exports for convenience ──────────────────────────────────────────────

pub use pki::{Document, Entry, EpochTime, Layer, MixDescriptor, NodeId, PkiClock, PkiError};
pub use sphinx::{PathHop, RoutingCommand, SphinxError, SprpKey};

// ── Library metadata ────────────────────────────────────────────────────────

/// Mixnode protocol version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the protocol crate version string.
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().contains('.'));
    }
}
