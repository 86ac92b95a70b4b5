//! Outstanding decoy SURB tracking.
//!
//! [`SurbTracker`] pairs an exact-match [`SurbStore`] with an [`EtaIndex`]
//! ordered by expected reply arrival, so replies retire their SURB in O(1)
//! and lost SURBs are swept from the front of the index.

pub mod context;
pub mod eta_index;
pub mod id;
pub mod store;
pub mod tracker;

pub use context::SurbCtx;
pub use eta_index::{EtaHandle, EtaIndex, EtaNode};
pub use id::{make_surb_id, split_surb_id, surb_id_base_now};
pub use store::SurbStore;
pub use tracker::{SurbTracker, SweepStats};
