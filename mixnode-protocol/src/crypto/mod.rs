pub mod constant_time;
pub mod encryption;

pub use constant_time::eq_32;
pub use encryption::{derive_key, open, seal, EncryptionError, NONCE_SIZE, TAG_SIZE};
