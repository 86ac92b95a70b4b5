#![no_main]
use libfuzzer_sys::fuzz_target;
use mixnode_protocol::sphinx::{unwrap_packet, Unwrapped};
use x25519_dalek::StaticSecret;

fuzz_target!(|data: &[u8]| {
    let secret = StaticSecret::from([0x24u8; 32]);

    // Arbitrary bytes must be rejected, never panic.
    if let Ok(Unwrapped::Forward { packet, .. }) = unwrap_packet(&secret, data) {
        // A forwarded packet is strictly smaller than its input.
        assert!(packet.len() < data.len());
    }
});
