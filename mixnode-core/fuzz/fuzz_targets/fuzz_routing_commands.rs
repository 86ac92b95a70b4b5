#![no_main]
use libfuzzer_sys::fuzz_target;
use mixnode_protocol::sphinx::commands::{decode_commands, encode_commands};

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must re-encode to the same bytes.
    if let Ok(commands) = decode_commands(data) {
        assert_eq!(encode_commands(&commands), data);
    }
});
