#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mqtt_wire::protocol::dispatcher;

fuzz_target!(|data: &[u8]| {
    // Fuzz packet decoding - test for panics, crashes, infinite loops
    let src = Bytes::copy_from_slice(data);
    if let Ok((packet, consumed)) = dispatcher::decode(&src) {
        assert!(consumed <= data.len());
        let _ = packet.to_bytes();
    }
});
