#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Classification of an arbitrary inbound line must never panic
    if let Ok(message) = eywa_rpc::Message::from_slice(data) {
        let encoded = serde_json::to_vec(&message).expect("classified message must serialize");
        let again =
            eywa_rpc::Message::from_slice(&encoded).expect("re-encoded message must classify");
        assert_eq!(message.id(), again.id());
        assert_eq!(message.method(), again.method());
    }
});
