#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The client also parses request envelopes (in tests and tooling that
    // replay captured traffic); the flattened ackId + adjacently-tagged
    // request shape gets the same treatment as server messages.
    let _ = serde_json::from_slice::<quizwire_client::protocol::RequestEnvelope>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<quizwire_client::protocol::RequestEnvelope>(s);
    }
});
