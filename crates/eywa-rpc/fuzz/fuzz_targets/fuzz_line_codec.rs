#![no_main]

use bytes::BytesMut;
use eywa_rpc::transport::{Frame, JsonLineCodec};
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Small limit so oversized-line discarding is exercised
    let mut codec = JsonLineCodec::with_max_length(64);
    let mut buf = BytesMut::from(data);

    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        if let Frame::Line(line) = frame {
            assert!(!line.contains(&b'\n'));
            assert!(line.len() <= 64);
        }
    }
    let _ = codec.decode_eof(&mut buf);
});
