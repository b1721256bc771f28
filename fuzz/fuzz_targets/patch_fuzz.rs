#![no_main]
use libfuzzer_sys::fuzz_target;
use rspatch::delta::{self, DELTA_MAGIC};

fuzz_target!(|data: &[u8]| {
    // The patcher must never panic, only return errors.
    let _ = delta::apply(&[], data);

    // Valid magic plus arbitrary commands against a non-empty target.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (target, body) = data.split_at(split);
        let mut stream = DELTA_MAGIC.to_be_bytes().to_vec();
        stream.extend_from_slice(body);
        let _ = delta::apply(target, &stream);
    }
});
