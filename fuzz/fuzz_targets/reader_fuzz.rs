#![no_main]
use libfuzzer_sys::fuzz_target;
use rspatch::delta::{DELTA_MAGIC, InstructionReader};

fuzz_target!(|data: &[u8]| {
    let mut stream = DELTA_MAGIC.to_be_bytes().to_vec();
    stream.extend_from_slice(data);
    for cmd in InstructionReader::new(&stream[..]) {
        if cmd.is_err() {
            break;
        }
    }
});
