//! Fuzz target for module container parsing
//!
//! This target tests module deserialization, which handles:
//! - Form header validation (magic + size + form type)
//! - Chunk parsing (tag + big-endian length + padded payload)
//! - Attribute chunk decoding
//!
//! Security concerns:
//! - Buffer overflows when reading chunk payloads
//! - Integer overflows in form size accounting
//! - Memory exhaustion via large chunk lengths
//! - Truncated input handling

#![no_main]

use beamsign::Module;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Full module deserialization should never panic.
    let mut cursor = Cursor::new(data);
    if let Ok(module) = Module::deserialize(&mut cursor) {
        // Exercise serialization (roundtrip) and chunk accessors.
        let _ = module.serialize_to_vec();
        let _ = module.code_payload();
        let _ = module.embedded_signature();
        for chunk in &module.chunks {
            let _ = chunk.tag();
            let _ = chunk.payload();
            let _ = chunk.display(false);
            let _ = chunk.display(true);
        }
    }

    // Streaming chunk parsing.
    let mut cursor = Cursor::new(data);
    if let Ok(stream) = Module::init_from_reader(&mut cursor) {
        if let Ok(chunks) = Module::iterate(stream) {
            for chunk in chunks.take(100) {
                if let Ok(chunk) = chunk {
                    let _ = chunk.payload();
                }
            }
        }
    }
});
