//! Fuzz target for attribute term decoding
//!
//! This target tests Term::decode(), which parses untrusted nested terms:
//! version byte, integers, atoms, strings, binaries, lists and tuples.
//!
//! Security concerns:
//! - Memory exhaustion via large length prefixes
//! - Stack exhaustion via deep nesting
//! - UTF-8 validation in atom names
//! - Panics on truncated or malformed input

#![no_main]

use beamsign::term::Term;
use beamsign::AttributeList;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(term) = Term::decode(data) {
        // Roundtrip: re-encode and decode again.
        if let Ok(encoded) = term.encode() {
            let _ = Term::decode(&encoded);
        }
    }

    if let Ok(attributes) = AttributeList::deserialize(data) {
        let _ = attributes.signature();
        let _ = attributes.serialize();
    }
});
