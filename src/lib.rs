//! Embedded signatures for BEAM-style chunked binary modules.
//!
//! A module is signed by computing an Ed25519 signature over the payload of
//! its `Code` chunk and storing it under the `signature` key of the `Attr`
//! chunk's attribute list. The container is reassembled around the updated
//! chunk without touching any other byte, so a runtime that knew nothing
//! about signatures would still load the signed module.
//!
//! The `valid_signature()` function is what most runtimes should call before
//! loading a module; `load()` bundles that check with the handoff to the
//! runtime's own loader.

#![forbid(unsafe_code)]

mod beam_module;
mod error;
mod loader;
mod signature;

pub use beam_module::*;
pub use error::*;
pub use loader::*;
pub use signature::*;

pub mod reexports {
    pub use {ct_codecs, log, thiserror};
}
