use crate::error::*;
use crate::signature::*;

use log::*;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

/// The runtime loader this crate hands verified modules to.
///
/// Implementations wrap whatever the host runtime uses to load a module
/// binary; this crate never loads anything itself.
pub trait ModuleLoader {
    type Handle;

    /// Load a module binary into the runtime.
    ///
    /// `path` is the on-disk location of the binary, when there is one.
    fn load_binary(
        &mut self,
        name: &str,
        path: Option<&Path>,
        binary: &[u8],
    ) -> Result<Self::Handle, BsError>;
}

/// Verify a module binary, then hand it to the loader.
///
/// Every verification failure, a malformed container included, collapses
/// into `BsError::Rejected`. The loader is never invoked for a module that
/// did not verify.
pub fn load<L: ModuleLoader>(
    loader: &mut L,
    name: &str,
    binary: &[u8],
    pk: &PublicKey,
) -> Result<L::Handle, BsError> {
    gatekeep(loader, name, None, binary, pk)
}

/// Read a module from a path, verify it, then hand it to the loader.
pub fn load_from_path<L: ModuleLoader>(
    loader: &mut L,
    name: &str,
    path: impl AsRef<Path>,
    pk: &PublicKey,
) -> Result<L::Handle, BsError> {
    let path = path.as_ref();
    let mut fp = File::open(path).map_err(|e| {
        BsError::InternalError(format!("Failed to open module '{}': {}", path.display(), e))
    })?;
    let mut binary = vec![];
    fp.read_to_end(&mut binary)?;
    gatekeep(loader, name, Some(path), &binary, pk)
}

fn gatekeep<L: ModuleLoader>(
    loader: &mut L,
    name: &str,
    path: Option<&Path>,
    binary: &[u8],
    pk: &PublicKey,
) -> Result<L::Handle, BsError> {
    match valid_signature(binary, pk) {
        Ok(true) => loader.load_binary(name, path, binary),
        Ok(false) => {
            debug!("Module [{name}] rejected: signature missing or invalid");
            Err(BsError::Rejected)
        }
        Err(e) => {
            debug!("Module [{name}] rejected: {e}");
            Err(BsError::Rejected)
        }
    }
}
