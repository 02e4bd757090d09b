use crate::beam_module::*;
use crate::signature::*;

use log::*;

impl SecretKey {
    /// Sign a module with the secret key.
    ///
    /// The signature covers the raw payload of the `Code` chunk and is
    /// stored in the `Attr` chunk. If the module was already signed, the
    /// previous signature is replaced.
    pub fn sign(&self, module: Module) -> Result<Module, BsError> {
        let signature = {
            let code = module.code_payload()?;
            self.sk.sign(code, None).to_vec()
        };
        module.embed_signature(&signature)
    }
}

impl PublicKey {
    /// Check a module's embedded signature against the public key.
    ///
    /// An unsigned module is a normal negative result (`Ok(false)`), not an
    /// error. A module without a `Code` chunk cannot be evaluated at all
    /// and fails with `MissingCodeChunk`.
    pub fn valid_signature(&self, module: &Module) -> Result<bool, BsError> {
        let code = module.code_payload()?;
        let signature = match module.embedded_signature()? {
            Some(signature) => signature,
            None => {
                debug!("This module is not signed");
                return Ok(false);
            }
        };
        let signature = match ed25519_compact::Signature::from_slice(&signature) {
            Ok(signature) => signature,
            Err(_) => {
                debug!("Stored signature is not a valid Ed25519 signature");
                return Ok(false);
            }
        };
        Ok(self.pk.verify(code, &signature).is_ok())
    }
}

/// Sign a module and return the signed binary.
///
/// The input is never mutated: signing a path-referenced module leaves the
/// file untouched and returns a fresh blob.
pub fn sign<'a>(module: impl Into<ModuleSource<'a>>, sk: &SecretKey) -> Result<Vec<u8>, BsError> {
    let module = Module::from_source(module)?;
    sk.sign(module)?.serialize_to_vec()
}

/// Check the embedded signature of a module against a public key.
pub fn valid_signature<'a>(
    module: impl Into<ModuleSource<'a>>,
    pk: &PublicKey,
) -> Result<bool, BsError> {
    let module = Module::from_source(module)?;
    pk.valid_signature(&module)
}
