use crate::beam_module::term::Term;
use crate::beam_module::*;
use crate::error::*;

use log::*;

/// Attribute key under which the module signature is stored.
pub const SIGNATURE_ATTRIBUTE_KEY: &str = "signature";

/// The decoded key/value list carried by the `Attr` chunk.
///
/// Keys this crate doesn't know about are preserved untouched across a
/// decode/encode cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    entries: Vec<(String, Term)>,
}

impl AttributeList {
    /// Create an empty attribute list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the attribute list carried by a chunk sequence.
    ///
    /// Returns `None` if the module has no `Attr` chunk, which is distinct
    /// from a chunk carrying an empty list.
    pub fn from_chunks(chunks: &[Chunk]) -> Result<Option<Self>, BsError> {
        match chunks.iter().find(|chunk| chunk.is_attributes()) {
            Some(chunk) => Self::deserialize(chunk.payload()).map(Some),
            None => Ok(None),
        }
    }

    /// Decode an attribute list from an `Attr` chunk payload.
    pub fn deserialize(bin: &[u8]) -> Result<Self, BsError> {
        let items = match Term::decode(bin)? {
            Term::List(items) => items,
            _ => {
                debug!("Attribute payload is not a list");
                return Err(BsError::MalformedContainer);
            }
        };
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let mut kv = match item {
                Term::Tuple(kv) if kv.len() == 2 => kv,
                _ => {
                    debug!("Attribute entry is not a 2-tuple");
                    return Err(BsError::MalformedContainer);
                }
            };
            let value = kv.pop().ok_or(BsError::MalformedContainer)?;
            match kv.pop() {
                Some(Term::Atom(key)) => entries.push((key, value)),
                _ => {
                    debug!("Attribute key is not an atom");
                    return Err(BsError::MalformedContainer);
                }
            }
        }
        Ok(AttributeList { entries })
    }

    /// Encode the attribute list into an `Attr` chunk payload.
    pub fn serialize(&self) -> Result<Vec<u8>, BsError> {
        let items = self
            .entries
            .iter()
            .map(|(key, value)| Term::Tuple(vec![Term::Atom(key.clone()), value.clone()]))
            .collect();
        Term::List(items).encode()
    }

    /// Return the value stored under a key.
    pub fn get(&self, key: &str) -> Option<&Term> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    /// Set the value stored under a key, replacing any previous value.
    ///
    /// New keys are prepended; existing keys keep their position.
    pub fn set(&mut self, key: &str, value: Term) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.insert(0, (key.to_string(), value)),
        }
    }

    /// Iterate over the attribute keys, in stored order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extract the stored signature, if any.
    ///
    /// The signature is stored as a single-element list holding one binary.
    /// A key with any other shape is treated as "unsigned" rather than an
    /// error.
    pub fn signature(&self) -> Option<Vec<u8>> {
        match self.get(SIGNATURE_ATTRIBUTE_KEY)? {
            Term::List(items) => match items.first() {
                Some(Term::Binary(signature)) => Some(signature.clone()),
                _ => {
                    debug!("Stored signature has an unexpected shape");
                    None
                }
            },
            _ => {
                debug!("Stored signature is not list-valued");
                None
            }
        }
    }

    /// Store a signature, replacing any previous one.
    pub fn set_signature(&mut self, signature: &[u8]) {
        self.set(
            SIGNATURE_ATTRIBUTE_KEY,
            Term::List(vec![Term::Binary(signature.to_vec())]),
        );
    }
}

impl Module {
    /// Return a new module with `signature` embedded in the `Attr` chunk.
    ///
    /// An existing `Attr` chunk has its payload replaced, other keys kept;
    /// a module without one gets a fresh `Attr` chunk appended. No other
    /// chunk is touched.
    pub fn embed_signature(self, signature: &[u8]) -> Result<Module, BsError> {
        let mut attributes = AttributeList::from_chunks(&self.chunks)?.unwrap_or_default();
        attributes.set_signature(signature);
        let payload = attributes.serialize()?;

        let mut replaced = false;
        let mut chunks = Vec::with_capacity(self.chunks.len() + 1);
        for chunk in self.chunks {
            if chunk.is_attributes() {
                chunks.push(Chunk::new(ChunkTag::ATTR, payload.clone()));
                replaced = true;
            } else {
                chunks.push(chunk);
            }
        }
        if !replaced {
            chunks.push(Chunk::new(ChunkTag::ATTR, payload));
        }
        Ok(Module { chunks })
    }

    /// Extract the signature embedded in the `Attr` chunk, if any.
    ///
    /// `Ok(None)` means "unsigned module"; it is not an error.
    pub fn embedded_signature(&self) -> Result<Option<Vec<u8>>, BsError> {
        Ok(AttributeList::from_chunks(&self.chunks)?.and_then(|attributes| attributes.signature()))
    }
}
