use std::io::{self, prelude::*};
use std::str;

use log::*;

use crate::error::*;

/// Version byte every encoded term starts with.
pub const FORMAT_VERSION: u8 = 131;

const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const ATOM_EXT: u8 = 100;
const SMALL_TUPLE_EXT: u8 = 104;
const LARGE_TUPLE_EXT: u8 = 105;
const NIL_EXT: u8 = 106;
const STRING_EXT: u8 = 107;
const LIST_EXT: u8 = 108;
const BINARY_EXT: u8 = 109;
const ATOM_UTF8_EXT: u8 = 118;
const SMALL_ATOM_UTF8_EXT: u8 = 119;

/// Attribute data is shallow; anything deeper than this is hostile.
pub const MAX_TERM_DEPTH: usize = 64;

/// A term from the attribute chunk's generic serialization.
///
/// Only the subset of the term format that attribute lists are built from
/// is supported. Unknown tags fail decoding instead of being skipped, so a
/// payload never round-trips with silently dropped data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Int(i64),
    Atom(String),
    Binary(Vec<u8>),
    /// A byte list in the compact string encoding.
    String(Vec<u8>),
    List(Vec<Term>),
    Tuple(Vec<Term>),
}

impl Term {
    /// Decode a term from its serialized representation, including the
    /// leading version byte.
    pub fn decode(bin: impl AsRef<[u8]>) -> Result<Term, BsError> {
        let bin = bin.as_ref();
        let mut reader = io::Cursor::new(bin);
        let version = get_u8(&mut reader)?;
        if version != FORMAT_VERSION {
            debug!("Unsupported term format version: {version:02x}");
            return Err(BsError::MalformedContainer);
        }
        let term = Term::get(&mut reader, 0)?;
        if reader.position() != bin.len() as u64 {
            debug!("Trailing bytes after the term");
            return Err(BsError::MalformedContainer);
        }
        Ok(term)
    }

    /// Serialize a term, including the leading version byte.
    pub fn encode(&self) -> Result<Vec<u8>, BsError> {
        let mut out = vec![FORMAT_VERSION];
        self.put(&mut out)?;
        Ok(out)
    }

    fn get(reader: &mut impl Read, depth: usize) -> Result<Term, BsError> {
        if depth > MAX_TERM_DEPTH {
            debug!("Term nesting deeper than {MAX_TERM_DEPTH}");
            return Err(BsError::MalformedContainer);
        }
        let tag = get_u8(reader)?;
        match tag {
            SMALL_INTEGER_EXT => Ok(Term::Int(get_u8(reader)? as i64)),
            INTEGER_EXT => {
                let mut bytes = [0u8; 4];
                get_exact(reader, &mut bytes)?;
                Ok(Term::Int(i32::from_be_bytes(bytes) as i64))
            }
            ATOM_EXT | ATOM_UTF8_EXT => {
                let len = get_u16(reader)? as usize;
                let mut bytes = vec![0u8; len];
                get_exact(reader, &mut bytes)?;
                Ok(Term::Atom(str::from_utf8(&bytes)?.to_string()))
            }
            SMALL_ATOM_UTF8_EXT => {
                let len = get_u8(reader)? as usize;
                let mut bytes = vec![0u8; len];
                get_exact(reader, &mut bytes)?;
                Ok(Term::Atom(str::from_utf8(&bytes)?.to_string()))
            }
            SMALL_TUPLE_EXT => {
                let arity = get_u8(reader)? as usize;
                let mut elements = Vec::new();
                for _ in 0..arity {
                    elements.push(Term::get(reader, depth + 1)?);
                }
                Ok(Term::Tuple(elements))
            }
            LARGE_TUPLE_EXT => {
                let arity = get_u32(reader)? as usize;
                let mut elements = Vec::new();
                for _ in 0..arity {
                    elements.push(Term::get(reader, depth + 1)?);
                }
                Ok(Term::Tuple(elements))
            }
            NIL_EXT => Ok(Term::List(vec![])),
            STRING_EXT => {
                let len = get_u16(reader)? as usize;
                let mut bytes = vec![0u8; len];
                get_exact(reader, &mut bytes)?;
                Ok(Term::String(bytes))
            }
            LIST_EXT => {
                let count = get_u32(reader)? as usize;
                let mut elements = Vec::new();
                for _ in 0..count {
                    elements.push(Term::get(reader, depth + 1)?);
                }
                // Improper lists never occur in attribute data.
                match Term::get(reader, depth + 1)? {
                    Term::List(tail) if tail.is_empty() => {}
                    _ => {
                        debug!("List term with a non-nil tail");
                        return Err(BsError::MalformedContainer);
                    }
                }
                Ok(Term::List(elements))
            }
            BINARY_EXT => {
                let len = get_u32(reader)? as usize;
                let mut bytes = vec![0u8; len];
                get_exact(reader, &mut bytes)?;
                Ok(Term::Binary(bytes))
            }
            _ => {
                debug!("Unsupported term tag: {tag:02x}");
                Err(BsError::MalformedContainer)
            }
        }
    }

    fn put(&self, out: &mut Vec<u8>) -> Result<(), BsError> {
        match self {
            Term::Int(v) => {
                if (0..=255).contains(v) {
                    out.push(SMALL_INTEGER_EXT);
                    out.push(*v as u8);
                } else if i32::try_from(*v).is_ok() {
                    out.push(INTEGER_EXT);
                    out.extend_from_slice(&(*v as i32).to_be_bytes());
                } else {
                    return Err(BsError::Reconstruction);
                }
            }
            Term::Atom(name) => {
                let bytes = name.as_bytes();
                if bytes.len() <= u8::MAX as usize {
                    out.push(SMALL_ATOM_UTF8_EXT);
                    out.push(bytes.len() as u8);
                } else if bytes.len() <= u16::MAX as usize {
                    out.push(ATOM_UTF8_EXT);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                } else {
                    return Err(BsError::Reconstruction);
                }
                out.extend_from_slice(bytes);
            }
            Term::Binary(bytes) => {
                if u32::try_from(bytes.len()).is_err() {
                    return Err(BsError::Reconstruction);
                }
                out.push(BINARY_EXT);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Term::String(bytes) => {
                if bytes.len() > u16::MAX as usize {
                    return Err(BsError::Reconstruction);
                }
                out.push(STRING_EXT);
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Term::List(elements) => {
                if elements.is_empty() {
                    out.push(NIL_EXT);
                    return Ok(());
                }
                if u32::try_from(elements.len()).is_err() {
                    return Err(BsError::Reconstruction);
                }
                out.push(LIST_EXT);
                out.extend_from_slice(&(elements.len() as u32).to_be_bytes());
                for element in elements {
                    element.put(out)?;
                }
                out.push(NIL_EXT);
            }
            Term::Tuple(elements) => {
                if elements.len() <= u8::MAX as usize {
                    out.push(SMALL_TUPLE_EXT);
                    out.push(elements.len() as u8);
                } else if u32::try_from(elements.len()).is_ok() {
                    out.push(LARGE_TUPLE_EXT);
                    out.extend_from_slice(&(elements.len() as u32).to_be_bytes());
                } else {
                    return Err(BsError::Reconstruction);
                }
                for element in elements {
                    element.put(out)?;
                }
            }
        }
        Ok(())
    }
}

fn get_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), BsError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BsError::Eof
        } else {
            e.into()
        }
    })
}

fn get_u8(reader: &mut impl Read) -> Result<u8, BsError> {
    let mut byte = [0u8; 1];
    get_exact(reader, &mut byte)?;
    Ok(byte[0])
}

fn get_u16(reader: &mut impl Read) -> Result<u16, BsError> {
    let mut bytes = [0u8; 2];
    get_exact(reader, &mut bytes)?;
    Ok(u16::from_be_bytes(bytes))
}

fn get_u32(reader: &mut impl Read) -> Result<u32, BsError> {
    let mut bytes = [0u8; 4];
    get_exact(reader, &mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_int_roundtrip() {
        for v in [0i64, 1, 42, 255] {
            let encoded = Term::Int(v).encode().unwrap();
            assert_eq!(encoded[1], SMALL_INTEGER_EXT);
            assert_eq!(Term::decode(&encoded).unwrap(), Term::Int(v));
        }
    }

    #[test]
    fn test_integer_roundtrip() {
        for v in [-1i64, 256, -1000, i32::MAX as i64, i32::MIN as i64] {
            let encoded = Term::Int(v).encode().unwrap();
            assert_eq!(encoded[1], INTEGER_EXT);
            assert_eq!(Term::decode(&encoded).unwrap(), Term::Int(v));
        }
    }

    #[test]
    fn test_int_out_of_range() {
        let result = Term::Int(i64::MAX).encode();
        assert!(matches!(result.unwrap_err(), BsError::Reconstruction));
    }

    #[test]
    fn test_atom_roundtrip() {
        let term = Term::Atom("signature".to_string());
        let encoded = term.encode().unwrap();
        assert_eq!(encoded[1], SMALL_ATOM_UTF8_EXT);
        assert_eq!(Term::decode(&encoded).unwrap(), term);
    }

    #[test]
    fn test_long_atom_roundtrip() {
        let term = Term::Atom("a".repeat(300));
        let encoded = term.encode().unwrap();
        assert_eq!(encoded[1], ATOM_UTF8_EXT);
        assert_eq!(Term::decode(&encoded).unwrap(), term);
    }

    #[test]
    fn test_legacy_atom_decoding() {
        // ATOM_EXT with a u16 length prefix, as older encoders emit.
        let mut bin = vec![FORMAT_VERSION, ATOM_EXT, 0, 3];
        bin.extend_from_slice(b"vsn");
        assert_eq!(Term::decode(&bin).unwrap(), Term::Atom("vsn".to_string()));
    }

    #[test]
    fn test_binary_roundtrip() {
        let term = Term::Binary(vec![0, 1, 2, 255]);
        assert_eq!(Term::decode(term.encode().unwrap()).unwrap(), term);
    }

    #[test]
    fn test_string_roundtrip() {
        let term = Term::String(b"hello".to_vec());
        let encoded = term.encode().unwrap();
        assert_eq!(encoded[1], STRING_EXT);
        assert_eq!(Term::decode(&encoded).unwrap(), term);
    }

    #[test]
    fn test_empty_list_is_nil() {
        let encoded = Term::List(vec![]).encode().unwrap();
        assert_eq!(encoded, vec![FORMAT_VERSION, NIL_EXT]);
        assert_eq!(Term::decode(&encoded).unwrap(), Term::List(vec![]));
    }

    #[test]
    fn test_nested_roundtrip() {
        let term = Term::List(vec![
            Term::Tuple(vec![
                Term::Atom("vsn".to_string()),
                Term::List(vec![Term::Int(123)]),
            ]),
            Term::Tuple(vec![
                Term::Atom("signature".to_string()),
                Term::List(vec![Term::Binary(vec![7; 64])]),
            ]),
        ]);
        assert_eq!(Term::decode(term.encode().unwrap()).unwrap(), term);
    }

    #[test]
    fn test_large_tuple_roundtrip() {
        let term = Term::Tuple(vec![Term::Int(1); 300]);
        let encoded = term.encode().unwrap();
        assert_eq!(encoded[1], LARGE_TUPLE_EXT);
        assert_eq!(Term::decode(&encoded).unwrap(), term);
    }

    #[test]
    fn test_decode_bad_version() {
        let result = Term::decode([130, NIL_EXT]);
        assert!(matches!(result.unwrap_err(), BsError::MalformedContainer));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let result = Term::decode([FORMAT_VERSION, 0xfe]);
        assert!(matches!(result.unwrap_err(), BsError::MalformedContainer));
    }

    #[test]
    fn test_decode_truncated() {
        let mut bin = Term::Binary(vec![1, 2, 3, 4]).encode().unwrap();
        bin.truncate(bin.len() - 2);
        let result = Term::decode(&bin);
        assert!(matches!(result.unwrap_err(), BsError::Eof));
    }

    #[test]
    fn test_decode_improper_list() {
        // [1 | 2] — a list whose tail is not nil.
        let bin = vec![
            FORMAT_VERSION,
            LIST_EXT,
            0,
            0,
            0,
            1,
            SMALL_INTEGER_EXT,
            1,
            SMALL_INTEGER_EXT,
            2,
        ];
        let result = Term::decode(&bin);
        assert!(matches!(result.unwrap_err(), BsError::MalformedContainer));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bin = Term::Int(1).encode().unwrap();
        bin.extend_from_slice(b"garbage");
        let result = Term::decode(&bin);
        assert!(matches!(result.unwrap_err(), BsError::MalformedContainer));
    }

    #[test]
    fn test_decode_rejects_hostile_nesting() {
        let mut bin = vec![FORMAT_VERSION];
        for _ in 0..(MAX_TERM_DEPTH + 2) {
            bin.extend_from_slice(&[LIST_EXT, 0, 0, 0, 1]);
        }
        bin.push(NIL_EXT);
        let result = Term::decode(&bin);
        assert!(matches!(result.unwrap_err(), BsError::MalformedContainer));
    }

    #[test]
    fn test_decode_empty_input() {
        let result = Term::decode([0u8; 0]);
        assert!(matches!(result.unwrap_err(), BsError::Eof));
    }
}
