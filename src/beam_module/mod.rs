/// Generic term (de)serialization for the attribute chunk payload.
///
/// This module provides the subset of the external term format that
/// attribute lists are encoded with.
pub mod term;

use crate::error::*;
use crate::signature::AttributeList;

use ct_codecs::{Encoder, Hex};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, prelude::*};
use std::path::{Path, PathBuf};
use std::str;

const FORM_MAGIC: [u8; 4] = *b"FOR1";
const FORM_TYPE: [u8; 4] = *b"BEAM";

/// A 4-character chunk identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    /// The chunk holding the module's executable payload.
    pub const CODE: ChunkTag = ChunkTag(*b"Code");
    /// The chunk holding the module's attribute list.
    pub const ATTR: ChunkTag = ChunkTag(*b"Attr");
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match str::from_utf8(&self.0) {
            Ok(tag) => write!(f, "{tag}"),
            Err(_) => write!(
                f,
                "0x{}",
                Hex::encode_to_string(self.0).unwrap_or_else(|_| "<hex encoding error>".to_string())
            ),
        }
    }
}

/// A named section of a module container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    tag: ChunkTag,
    payload: Vec<u8>,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(tag: ChunkTag, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// Return the identifier of the chunk.
    pub fn tag(&self) -> ChunkTag {
        self.tag
    }

    /// Return the payload of the chunk.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Return `true` if the chunk holds the module's executable payload.
    pub fn is_code(&self) -> bool {
        self.tag == ChunkTag::CODE
    }

    /// Return `true` if the chunk holds the module's attribute list.
    pub fn is_attributes(&self) -> bool {
        self.tag == ChunkTag::ATTR
    }

    /// Human-readable representation of the chunk.
    pub fn display(&self, verbose: bool) -> String {
        if !verbose || !self.is_attributes() {
            return format!("chunk: [{}] ({} bytes)", self.tag, self.payload.len());
        }
        let attributes = match AttributeList::deserialize(&self.payload) {
            Ok(attributes) => attributes,
            _ => return "undecodable attribute chunk".to_string(),
        };
        let mut s = format!("chunk: [{}]\n", self.tag);
        for key in attributes.keys() {
            s.push_str(&format!("- attribute: [{key}]\n"));
        }
        if let Some(signature) = attributes.signature() {
            let hex = Hex::encode_to_string(&signature)
                .unwrap_or_else(|_| "<hex encoding error>".to_string());
            s.push_str(&format!("- signature: [{hex}]\n"));
        }
        s
    }

    /// Read one chunk record, including its alignment padding.
    ///
    /// Returns `Ok(None)` at a clean end of input.
    pub fn deserialize(reader: &mut impl Read) -> Result<Option<Self>, BsError> {
        Ok(Self::deserialize_record(reader)?.map(|(chunk, _)| chunk))
    }

    /// Read one chunk record, also returning the number of bytes the record
    /// actually occupied in the stream.
    ///
    /// Some emitters leave the final chunk unpadded and declare the exact
    /// form size; the consumed count reflects however much of the pad was
    /// present, so form-size accounting agrees with either convention.
    fn deserialize_record(reader: &mut impl Read) -> Result<Option<(Self, u64)>, BsError> {
        let mut tag = [0u8; 4];
        match reader.read_exact(&mut tag) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = get_u32(reader)? as usize;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).map_err(map_eof)?;
        let mut pad = [0u8; 3];
        let pad = &mut pad[..padding(len)];
        let mut pad_read = 0;
        while pad_read < pad.len() {
            match reader.read(&mut pad[pad_read..]) {
                Ok(0) => break,
                Ok(n) => pad_read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let consumed = 8 + len as u64 + pad_read as u64;
        Ok(Some((
            Chunk {
                tag: ChunkTag(tag),
                payload,
            },
            consumed,
        )))
    }

    /// Serialize a chunk record, padding the payload to a 4-byte boundary.
    pub fn serialize(&self, writer: &mut impl Write) -> Result<(), BsError> {
        let len = u32::try_from(self.payload.len()).map_err(|_| BsError::Reconstruction)?;
        writer.write_all(&self.tag.0)?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&self.payload)?;
        writer.write_all(&[0u8; 3][..padding(self.payload.len())])?;
        Ok(())
    }

    /// Size of the serialized chunk record, padding included.
    fn record_len(&self) -> u64 {
        8 + (self.payload.len() as u64 + 3) / 4 * 4
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.display(false))
    }
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn map_eof(e: io::Error) -> BsError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        BsError::Eof
    } else {
        e.into()
    }
}

fn get_u32(reader: &mut impl Read) -> Result<u32, BsError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(map_eof)?;
    Ok(u32::from_be_bytes(bytes))
}

/// Input to the signing and verification entry points: either raw module
/// bytes or a path to a module on disk.
#[derive(Debug, Clone, Copy)]
pub enum ModuleSource<'a> {
    Binary(&'a [u8]),
    Path(&'a Path),
}

impl<'a> From<&'a [u8]> for ModuleSource<'a> {
    fn from(binary: &'a [u8]) -> Self {
        ModuleSource::Binary(binary)
    }
}

impl<'a> From<&'a Vec<u8>> for ModuleSource<'a> {
    fn from(binary: &'a Vec<u8>) -> Self {
        ModuleSource::Binary(binary)
    }
}

impl<'a> From<&'a Path> for ModuleSource<'a> {
    fn from(path: &'a Path) -> Self {
        ModuleSource::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for ModuleSource<'a> {
    fn from(path: &'a PathBuf) -> Self {
        ModuleSource::Path(path)
    }
}

/// A chunked module container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub chunks: Vec<Chunk>,
}

impl Module {
    /// Deserialize a module from the given reader.
    pub fn deserialize(reader: &mut impl Read) -> Result<Self, BsError> {
        let stream = Self::init_from_reader(reader)?;
        let mut chunks = Vec::new();
        for chunk in Self::iterate(stream)? {
            chunks.push(chunk?);
        }
        Ok(Module { chunks })
    }

    /// Deserialize a module from the given file.
    pub fn deserialize_from_file(file: impl AsRef<Path>) -> Result<Self, BsError> {
        let path = file.as_ref();
        let fp = File::open(path).map_err(|e| {
            BsError::InternalError(format!(
                "Failed to open input file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::deserialize(&mut BufReader::new(fp))
    }

    /// Deserialize a module from raw bytes or a file.
    pub fn from_source<'a>(source: impl Into<ModuleSource<'a>>) -> Result<Self, BsError> {
        match source.into() {
            ModuleSource::Binary(binary) => Self::deserialize(&mut io::Cursor::new(binary)),
            ModuleSource::Path(path) => Self::deserialize_from_file(path),
        }
    }

    /// Serialize a module to the given writer.
    ///
    /// The form size is recomputed; chunk order and payload bytes are
    /// written exactly as stored.
    pub fn serialize(&self, writer: &mut impl Write) -> Result<(), BsError> {
        let form_size = self
            .chunks
            .iter()
            .fold(FORM_TYPE.len() as u64, |acc, chunk| acc + chunk.record_len());
        let form_size = u32::try_from(form_size).map_err(|_| BsError::Reconstruction)?;
        writer.write_all(&FORM_MAGIC)?;
        writer.write_all(&form_size.to_be_bytes())?;
        writer.write_all(&FORM_TYPE)?;
        for chunk in &self.chunks {
            chunk.serialize(writer)?;
        }
        Ok(())
    }

    /// Serialize a module to a byte vector.
    pub fn serialize_to_vec(&self) -> Result<Vec<u8>, BsError> {
        let mut out = Vec::new();
        self.serialize(&mut out)?;
        Ok(out)
    }

    /// Serialize a module to the given file.
    pub fn serialize_to_file(&self, file: impl AsRef<Path>) -> Result<(), BsError> {
        let path = file.as_ref();
        let fp = File::create(path).map_err(|e| {
            BsError::InternalError(format!(
                "Failed to create output file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::new(fp);
        self.serialize(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse the module's form header. This function must be called before
    /// iterating over chunks.
    pub fn init_from_reader<T: Read>(reader: &mut T) -> Result<ModuleStreamReader<'_, T>, BsError> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| BsError::MalformedContainer)?;
        if magic != FORM_MAGIC {
            return Err(BsError::MalformedContainer);
        }
        let form_size = get_u32(reader).map_err(|_| BsError::MalformedContainer)?;
        if (form_size as usize) < FORM_TYPE.len() {
            return Err(BsError::MalformedContainer);
        }
        let mut form_type = [0u8; 4];
        reader
            .read_exact(&mut form_type)
            .map_err(|_| BsError::MalformedContainer)?;
        if form_type != FORM_TYPE {
            return Err(BsError::MalformedContainer);
        }
        Ok(ModuleStreamReader {
            reader,
            remaining: form_size as u64 - FORM_TYPE.len() as u64,
        })
    }

    /// Return an iterator over the chunks of a module.
    ///
    /// The module is read in a streaming fashion, and doesn't have to be
    /// fully loaded into memory.
    pub fn iterate<T: Read>(
        module_stream: ModuleStreamReader<T>,
    ) -> Result<ChunksIterator<T>, BsError> {
        Ok(ChunksIterator {
            reader: module_stream.reader,
            remaining: module_stream.remaining,
        })
    }

    /// Return the executable payload of the module.
    pub fn code_payload(&self) -> Result<&[u8], BsError> {
        self.chunks
            .iter()
            .find(|chunk| chunk.is_code())
            .map(|chunk| chunk.payload())
            .ok_or(BsError::MissingCodeChunk)
    }

    /// Print the structure of a module to the standard output, mainly for
    /// debugging purposes.
    ///
    /// Set `verbose` to `true` in order to also print attribute details.
    pub fn show(&self, verbose: bool) {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            println!("{}:\t{}", idx, chunk.display(verbose));
        }
    }
}

pub struct ModuleStreamReader<'t, T: Read> {
    reader: &'t mut T,
    remaining: u64,
}

/// An iterator over the chunks of a module.
pub struct ChunksIterator<'t, T: Read> {
    reader: &'t mut T,
    remaining: u64,
}

impl<'t, T: Read> Iterator for ChunksIterator<'t, T> {
    type Item = Result<Chunk, BsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match Chunk::deserialize_record(self.reader) {
            Err(e) => Some(Err(e)),
            // The declared form size promises more data than the stream
            // holds.
            Ok(None) => {
                self.remaining = 0;
                Some(Err(BsError::MalformedContainer))
            }
            Ok(Some((chunk, consumed))) => {
                if consumed > self.remaining {
                    // The form size disagrees with the chunk records.
                    self.remaining = 0;
                    return Some(Err(BsError::MalformedContainer));
                }
                self.remaining -= consumed;
                Some(Ok(chunk))
            }
        }
    }
}
