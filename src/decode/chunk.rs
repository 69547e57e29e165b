//! PNG chunk framing.
//!
//! A chunk is a 4-byte big-endian payload length, a 4-byte type tag, the
//! payload, and a CRC-32 over tag and payload. [`ChunkReader`] frames chunks
//! from a byte source and computes their CRC; deciding what a mismatch means
//! is left to the caller. [`ImageDataStream`] joins the payloads of
//! consecutive `IDAT` chunks into one byte stream for the zlib decoder.

use std::fmt;
use std::io::{self, ErrorKind, Read};

use crate::checksum::Crc32;
use crate::error::{ChecksumKind, Error, Result};

/// Largest payload length a chunk may declare (2^31 - 1).
pub const MAX_CHUNK_LENGTH: u32 = (1 << 31) - 1;

/// Chunk type, by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// `IHDR`, the image header.
    Ihdr,
    /// `PLTE`, the palette.
    Plte,
    /// `IDAT`, compressed image data.
    Idat,
    /// `IEND`, the end marker.
    Iend,
    /// `tEXt`, Latin-1 text metadata.
    Text,
    /// `tRNS`, simple transparency.
    Trns,
    /// Any other tag.
    Other([u8; 4]),
}

impl ChunkType {
    /// Classify a type tag.
    pub fn from_tag(tag: [u8; 4]) -> Self {
        match &tag {
            b"IHDR" => ChunkType::Ihdr,
            b"PLTE" => ChunkType::Plte,
            b"IDAT" => ChunkType::Idat,
            b"IEND" => ChunkType::Iend,
            b"tEXt" => ChunkType::Text,
            b"tRNS" => ChunkType::Trns,
            _ => ChunkType::Other(tag),
        }
    }

    /// The 4-byte tag.
    pub fn tag(&self) -> [u8; 4] {
        match self {
            ChunkType::Ihdr => *b"IHDR",
            ChunkType::Plte => *b"PLTE",
            ChunkType::Idat => *b"IDAT",
            ChunkType::Iend => *b"IEND",
            ChunkType::Text => *b"tEXt",
            ChunkType::Trns => *b"tRNS",
            ChunkType::Other(tag) => *tag,
        }
    }

    /// Critical chunks have bit 5 of the first tag byte clear (uppercase).
    pub fn is_critical(&self) -> bool {
        self.tag()[0] & 0x20 == 0
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.tag()))
    }
}

/// One framed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    kind: ChunkType,
    data: Vec<u8>,
    stored_crc: u32,
    computed_crc: u32,
}

impl Chunk {
    /// Chunk type.
    pub fn kind(&self) -> ChunkType {
        self.kind
    }

    /// Type tag.
    pub fn tag(&self) -> [u8; 4] {
        self.kind.tag()
    }

    /// Payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the chunk, returning its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Whether the chunk is critical.
    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }

    /// CRC stored in the file.
    pub fn stored_crc(&self) -> u32 {
        self.stored_crc
    }

    /// CRC computed over tag and payload.
    pub fn computed_crc(&self) -> u32 {
        self.computed_crc
    }

    /// Whether the stored and computed CRCs agree.
    pub fn crc_matches(&self) -> bool {
        self.stored_crc == self.computed_crc
    }

    /// `Ok` if the CRC matches, otherwise the corresponding checksum error.
    pub fn verify(&self) -> Result<()> {
        if self.crc_matches() {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                kind: ChecksumKind::Chunk(self.tag()),
                expected: self.stored_crc,
                actual: self.computed_crc,
            })
        }
    }
}

/// Reads chunks in order from a byte source.
#[derive(Debug)]
pub struct ChunkReader<R: Read> {
    inner: R,
    chunks_read: u64,
    bytes_read: u64,
}

impl<R: Read> ChunkReader<R> {
    /// Wrap a source positioned at a chunk boundary (or at the signature).
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunks_read: 0,
            bytes_read: 0,
        }
    }

    /// Read up to `buf.len()` bytes, stopping early only at end of input.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.bytes_read += filled as u64;
        Ok(filled)
    }

    fn read_exact_or(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        if self.read_raw(buf)? < buf.len() {
            return Err(Error::TruncatedStream(format!("source ended inside {what}")));
        }
        Ok(())
    }

    /// Read the next chunk, or `None` if the source ends cleanly at a chunk
    /// boundary. The CRC is computed but not enforced.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        let mut length = [0u8; 4];
        match self.read_raw(&mut length)? {
            0 => return Ok(None),
            4 => {}
            _ => {
                return Err(Error::TruncatedStream(
                    "source ended inside a chunk length".into(),
                ))
            }
        }
        let length = u32::from_be_bytes(length);
        if length > MAX_CHUNK_LENGTH {
            return Err(Error::MalformedStream(format!(
                "chunk length {length} exceeds 2^31 - 1"
            )));
        }

        let mut tag = [0u8; 4];
        self.read_exact_or(&mut tag, "a chunk type")?;
        if !tag.iter().all(u8::is_ascii_alphabetic) {
            return Err(Error::MalformedStream(format!(
                "invalid chunk type {:02X?}",
                tag
            )));
        }
        let kind = ChunkType::from_tag(tag);
        log::debug!("png: chunk {} ({} bytes)", kind, length);

        // Grow with the data actually present rather than trusting the length.
        let mut data = Vec::new();
        let read = (&mut self.inner)
            .take(u64::from(length))
            .read_to_end(&mut data)?;
        self.bytes_read += read as u64;
        if read < length as usize {
            return Err(Error::TruncatedStream(format!(
                "source ended inside {kind} payload ({read} of {length} bytes)"
            )));
        }

        let mut crc = [0u8; 4];
        self.read_exact_or(&mut crc, "a chunk CRC")?;

        let mut computed = Crc32::new();
        computed.update(&tag);
        computed.update(&data);

        self.chunks_read += 1;
        Ok(Some(Chunk {
            kind,
            data,
            stored_crc: u32::from_be_bytes(crc),
            computed_crc: computed.finalize(),
        }))
    }

    /// Chunks framed so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// Bytes taken from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Give back the source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// The payloads of a run of consecutive `IDAT` chunks, as one byte stream.
///
/// The next chunk is framed only once the current payload has been
/// consumed. Each `IDAT` CRC is checked when its chunk is framed; since
/// `IDAT` is critical, a mismatch fails the read. The first chunk that is
/// not `IDAT` is parked and the stream reports end of input; recover it
/// with [`into_parked`](ImageDataStream::into_parked).
pub struct ImageDataStream<'a, R: Read> {
    chunks: &'a mut ChunkReader<R>,
    current: Vec<u8>,
    pos: usize,
    parked: Option<Chunk>,
    exhausted: bool,
    idat_chunks: u32,
    compressed_len: u64,
}

impl<'a, R: Read> ImageDataStream<'a, R> {
    /// Start with `first`, an `IDAT` chunk whose CRC the caller has verified.
    pub fn new(chunks: &'a mut ChunkReader<R>, first: Chunk) -> Self {
        debug_assert_eq!(first.kind(), ChunkType::Idat);
        let compressed_len = first.data().len() as u64;
        Self {
            chunks,
            current: first.into_data(),
            pos: 0,
            parked: None,
            exhausted: false,
            idat_chunks: 1,
            compressed_len,
        }
    }

    /// Frame the next chunk; returns false once the run has ended.
    fn advance(&mut self) -> Result<bool> {
        match self.chunks.next_chunk()? {
            Some(chunk) if chunk.kind() == ChunkType::Idat => {
                chunk.verify()?;
                self.idat_chunks += 1;
                self.compressed_len += chunk.data().len() as u64;
                self.current = chunk.into_data();
                self.pos = 0;
                Ok(true)
            }
            Some(chunk) => {
                self.parked = Some(chunk);
                self.exhausted = true;
                Ok(false)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// `IDAT` chunks framed so far.
    pub fn idat_chunks(&self) -> u32 {
        self.idat_chunks
    }

    /// Total payload bytes of those chunks.
    pub fn compressed_len(&self) -> u64 {
        self.compressed_len
    }

    /// The chunk that ended the run, if one was read.
    pub fn into_parked(self) -> Option<Chunk> {
        self.parked
    }
}

impl<R: Read> Read for ImageDataStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.current.len() {
            if self.exhausted || !self.advance()? {
                return Ok(0);
            }
        }
        let n = (self.current.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Serialize one chunk. Used to build test inputs.
#[cfg(test)]
pub(crate) fn write_chunk(output: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    let mut crc = Crc32::new();
    crc.update(tag);
    crc.update(data);

    output.extend_from_slice(&(data.len() as u32).to_be_bytes());
    output.extend_from_slice(tag);
    output.extend_from_slice(data);
    output.extend_from_slice(&crc.finalize().to_be_bytes());
}
