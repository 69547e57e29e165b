//! Error types for the pixdec library.

use std::fmt;
use std::io;

/// Result type alias for pixdec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which part of the 8-byte PNG signature did not match.
///
/// The signature is built so that common transfer accidents damage a
/// recognisable byte, so the fault is worth reporting precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFault {
    /// The leading `\x89PNG` bytes are wrong; this is not a PNG file.
    NotPng,
    /// The CR LF pair was altered, typically by a DOS-to-Unix line ending conversion.
    CrLfConverted,
    /// The DOS end-of-file control byte (0x1A) is wrong.
    ControlByte,
    /// The trailing LF was altered, typically by a Unix-to-DOS line ending conversion.
    LfConverted,
}

impl fmt::Display for SignatureFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureFault::NotPng => write!(f, "not a PNG file"),
            SignatureFault::CrLfConverted => write!(
                f,
                "CR LF bytes altered (likely corrupted by a DOS-to-Unix text transfer)"
            ),
            SignatureFault::ControlByte => write!(f, "control byte 0x1A altered (file corrupted)"),
            SignatureFault::LfConverted => write!(
                f,
                "LF byte altered (likely corrupted by a Unix-to-DOS text transfer)"
            ),
        }
    }
}

/// Which checksum failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// CRC-32 of a container chunk, with the chunk's type tag.
    Chunk([u8; 4]),
    /// Adler-32 of the whole decompressed stream.
    Stream,
}

impl ChecksumKind {
    /// True when a mismatch of this kind may be recovered by skipping the chunk.
    ///
    /// Only ancillary chunks (bit 5 of the first tag byte set) qualify.
    pub fn is_ancillary_chunk(&self) -> bool {
        match self {
            ChecksumKind::Chunk(tag) => tag[0] & 0x20 != 0,
            ChecksumKind::Stream => false,
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumKind::Chunk(tag) => write!(f, "CRC-32 of {} chunk", String::from_utf8_lossy(tag)),
            ChecksumKind::Stream => write!(f, "Adler-32 of compressed stream"),
        }
    }
}

/// Errors that can occur while decoding.
#[derive(Debug)]
pub enum Error {
    /// The byte source could not be read.
    Io(io::Error),
    /// The file signature did not match.
    BadMagic(SignatureFault),
    /// The first chunk was not a header chunk.
    MissingHeader,
    /// A method, color configuration, bit depth or block type this decoder does not handle.
    UnsupportedFormat(String),
    /// A chunk CRC-32 or the stream Adler-32 did not match.
    ChecksumMismatch {
        /// Which checksum failed.
        kind: ChecksumKind,
        /// Value stored in the file.
        expected: u32,
        /// Value computed over the data.
        actual: u32,
    },
    /// Structurally invalid data.
    MalformedStream(String),
    /// The source ended before the terminating marker.
    TruncatedStream(String),
}

impl Error {
    /// True for the one condition the container parser recovers from locally:
    /// a CRC mismatch on an ancillary chunk.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ChecksumMismatch { kind, .. } if kind.is_ancillary_chunk())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::BadMagic(fault) => write!(f, "Bad signature: {}", fault),
            Error::MissingHeader => write!(f, "Missing IHDR chunk: the first chunk must be IHDR"),
            Error::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            Error::ChecksumMismatch {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "Checksum mismatch in {}: expected {:08X}, got {:08X}",
                kind, expected, actual
            ),
            Error::MalformedStream(msg) => write!(f, "Malformed stream: {}", msg),
            Error::TruncatedStream(msg) => write!(f, "Truncated stream: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return Error::TruncatedStream(err.to_string());
        }
        // Decode errors raised inside an `io::Read` adapter travel wrapped.
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                _ => unreachable!("inner error type checked above"),
            };
        }
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}
