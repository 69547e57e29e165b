//! DEFLATE block decoding (RFC 1951).
//!
//! A [`BlockDecoder`] walks `ExpectHeader -> {Stored, FixedHuffman,
//! DynamicHuffman} -> ExpectHeader ... -> Done`, writing into a [`Window`]
//! of previously produced output. Decoding can stop at any output byte
//! (a caller-supplied limit) and resume on the next call: the decoder keeps
//! the stored-block byte count, the current trees and any half-copied match.

use std::io::Read;

use super::bit_reader::BitReader;
use super::huffman::{fixed_tables, HuffmanTree};
use crate::error::{Error, Result};

/// Length code base values (codes 257-285).
const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for length codes.
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values (codes 0-29).
const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance codes.
const DISTANCE_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order in which code length code lengths are transmitted.
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const END_OF_BLOCK: u16 = 256;

/// Largest back-reference distance the format can express.
pub const MAX_DISTANCE: usize = 32 * 1024;

/// The three block encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// BTYPE 00: verbatim bytes.
    Stored,
    /// BTYPE 01: the fixed literal/length and distance codes.
    FixedHuffman,
    /// BTYPE 10: codes transmitted in the block header.
    DynamicHuffman,
}

/// Already-produced output that back-references resolve against.
///
/// Within one stream the history is kept whole; only distances up to the
/// stream's window size are ever honoured.
#[derive(Debug, Default)]
pub struct Window {
    data: Vec<u8>,
}

impl Window {
    /// Create an empty window, reserving `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Reserve room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Bytes produced so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True before the first byte is produced.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All bytes produced so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the window, returning its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Copy `length` bytes starting `distance` bytes back. The source may
    /// overlap the bytes being written, so overlapping copies go one byte
    /// at a time.
    fn copy_match(&mut self, distance: usize, length: usize) {
        let start = self.data.len() - distance;
        if distance >= length {
            self.data.extend_from_within(start..start + length);
        } else {
            for i in 0..length {
                let byte = self.data[start + i];
                self.data.push(byte);
            }
        }
    }

    fn copy_from_reader<R: Read>(&mut self, reader: &mut BitReader<R>, count: usize) -> Result<()> {
        let start = self.data.len();
        self.data.resize(start + count, 0);
        let read = reader.read_aligned_bytes(&mut self.data[start..])?;
        if read < count {
            self.data.truncate(start + read);
            return Err(Error::TruncatedStream(format!(
                "stored block ended after {read} of {count} bytes"
            )));
        }
        Ok(())
    }
}

/// Trees owned by a dynamic block.
#[derive(Debug)]
struct DynamicTables {
    literal: HuffmanTree,
    distance: HuffmanTree,
}

#[derive(Debug)]
enum Tables {
    Fixed,
    Dynamic(Box<DynamicTables>),
}

impl Tables {
    fn trees(&self) -> (&HuffmanTree, &HuffmanTree) {
        match self {
            Tables::Fixed => {
                let fixed = fixed_tables();
                (&fixed.literal, &fixed.distance)
            }
            Tables::Dynamic(tables) => (&tables.literal, &tables.distance),
        }
    }
}

/// A back-reference not yet fully copied.
#[derive(Debug, Clone, Copy)]
struct PendingMatch {
    distance: usize,
    remaining: usize,
}

#[derive(Debug)]
enum State {
    ExpectHeader,
    Stored { remaining: usize },
    Huffman {
        tables: Tables,
        pending: Option<PendingMatch>,
    },
    Done,
}

/// Decodes the sequence of DEFLATE blocks of one stream.
#[derive(Debug)]
pub struct BlockDecoder {
    state: State,
    final_block: bool,
    max_distance: usize,
    blocks: u32,
}

impl BlockDecoder {
    /// Create a decoder honouring back-references up to `max_distance`
    /// bytes (the stream's window size, at most 32 KiB).
    pub fn new(max_distance: usize) -> Self {
        Self {
            state: State::ExpectHeader,
            final_block: false,
            max_distance: max_distance.min(MAX_DISTANCE),
            blocks: 0,
        }
    }

    /// True once the final block's end has been reached.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Number of block headers read so far.
    pub fn blocks_started(&self) -> u32 {
        self.blocks
    }

    /// Decode until `limit` more bytes have been produced or the final
    /// block ends. Returns the number of bytes produced.
    pub fn decode<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        window: &mut Window,
        limit: usize,
    ) -> Result<usize> {
        let start = window.len();
        let target = start.saturating_add(limit);

        while window.len() < target {
            match &mut self.state {
                State::Done => break,
                State::ExpectHeader => self.begin_block(reader)?,
                State::Stored { remaining } => {
                    let take = (*remaining).min(target - window.len());
                    window.copy_from_reader(reader, take)?;
                    *remaining -= take;
                    if *remaining == 0 {
                        self.end_block();
                    }
                }
                State::Huffman { tables, pending } => {
                    if let Some(mut copy) = pending.take() {
                        let take = copy.remaining.min(target - window.len());
                        window.copy_match(copy.distance, take);
                        copy.remaining -= take;
                        if copy.remaining > 0 {
                            *pending = Some(copy);
                        }
                        continue;
                    }

                    let (literal, distance) = tables.trees();
                    match decode_symbol(reader, literal, distance, window, self.max_distance)? {
                        Symbol::Literal(byte) => window.push(byte),
                        Symbol::EndOfBlock => self.end_block(),
                        Symbol::Match { distance, length } => {
                            *pending = Some(PendingMatch {
                                distance,
                                remaining: length,
                            });
                        }
                    }
                }
            }
        }

        Ok(window.len() - start)
    }

    /// Read the 3-bit block header and set up the block's state.
    fn begin_block<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        let header = reader.read_bits(3)?;
        if reader.is_eof() {
            return Err(Error::TruncatedStream(
                "compressed data ended before the final block".into(),
            ));
        }
        self.final_block = header & 1 == 1;
        self.blocks += 1;

        let kind = match header >> 1 {
            0 => BlockKind::Stored,
            1 => BlockKind::FixedHuffman,
            2 => BlockKind::DynamicHuffman,
            _ => {
                return Err(Error::MalformedStream(
                    "reserved block type 3".into(),
                ))
            }
        };
        log::debug!(
            "zlib: block {} {:?}{}",
            self.blocks,
            kind,
            if self.final_block { " (final)" } else { "" }
        );

        self.state = match kind {
            BlockKind::Stored => {
                let len = reader.read_aligned_u16_le()?;
                let nlen = reader.read_aligned_u16_le()?;
                if len != !nlen {
                    return Err(Error::MalformedStream(format!(
                        "stored block LEN {len:#06x} is not the complement of NLEN {nlen:#06x}"
                    )));
                }
                State::Stored {
                    remaining: len as usize,
                }
            }
            BlockKind::FixedHuffman => State::Huffman {
                tables: Tables::Fixed,
                pending: None,
            },
            BlockKind::DynamicHuffman => State::Huffman {
                tables: Tables::Dynamic(Box::new(read_dynamic_tables(reader)?)),
                pending: None,
            },
        };
        if matches!(self.state, State::Stored { remaining: 0 }) {
            self.end_block();
        }
        Ok(())
    }

    fn end_block(&mut self) {
        self.state = if self.final_block {
            State::Done
        } else {
            State::ExpectHeader
        };
    }
}

enum Symbol {
    Literal(u8),
    EndOfBlock,
    Match { distance: usize, length: usize },
}

/// Decode one literal/length symbol and, for a match, its distance.
fn decode_symbol<R: Read>(
    reader: &mut BitReader<R>,
    literal: &HuffmanTree,
    distance_tree: &HuffmanTree,
    window: &Window,
    max_distance: usize,
) -> Result<Symbol> {
    let symbol = literal.decode(reader)?;
    match symbol {
        0..=255 => Ok(Symbol::Literal(symbol as u8)),
        END_OF_BLOCK => Ok(Symbol::EndOfBlock),
        257..=285 => {
            let len_idx = (symbol - 257) as usize;
            let length =
                LENGTH_BASE[len_idx] as usize + reader.read_bits_exact(LENGTH_EXTRA[len_idx])? as usize;

            let dist_symbol = distance_tree.decode(reader)?;
            if dist_symbol >= 30 {
                return Err(Error::MalformedStream(format!(
                    "invalid distance code {dist_symbol}"
                )));
            }
            let dist_idx = dist_symbol as usize;
            let distance = DISTANCE_BASE[dist_idx] as usize
                + reader.read_bits_exact(DISTANCE_EXTRA[dist_idx])? as usize;

            if distance > window.len() {
                return Err(Error::MalformedStream(format!(
                    "back-reference distance {distance} exceeds the {} bytes produced so far",
                    window.len()
                )));
            }
            if distance > max_distance {
                return Err(Error::MalformedStream(format!(
                    "back-reference distance {distance} exceeds the {max_distance}-byte window"
                )));
            }
            Ok(Symbol::Match { distance, length })
        }
        _ => Err(Error::MalformedStream(format!(
            "invalid literal/length code {symbol}"
        ))),
    }
}

/// Read a dynamic block's code descriptions and build its two trees.
fn read_dynamic_tables<R: Read>(reader: &mut BitReader<R>) -> Result<DynamicTables> {
    let hlit = reader.read_bits_exact(5)? as usize + 257;
    let hdist = reader.read_bits_exact(5)? as usize + 1;
    let hclen = reader.read_bits_exact(4)? as usize + 4;
    if hlit > 286 || hdist > 30 {
        return Err(Error::MalformedStream(format!(
            "too many length or distance symbols ({hlit}, {hdist})"
        )));
    }

    let mut cl_lengths = [0u8; 19];
    for &index in CODE_LENGTH_ORDER.iter().take(hclen) {
        cl_lengths[index] = reader.read_bits_exact(3)? as u8;
    }
    let cl_tree = HuffmanTree::from_lengths(&cl_lengths)?;

    // Literal/length and distance lengths form one sequence; runs may
    // cross from one into the other.
    let mut lengths = vec![0u8; hlit + hdist];
    let mut i = 0;
    while i < lengths.len() {
        let symbol = cl_tree.decode(reader)?;
        let (value, repeat) = match symbol {
            0..=15 => (symbol as u8, 1),
            16 => {
                if i == 0 {
                    return Err(Error::MalformedStream(
                        "repeat code with no previous length".into(),
                    ));
                }
                (lengths[i - 1], reader.read_bits_exact(2)? as usize + 3)
            }
            17 => (0, reader.read_bits_exact(3)? as usize + 3),
            18 => (0, reader.read_bits_exact(7)? as usize + 11),
            _ => {
                return Err(Error::MalformedStream(format!(
                    "invalid code length code {symbol}"
                )))
            }
        };
        if i + repeat > lengths.len() {
            return Err(Error::MalformedStream(
                "code length run overflows the length table".into(),
            ));
        }
        lengths[i..i + repeat].fill(value);
        i += repeat;
    }

    if lengths[END_OF_BLOCK as usize] == 0 {
        return Err(Error::MalformedStream(
            "dynamic block has no end-of-block code".into(),
        ));
    }

    Ok(DynamicTables {
        literal: HuffmanTree::from_lengths(&lengths[..hlit])?,
        distance: HuffmanTree::from_lengths(&lengths[hlit..])?,
    })
}
