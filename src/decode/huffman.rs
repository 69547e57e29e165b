//! Canonical Huffman trees for DEFLATE decoding.
//!
//! Trees are binary tries stored as an arena of nodes addressed by index.
//! Decoding walks from the root one bit at a time: 0 goes left, 1 goes
//! right, until a leaf is reached.

use std::io::Read;
use std::sync::LazyLock;

use super::bit_reader::BitReader;
use crate::error::{Error, Result};

/// Maximum code length for DEFLATE Huffman codes.
pub const MAX_BITS: u8 = 15;

/// Number of symbols in the fixed literal/length code (286 and 287 never occur).
const FIXED_LITERAL_SYMBOLS: usize = 288;

/// Number of symbols in the fixed distance code (30 and 31 never occur).
const FIXED_DISTANCE_SYMBOLS: usize = 32;

const ROOT: usize = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    /// Child indices for bit 0 and bit 1.
    children: [Option<u32>; 2],
    symbol: Option<u16>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.symbol.is_some()
    }

    fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }
}

/// A binary Huffman trie.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    symbols: usize,
}

impl HuffmanTree {
    /// Create an empty tree (a root with no children).
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            symbols: 0,
        }
    }

    /// Number of symbols inserted so far.
    pub fn len(&self) -> usize {
        self.symbols
    }

    /// True if no codeword has been inserted.
    pub fn is_empty(&self) -> bool {
        self.symbols == 0
    }

    /// Insert `symbol` under the `length`-bit `codeword`, walking the
    /// codeword from its most significant bit.
    ///
    /// Fails if the codeword runs through an existing leaf, or ends on a
    /// node that is already a leaf or an internal node: either way two
    /// codes would share a prefix.
    pub fn insert(&mut self, codeword: u16, length: u8, symbol: u16) -> Result<()> {
        if length == 0 || length > MAX_BITS {
            return Err(Error::MalformedStream(format!(
                "invalid Huffman code length {length}"
            )));
        }
        if u32::from(codeword) >> length != 0 {
            return Err(Error::MalformedStream(format!(
                "codeword {codeword:#b} does not fit in {length} bits"
            )));
        }

        let mut node = ROOT;
        for i in (0..length).rev() {
            if self.nodes[node].is_leaf() {
                return Err(overlap(symbol));
            }
            let bit = ((codeword >> i) & 1) as usize;
            node = match self.nodes[node].children[bit] {
                Some(child) => child as usize,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children[bit] = Some(child as u32);
                    child
                }
            };
        }

        let terminal = &mut self.nodes[node];
        if terminal.is_leaf() || terminal.has_children() {
            return Err(overlap(symbol));
        }
        terminal.symbol = Some(symbol);
        self.symbols += 1;
        Ok(())
    }

    /// Build a tree from per-symbol code lengths using canonical code
    /// assignment (RFC 1951 section 3.2.2): shorter codes first, and codes
    /// of equal length handed out in increasing symbol order. A length of
    /// zero means the symbol does not occur.
    ///
    /// Over-subscribed length sets are rejected. Incomplete ones are
    /// accepted; decoding an unassigned bit pattern fails later.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut bl_count = [0u16; MAX_BITS as usize + 1];
        for &len in lengths {
            if len > MAX_BITS {
                return Err(Error::MalformedStream(format!(
                    "code length {len} exceeds {MAX_BITS}"
                )));
            }
            bl_count[len as usize] += 1;
        }
        bl_count[0] = 0;

        // Kraft check: more codes of a length than the remaining space allows.
        let mut left: i32 = 1;
        for &count in bl_count.iter().skip(1) {
            left = (left << 1) - i32::from(count);
            if left < 0 {
                return Err(Error::MalformedStream(
                    "over-subscribed Huffman code lengths".into(),
                ));
            }
        }

        let mut next_code = [0u16; MAX_BITS as usize + 1];
        let mut code = 0u16;
        for bits in 1..=MAX_BITS as usize {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }

        let mut tree = Self::new();
        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let codeword = next_code[len as usize];
            next_code[len as usize] += 1;
            tree.insert(codeword, len, symbol as u16)?;
        }
        Ok(tree)
    }

    /// Decode one symbol by walking from the root.
    ///
    /// Following a missing child, or running out of input mid-walk, is
    /// [`Error::MalformedStream`].
    pub fn decode<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        if self.is_empty() {
            return Err(Error::MalformedStream(
                "symbol decoded with an empty Huffman tree".into(),
            ));
        }

        let mut node = &self.nodes[ROOT];
        loop {
            if let Some(symbol) = node.symbol {
                return Ok(symbol);
            }
            let bit = reader.read_bit()?;
            if reader.is_eof() {
                return Err(Error::MalformedStream(
                    "input ended inside a Huffman code".into(),
                ));
            }
            match node.children[bit as usize] {
                Some(child) => node = &self.nodes[child as usize],
                None => {
                    return Err(Error::MalformedStream(
                        "bit sequence matches no Huffman code".into(),
                    ))
                }
            }
        }
    }
}

impl Default for HuffmanTree {
    fn default() -> Self {
        Self::new()
    }
}

fn overlap(symbol: u16) -> Error {
    Error::MalformedStream(format!(
        "Huffman codeword for symbol {symbol} overlaps an existing code"
    ))
}

/// The literal/length and distance trees of fixed-Huffman blocks.
#[derive(Debug)]
pub struct FixedTables {
    /// Literal/length tree (symbols 0-287).
    pub literal: HuffmanTree,
    /// Distance tree (symbols 0-31).
    pub distance: HuffmanTree,
}

/// Code lengths of the fixed literal/length code (RFC 1951 section 3.2.6).
pub fn fixed_literal_lengths() -> [u8; FIXED_LITERAL_SYMBOLS] {
    let mut lengths = [0u8; FIXED_LITERAL_SYMBOLS];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    lengths
}

static FIXED_TABLES: LazyLock<FixedTables> = LazyLock::new(|| {
    let literal = HuffmanTree::from_lengths(&fixed_literal_lengths())
        .unwrap_or_else(|_| unreachable!("fixed literal lengths form a complete code"));
    let distance = HuffmanTree::from_lengths(&[5u8; FIXED_DISTANCE_SYMBOLS])
        .unwrap_or_else(|_| unreachable!("fixed distance lengths form a complete code"));
    FixedTables { literal, distance }
});

/// Process-wide fixed trees, built on first use and shared read-only.
pub fn fixed_tables() -> &'static FixedTables {
    &FIXED_TABLES
}
