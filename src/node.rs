//! The cons-pair tree used on the wire, and its canonical serialization.
//!
//! A [`Node`] is either an atom (a byte string, possibly empty) or a pair of
//! nodes. The empty atom doubles as `nil`, the list terminator, and as the
//! integer zero.

use crate::error::EncodingError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::{Arc, OnceLock};

const PAIR_PREFIX: u8 = 0xff;
const NIL_BYTE: u8 = 0x80;
const MAX_SINGLE_BYTE: u8 = 0x7f;
const MAX_ATOM_LEN: usize = 0x3_ffff_ffff;

/// Drop, equality and hashing walk the tree with an explicit stack, so a
/// list of any length is safe to handle.
#[derive(Clone)]
pub enum Node {
    Atom(Vec<u8>),
    Pair(Arc<Node>, Arc<Node>),
}

impl Node {
    pub fn nil() -> Self {
        Node::Atom(Vec::new())
    }

    pub fn atom(bytes: impl Into<Vec<u8>>) -> Self {
        Node::Atom(bytes.into())
    }

    pub fn pair(first: Node, rest: Node) -> Self {
        Node::Pair(Arc::new(first), Arc::new(rest))
    }

    pub fn from_int(value: i128) -> Self {
        Node::Atom(int_to_atom(value))
    }

    /// Builds a nil-terminated list.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Node::nil(), |rest, item| Node::pair(item, rest))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Node::Atom(bytes) if bytes.is_empty())
    }

    pub fn as_atom(&self) -> Option<&[u8]> {
        match self {
            Node::Atom(bytes) => Some(bytes),
            Node::Pair(..) => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&Node, &Node)> {
        match self {
            Node::Atom(_) => None,
            Node::Pair(first, rest) => Some((&**first, &**rest)),
        }
    }

    pub fn atom_bytes(&self) -> Result<&[u8], EncodingError> {
        self.as_atom().ok_or(EncodingError::ExpectedAtom)
    }

    pub fn pair_parts(&self) -> Result<(&Node, &Node), EncodingError> {
        self.as_pair().ok_or(EncodingError::ExpectedPair)
    }

    pub fn as_int(&self) -> Result<i128, EncodingError> {
        atom_to_int(self.atom_bytes()?)
    }

    /// Collects the elements of a nil-terminated list.
    pub fn list_items(&self) -> Result<Vec<&Node>, EncodingError> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Node::Pair(first, rest) => {
                    items.push(first.as_ref());
                    cursor = rest;
                }
                Node::Atom(bytes) if bytes.is_empty() => return Ok(items),
                Node::Atom(_) => return Err(EncodingError::ImproperList),
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut todo = vec![self];
        while let Some(node) = todo.pop() {
            match node {
                Node::Atom(bytes) => write_atom(&mut out, bytes),
                Node::Pair(first, rest) => {
                    out.push(PAIR_PREFIX);
                    todo.push(&**rest);
                    todo.push(&**first);
                }
            }
        }
        out
    }

    /// Parses exactly one serialized node; trailing bytes are an error.
    pub fn from_bytes(blob: &[u8]) -> Result<Self, EncodingError> {
        let (node, used) = Self::parse(blob)?;
        if used != blob.len() {
            return Err(EncodingError::TrailingBytes(blob.len() - used));
        }
        Ok(node)
    }

    /// Parses one serialized node from the front of `blob`, returning it with
    /// the number of bytes consumed.
    pub fn parse(blob: &[u8]) -> Result<(Self, usize), EncodingError> {
        enum Op {
            Parse,
            Cons,
        }

        let mut pos = 0;
        let mut ops = vec![Op::Parse];
        let mut values: Vec<Node> = Vec::new();
        while let Some(op) = ops.pop() {
            match op {
                Op::Parse => {
                    let b = *blob
                        .get(pos)
                        .ok_or(EncodingError::Serialization("unexpected end of input"))?;
                    pos += 1;
                    if b == PAIR_PREFIX {
                        ops.push(Op::Cons);
                        ops.push(Op::Parse);
                        ops.push(Op::Parse);
                    } else {
                        let atom = read_atom(blob, &mut pos, b)?;
                        values.push(Node::Atom(atom));
                    }
                }
                Op::Cons => {
                    let rest = values.pop();
                    let first = values.pop();
                    match (first, rest) {
                        (Some(first), Some(rest)) => values.push(Node::pair(first, rest)),
                        _ => return Err(EncodingError::Serialization("unbalanced pair")),
                    }
                }
            }
        }
        match (values.pop(), values.is_empty()) {
            (Some(node), true) => Ok((node, pos)),
            _ => Err(EncodingError::Serialization("unbalanced pair")),
        }
    }

    /// The ledger's tree hash: `sha256(1 || atom)` for atoms and
    /// `sha256(2 || hash(first) || hash(rest))` for pairs.
    pub fn tree_hash(&self) -> [u8; 32] {
        enum Op<'a> {
            Visit(&'a Node),
            Combine,
        }

        let mut ops = vec![Op::Visit(self)];
        let mut hashes: Vec<[u8; 32]> = Vec::new();
        while let Some(op) = ops.pop() {
            match op {
                Op::Visit(Node::Atom(bytes)) => {
                    let mut hasher = Sha256::new();
                    hasher.update([1u8]);
                    hasher.update(bytes);
                    hashes.push(hasher.finalize().into());
                }
                Op::Visit(Node::Pair(first, rest)) => {
                    ops.push(Op::Combine);
                    ops.push(Op::Visit(rest));
                    ops.push(Op::Visit(first));
                }
                Op::Combine => {
                    // both children were pushed before the combine marker is reached
                    let rest = hashes.pop().unwrap_or_default();
                    let first = hashes.pop().unwrap_or_default();
                    let mut hasher = Sha256::new();
                    hasher.update([2u8]);
                    hasher.update(first);
                    hasher.update(rest);
                    hashes.push(hasher.finalize().into());
                }
            }
        }
        hashes.pop().unwrap_or_default()
    }
}

fn shared_nil() -> Arc<Node> {
    static NIL: OnceLock<Arc<Node>> = OnceLock::new();
    Arc::clone(NIL.get_or_init(|| Arc::new(Node::nil())))
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut todo = Vec::new();
        if let Node::Pair(first, rest) = self {
            todo.push(mem::replace(first, shared_nil()));
            todo.push(mem::replace(rest, shared_nil()));
        }
        while let Some(child) = todo.pop() {
            // children still shared elsewhere are left to their other owners
            if let Ok(mut node) = Arc::try_unwrap(child) {
                if let Node::Pair(first, rest) = &mut node {
                    todo.push(mem::replace(first, shared_nil()));
                    todo.push(mem::replace(rest, shared_nil()));
                }
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut todo = vec![(self, other)];
        while let Some((a, b)) = todo.pop() {
            match (a, b) {
                (Node::Atom(x), Node::Atom(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (Node::Pair(f1, r1), Node::Pair(f2, r2)) => {
                    if !Arc::ptr_eq(r1, r2) {
                        todo.push((&**r1, &**r2));
                    }
                    if !Arc::ptr_eq(f1, f2) {
                        todo.push((&**f1, &**f2));
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut todo = vec![self];
        while let Some(node) = todo.pop() {
            match node {
                Node::Atom(bytes) => {
                    state.write_u8(0);
                    bytes.hash(state);
                }
                Node::Pair(first, rest) => {
                    state.write_u8(1);
                    todo.push(&**rest);
                    todo.push(&**first);
                }
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl From<Vec<u8>> for Node {
    fn from(bytes: Vec<u8>) -> Self {
        Node::Atom(bytes)
    }
}

impl From<&[u8]> for Node {
    fn from(bytes: &[u8]) -> Self {
        Node::Atom(bytes.to_vec())
    }
}

fn write_atom(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = bytes.len();
    if len == 0 {
        out.push(NIL_BYTE);
        return;
    }
    if len == 1 && bytes[0] <= MAX_SINGLE_BYTE {
        out.push(bytes[0]);
        return;
    }
    // atoms past MAX_ATOM_LEN cannot be represented; callers never build them
    let len = len.min(MAX_ATOM_LEN) as u64;
    if len < 0x40 {
        out.push(0x80 | len as u8);
    } else if len < 0x2000 {
        out.extend_from_slice(&[0xc0 | (len >> 8) as u8, len as u8]);
    } else if len < 0x10_0000 {
        out.extend_from_slice(&[0xe0 | (len >> 16) as u8, (len >> 8) as u8, len as u8]);
    } else if len < 0x800_0000 {
        out.extend_from_slice(&[
            0xf0 | (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ]);
    } else {
        out.extend_from_slice(&[
            0xf8 | (len >> 32) as u8,
            (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ]);
    }
    out.extend_from_slice(bytes);
}

fn read_atom(blob: &[u8], pos: &mut usize, first: u8) -> Result<Vec<u8>, EncodingError> {
    if first <= MAX_SINGLE_BYTE {
        return Ok(vec![first]);
    }
    if first == NIL_BYTE {
        return Ok(Vec::new());
    }

    let mut bit_count = 0;
    let mut bit_mask = 0x80u8;
    let mut b = first;
    while b & bit_mask != 0 {
        bit_count += 1;
        b &= !bit_mask;
        bit_mask >>= 1;
    }
    if bit_count > 5 {
        return Err(EncodingError::Serialization("bad atom size prefix"));
    }

    let extra = blob
        .get(*pos..*pos + bit_count - 1)
        .ok_or(EncodingError::Serialization("truncated atom size"))?;
    *pos += bit_count - 1;
    let size = extra
        .iter()
        .fold(u64::from(b), |acc, byte| (acc << 8) | u64::from(*byte)) as usize;
    if size > MAX_ATOM_LEN {
        return Err(EncodingError::Serialization("atom too large"));
    }

    let bytes = blob
        .get(*pos..*pos + size)
        .ok_or(EncodingError::Serialization("truncated atom"))?;
    *pos += size;
    Ok(bytes.to_vec())
}

/// Minimal signed big-endian two's complement. Zero is the empty atom.
pub fn int_to_atom(value: i128) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

pub fn atom_to_int(atom: &[u8]) -> Result<i128, EncodingError> {
    if atom.is_empty() {
        return Ok(0);
    }
    if atom.len() > 16 {
        return Err(EncodingError::IntegerOverflow(atom.len()));
    }
    let mut buf = if atom[0] & 0x80 != 0 {
        [0xffu8; 16]
    } else {
        [0u8; 16]
    };
    buf[16 - atom.len()..].copy_from_slice(atom);
    Ok(i128::from_be_bytes(buf))
}
