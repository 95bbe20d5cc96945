//! Minimal Solidity ABI codec
//!
//! Encodes call data for the handful of contract functions the bridge calls and
//! decodes 32-byte words out of return data and event logs.

use anyhow::{Context, Result};
use chain_clients_common::{normalize_evm_address, strip_0x};
use ethereum_types::U256;
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

// ============================================================================
// SIGNATURE HASHING
// ============================================================================

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// 4-byte function selector for a canonical signature such as `approve(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Event topic (keccak256 of the canonical event signature) as `0x`-prefixed hex.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Left-padded 32-byte topic for an indexed integer parameter.
pub fn u256_topic(value: U256) -> String {
    format!("0x{}", hex::encode(u256_word(value)))
}

// ============================================================================
// ENCODING
// ============================================================================

/// A single ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Any `uintN`
    Uint(U256),
    /// `address`
    Address([u8; 20]),
    /// `bool`
    Bool(bool),
    /// `bytesN` (N <= 32), right-padded
    FixedBytes(Vec<u8>),
    /// `bytes`
    Bytes(Vec<u8>),
    /// `T[]`
    Array(Vec<Token>),
    /// `T[N]`
    FixedArray(Vec<Token>),
    /// `(T1, T2, ...)`
    Tuple(Vec<Token>),
}

impl Token {
    /// Parses a hex address (20 bytes, or a 32-byte padded word).
    pub fn address(value: &str) -> Result<Self> {
        Ok(Token::Address(parse_address(value)?))
    }

    /// Parses a `0x`-prefixed 32-byte value.
    pub fn bytes32(value: &str) -> Result<Self> {
        let bytes = decode_hex(value)?;
        if bytes.len() != WORD {
            anyhow::bail!("Expected 32 bytes, got {} for {}", bytes.len(), value);
        }
        Ok(Token::FixedBytes(bytes))
    }

    /// Parses arbitrary `0x`-prefixed hex into dynamic `bytes`.
    pub fn bytes_hex(value: &str) -> Result<Self> {
        Ok(Token::Bytes(decode_hex(value)?))
    }

    pub fn uint(value: impl Into<U256>) -> Self {
        Token::Uint(value.into())
    }

    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::Array(_) => true,
            Token::FixedArray(items) | Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    /// Size this token occupies in the head section of its enclosing tuple.
    fn head_len(&self) -> usize {
        if self.is_dynamic() {
            return WORD;
        }
        match self {
            Token::FixedArray(items) | Token::Tuple(items) => items.iter().map(Token::head_len).sum(),
            _ => WORD,
        }
    }
}

/// Parses a hex address (20 bytes, or a 32-byte padded word) into raw bytes.
pub fn parse_address(value: &str) -> Result<[u8; 20]> {
    let normalized = normalize_evm_address(value)?;
    let bytes = hex::decode(strip_0x(&normalized)).context("Invalid address hex")?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn u256_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn usize_word(value: usize) -> [u8; 32] {
    u256_word(U256::from(value))
}

fn padded(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let padding = (WORD - data.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(value) => u256_word(*value).to_vec(),
        Token::Address(addr) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr);
            word.to_vec()
        }
        Token::Bool(flag) => u256_word(U256::from(*flag as u8)).to_vec(),
        Token::FixedBytes(bytes) => {
            let mut word = [0u8; 32];
            let len = bytes.len().min(WORD);
            word[..len].copy_from_slice(&bytes[..len]);
            word.to_vec()
        }
        Token::Bytes(bytes) => {
            let mut out = usize_word(bytes.len()).to_vec();
            out.extend(padded(bytes));
            out
        }
        Token::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode(items));
            out
        }
        Token::FixedArray(items) | Token::Tuple(items) => encode(items),
    }
}

/// ABI-encodes a sequence of tokens as a tuple (head/tail layout).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_size: usize = tokens.iter().map(Token::head_len).sum();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(head_size + tail.len()));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

/// Builds `0x`-prefixed call data: selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> String {
    let mut data = selector(signature).to_vec();
    data.extend(encode(tokens));
    format!("0x{}", hex::encode(data))
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes `0x`-prefixed (or bare) hex into bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    hex::decode(strip_0x(value)).with_context(|| format!("Invalid hex data: {}", value))
}

/// Returns the 32-byte word at `index`.
pub fn word(data: &[u8], index: usize) -> Result<&[u8]> {
    let start = index
        .checked_mul(WORD)
        .with_context(|| format!("ABI word index {} out of range", index))?;
    word_at_offset(data, start)
        .with_context(|| format!("ABI data too short: need word {}, have {} bytes", index, data.len()))
}

/// Slice `data[start..start + len]`, failing instead of overflowing.
fn slice_at(data: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    let end = start
        .checked_add(len)
        .with_context(|| format!("ABI range overflows: start {}, length {}", start, len))?;
    data.get(start..end).with_context(|| {
        format!("ABI data too short: need bytes {}..{}, have {}", start, end, data.len())
    })
}

fn word_at_offset(data: &[u8], offset: usize) -> Result<&[u8]> {
    slice_at(data, offset, WORD)
}

pub fn word_u256(data: &[u8], index: usize) -> Result<U256> {
    Ok(U256::from_big_endian(word(data, index)?))
}

/// Reads a word that must fit into a u64 (offsets, lengths, block numbers, timestamps).
pub fn word_u64(data: &[u8], index: usize) -> Result<u64> {
    let value = word_u256(data, index)?;
    if value > U256::from(u64::MAX) {
        anyhow::bail!("ABI word {} does not fit into u64: {}", index, value);
    }
    Ok(value.low_u64())
}

pub fn word_bool(data: &[u8], index: usize) -> Result<bool> {
    Ok(!word_u256(data, index)?.is_zero())
}

pub fn word_address(data: &[u8], index: usize) -> Result<String> {
    Ok(format!("0x{}", hex::encode(&word(data, index)?[12..])))
}

pub fn word_bytes32(data: &[u8], index: usize) -> Result<String> {
    Ok(format!("0x{}", hex::encode(word(data, index)?)))
}

fn offset_from_head(data: &[u8], head_index: usize) -> Result<usize> {
    let offset = word_u64(data, head_index)?;
    usize::try_from(offset).context("ABI offset overflows usize")
}

/// Length prefix of a dynamic value at `offset`. Lengths come from untrusted
/// node data and must fit into `usize`.
fn length_at(data: &[u8], offset: usize) -> Result<usize> {
    let len = U256::from_big_endian(word_at_offset(data, offset)?);
    if len > U256::from(usize::MAX as u64) {
        anyhow::bail!("ABI length {} at offset {} does not fit into usize", len, offset);
    }
    Ok(len.low_u64() as usize)
}

/// Decodes a dynamic `bytes` value whose offset is stored at `head_index`.
pub fn dynamic_bytes(data: &[u8], head_index: usize) -> Result<Vec<u8>> {
    let offset = offset_from_head(data, head_index)?;
    let len = length_at(data, offset)?;
    let start = offset
        .checked_add(WORD)
        .with_context(|| format!("ABI offset {} out of range", offset))?;
    Ok(slice_at(data, start, len)?.to_vec())
}

/// Decodes a dynamic `bytes32[]` value whose offset is stored at `head_index`.
pub fn dynamic_bytes32_array(data: &[u8], head_index: usize) -> Result<Vec<String>> {
    let offset = offset_from_head(data, head_index)?;
    let len = length_at(data, offset)?;
    let start = offset
        .checked_add(WORD)
        .with_context(|| format!("ABI offset {} out of range", offset))?;
    let size = len
        .checked_mul(WORD)
        .with_context(|| format!("ABI array length {} out of range", len))?;
    Ok(slice_at(data, start, size)?
        .chunks(WORD)
        .map(|w| format!("0x{}", hex::encode(w)))
        .collect())
}
