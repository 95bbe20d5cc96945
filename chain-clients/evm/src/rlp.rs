//! RLP encoding for legacy (EIP-155) EVM transactions.

use ethereum_types::U256;

/// Big-endian bytes of an integer with leading zeros stripped (RLP integer form).
pub fn encode_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Same as [`encode_u64`] for 256-bit values.
pub fn encode_u256(value: U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// RLP-encodes a single byte string.
pub fn encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() <= 55 {
        let mut out = vec![0x80 + data.len() as u8];
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = encode_u64(data.len() as u64);
        let mut out = vec![0xb7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// RLP-encodes a list of raw byte strings (each item is encoded with [`encode_item`]).
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.iter().flat_map(|item| encode_item(item)).collect();

    let mut out = if payload.len() <= 55 {
        vec![0xc0 + payload.len() as u8]
    } else {
        let len_bytes = encode_u64(payload.len() as u64);
        let mut prefix = vec![0xf7 + len_bytes.len() as u8];
        prefix.extend_from_slice(&len_bytes);
        prefix
    };
    out.extend(payload);
    out
}

/// Unsigned legacy transaction.
#[derive(Debug, Clone)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn fields(&self) -> Vec<Vec<u8>> {
        vec![
            encode_u64(self.nonce),
            encode_u256(self.gas_price),
            encode_u64(self.gas_limit),
            self.to.to_vec(),
            encode_u256(self.value),
            self.data.clone(),
        ]
    }

    /// EIP-155 signing payload: `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut items = self.fields();
        items.push(encode_u64(self.chain_id));
        items.push(vec![]);
        items.push(vec![]);
        encode_list(&items)
    }

    /// Signed raw transaction: `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`.
    pub fn encode_signed(&self, recovery_id: u8, r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
        let v = recovery_id as u64 + self.chain_id * 2 + 35;
        let mut items = self.fields();
        items.push(encode_u64(v));
        items.push(trim_leading_zeros(r));
        items.push(trim_leading_zeros(s));
        encode_list(&items)
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
