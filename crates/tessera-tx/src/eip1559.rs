//! EIP-1559 (type 0x02) transactions.
//!
//! Signing hash:
//!   keccak256(0x02 || rlp([chain_id, nonce, max_priority_fee_per_gas,
//!                          max_fee_per_gas, gas_limit, to, value, data,
//!                          access_list]))
//!
//! Signed envelope: 0x02 || rlp([...same nine fields, y_parity, r, s]).
//! The access list is always empty.

use crate::quantity::trim_be;
use crate::TxError;
use k256::ecdsa::{Signature, SigningKey};
use rlp::RlpStream;
use tessera_crypto::keccak256;

/// EIP-2718 type byte for fee-market transactions.
pub const EIP1559_TX_TYPE: u8 = 0x02;

const UNSIGNED_FIELDS: usize = 9;
const SIGNED_FIELDS: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    /// `None` for contract creation.
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub data: Vec<u8>,
}

/// A signed envelope and its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEip1559 {
    pub raw: Vec<u8>,
    pub y_parity: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl SignedEip1559 {
    /// `0x`-prefixed hex of the raw envelope, as `eth_sendRawTransaction` takes it.
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    /// Transaction hash: keccak256 of the envelope.
    pub fn tx_hash(&self) -> [u8; 32] {
        keccak256(&self.raw)
    }
}

impl Eip1559Transaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&trim_be(self.chain_id as u128));
        stream.append(&trim_be(self.nonce as u128));
        stream.append(&trim_be(self.max_priority_fee_per_gas));
        stream.append(&trim_be(self.max_fee_per_gas));
        stream.append(&trim_be(self.gas_limit as u128));
        stream.append(&self.to.map(|a| a.to_vec()).unwrap_or_default());
        stream.append(&trim_be(self.value));
        stream.append(&self.data);
        stream.begin_list(0);
    }

    /// RLP payload the signature commits to, type byte included.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(UNSIGNED_FIELDS);
        self.append_fields(&mut stream);
        let mut out = vec![EIP1559_TX_TYPE];
        out.extend_from_slice(&stream.out());
        out
    }

    pub fn signature_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    /// Sign with RFC 6979 deterministic ECDSA. The signature is low-S.
    pub fn sign(&self, key: &SigningKey) -> Result<SignedEip1559, TxError> {
        if self.max_priority_fee_per_gas > self.max_fee_per_gas {
            return Err(TxError::Invalid(
                "max priority fee exceeds max fee per gas".into(),
            ));
        }

        let hash = self.signature_hash();
        let (signature, recovery_id): (Signature, _) = key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| TxError::Signing(e.to_string()))?;

        let (r_bytes, s_bytes) = signature.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);
        let y_parity = u8::from(recovery_id.is_y_odd());

        let mut stream = RlpStream::new_list(SIGNED_FIELDS);
        self.append_fields(&mut stream);
        stream.append(&trim_be(y_parity as u128));
        stream.append(&trim_leading_zeros(&r));
        stream.append(&trim_leading_zeros(&s));

        let mut raw = vec![EIP1559_TX_TYPE];
        raw.extend_from_slice(&stream.out());

        Ok(SignedEip1559 { raw, y_parity, r, s })
    }
}

/// 256-bit scalars are RLP integers too: no leading zero bytes.
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}
