//! Solana transaction wire format, just enough to sign.
//!
//! Layout:
//!   compact-u16 signature count
//!   64-byte signatures
//!   message
//!
//! A message whose first byte has the high bit set is versioned (only v0
//! exists); the three-byte header follows the version byte. Otherwise the
//! message is legacy and starts with the header. The header is
//! `[num_required_signatures, num_readonly_signed, num_readonly_unsigned]`
//! and is followed by a compact-u16 account count and the 32-byte account
//! keys. The first `num_required_signatures` keys are the signers, in
//! signature-slot order.

use crate::TxError;
use ed25519_dalek::{Signer, SigningKey};

pub const SIGNATURE_LEN: usize = 64;
pub const PUBKEY_LEN: usize = 32;

const VERSION_PREFIX: u8 = 0x80;

/// A parsed transaction. The message bytes are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolanaTransaction {
    signatures: Vec<[u8; SIGNATURE_LEN]>,
    message: Vec<u8>,
    version: Option<u8>,
    num_required_signatures: u8,
    account_keys: Vec<[u8; PUBKEY_LEN]>,
}

impl SolanaTransaction {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let (sig_count, mut offset) = decode_compact_u16(bytes, 0)?;
        let sig_count = sig_count as usize;

        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            let sig = read_array::<SIGNATURE_LEN>(bytes, offset, "signature")?;
            signatures.push(sig);
            offset += SIGNATURE_LEN;
        }

        let message = bytes[offset..].to_vec();
        let (version, header_at) = match message.first() {
            None => return Err(TxError::Parse("missing message".into())),
            Some(&b) if b & VERSION_PREFIX != 0 => {
                let v = b & !VERSION_PREFIX;
                if v != 0 {
                    return Err(TxError::Parse(format!("unsupported message version {v}")));
                }
                (Some(v), 1)
            }
            Some(_) => (None, 0),
        };

        let header = message
            .get(header_at..header_at + 3)
            .ok_or_else(|| TxError::Parse("truncated message header".into()))?;
        let num_required_signatures = header[0];

        let (key_count, mut at) = decode_compact_u16(&message, header_at + 3)?;
        let mut account_keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            account_keys.push(read_array::<PUBKEY_LEN>(&message, at, "account key")?);
            at += PUBKEY_LEN;
        }

        if signatures.len() != num_required_signatures as usize {
            return Err(TxError::Invalid(format!(
                "{} signature slots for {} required signers",
                signatures.len(),
                num_required_signatures
            )));
        }
        if account_keys.len() < num_required_signatures as usize {
            return Err(TxError::Invalid(format!(
                "{} account keys for {} required signers",
                account_keys.len(),
                num_required_signatures
            )));
        }

        Ok(Self {
            signatures,
            message,
            version,
            num_required_signatures,
            account_keys,
        })
    }

    /// `None` for legacy messages, `Some(0)` for v0.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn signatures(&self) -> &[[u8; SIGNATURE_LEN]] {
        &self.signatures
    }

    /// Public keys that must sign, in slot order.
    pub fn signers(&self) -> &[[u8; PUBKEY_LEN]] {
        &self.account_keys[..self.num_required_signatures as usize]
    }

    /// Sign the message and write the signature into this key's slot.
    ///
    /// Other slots are left untouched, so partially signed transactions
    /// from the service keep their co-signatures.
    pub fn sign(&mut self, key: &SigningKey) -> Result<usize, TxError> {
        let pubkey = key.verifying_key().to_bytes();
        let slot = self
            .signers()
            .iter()
            .position(|k| *k == pubkey)
            .ok_or_else(|| TxError::SignerMismatch {
                expected: self
                    .signers()
                    .iter()
                    .map(|k| bs58::encode(k).into_string())
                    .collect::<Vec<_>>()
                    .join(","),
                actual: bs58::encode(pubkey).into_string(),
            })?;

        let signature = key.sign(&self.message);
        self.signatures[slot] = signature.to_bytes();
        Ok(slot)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = encode_compact_u16(self.signatures.len() as u16);
        for sig in &self.signatures {
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&self.message);
        out
    }
}

fn read_array<const N: usize>(bytes: &[u8], at: usize, what: &str) -> Result<[u8; N], TxError> {
    let slice = bytes
        .get(at..at + N)
        .ok_or_else(|| TxError::Parse(format!("truncated {what} at offset {at}")))?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

/// Decode a compact-u16 (1 to 3 bytes, 7 bits per byte, little-endian).
pub fn decode_compact_u16(bytes: &[u8], at: usize) -> Result<(u16, usize), TxError> {
    let mut value: u32 = 0;
    for i in 0..3 {
        let b = *bytes
            .get(at + i)
            .ok_or_else(|| TxError::Parse(format!("truncated length at offset {at}")))?;
        value |= ((b & 0x7f) as u32) << (7 * i);
        if b & 0x80 == 0 {
            let value = u16::try_from(value)
                .map_err(|_| TxError::Parse(format!("length {value} overflows u16")))?;
            return Ok((value, at + i + 1));
        }
    }
    Err(TxError::Parse(format!("overlong length at offset {at}")))
}

pub fn encode_compact_u16(mut value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    loop {
        let mut b = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(b);
            return out;
        }
        b |= 0x80;
        out.push(b);
    }
}
