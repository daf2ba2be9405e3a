//! The sealed wire envelope, `SecureEnvelope`, and its canonical signing
//! byte layout.
//!
//! Two encodings are supported: a compact, length-prefixed binary form
//! (preferred for native clients) and a JSON form with base64 byte fields,
//! field names `keyId, nonce, ciphertext, tag, signature, timestamp,
//! sequenceNumber`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::varint::{read_varint, write_varint};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureEnvelope {
    pub key_id: String,
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
    pub signature: Vec<u8>,
    pub timestamp_ms: i64,
    pub sequence_number: i64,
}

impl SecureEnvelope {
    /// The exact byte layout signatures are computed over:
    ///
    /// `key_id_length_varint ‖ key_id_utf8 ‖ nonce ‖ ciphertext ‖ tag ‖
    /// timestamp_ms (8B LE) ‖ sequence_number (8B LE)`
    pub fn canonical_signing_bytes(&self) -> Vec<u8> {
        let key_id_bytes = self.key_id.as_bytes();
        let mut out = Vec::with_capacity(
            10 + key_id_bytes.len() + NONCE_LEN + self.ciphertext.len() + TAG_LEN + 16,
        );
        write_varint(key_id_bytes.len() as u64, &mut out);
        out.extend_from_slice(key_id_bytes);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.extend_from_slice(&self.sequence_number.to_le_bytes());
        out
    }

    /// Compact binary encoding: every variable-length field is length
    /// prefixed with a varint; fixed-length fields (`nonce`, `tag`,
    /// `timestamp_ms`, `sequence_number`) are emitted raw.
    pub fn encode_compact(&self) -> Vec<u8> {
        let key_id_bytes = self.key_id.as_bytes();
        let mut out = Vec::new();
        write_varint(key_id_bytes.len() as u64, &mut out);
        out.extend_from_slice(key_id_bytes);
        out.extend_from_slice(&self.nonce);
        write_varint(self.ciphertext.len() as u64, &mut out);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        write_varint(self.signature.len() as u64, &mut out);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.extend_from_slice(&self.sequence_number.to_le_bytes());
        out
    }

    pub fn decode_compact(input: &[u8]) -> Result<Self, CodecError> {
        let mut offset = 0usize;

        let (key_id_len, consumed) =
            read_varint(&input[offset..]).ok_or(CodecError::Truncated)?;
        offset += consumed;
        let key_id_len = key_id_len as usize;
        let key_id = String::from_utf8(
            input
                .get(offset..offset + key_id_len)
                .ok_or(CodecError::Truncated)?
                .to_vec(),
        )
        .map_err(|_| CodecError::InvalidField("key_id not valid utf8"))?;
        offset += key_id_len;

        let nonce: [u8; NONCE_LEN] = input
            .get(offset..offset + NONCE_LEN)
            .ok_or(CodecError::Truncated)?
            .try_into()
            .unwrap();
        offset += NONCE_LEN;

        let (ct_len, consumed) = read_varint(&input[offset..]).ok_or(CodecError::Truncated)?;
        offset += consumed;
        let ciphertext = input
            .get(offset..offset + ct_len as usize)
            .ok_or(CodecError::Truncated)?
            .to_vec();
        offset += ct_len as usize;

        let tag: [u8; TAG_LEN] = input
            .get(offset..offset + TAG_LEN)
            .ok_or(CodecError::Truncated)?
            .try_into()
            .unwrap();
        offset += TAG_LEN;

        let (sig_len, consumed) = read_varint(&input[offset..]).ok_or(CodecError::Truncated)?;
        offset += consumed;
        let signature = input
            .get(offset..offset + sig_len as usize)
            .ok_or(CodecError::Truncated)?
            .to_vec();
        offset += sig_len as usize;

        let timestamp_ms = i64::from_le_bytes(
            input
                .get(offset..offset + 8)
                .ok_or(CodecError::Truncated)?
                .try_into()
                .unwrap(),
        );
        offset += 8;

        let sequence_number = i64::from_le_bytes(
            input
                .get(offset..offset + 8)
                .ok_or(CodecError::Truncated)?
                .try_into()
                .unwrap(),
        );

        Ok(Self {
            key_id,
            nonce,
            ciphertext,
            tag,
            signature,
            timestamp_ms,
            sequence_number,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeWire {
    key_id: String,
    nonce: String,
    ciphertext: String,
    tag: String,
    signature: String,
    timestamp: i64,
    sequence_number: i64,
}

impl From<&SecureEnvelope> for EnvelopeWire {
    fn from(e: &SecureEnvelope) -> Self {
        Self {
            key_id: e.key_id.clone(),
            nonce: URL_SAFE_NO_PAD.encode(e.nonce),
            ciphertext: URL_SAFE_NO_PAD.encode(&e.ciphertext),
            tag: URL_SAFE_NO_PAD.encode(e.tag),
            signature: URL_SAFE_NO_PAD.encode(&e.signature),
            timestamp: e.timestamp_ms,
            sequence_number: e.sequence_number,
        }
    }
}

impl SecureEnvelope {
    pub fn encode_json(&self) -> Result<Vec<u8>, CodecError> {
        let wire = EnvelopeWire::from(self);
        serde_json::to_vec(&wire).map_err(CodecError::Serde)
    }

    pub fn decode_json(input: &[u8]) -> Result<Self, CodecError> {
        let wire: EnvelopeWire = serde_json::from_slice(input).map_err(CodecError::Serde)?;
        let nonce: [u8; NONCE_LEN] = URL_SAFE_NO_PAD
            .decode(&wire.nonce)
            .map_err(|_| CodecError::InvalidField("nonce not valid base64"))?
            .try_into()
            .map_err(|_| CodecError::InvalidField("nonce wrong length"))?;
        let tag: [u8; TAG_LEN] = URL_SAFE_NO_PAD
            .decode(&wire.tag)
            .map_err(|_| CodecError::InvalidField("tag not valid base64"))?
            .try_into()
            .map_err(|_| CodecError::InvalidField("tag wrong length"))?;
        let ciphertext = URL_SAFE_NO_PAD
            .decode(&wire.ciphertext)
            .map_err(|_| CodecError::InvalidField("ciphertext not valid base64"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(&wire.signature)
            .map_err(|_| CodecError::InvalidField("signature not valid base64"))?;

        Ok(Self {
            key_id: wire.key_id,
            nonce,
            ciphertext,
            tag,
            signature,
            timestamp_ms: wire.timestamp,
            sequence_number: wire.sequence_number,
        })
    }
}
