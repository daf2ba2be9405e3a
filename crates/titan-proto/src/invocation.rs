//! `EncryptedInvocation` — the plaintext carried inside a `SecureEnvelope`
//! that targets the gateway.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::varint::{read_varint, write_varint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInvocation {
    pub target: String,
    pub payload: Vec<u8>,
}

impl EncryptedInvocation {
    pub fn encode_compact(&self) -> Vec<u8> {
        let target_bytes = self.target.as_bytes();
        let mut out = Vec::with_capacity(target_bytes.len() + self.payload.len() + 10);
        write_varint(target_bytes.len() as u64, &mut out);
        out.extend_from_slice(target_bytes);
        out.extend_from_slice(&self.payload);
        out
    }

    fn decode_compact(input: &[u8]) -> Result<Self, CodecError> {
        let (target_len, consumed) = read_varint(input).ok_or(CodecError::Truncated)?;
        let target_len = target_len as usize;
        let target_bytes = input
            .get(consumed..consumed + target_len)
            .ok_or(CodecError::Truncated)?;
        let target = std::str::from_utf8(target_bytes)
            .map_err(|_| CodecError::InvalidField("target not valid utf8"))?
            .to_string();
        let payload = input[consumed + target_len..].to_vec();
        Ok(Self { target, payload })
    }

    fn decode_json(input: &[u8]) -> Result<Self, CodecError> {
        let wire: InvocationWire = serde_json::from_slice(input).map_err(CodecError::Serde)?;
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let payload = URL_SAFE_NO_PAD
            .decode(&wire.payload)
            .map_err(|_| CodecError::InvalidField("payload not valid base64"))?;
        Ok(Self { target: wire.target, payload })
    }

    pub fn encode_json(&self) -> Result<Vec<u8>, CodecError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let wire = InvocationWire {
            target: self.target.clone(),
            payload: URL_SAFE_NO_PAD.encode(&self.payload),
        };
        serde_json::to_vec(&wire).map_err(CodecError::Serde)
    }
}

#[derive(Serialize, Deserialize)]
struct InvocationWire {
    target: String,
    payload: String,
}

/// Try the compact binary form first, falling back to JSON — the ingress
/// contract the gateway relies on.
pub fn decode_invocation(input: &[u8]) -> Result<EncryptedInvocation, CodecError> {
    if let Ok(inv) = EncryptedInvocation::decode_compact(input) {
        if std::str::from_utf8(inv.target.as_bytes()).is_ok() {
            return Ok(inv);
        }
    }
    EncryptedInvocation::decode_json(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_round_trip() {
        let inv = EncryptedInvocation {
            target: "ping".to_string(),
            payload: b"hello".to_vec(),
        };
        let encoded = inv.encode_compact();
        let decoded = decode_invocation(&encoded).unwrap();
        assert_eq!(inv, decoded);
    }

    #[test]
    fn json_round_trip() {
        let inv = EncryptedInvocation {
            target: "ping".to_string(),
            payload: b"hello".to_vec(),
        };
        let encoded = inv.encode_json().unwrap();
        let decoded = EncryptedInvocation::decode_json(&encoded).unwrap();
        assert_eq!(inv, decoded);
    }
}
