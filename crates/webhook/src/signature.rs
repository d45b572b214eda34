//! HMAC-SHA-256 signature verification (spec §4.1, §6). Returns the
//! verified body so callers can't parse before verifying — there is no
//! window between "signature checked" and "bytes parsed".

use bridge_common::{BridgeError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

pub fn verify<'a>(body: &'a [u8], signature_header: &str, secret: &[u8]) -> Result<&'a [u8]> {
    let Some(provided_hex) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return Err(BridgeError::Unauthorized("signature header missing sha256= prefix".to_string()));
    };
    let provided = hex::decode(provided_hex)
        .map_err(|_| BridgeError::Unauthorized("signature header is not valid hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| BridgeError::Internal(format!("invalid HMAC key: {e}")))?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let expected = expected.as_slice();

    let matches = expected.len() == provided.len() && expected.ct_eq(&provided).unwrap_u8() == 1;
    if !matches {
        return Err(BridgeError::Unauthorized("signature does not match".to_string()));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_valid_signature() {
        let secret = b"shared-secret";
        let body = b"{\"type\":\"crawl.started\"}";
        let header = sign(body, secret);
        assert!(verify(body, &header, secret).is_ok());
    }

    #[test]
    fn rejects_a_single_altered_bit() {
        let secret = b"shared-secret";
        let body = b"{\"type\":\"crawl.started\"}";
        let header = sign(body, secret);
        let mut tampered = body.to_vec();
        tampered[5] ^= 0x01;
        assert!(verify(&tampered, &header, secret).is_err());
    }

    #[test]
    fn rejects_missing_prefix() {
        let err = verify(b"body", "deadbeef", b"secret").unwrap_err();
        assert!(matches!(err, BridgeError::Unauthorized(_)));
    }

    #[test]
    fn rejects_non_hex_signature() {
        let err = verify(b"body", "sha256=not-hex", b"secret").unwrap_err();
        assert!(matches!(err, BridgeError::Unauthorized(_)));
    }

    #[test]
    fn rejects_signature_from_a_different_secret() {
        let body = b"payload";
        let header = sign(body, b"secret-a");
        assert!(verify(body, &header, b"secret-b").is_err());
    }
}
