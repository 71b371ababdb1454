//! GitHub webhook signature verification

use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, error};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify a `sha256=<hex>` HMAC signature over the raw payload.
///
/// Fails closed: an unset or empty secret never verifies.
pub fn verify_signature(secret: Option<&str>, payload: &[u8], signature_header: &str) -> bool {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => {
            error!("Webhook secret is not set, rejecting payload");
            return false;
        }
    };

    let Some(their_hex) = signature_header.trim().strip_prefix(SIGNATURE_PREFIX) else {
        debug!("Signature header lacks the sha256= prefix");
        return false;
    };

    // GitHub sends lowercase hex; anything else is not the exact header we would produce
    if their_hex.bytes().any(|b| b.is_ascii_uppercase()) {
        debug!("Signature header is not lowercase hex");
        return false;
    }

    let their_sig = match hex_decode(their_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            debug!("Signature header is not valid hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&their_sig).is_ok()
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
