//! GitHub webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify an `X-Hub-Signature-256` header (`sha256=<hex>`) against `body`.
#[must_use]
pub fn verify_signature(body: &[u8], header: &str, secret: &str) -> bool {
    let Some(hex_signature) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(signature) = hex::decode(hex_signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.as_slice().ct_eq(&signature).into()
}

/// Compute the header value GitHub would send for `body`.
#[cfg(test)]
pub(crate) fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    )
}
