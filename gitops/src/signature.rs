use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

// Create an alias for HMAC-SHA256.
type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";
const SIGNATURE_HEX_LEN: usize = 64;

/// Computes the `X-Hub-Signature-256` header value for a payload.
pub fn sign_payload(payload_body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload_body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Checks a webhook signature header against the payload.
///
/// The header must be `sha256=` followed by 64 hex characters; anything else is
/// rejected before hashing. An empty secret never verifies.
pub fn verify_signature(payload_body: &[u8], signature: &str, github_secret: &str) -> bool {
    if github_secret.is_empty() {
        log::error!("Webhook secret is not configured; rejecting signature");
        return false;
    }
    if signature.len() != SIGNATURE_PREFIX.len() + SIGNATURE_HEX_LEN
        || !signature.starts_with(SIGNATURE_PREFIX)
    {
        log::debug!("Malformed signature header");
        return false;
    }

    let computed_sig = sign_payload(payload_body, github_secret);

    computed_sig
        .as_bytes()
        .ct_eq(signature.as_bytes())
        .unwrap_u8()
        == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "It's a Secret to Everybody";
    const PAYLOAD: &[u8] = b"Hello, World!";

    #[test]
    fn test_known_signature() {
        // Example from the GitHub webhook documentation
        assert_eq!(
            sign_payload(PAYLOAD, SECRET),
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
        assert!(verify_signature(
            PAYLOAD,
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17",
            SECRET
        ));
    }

    #[test]
    fn test_mutated_payload_fails() {
        let signature = sign_payload(PAYLOAD, SECRET);
        assert!(!verify_signature(b"Hello, World?", &signature, SECRET));
    }

    #[test]
    fn test_mutated_signature_fails() {
        let mut signature = sign_payload(PAYLOAD, SECRET).into_bytes();
        let last = signature.len() - 1;
        signature[last] = if signature[last] == b'0' { b'1' } else { b'0' };
        let signature = String::from_utf8(signature).unwrap();
        assert!(!verify_signature(PAYLOAD, &signature, SECRET));
    }

    #[test]
    fn test_malformed_headers() {
        let signature = sign_payload(PAYLOAD, SECRET);
        assert!(!verify_signature(PAYLOAD, "", SECRET));
        assert!(!verify_signature(PAYLOAD, &signature[..signature.len() - 1], SECRET));
        assert!(!verify_signature(PAYLOAD, &signature.replace("sha256=", "sha1=xx"), SECRET));
        assert!(!verify_signature(PAYLOAD, &format!("{}00", signature), SECRET));
    }

    #[test]
    fn test_empty_secret_rejects() {
        let signature = sign_payload(PAYLOAD, "");
        assert!(!verify_signature(PAYLOAD, &signature, ""));
    }
}
