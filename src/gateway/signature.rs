use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 over `"{gateway_order_id}|{gateway_payment_id}"`,
/// the digest the gateway sends back in its payment callback.
pub fn payment_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    secret: &str,
) -> String {
    // HMAC-SHA256 accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of the supplied signature against the expected
/// digest via `Mac::verify_slice`.
pub fn verify_payment_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    supplied: &str,
    secret: &str,
) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());

    let Ok(sig_bytes) = hex::decode(supplied) else {
        return false;
    };
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key";

    #[test]
    fn digest_is_deterministic() {
        let a = payment_signature("order_abc", "pay_xyz", SECRET);
        let b = payment_signature("order_abc", "pay_xyz", SECRET);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(verify_payment_signature("order_abc", "pay_xyz", &a, SECRET));
    }

    #[test]
    fn any_single_character_flip_fails_verification() {
        let sig = payment_signature("order_abc", "pay_xyz", SECRET);
        for i in 0..sig.len() {
            let mut flipped: Vec<char> = sig.chars().collect();
            flipped[i] = if flipped[i] == '0' { '1' } else { '0' };
            let flipped: String = flipped.into_iter().collect();
            if flipped == sig {
                continue;
            }
            assert!(
                !verify_payment_signature("order_abc", "pay_xyz", &flipped, SECRET),
                "flipped digit {i} should not verify"
            );
        }
    }

    #[test]
    fn different_inputs_or_secret_fail_verification() {
        let sig = payment_signature("order_abc", "pay_xyz", SECRET);
        assert!(!verify_payment_signature("order_abc", "pay_other", &sig, SECRET));
        assert!(!verify_payment_signature("order_other", "pay_xyz", &sig, SECRET));
        assert!(!verify_payment_signature("order_abc", "pay_xyz", &sig, "wrong"));
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert!(!verify_payment_signature("o", "p", "not hex at all", SECRET));
        assert!(!verify_payment_signature("o", "p", "", SECRET));
    }
}
