//! Form nonces
//!
//! A nonce is `blake3(secret || 0x00 || action)` as hex. Forms embed it in a
//! hidden field; the save path refuses submissions whose nonce does not match.

/// Hidden form field carrying the editor nonce
pub const EDITOR_NONCE_FIELD: &str = "reference_nonce";

/// Action name the editor nonce is bound to
pub const EDITOR_NONCE_ACTION: &str = "postrefs/editor";

/// Issues and verifies action-bound nonces
#[derive(Debug, Clone)]
pub struct NonceIssuer {
    secret: String,
}

impl NonceIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn issue(&self, action: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(&[0]);
        hasher.update(action.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    pub fn verify(&self, action: &str, nonce: &str) -> bool {
        let expected = self.issue(action);
        expected.len() == nonce.len()
            && expected
                .bytes()
                .zip(nonce.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}
