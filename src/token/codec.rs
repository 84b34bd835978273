//! Symmetric cipher codec for opaque access tokens.
//!
//! Tokens are `ivHex:cipherHex` where the cipher text is AES-256-CBC with
//! PKCS#7 padding and the key is the SHA-256 digest of the configured secret.
//! The scheme has no authentication tag: tampering is only caught by the
//! padding check or later by the claim parser.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::TokenError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256 key size (32 bytes).
const KEY_SIZE: usize = 32;

/// CBC initialization vector size (16 bytes).
const IV_SIZE: usize = 16;

/// Separator between the IV and the cipher text.
const SEPARATOR: char = ':';

/// Reversible, keyed transformation between a UTF-8 payload and a transport-safe token.
///
/// Issuer and verifier only see this trait, so replacing the cipher scheme with a
/// signed token format does not touch them.
pub trait TokenCodec: Send + Sync {
    /// Encode a plaintext payload into an opaque token.
    fn encode(&self, plaintext: &str) -> Result<String, TokenError>;

    /// Decode an opaque token back into its plaintext payload.
    fn decode(&self, token: &str) -> Result<String, TokenError>;
}

/// AES-256-CBC token codec.
#[derive(Clone)]
pub struct AesCbcCodec {
    key: [u8; KEY_SIZE],
}

impl AesCbcCodec {
    /// Create a codec whose key is derived from `secret` with SHA-256.
    pub fn new(secret: &str) -> Self {
        Self {
            key: derive_key(secret),
        }
    }
}

impl std::fmt::Debug for AesCbcCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcCodec").finish_non_exhaustive()
    }
}

/// Derive a 32-byte key from a secret using SHA-256.
fn derive_key(secret: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&result);
    key
}

impl TokenCodec for AesCbcCodec {
    fn encode(&self, plaintext: &str) -> Result<String, TokenError> {
        let mut iv = [0u8; IV_SIZE];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!(
            "{}{}{}",
            hex::encode(iv),
            SEPARATOR,
            hex::encode(ciphertext)
        ))
    }

    fn decode(&self, token: &str) -> Result<String, TokenError> {
        let (iv_hex, cipher_hex) = token.split_once(SEPARATOR).ok_or(TokenError::Malformed)?;
        if iv_hex.is_empty() || cipher_hex.is_empty() {
            return Err(TokenError::Malformed);
        }

        let iv = hex::decode(iv_hex).map_err(|_| TokenError::Decryption)?;
        let ciphertext = hex::decode(cipher_hex).map_err(|_| TokenError::Decryption)?;

        let cipher =
            Aes256CbcDec::new_from_slices(&self.key, &iv).map_err(|_| TokenError::Decryption)?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| TokenError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| TokenError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-token-secret";

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = AesCbcCodec::new(SECRET);
        let token = codec.encode(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), r#"{"id":"abc"}"#);
    }

    #[test]
    fn test_token_format() {
        let codec = AesCbcCodec::new(SECRET);
        let token = codec.encode("hello").unwrap();

        let (iv, ct) = token.split_once(':').unwrap();
        assert_eq!(iv.len(), IV_SIZE * 2);
        // "hello" pads to a single 16-byte block
        assert_eq!(ct.len(), 32);
        assert!(token
            .chars()
            .all(|c| c == ':' || (c.is_ascii_hexdigit() && !c.is_ascii_uppercase())));
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let codec = AesCbcCodec::new(SECRET);
        let a = codec.encode("same payload").unwrap();
        let b = codec.encode("same payload").unwrap();

        assert_ne!(a, b);
        assert_ne!(a.split_once(':').unwrap().0, b.split_once(':').unwrap().0);
    }

    #[test]
    fn test_empty_plaintext() {
        let codec = AesCbcCodec::new(SECRET);
        let token = codec.encode("").unwrap();
        assert_eq!(codec.decode(&token).unwrap(), "");
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        let codec = AesCbcCodec::new(SECRET);
        assert!(matches!(
            codec.decode("00112233445566778899aabbccddeeff"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(codec.decode(""), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_empty_half_is_malformed() {
        let codec = AesCbcCodec::new(SECRET);
        assert!(matches!(codec.decode(":abcd"), Err(TokenError::Malformed)));
        assert!(matches!(
            codec.decode("00112233445566778899aabbccddeeff:"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(codec.decode(":"), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_non_hex_is_decryption_error() {
        let codec = AesCbcCodec::new(SECRET);
        assert!(matches!(
            codec.decode("not-hex:also-not-hex"),
            Err(TokenError::Decryption)
        ));
    }

    #[test]
    fn test_bad_iv_length_is_decryption_error() {
        let codec = AesCbcCodec::new(SECRET);
        let token = codec.encode("payload").unwrap();
        let (_, ct) = token.split_once(':').unwrap();

        assert!(matches!(
            codec.decode(&format!("0011:{ct}")),
            Err(TokenError::Decryption)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_is_decryption_error() {
        let codec = AesCbcCodec::new(SECRET);
        let token = codec.encode("payload").unwrap();
        // Drop one byte so the cipher text is no longer block aligned
        let truncated = &token[..token.len() - 2];

        assert!(matches!(
            codec.decode(truncated),
            Err(TokenError::Decryption)
        ));
    }

    #[test]
    fn test_extra_separator_goes_to_cipher_half() {
        let codec = AesCbcCodec::new(SECRET);
        let token = codec.encode("payload").unwrap();

        assert!(matches!(
            codec.decode(&format!("{token}:00")),
            Err(TokenError::Decryption)
        ));
    }

    #[test]
    fn test_derive_key_is_sha256() {
        let key = derive_key("your_aes_secret_key");
        let expected = Sha256::digest("your_aes_secret_key".as_bytes());
        assert_eq!(&key[..], &expected[..]);
    }

    #[test]
    fn test_debug_hides_key() {
        let codec = AesCbcCodec::new(SECRET);
        let debug = format!("{codec:?}");
        assert!(!debug.contains("key"));
    }
}
