//! Opaque access tokens.
//!
//! - [`codec`]: reversible keyed transformation (AES-256-CBC)
//! - [`claim`]: bare and full identity claims
//! - [`issuer`]: token minting
//! - [`verifier`]: token decoding and claim normalization

pub mod claim;
pub mod codec;
pub mod issuer;
pub mod verifier;

use thiserror::Error;

pub use claim::{FullClaim, TokenSubject, VerifiedIdentity};
pub use codec::{AesCbcCodec, TokenCodec};
pub use issuer::TokenIssuer;
pub use verifier::TokenVerifier;

/// Token errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not in `ivHex:cipherHex` form.
    #[error("malformed token")]
    Malformed,

    /// Hex decoding, cipher or padding failure.
    #[error("token decryption failed")]
    Decryption,

    /// Payload decoded but does not carry a usable identity.
    #[error("invalid token")]
    InvalidToken,
}
