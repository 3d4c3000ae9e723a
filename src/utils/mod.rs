//! Utility functions and helpers
//!
//! Digests, base58, ECDSA primitives and the bincode codec shared by the rest of the crate.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, ecdsa_p256_sha256_sign, ecdsa_p256_sha256_verify,
    new_key_pair, ripemd160_digest, sha256_digest, DIGEST_LEN,
};

pub use serialization::{deserialize, deserialize_exact, serialize};
