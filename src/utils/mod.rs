//! Utility functions and helpers
//!
//! This module contains the digest backend, canonical encoding and
//! other helper functions used throughout the miner.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, digest_hex, record_id, sha256_digest, DigestBackend, Sha256Backend,
    DIGEST_LEN,
};

pub use serialization::{canonical_bytes, encode_value, to_pretty_json};
