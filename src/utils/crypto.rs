use ring::digest::{Context, SHA256};

use crate::error::{MinerError, Result};
use crate::utils::canonical_bytes;
use data_encoding::HEXLOWER;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length in bytes of every digest the miner works with
pub const DIGEST_LEN: usize = 32;

/// Anything that can turn bytes into a 32-byte digest.
///
/// Implementations must be pure: the same input always yields the same output and
/// nothing is carried over between calls. The search loop is generic over this so a
/// hardware-backed hasher can be dropped in without touching the engine.
pub trait DigestBackend: Send + Sync {
    fn compute_digest(&self, data: &[u8]) -> [u8; DIGEST_LEN];
}

/// SHA-256 on the CPU
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Backend;

impl DigestBackend for Sha256Backend {
    fn compute_digest(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        sha256_digest(data)
    }
}

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| MinerError::Clock(format!("System time error: {e}")))?
        .as_secs();

    if duration > i64::MAX as u64 {
        return Err(MinerError::Clock("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Lowercase hex of a digest, always 64 characters
pub fn digest_hex(digest: &[u8; DIGEST_LEN]) -> String {
    HEXLOWER.encode(digest)
}

/// The id of a record: hex digest of its canonical bytes
pub fn record_id<B, T>(backend: &B, record: &T) -> Result<String>
where
    B: DigestBackend + ?Sized,
    T: Serialize + ?Sized,
{
    let bytes = canonical_bytes(record)?;
    Ok(digest_hex(&backend.compute_digest(&bytes)))
}
