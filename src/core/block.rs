use crate::core::difficulty::DifficultyTarget;
use crate::error::Result;
use crate::utils::{canonical_bytes, digest_hex, record_id, DigestBackend, DIGEST_LEN};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Target every block of this chain is mined against
pub const CHAIN_TARGET: &str = "00000002af000000000000000000000000000000000000000000000000000000";

/// The fixed first block. It is never mined by this program and never mutated.
pub static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| Block {
    kind: RecordKind::Block,
    target: CHAIN_TARGET.to_string(),
    created: 1624219079,
    miner: "dionyziz".to_string(),
    nonce: "0000000000000000000000000000000000000000000000000000002634878840".to_string(),
    note: "The Economist 2021-06-20: Crypto-miners are probably to blame for the graphics-chip shortage".to_string(),
    previd: None,
    txids: vec![],
});

/// The `type` tag carried by every record on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Block,
    Transaction,
}

// Wire names follow the published chain format ("type", "T") so ids stay compatible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    kind: RecordKind,
    #[serde(rename = "T")]
    target: String,
    created: i64,
    miner: String,
    nonce: String,
    note: String,
    previd: Option<String>,
    txids: Vec<String>,
}

impl Block {
    /// Build an unmined block on top of `previd` carrying a single coinbase id
    pub fn new_candidate(
        previd: String,
        coinbase_id: String,
        nonce: String,
        target: &DifficultyTarget,
        created: i64,
        miner: &str,
        note: String,
    ) -> Block {
        Block {
            kind: RecordKind::Block,
            target: target.as_hex().to_string(),
            created,
            miner: miner.to_string(),
            nonce,
            note,
            previd: Some(previd),
            txids: vec![coinbase_id],
        }
    }

    pub fn genesis() -> Block {
        GENESIS_BLOCK.clone()
    }

    pub fn is_genesis(&self) -> bool {
        self.previd.is_none()
    }

    pub fn get_kind(&self) -> RecordKind {
        self.kind
    }

    pub fn get_target(&self) -> &str {
        self.target.as_str()
    }

    pub fn get_created(&self) -> i64 {
        self.created
    }

    pub fn get_miner(&self) -> &str {
        self.miner.as_str()
    }

    pub fn get_nonce(&self) -> &str {
        self.nonce.as_str()
    }

    pub fn get_note(&self) -> &str {
        self.note.as_str()
    }

    pub fn get_previd(&self) -> Option<&str> {
        self.previd.as_deref()
    }

    pub fn get_txids(&self) -> &[String] {
        self.txids.as_slice()
    }

    /// Only the search loop changes a block, and only its nonce
    pub(crate) fn set_nonce(&mut self, nonce: String) {
        self.nonce = nonce;
    }

    /// The block id: digest of its canonical encoding
    pub fn id<B: DigestBackend + ?Sized>(&self, backend: &B) -> Result<String> {
        record_id(backend, self)
    }

    /// Raw digest of the canonical encoding, used by the search loop
    pub fn digest<B: DigestBackend + ?Sized>(&self, backend: &B) -> Result<[u8; DIGEST_LEN]> {
        let bytes = canonical_bytes(self)?;
        Ok(backend.compute_digest(&bytes))
    }

    /// Recompute the id and compare it against the block's own target
    pub fn meets_own_target<B: DigestBackend + ?Sized>(&self, backend: &B) -> Result<bool> {
        let target = DifficultyTarget::from_hex(&self.target)?;
        Ok(target.is_met_by(&self.digest(backend)?))
    }

    /// Hex id derived from an already computed digest
    pub fn id_from_digest(digest: &[u8; DIGEST_LEN]) -> String {
        digest_hex(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Sha256Backend;

    #[test]
    fn test_genesis_canonical_form() {
        let bytes = canonical_bytes(&*GENESIS_BLOCK).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(&format!(r#"{{"T":"{CHAIN_TARGET}","created":1624219079,"#)));
        assert!(text.ends_with(r#""previd":null,"txids":[],"type":"block"}"#));
    }

    #[test]
    fn test_genesis_meets_its_target() {
        assert_eq!(
            GENESIS_BLOCK.id(&Sha256Backend).unwrap(),
            "00000000a420b7cefa2b7730243316921ed59ffe836e111ca3801f82a4f5360e"
        );
        assert!(GENESIS_BLOCK.meets_own_target(&Sha256Backend).unwrap());
        assert!(GENESIS_BLOCK.is_genesis());
    }

    #[test]
    fn test_nonce_changes_id() {
        let backend = Sha256Backend;
        let target = DifficultyTarget::from_hex(CHAIN_TARGET).unwrap();
        let mut block = Block::new_candidate(
            GENESIS_BLOCK.id(&backend).unwrap(),
            "ab".repeat(32),
            format!("{:064x}", 1),
            &target,
            1_700_000_000,
            "tester",
            "Block 1".to_string(),
        );
        let before = block.id(&backend).unwrap();
        block.set_nonce(format!("{:064x}", 2));
        assert_ne!(before, block.id(&backend).unwrap());
        assert_eq!(
            Block::id_from_digest(&block.digest(&backend).unwrap()),
            block.id(&backend).unwrap()
        );
    }

    #[test]
    fn test_json_round_trip_keeps_null_previd() {
        let json = serde_json::to_string(&*GENESIS_BLOCK).unwrap();
        assert!(json.contains(r#""previd":null"#));
        let parsed: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, *GENESIS_BLOCK);
    }
}
