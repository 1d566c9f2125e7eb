// The ledger owns the accepted blocks and their coinbase transactions
// blocks[0] is always the genesis block and coinbase[i] pays for blocks[i + 1]

use crate::core::block::GENESIS_BLOCK;
use crate::core::progress::ProgressObserver;
use crate::core::proof_of_work::{ProofOfWork, SearchOutcome};
use crate::core::session::MiningSession;
use crate::core::{Block, RecordKind, Transaction};
use crate::error::{MinerError, Result};
use crate::storage::ChainStore;
use crate::utils::{current_timestamp, DigestBackend, Sha256Backend};
use log::{debug, info, warn};

// Consecutive exhausted searches tolerated before giving up
const MAX_EXHAUSTED_RETRIES: usize = 3;

/// An unmined block together with the coinbase it commits to.
///
/// Nothing is recorded in the ledger until the block is accepted, so an abandoned
/// candidate leaves no trace.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub block: Block,
    pub coinbase: Transaction,
    pub coinbase_id: String,
    pub height: u64,
}

pub struct ChainLedger {
    blocks: Vec<Block>,
    coinbase: Vec<Transaction>,
    tip_id: String,
    backend: Box<dyn DigestBackend>,
}

impl ChainLedger {
    /// A ledger holding only the genesis block
    pub fn new() -> Result<ChainLedger> {
        Self::with_backend(Box::new(Sha256Backend))
    }

    pub fn with_backend(backend: Box<dyn DigestBackend>) -> Result<ChainLedger> {
        let tip_id = GENESIS_BLOCK.id(backend.as_ref())?;
        Ok(ChainLedger {
            blocks: vec![Block::genesis()],
            coinbase: vec![],
            tip_id,
            backend,
        })
    }

    /// Load both sequences from the store, or start from genesis when it is empty
    pub fn restore(store: &dyn ChainStore) -> Result<ChainLedger> {
        Self::restore_with_backend(store, Box::new(Sha256Backend))
    }

    pub fn restore_with_backend(
        store: &dyn ChainStore,
        backend: Box<dyn DigestBackend>,
    ) -> Result<ChainLedger> {
        let snapshot = match store.load()? {
            Some(snapshot) => snapshot,
            None => {
                info!("No saved chain found, starting from the genesis block");
                return Self::with_backend(backend);
            }
        };

        let blocks = snapshot.blocks;
        let mut coinbase = snapshot.coinbase;
        Self::drop_unconfirmed_coinbase(&blocks, &mut coinbase, backend.as_ref())?;

        let tip_id = validate_chain(&blocks, &coinbase, backend.as_ref())?;
        info!("Restored chain of {} blocks, tip {tip_id}", blocks.len());
        Ok(ChainLedger {
            blocks,
            coinbase,
            tip_id,
            backend,
        })
    }

    // A crash between the two renames in the file store leaves the coinbase of a
    // block that never reached disk at the end of the list. That one shape is repaired.
    fn drop_unconfirmed_coinbase(
        blocks: &[Block],
        coinbase: &mut Vec<Transaction>,
        backend: &dyn DigestBackend,
    ) -> Result<()> {
        if blocks.is_empty() || coinbase.len() != blocks.len() {
            return Ok(());
        }
        let Some(last) = coinbase.last() else {
            return Ok(());
        };
        let orphan_id = last.id(backend)?;
        let referenced = blocks
            .iter()
            .any(|block| block.get_txids().iter().any(|txid| *txid == orphan_id));
        if last.get_height() == blocks.len() as u64 && !referenced {
            warn!(
                "Dropping coinbase {orphan_id} for height {}: its block was never saved",
                last.get_height()
            );
            coinbase.pop();
        }
        Ok(())
    }

    /// Build the next block to mine and its reward transaction
    pub fn build_candidate(&self, session: &MiningSession) -> Result<Candidate> {
        let height = self.blocks.len() as u64;
        let coinbase =
            Transaction::new_coinbase_tx(height, session.reward(), session.reward_pubkey());
        let coinbase_id = coinbase.id(self.backend.as_ref())?;

        let block = Block::new_candidate(
            self.tip_id.clone(),
            coinbase_id.clone(),
            session.origin_hex(),
            session.target(),
            current_timestamp()?,
            session.miner(),
            session.note_for(height),
        );
        debug!("Built candidate for height {height} on top of {}", self.tip_id);

        Ok(Candidate {
            block,
            coinbase,
            coinbase_id,
            height,
        })
    }

    /// Append a mined block and its coinbase, checking every chain invariant first
    pub fn accept(&mut self, block: Block, coinbase: Transaction) -> Result<String> {
        let height = self.blocks.len() as u64;

        if block.get_kind() != RecordKind::Block {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Record at height {height} is not a block"
            )));
        }
        if block.get_previd() != Some(self.tip_id.as_str()) {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Block previd {:?} does not match tip {}",
                block.get_previd(),
                self.tip_id
            )));
        }
        coinbase.validate_coinbase(height)?;
        let coinbase_id = coinbase.id(self.backend.as_ref())?;
        if block.get_txids() != [coinbase_id.clone()] {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Block txids {:?} do not commit to coinbase {coinbase_id}",
                block.get_txids()
            )));
        }
        if !block.meets_own_target(self.backend.as_ref())? {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Block at height {height} does not satisfy target {}",
                block.get_target()
            )));
        }

        let id = block.id(self.backend.as_ref())?;
        self.blocks.push(block);
        self.coinbase.push(coinbase);
        self.tip_id = id.clone();
        Ok(id)
    }

    /// Write both sequences to the store
    pub fn persist(&self, store: &dyn ChainStore) -> Result<()> {
        store.save(&self.blocks, &self.coinbase)
    }

    /// Re-run the full chain validation over the in-memory ledger
    pub fn verify(&self) -> Result<()> {
        let tip = validate_chain(&self.blocks, &self.coinbase, self.backend.as_ref())?;
        if tip != self.tip_id {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Cached tip {} differs from recomputed tip {tip}",
                self.tip_id
            )));
        }
        Ok(())
    }

    /// Build, search, accept and persist one block
    pub fn mine_next(
        &mut self,
        session: &mut MiningSession,
        store: &dyn ChainStore,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SearchOutcome> {
        let candidate = self.build_candidate(session)?;
        let height = candidate.height;
        info!(
            "Mining block {height} (expected tries: {:.0})",
            session.expected_tries()
        );

        let outcome = {
            let pow = ProofOfWork::new(
                self.backend.as_ref(),
                session.target(),
                session.update_rate(),
            );
            pow.run_parallel(
                candidate.block,
                height,
                session.expected_tries(),
                session.workers(),
                observer,
            )?
        };

        self.accept(outcome.block.clone(), candidate.coinbase)?;
        self.persist(store)?;
        session.record_block(outcome.attempts);
        info!(
            "Block {height} accepted and saved: {} ({} tries)",
            outcome.id, outcome.attempts
        );
        Ok(outcome)
    }

    /// Keep mining until the ledger holds `num_blocks` blocks; returns how many were mined
    pub fn mine(
        &mut self,
        num_blocks: usize,
        session: &mut MiningSession,
        store: &dyn ChainStore,
        observer: &mut dyn ProgressObserver,
    ) -> Result<usize> {
        let mut mined = 0;
        let mut exhausted = 0;
        while self.blocks.len() < num_blocks {
            match self.mine_next(session, store, observer) {
                Ok(_) => {
                    mined += 1;
                    exhausted = 0;
                }
                Err(e @ MinerError::SearchExhausted { .. }) => {
                    exhausted += 1;
                    if exhausted >= MAX_EXHAUSTED_RETRIES {
                        return Err(e);
                    }
                    warn!("{e}; retrying with a fresh candidate");
                    session.reseed_origin()?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(mined)
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn coinbase_transactions(&self) -> &[Transaction] {
        self.coinbase.as_slice()
    }

    pub fn tip_id(&self) -> &str {
        self.tip_id.as_str()
    }

    /// Height of the tip; the genesis block is height 0
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn backend(&self) -> &dyn DigestBackend {
        self.backend.as_ref()
    }
}

/// Check a whole chain end to end and return the id of its tip.
///
/// Recomputes every id, so nothing loaded from disk is trusted as-is.
pub fn validate_chain(
    blocks: &[Block],
    coinbase: &[Transaction],
    backend: &dyn DigestBackend,
) -> Result<String> {
    let Some(genesis) = blocks.first() else {
        return Err(MinerError::ChainInvariantViolation(
            "Chain has no genesis block".to_string(),
        ));
    };
    if *genesis != *GENESIS_BLOCK {
        return Err(MinerError::ChainInvariantViolation(
            "First block is not the genesis block".to_string(),
        ));
    }
    if coinbase.len() + 1 != blocks.len() {
        return Err(MinerError::ChainInvariantViolation(format!(
            "{} blocks but {} coinbase transactions",
            blocks.len(),
            coinbase.len()
        )));
    }

    let mut prev_id = genesis.id(backend)?;
    for (i, block) in blocks.iter().enumerate().skip(1) {
        let tx = &coinbase[i - 1];
        check_block(i as u64, block, tx, &prev_id, backend)
            .map_err(|e| invariant(i, e))?;
        prev_id = block.id(backend)?;
    }
    Ok(prev_id)
}

fn check_block(
    height: u64,
    block: &Block,
    tx: &Transaction,
    prev_id: &str,
    backend: &dyn DigestBackend,
) -> Result<()> {
    if block.get_kind() != RecordKind::Block || block.is_genesis() {
        return Err(MinerError::ChainInvariantViolation(
            "not a mined block".to_string(),
        ));
    }
    if block.get_previd() != Some(prev_id) {
        return Err(MinerError::ChainInvariantViolation(format!(
            "previd {:?} does not match {prev_id}",
            block.get_previd()
        )));
    }
    if !block.meets_own_target(backend)? {
        return Err(MinerError::ChainInvariantViolation(format!(
            "id does not satisfy target {}",
            block.get_target()
        )));
    }
    tx.validate_coinbase(height)?;
    let tx_id = tx.id(backend)?;
    if block.get_txids() != [tx_id.clone()] {
        return Err(MinerError::ChainInvariantViolation(format!(
            "txids {:?} do not match coinbase {tx_id}",
            block.get_txids()
        )));
    }
    Ok(())
}

// Anything wrong with a loaded block, malformed hex included, is an invariant violation
fn invariant(index: usize, err: MinerError) -> MinerError {
    match err {
        MinerError::ChainInvariantViolation(msg) | MinerError::MalformedHex(msg) => {
            MinerError::ChainInvariantViolation(format!("block {index}: {msg}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinerConfig;
    use crate::core::difficulty::max_search_value;
    use crate::core::progress::SilentProgress;
    use crate::storage::MemoryStore;
    use num_bigint::BigUint;

    const LOOSEST: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

    fn loose_session() -> MiningSession {
        let config = MinerConfig {
            target: LOOSEST.to_string(),
            ..MinerConfig::default()
        };
        MiningSession::with_start_time(&config, 1_700_000_000).unwrap()
    }

    #[test]
    fn test_new_ledger_is_genesis_only() {
        let ledger = ChainLedger::new().unwrap();
        assert_eq!(ledger.blocks().len(), 1);
        assert!(ledger.coinbase_transactions().is_empty());
        assert_eq!(ledger.height(), 0);
        assert_eq!(
            ledger.tip_id(),
            "00000000a420b7cefa2b7730243316921ed59ffe836e111ca3801f82a4f5360e"
        );
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_build_candidate_leaves_ledger_untouched() {
        let ledger = ChainLedger::new().unwrap();
        let session = loose_session();
        let candidate = ledger.build_candidate(&session).unwrap();

        assert_eq!(candidate.height, 1);
        assert_eq!(candidate.coinbase.get_height(), 1);
        assert_eq!(candidate.block.get_previd(), Some(ledger.tip_id()));
        assert_eq!(candidate.block.get_txids(), [candidate.coinbase_id.clone()]);
        assert_eq!(candidate.block.get_nonce(), session.origin_hex());
        assert_eq!(candidate.block.get_target(), LOOSEST);
        assert_eq!(candidate.block.get_note(), "Block 1, group 6 will rule");
        assert!(ledger.coinbase_transactions().is_empty());
    }

    #[test]
    fn test_accept_appends_block_and_coinbase() {
        let mut ledger = ChainLedger::new().unwrap();
        let genesis_id = ledger.tip_id().to_string();
        let candidate = ledger.build_candidate(&loose_session()).unwrap();

        let id = ledger.accept(candidate.block, candidate.coinbase).unwrap();
        assert_eq!(ledger.blocks().len(), 2);
        assert_eq!(ledger.coinbase_transactions().len(), 1);
        assert_eq!(ledger.blocks()[1].get_previd(), Some(genesis_id.as_str()));
        assert_eq!(ledger.tip_id(), id);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_accept_rejects_wrong_previd() {
        let mut ledger = ChainLedger::new().unwrap();
        let session = loose_session();
        let stale = ledger.build_candidate(&session).unwrap();
        let fresh = ledger.build_candidate(&session).unwrap();
        ledger.accept(fresh.block, fresh.coinbase).unwrap();

        let result = ledger.accept(stale.block, stale.coinbase);
        assert!(matches!(
            result,
            Err(MinerError::ChainInvariantViolation(_))
        ));
        assert_eq!(ledger.blocks().len(), 2);
    }

    #[test]
    fn test_accept_rejects_unmet_target() {
        let mut ledger = ChainLedger::new().unwrap();
        let config = MinerConfig {
            target: "0".to_string(),
            ..MinerConfig::default()
        };
        let session = MiningSession::with_start_time(&config, 0).unwrap();
        let candidate = ledger.build_candidate(&session).unwrap();

        let result = ledger.accept(candidate.block, candidate.coinbase);
        assert!(matches!(
            result,
            Err(MinerError::ChainInvariantViolation(_))
        ));
        assert_eq!(ledger.blocks().len(), 1);
        assert!(ledger.coinbase_transactions().is_empty());
    }

    #[test]
    fn test_accept_rejects_foreign_coinbase() {
        let mut ledger = ChainLedger::new().unwrap();
        let candidate = ledger.build_candidate(&loose_session()).unwrap();
        let other = Transaction::new_coinbase_tx(1, 1, candidate.coinbase.get_outputs()[0].get_pubkey());

        let result = ledger.accept(candidate.block, other);
        assert!(matches!(
            result,
            Err(MinerError::ChainInvariantViolation(_))
        ));
    }

    #[test]
    fn test_mine_keeps_invariants() {
        let mut ledger = ChainLedger::new().unwrap();
        let mut session = loose_session();
        let store = MemoryStore::new();

        let mined = ledger
            .mine(4, &mut session, &store, &mut SilentProgress)
            .unwrap();
        assert_eq!(mined, 3);
        assert_eq!(session.estimator().blocks_recorded(), 3);

        let backend = Sha256Backend;
        for i in 1..ledger.blocks().len() {
            let prev = ledger.blocks()[i - 1].id(&backend).unwrap();
            assert_eq!(ledger.blocks()[i].get_previd(), Some(prev.as_str()));
            assert_eq!(ledger.coinbase_transactions()[i - 1].get_height(), i as u64);
        }

        // Every accepted block was persisted
        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.blocks, ledger.blocks());
        assert_eq!(snapshot.coinbase, ledger.coinbase_transactions());
    }

    #[test]
    fn test_mine_gives_up_after_repeated_exhaustion() {
        let config = MinerConfig {
            target: "0".to_string(),
            ..MinerConfig::default()
        };
        let mut session = MiningSession::with_start_time(&config, 0).unwrap();
        let near_top = max_search_value() - BigUint::from(2u8);
        session.set_origin(near_top.clone());

        let mut ledger = ChainLedger::new().unwrap();
        let store = MemoryStore::new();
        let result = ledger.mine(2, &mut session, &store, &mut SilentProgress);

        // Three searches, two reseeds in between, each a step further along
        assert_eq!(
            result.unwrap_err(),
            MinerError::SearchExhausted {
                height: 1,
                attempts: 0
            }
        );
        let step = BigUint::from(10u8).pow(52);
        assert_eq!(session.origin(), &(near_top + step * 2u8));
        assert_eq!(ledger.blocks().len(), 1);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_restore_repairs_unconfirmed_coinbase() {
        let mut ledger = ChainLedger::new().unwrap();
        let session = loose_session();
        let candidate = ledger.build_candidate(&session).unwrap();
        ledger.accept(candidate.block, candidate.coinbase).unwrap();

        // Coinbase for height 2 reached disk, its block did not
        let next = ledger.build_candidate(&session).unwrap();
        let mut coinbase = ledger.coinbase_transactions().to_vec();
        coinbase.push(next.coinbase);
        let store = MemoryStore::with_snapshot(crate::storage::ChainSnapshot {
            blocks: ledger.blocks().to_vec(),
            coinbase,
        });

        let restored = ChainLedger::restore(&store).unwrap();
        assert_eq!(restored.blocks().len(), 2);
        assert_eq!(restored.coinbase_transactions().len(), 1);
        assert_eq!(restored.tip_id(), ledger.tip_id());
    }

    #[test]
    fn test_restore_rejects_broken_link() {
        let mut ledger = ChainLedger::new().unwrap();
        let session = loose_session();
        for _ in 0..2 {
            let candidate = ledger.build_candidate(&session).unwrap();
            ledger.accept(candidate.block, candidate.coinbase).unwrap();
        }

        // Drop the middle block: block 2 now points at a block that is not its predecessor
        let mut blocks = ledger.blocks().to_vec();
        blocks.remove(1);
        let mut coinbase = ledger.coinbase_transactions().to_vec();
        coinbase.remove(0);
        let store = MemoryStore::with_snapshot(crate::storage::ChainSnapshot { blocks, coinbase });

        assert!(matches!(
            ChainLedger::restore(&store),
            Err(MinerError::ChainInvariantViolation(_))
        ));
    }

    #[test]
    fn test_restore_rejects_empty_chain() {
        let store = MemoryStore::with_snapshot(crate::storage::ChainSnapshot {
            blocks: vec![],
            coinbase: vec![],
        });
        assert!(matches!(
            ChainLedger::restore(&store),
            Err(MinerError::ChainInvariantViolation(_))
        ));
    }
}
