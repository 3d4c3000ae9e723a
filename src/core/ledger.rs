// The ledger is an append-only chain of blocks kept in a key-value store.
// Each block is stored under its own hash; one reserved key points at the tip,
// and following previous-hash links from there always ends at genesis.

use crate::config::Config;
use crate::core::{
    Block, OwnershipProof, ProofOfWork, Transaction, COINBASE_REWARD, GENESIS_DATA,
};
use crate::error::{BlockchainError, Result};
use crate::storage::KvStore;
use data_encoding::HEXLOWER;
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use uuid::Uuid;

const TIP_BLOCK_HASH_KEY: &[u8] = b"tip_block_hash";
const DIFFICULTY_KEY: &[u8] = b"difficulty";
const OWNERSHIP_KEY: &[u8] = b"ownership";

#[derive(Clone)]
pub struct Ledger {
    tip_hash: Arc<RwLock<Vec<u8>>>,
    store: KvStore,
    pow: ProofOfWork,
    ownership: Arc<dyn OwnershipProof>,
    // Appends are serialized: read tip, mine, commit is one unit per writer.
    writer: Arc<Mutex<()>>,
}

/// Outcome of walking the whole chain with [`Ledger::verify_chain`].
#[derive(Debug, Default)]
pub struct ChainReport {
    pub length: usize,
    pub invalid_blocks: Vec<(String, BlockchainError)>,
    /// Blocks present in the store but unreachable from the tip.
    pub orphaned_blocks: usize,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.invalid_blocks.is_empty()
    }
}

impl Ledger {
    pub fn create(
        config: &Config,
        genesis_address: &str,
        ownership: Arc<dyn OwnershipProof>,
    ) -> Result<Ledger> {
        Self::create_with_path(
            &config.blocks_path(),
            genesis_address,
            config.difficulty,
            ownership,
        )
    }

    pub fn open(config: &Config, ownership: Arc<dyn OwnershipProof>) -> Result<Ledger> {
        Self::open_with_path(&config.blocks_path(), config.difficulty, ownership)
    }

    /// Writes a genesis block paying the coinbase reward to `genesis_address`.
    ///
    /// Fails with `AlreadyExists` if a tip is already persisted at `path`.
    pub fn create_with_path(
        path: &Path,
        genesis_address: &str,
        difficulty: u32,
        ownership: Arc<dyn OwnershipProof>,
    ) -> Result<Ledger> {
        if !ownership.validate_address(genesis_address) {
            return Err(BlockchainError::InvalidAddress(genesis_address.to_string()));
        }
        let pow = ProofOfWork::new(difficulty)?;
        let store = KvStore::open(path)?;
        if store.contains(TIP_BLOCK_HASH_KEY)? {
            return Err(BlockchainError::AlreadyExists(format!(
                "blockchain at {}",
                path.display()
            )));
        }

        info!("Creating genesis block for address: {genesis_address}");
        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address, GENESIS_DATA)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx, &pow)?;
        let block_data = genesis.serialize()?;
        let difficulty_bytes = difficulty.to_be_bytes();

        let committed = store.compare_and_write(
            TIP_BLOCK_HASH_KEY,
            None,
            &[
                (genesis.get_hash(), block_data.as_slice()),
                (TIP_BLOCK_HASH_KEY, genesis.get_hash()),
                (DIFFICULTY_KEY, difficulty_bytes.as_slice()),
                (OWNERSHIP_KEY, ownership.name().as_bytes()),
            ],
        )?;
        if !committed {
            return Err(BlockchainError::AlreadyExists(format!(
                "blockchain at {}",
                path.display()
            )));
        }
        info!("Genesis block {} written", genesis.get_hash_hex());

        Ok(Ledger {
            tip_hash: Arc::new(RwLock::new(genesis.get_hash().to_vec())),
            store,
            pow,
            ownership,
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Reopens a persisted chain. The difficulty recorded at genesis wins over
    /// `difficulty` so existing blocks keep validating.
    pub fn open_with_path(
        path: &Path,
        difficulty: u32,
        ownership: Arc<dyn OwnershipProof>,
    ) -> Result<Ledger> {
        if !path.exists() {
            return Err(BlockchainError::NotFound(format!(
                "no blockchain at {}, create one first",
                path.display()
            )));
        }

        let store = KvStore::open(path)?;
        let tip_hash = store.get(TIP_BLOCK_HASH_KEY)?.ok_or_else(|| {
            BlockchainError::NotFound(format!(
                "no blockchain at {}, create one first",
                path.display()
            ))
        })?;

        if let Some(stored_mode) = store.get(OWNERSHIP_KEY)? {
            if stored_mode.as_slice() != ownership.name().as_bytes() {
                return Err(BlockchainError::Config(format!(
                    "Chain at {} uses '{}' ownership, configured '{}'",
                    path.display(),
                    String::from_utf8_lossy(&stored_mode),
                    ownership.name()
                )));
            }
        }

        let stored_difficulty = match store.get(DIFFICULTY_KEY)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    BlockchainError::Database("Stored difficulty is not a u32".to_string())
                })?;
                u32::from_be_bytes(raw)
            }
            None => difficulty,
        };
        if stored_difficulty != difficulty {
            warn!(
                "Configured difficulty {difficulty} differs from chain difficulty {stored_difficulty}; using {stored_difficulty}"
            );
        }

        Ok(Ledger {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            store,
            pow: ProofOfWork::new(stored_difficulty)?,
            ownership,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = self
            .tip_hash
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *tip_hash = new_tip_hash.to_vec();
    }

    pub fn get_difficulty(&self) -> u32 {
        self.pow.get_difficulty()
    }

    pub fn get_pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn ownership(&self) -> &dyn OwnershipProof {
        self.ownership.as_ref()
    }

    /// Mines `transactions` into a new block on top of the current tip and commits it.
    ///
    /// If another handle advanced the tip while this block was being mined, the block
    /// is discarded and mined again against the new tip.
    pub fn append(&self, transactions: &[Transaction]) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.check_block_transactions(transactions)?;

        loop {
            let tip = self
                .store
                .get(TIP_BLOCK_HASH_KEY)?
                .ok_or_else(|| BlockchainError::NotFound("tip block hash".to_string()))?;

            let block = Block::new_block(tip.clone(), transactions, &self.pow)?;
            let block_data = block.serialize()?;
            let committed = self.store.compare_and_write(
                TIP_BLOCK_HASH_KEY,
                Some(tip.as_slice()),
                &[
                    (block.get_hash(), block_data.as_slice()),
                    (TIP_BLOCK_HASH_KEY, block.get_hash()),
                ],
            )?;

            if committed {
                self.set_tip_hash(block.get_hash());
                info!(
                    "Appended block {} with {} transactions",
                    block.get_hash_hex(),
                    block.get_transactions().len()
                );
                return Ok(block);
            }
            warn!(
                "Tip moved while mining on {}, mining again",
                HEXLOWER.encode(&tip)
            );
        }
    }

    /// Like [`Ledger::append`], with a coinbase paying the block reward to
    /// `miner_address` placed first in the block.
    pub fn append_with_reward(
        &self,
        transactions: &[Transaction],
        miner_address: &str,
    ) -> Result<Block> {
        if !self.ownership.validate_address(miner_address) {
            return Err(BlockchainError::InvalidAddress(miner_address.to_string()));
        }

        // Random data keeps repeated rewards to one address from sharing an id.
        let data = format!("reward to {miner_address} ({})", Uuid::new_v4());
        let coinbase_tx = Transaction::new_coinbase_tx(miner_address, &data)?;

        let mut block_transactions = Vec::with_capacity(transactions.len() + 1);
        block_transactions.push(coinbase_tx);
        block_transactions.extend_from_slice(transactions);
        self.append(&block_transactions)
    }

    fn check_block_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let coinbase_count = transactions.iter().filter(|tx| tx.is_coinbase()).count();
        if coinbase_count > 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block carries {coinbase_count} coinbase transactions, at most one allowed"
            )));
        }

        let mut spent_in_block: HashSet<(Vec<u8>, i64)> = HashSet::new();
        for transaction in transactions {
            self.verify_transaction(transaction)?;
            if transaction.is_coinbase() {
                continue;
            }
            for input in transaction.get_vin() {
                if !spent_in_block.insert((input.get_txid().to_vec(), input.get_vout())) {
                    return Err(BlockchainError::Transaction(format!(
                        "Double-spending detected: output {}:{} spent twice in one block",
                        HEXLOWER.encode(input.get_txid()),
                        input.get_vout()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Checks a transaction against the current chain: its id matches its content, and
    /// every input spends an existing, unspent output owned by the spender, with no
    /// value created or destroyed.
    pub fn verify_transaction(&self, transaction: &Transaction) -> Result<()> {
        let txid_hex = HEXLOWER.encode(transaction.get_id());
        if !transaction.verify_id()? {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} id does not match its content"
            )));
        }
        if transaction.is_coinbase() {
            let mints_reward = matches!(
                transaction.get_vout(),
                [output] if output.get_value() == COINBASE_REWARD
            );
            if !mints_reward {
                return Err(BlockchainError::Transaction(format!(
                    "Coinbase {txid_hex} must pay exactly one output of {COINBASE_REWARD}"
                )));
            }
            return Ok(());
        }
        if transaction.get_vin().is_empty() {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} has no inputs"
            )));
        }

        let mut input_value = 0u64;
        for input in transaction.get_vin() {
            let prev_txid_hex = HEXLOWER.encode(input.get_txid());
            let prev_tx = self.find_transaction(input.get_txid())?.ok_or_else(|| {
                BlockchainError::Transaction(format!(
                    "Transaction {txid_hex} references unknown transaction {prev_txid_hex}"
                ))
            })?;
            let prev_output = usize::try_from(input.get_vout())
                .ok()
                .and_then(|idx| prev_tx.get_vout().get(idx))
                .ok_or_else(|| {
                    BlockchainError::Transaction(format!(
                        "Transaction {txid_hex} references missing output {prev_txid_hex}:{}",
                        input.get_vout()
                    ))
                })?;

            if !self
                .ownership
                .owns_input(input, prev_output.get_lock_proof())
            {
                return Err(BlockchainError::Transaction(format!(
                    "Transaction {txid_hex} cannot unlock output {prev_txid_hex}:{}",
                    input.get_vout()
                )));
            }
            if self.is_output_spent(input.get_txid(), input.get_vout())? {
                return Err(BlockchainError::Transaction(format!(
                    "Input already spent: {prev_txid_hex}:{}",
                    input.get_vout()
                )));
            }

            input_value = input_value
                .checked_add(prev_output.get_value())
                .ok_or_else(|| BlockchainError::Transaction("Input value overflow".to_string()))?;
        }

        let output_value = transaction.get_output_value()?;
        if input_value != output_value {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} balance violation: inputs={input_value}, outputs={output_value}"
            )));
        }

        if !self.ownership.verify(transaction)? {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} failed {} ownership verification",
                self.ownership.name()
            )));
        }
        Ok(())
    }

    /// Walks the chain backward from the current tip to genesis.
    pub fn iterator(&self) -> LedgerIterator {
        LedgerIterator::new(self.get_tip_hash(), self.store.clone())
    }

    pub fn chain_length(&self) -> Result<usize> {
        let mut length = 0;
        for block in self.iterator() {
            block?;
            length += 1;
        }
        Ok(length)
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        match self.store.get(block_hash)? {
            Some(bytes) => Ok(Some(Block::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        for block in self.iterator() {
            let block = block?;
            if let Some(transaction) = block
                .get_transactions()
                .iter()
                .find(|tx| tx.get_id() == txid)
            {
                return Ok(Some(transaction.clone()));
            }
        }
        Ok(None)
    }

    pub fn is_output_spent(&self, txid: &[u8], vout: i64) -> Result<bool> {
        for block in self.iterator() {
            let block = block?;
            let spent = block
                .get_transactions()
                .iter()
                .filter(|tx| !tx.is_coinbase())
                .flat_map(|tx| tx.get_vin())
                .any(|input| input.get_txid() == txid && input.get_vout() == vout);
            if spent {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Re-checks a stored block: proof-of-work and transaction ids.
    pub fn validate_block(&self, block: &Block) -> Result<()> {
        if !self.pow.validate(block) {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} fails proof-of-work at difficulty {}",
                block.get_hash_hex(),
                self.pow.get_difficulty()
            )));
        }
        for transaction in block.get_transactions() {
            if !transaction.verify_id()? {
                return Err(BlockchainError::InvalidBlock(format!(
                    "block {} carries transaction {} whose id does not match its content",
                    block.get_hash_hex(),
                    HEXLOWER.encode(transaction.get_id())
                )));
            }
        }
        Ok(())
    }

    /// Validates every block from tip to genesis. Invalid blocks are collected in the
    /// report; store or decoding failures abort the walk.
    pub fn verify_chain(&self) -> Result<ChainReport> {
        let mut report = ChainReport::default();
        for block in self.iterator() {
            let block = block?;
            report.length += 1;
            if let Err(e) = self.validate_block(&block) {
                warn!("{e}");
                report.invalid_blocks.push((block.get_hash_hex(), e));
            }
        }

        let stored_blocks = self
            .store
            .iter_all()?
            .into_iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .count();
        report.orphaned_blocks = stored_blocks.saturating_sub(report.length);
        Ok(report)
    }

    /// Flushes the store. Dropping the last handle closes it.
    pub fn close(self) -> Result<()> {
        self.store.flush()
    }

    #[cfg(test)]
    pub(crate) fn get_store(&self) -> &KvStore {
        &self.store
    }
}

fn is_reserved_key(key: &[u8]) -> bool {
    key == TIP_BLOCK_HASH_KEY || key == DIFFICULTY_KEY || key == OWNERSHIP_KEY
}

pub struct LedgerIterator {
    store: KvStore,
    current_hash: Option<Vec<u8>>,
}

impl LedgerIterator {
    fn new(tip_hash: Vec<u8>, store: KvStore) -> LedgerIterator {
        LedgerIterator {
            store,
            current_hash: Some(tip_hash),
        }
    }

    fn load(&self, block_hash: &[u8]) -> Result<Block> {
        let bytes = self.store.get(block_hash)?.ok_or_else(|| {
            BlockchainError::NotFound(format!("block {}", HEXLOWER.encode(block_hash)))
        })?;
        let block = Block::deserialize(&bytes)?;
        if block.get_hash() != block_hash {
            return Err(BlockchainError::CorruptBlockData(format!(
                "block stored under {} claims hash {}",
                HEXLOWER.encode(block_hash),
                block.get_hash_hex()
            )));
        }
        Ok(block)
    }
}

impl Iterator for LedgerIterator {
    type Item = Result<Block>;

    /// Yields blocks tip-first and stops after genesis. An error is yielded once and
    /// ends the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        let block_hash = self.current_hash.take()?;
        let result = self.load(&block_hash);
        if let Ok(block) = &result {
            if !block.is_genesis() {
                self.current_hash = Some(block.get_pre_block_hash().to_vec());
            }
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        AddressOwnership, EcdsaOwnership, TXInput, TXOutput, UTXOSet, COINBASE_OUTPUT_INDEX,
    };
    use crate::wallet::Wallets;
    use crate::testing::{address_ledger, TEST_DIFFICULTY};
    use tempfile::tempdir;

    #[test]
    fn test_fresh_chain_has_only_genesis() {
        let (_dir, ledger) = address_ledger("alice");

        let blocks: Vec<Block> = ledger.iterator().collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_genesis());
        assert_eq!(blocks[0].get_hash(), ledger.get_tip_hash().as_slice());

        let coinbase = &blocks[0].get_transactions()[0];
        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.get_vin()[0].get_unlock_proof(), GENESIS_DATA);
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks");
        let ledger =
            Ledger::create_with_path(&path, "alice", TEST_DIFFICULTY, Arc::new(AddressOwnership))
                .unwrap();
        ledger.close().unwrap();

        let again =
            Ledger::create_with_path(&path, "bob", TEST_DIFFICULTY, Arc::new(AddressOwnership));
        assert!(matches!(again, Err(BlockchainError::AlreadyExists(_))));
    }

    #[test]
    fn test_open_missing_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nothing-here");
        let result = Ledger::open_with_path(&path, TEST_DIFFICULTY, Arc::new(AddressOwnership));
        assert!(matches!(result, Err(BlockchainError::NotFound(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_open_uses_stored_difficulty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks");
        Ledger::create_with_path(&path, "alice", TEST_DIFFICULTY, Arc::new(AddressOwnership))
            .unwrap()
            .close()
            .unwrap();

        let reopened =
            Ledger::open_with_path(&path, TEST_DIFFICULTY + 3, Arc::new(AddressOwnership)).unwrap();
        assert_eq!(reopened.get_difficulty(), TEST_DIFFICULTY);
        assert!(reopened.verify_chain().unwrap().is_valid());
    }

    #[test]
    fn test_append_links_to_previous_tip() {
        let (_dir, ledger) = address_ledger("alice");
        let genesis_hash = ledger.get_tip_hash();

        let block = ledger.append_with_reward(&[], "miner").unwrap();
        assert_eq!(block.get_pre_block_hash(), genesis_hash.as_slice());
        assert_eq!(ledger.get_tip_hash(), block.get_hash());
        assert!(ledger.get_pow().validate(&block));
        assert_eq!(ledger.chain_length().unwrap(), 2);
    }

    #[test]
    fn test_append_rejects_empty_block() {
        let (_dir, ledger) = address_ledger("alice");
        let tip = ledger.get_tip_hash();
        assert!(matches!(
            ledger.append(&[]),
            Err(BlockchainError::InvalidBlock(_))
        ));
        assert_eq!(ledger.get_tip_hash(), tip);
    }

    #[test]
    fn test_append_rejects_double_spend() {
        let (_dir, ledger) = address_ledger("alice");
        let utxo_set = UTXOSet::new(ledger.clone());

        let spend = Transaction::new_utxo_transaction("alice", "bob", 30, &utxo_set).unwrap();
        ledger.append(&[spend.clone()]).unwrap();
        let tip = ledger.get_tip_hash();

        // Same inputs again, already consumed on chain.
        let replay = ledger.append(&[spend]);
        assert!(matches!(replay, Err(BlockchainError::Transaction(_))));
        assert_eq!(ledger.get_tip_hash(), tip);
    }

    #[test]
    fn test_append_rejects_double_spend_within_block() {
        let (_dir, ledger) = address_ledger("alice");
        let utxo_set = UTXOSet::new(ledger.clone());

        let to_bob = Transaction::new_utxo_transaction("alice", "bob", 30, &utxo_set).unwrap();
        let to_carol = Transaction::new_utxo_transaction("alice", "carol", 30, &utxo_set).unwrap();
        assert!(matches!(
            ledger.append(&[to_bob, to_carol]),
            Err(BlockchainError::Transaction(_))
        ));
        assert_eq!(ledger.chain_length().unwrap(), 1);
    }

    #[test]
    fn test_append_rejects_stolen_input() {
        let (_dir, ledger) = address_ledger("alice");
        let genesis_coinbase = ledger.iterator().next().unwrap().unwrap().get_transactions()[0].clone();

        let mut theft = Transaction::from_parts(
            vec![TXInput::new(genesis_coinbase.get_id(), 0, "mallory")],
            vec![TXOutput::new(COINBASE_REWARD, "mallory")],
        );
        theft.set_id().unwrap();

        assert!(matches!(
            ledger.append(&[theft]),
            Err(BlockchainError::Transaction(_))
        ));
    }

    #[test]
    fn test_append_rejects_oversized_coinbase() {
        let (_dir, ledger) = address_ledger("alice");
        let utxo_set = UTXOSet::new(ledger.clone());
        let tip = ledger.get_tip_hash();

        let mut minted = Transaction::from_parts(
            vec![TXInput::new(&[], COINBASE_OUTPUT_INDEX, "free money")],
            vec![TXOutput::new(1_000_000, "mallory")],
        );
        minted.set_id().unwrap();
        assert!(minted.is_coinbase());
        assert!(matches!(
            ledger.append(&[minted]),
            Err(BlockchainError::Transaction(_))
        ));

        let mut split = Transaction::from_parts(
            vec![TXInput::new(&[], COINBASE_OUTPUT_INDEX, "split reward")],
            vec![
                TXOutput::new(COINBASE_REWARD, "mallory"),
                TXOutput::new(COINBASE_REWARD, "mallory"),
            ],
        );
        split.set_id().unwrap();
        assert!(ledger.append(&[split]).is_err());

        assert_eq!(ledger.get_tip_hash(), tip);
        assert_eq!(utxo_set.get_balance("mallory").unwrap(), 0);
    }

    #[test]
    fn test_open_rejects_other_ownership_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks");
        let mut wallets = Wallets::load(&dir.path().join("wallet.dat")).unwrap();
        let alice = wallets.create_wallet().unwrap();
        Ledger::create_with_path(
            &path,
            &alice,
            TEST_DIFFICULTY,
            Arc::new(EcdsaOwnership::new(wallets)),
        )
        .unwrap()
        .close()
        .unwrap();

        // Under address ownership the wallet address alone would unlock alice's outputs.
        let result = Ledger::open_with_path(&path, TEST_DIFFICULTY, Arc::new(AddressOwnership));
        assert!(matches!(result, Err(BlockchainError::Config(_))));

        let wallets = Wallets::load(&dir.path().join("wallet.dat")).unwrap();
        let reopened = Ledger::open_with_path(
            &path,
            TEST_DIFFICULTY,
            Arc::new(EcdsaOwnership::new(wallets)),
        )
        .unwrap();
        let report = reopened.verify_chain().unwrap();
        assert!(report.is_valid());
        assert_eq!(report.orphaned_blocks, 0);
    }

    #[test]
    fn test_append_rejects_second_coinbase() {
        let (_dir, ledger) = address_ledger("alice");
        let extra = Transaction::new_coinbase_tx("miner", "extra").unwrap();
        assert!(matches!(
            ledger.append_with_reward(&[extra], "miner"),
            Err(BlockchainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_append_builds_on_persisted_tip() {
        let (_dir, ledger) = address_ledger("alice");

        let other = ledger.clone();
        let other_block = other.append_with_reward(&[], "miner").unwrap();
        // A stale cached tip must not decide where the next block links.
        ledger.set_tip_hash(&[0; 32]);

        let block = ledger.append_with_reward(&[], "miner").unwrap();
        assert_eq!(block.get_pre_block_hash(), other_block.get_hash());
        assert_eq!(ledger.chain_length().unwrap(), 3);
    }

    #[test]
    fn test_repeated_rewards_have_distinct_ids() {
        let (_dir, ledger) = address_ledger("alice");
        let first = ledger.append_with_reward(&[], "miner").unwrap();
        let second = ledger.append_with_reward(&[], "miner").unwrap();
        assert_ne!(
            first.get_transactions()[0].get_id(),
            second.get_transactions()[0].get_id()
        );
    }

    #[test]
    fn test_verify_chain_reports_tampering() {
        let (_dir, ledger) = address_ledger("alice");
        ledger.append_with_reward(&[], "miner").unwrap();
        assert!(ledger.verify_chain().unwrap().is_valid());

        // Rewrite the tip block in place with a bumped nonce.
        let tip = ledger.get_tip_hash();
        let block = ledger.get_block(&tip).unwrap().unwrap();
        let tampered = block.with_nonce(block.get_nonce() + 1);
        ledger
            .get_store()
            .set(&tip, &tampered.serialize().unwrap())
            .unwrap();

        let report = ledger.verify_chain().unwrap();
        assert_eq!(report.length, 2);
        assert_eq!(report.invalid_blocks.len(), 1);
        assert!(matches!(
            report.invalid_blocks[0].1,
            BlockchainError::InvalidBlock(_)
        ));
    }

    #[test]
    fn test_verify_chain_counts_orphans() {
        let (_dir, ledger) = address_ledger("alice");
        let pow = ProofOfWork::new(TEST_DIFFICULTY).unwrap();
        let orphan = Block::new_block(
            vec![9; 32],
            &[Transaction::new_coinbase_tx("ghost", "").unwrap()],
            &pow,
        )
        .unwrap();
        ledger
            .get_store()
            .set(orphan.get_hash(), &orphan.serialize().unwrap())
            .unwrap();

        let report = ledger.verify_chain().unwrap();
        assert_eq!(report.length, 1);
        assert_eq!(report.orphaned_blocks, 1);
    }

    #[test]
    fn test_iterator_surfaces_corrupt_block() {
        let (_dir, ledger) = address_ledger("alice");
        ledger.append_with_reward(&[], "miner").unwrap();
        let tip = ledger.get_tip_hash();
        ledger.get_store().set(&tip, b"not a block").unwrap();

        let mut iter = ledger.iterator();
        assert!(matches!(
            iter.next(),
            Some(Err(BlockchainError::CorruptBlockData(_)))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_find_transaction_and_spent_outputs() {
        let (_dir, ledger) = address_ledger("alice");
        let utxo_set = UTXOSet::new(ledger.clone());
        let spend = Transaction::new_utxo_transaction("alice", "bob", 30, &utxo_set).unwrap();
        let spent_input = spend.get_vin()[0].clone();
        ledger.append(&[spend.clone()]).unwrap();

        assert_eq!(
            ledger.find_transaction(spend.get_id()).unwrap(),
            Some(spend.clone())
        );
        assert_eq!(ledger.find_transaction(&[0; 32]).unwrap(), None);
        assert!(ledger
            .is_output_spent(spent_input.get_txid(), spent_input.get_vout())
            .unwrap());
        assert!(!ledger.is_output_spent(spend.get_id(), 0).unwrap());
    }
}
