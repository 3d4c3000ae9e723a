use crate::core::{Ledger, TXOutput, Transaction};
use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Unspent-output queries answered by scanning the ledger from tip to genesis.
///
/// Nothing is cached; every query reflects the chain as it is when called.
pub struct UTXOSet {
    ledger: Ledger,
}

impl UTXOSet {
    pub fn new(ledger: Ledger) -> UTXOSet {
        UTXOSet { ledger }
    }

    pub fn get_ledger(&self) -> &Ledger {
        &self.ledger
    }

    // Walks blocks newest first, and each block's transactions last to first, so a
    // spend is always recorded before the output it consumes is visited. Only
    // spends made by `address` are tracked; those are the only ones that can
    // consume outputs locked to it.
    fn scan(&self, address: &str) -> Result<Vec<(Transaction, Vec<usize>)>> {
        let ownership = self.ledger.ownership();
        let mut spent: HashMap<String, HashSet<i64>> = HashMap::new();
        let mut unspent = vec![];

        for block in self.ledger.iterator() {
            let block = block?;
            for tx in block.get_transactions().iter().rev() {
                let txid_hex = HEXLOWER.encode(tx.get_id());

                let indices: Vec<usize> = tx
                    .get_vout()
                    .iter()
                    .enumerate()
                    .filter(|(idx, out)| {
                        ownership.owns_output(out, address)
                            && !spent
                                .get(&txid_hex)
                                .is_some_and(|outs| outs.contains(&(*idx as i64)))
                    })
                    .map(|(idx, _)| idx)
                    .collect();
                if !indices.is_empty() {
                    unspent.push((tx.clone(), indices));
                }

                if tx.is_coinbase() {
                    continue;
                }
                for input in tx.get_vin() {
                    if ownership.owns_input(input, address) {
                        spent
                            .entry(HEXLOWER.encode(input.get_txid()))
                            .or_default()
                            .insert(input.get_vout());
                    }
                }
            }
        }
        Ok(unspent)
    }

    /// Transactions holding at least one unspent output locked to `address`,
    /// newest first, each listed once.
    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self.scan(address)?.into_iter().map(|(tx, _)| tx).collect())
    }

    pub fn find_utxo(&self, address: &str) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        for (tx, indices) in self.scan(address)? {
            for idx in indices {
                utxos.push(tx.get_vout()[idx].clone());
            }
        }
        Ok(utxos)
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        self.find_utxo(address)?
            .iter()
            .try_fold(0u64, |balance, out| {
                balance
                    .checked_add(out.get_value())
                    .ok_or_else(|| BlockchainError::Transaction("Balance overflow".to_string()))
            })
    }

    /// Greedily picks unspent outputs of `address` until their sum reaches `amount`.
    ///
    /// Returns the accumulated value with the chosen output indices keyed by hex txid.
    /// The sum is below `amount` only when the address cannot cover it.
    pub fn find_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<(u64, BTreeMap<String, Vec<i64>>)> {
        let mut unspent_outputs: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        let mut accumulated = 0u64;

        'work: for (tx, indices) in self.scan(address)? {
            let txid_hex = HEXLOWER.encode(tx.get_id());
            for idx in indices {
                if accumulated >= amount {
                    break 'work;
                }
                accumulated = accumulated
                    .checked_add(tx.get_vout()[idx].get_value())
                    .ok_or_else(|| BlockchainError::Transaction("Balance overflow".to_string()))?;
                unspent_outputs
                    .entry(txid_hex.clone())
                    .or_default()
                    .push(idx as i64);
            }
        }
        Ok((accumulated, unspent_outputs))
    }
}
