// Transactions move value in the UTXO model: inputs consume earlier outputs,
// outputs create new spendable values locked to an address.

use crate::core::UTXOSet;
use crate::error::{BlockchainError, Result};
use crate::utils::{serialize, sha256_digest, DIGEST_LEN};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// Value minted by every coinbase transaction.
pub const COINBASE_REWARD: u64 = 100;

/// Output index carried by a coinbase input, meaning "no prior output".
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,        // Transaction holding the output being spent
    vout: i64,            // Index of that output, or -1 for coinbase
    unlock_proof: String, // Proof of ownership of the referenced output
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i64, unlock_proof: &str) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            unlock_proof: unlock_proof.to_string(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_unlock_proof(&self) -> &str {
        self.unlock_proof.as_str()
    }

    pub fn set_unlock_proof(&mut self, unlock_proof: String) {
        self.unlock_proof = unlock_proof;
    }

    /// Address-equality check; not an authentication primitive.
    pub fn can_unlock(&self, proof: &str) -> bool {
        self.unlock_proof == proof
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    lock_proof: String, // Address allowed to spend this output
}

impl TXOutput {
    pub fn new(value: u64, address: &str) -> TXOutput {
        TXOutput {
            value,
            lock_proof: address.to_string(),
        }
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_lock_proof(&self) -> &str {
        self.lock_proof.as_str()
    }

    pub fn can_be_unlocked(&self, proof: &str) -> bool {
        self.lock_proof == proof
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Builds a reward-minting transaction paying [`COINBASE_REWARD`] to `to`.
    ///
    /// `data` is embedded as the unlock proof of the single sentinel input; an empty
    /// string is replaced by `"reward to <to>"`.
    pub fn new_coinbase_tx(to: &str, data: &str) -> Result<Transaction> {
        let data = if data.is_empty() {
            format!("reward to {to}")
        } else {
            data.to_string()
        };

        let mut tx = Transaction {
            id: vec![],
            vin: vec![TXInput::new(&[], COINBASE_OUTPUT_INDEX, &data)],
            vout: vec![TXOutput::new(COINBASE_REWARD, to)],
        };
        tx.set_id()?;
        Ok(tx)
    }

    /// Builds a spend of `amount` from `from` to `to`, with change back to `from`.
    ///
    /// Inputs are chosen by [`UTXOSet::find_spendable_outputs`] and unlocked through the
    /// ledger's ownership capability.
    pub fn new_utxo_transaction(
        from: &str,
        to: &str,
        amount: u64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }

        let ownership = utxo_set.get_ledger().ownership();
        if !ownership.validate_address(from) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid from address: {from}"
            )));
        }
        if !ownership.validate_address(to) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid to address: {to}"
            )));
        }

        let (accumulated, valid_outputs) = utxo_set.find_spendable_outputs(from, amount)?;
        if accumulated < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid_hex, outs) in valid_outputs {
            let txid = HEXLOWER.decode(txid_hex.as_bytes()).map_err(|e| {
                BlockchainError::Transaction(format!("Invalid transaction ID: {e}"))
            })?;
            for out in outs {
                inputs.push(TXInput::new(&txid, out, ""));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)];
        let change = accumulated - amount;
        if change > 0 {
            outputs.push(TXOutput::new(change, from));
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        ownership.sign(&mut tx, from)?;
        tx.set_id()?;
        Ok(tx)
    }

    /// Assigns the content hash as this transaction's id.
    ///
    /// The id field is cleared in the hashed copy, so calling this again on an unchanged
    /// transaction reproduces the same id.
    pub fn set_id(&mut self) -> Result<()> {
        self.id = self.hash()?;
        Ok(())
    }

    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    /// Digest that ownership signatures cover: the encoding with the id and every
    /// unlock proof cleared.
    pub fn signing_digest(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self
                .vin
                .iter()
                .map(|input| TXInput::new(input.get_txid(), input.get_vout(), ""))
                .collect(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    /// True when the stored id is set and matches the content hash.
    pub fn verify_id(&self) -> Result<bool> {
        Ok(self.id.len() == DIGEST_LEN && self.id == self.hash()?)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1
            && self.vin[0].txid.is_empty()
            && self.vin[0].vout == COINBASE_OUTPUT_INDEX
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub(crate) fn get_vin_mut(&mut self) -> &mut [TXInput] {
        self.vin.as_mut_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_output_value(&self) -> Result<u64> {
        self.vout.iter().try_fold(0u64, |total, out| {
            total
                .checked_add(out.get_value())
                .ok_or_else(|| BlockchainError::Transaction("Output value overflow".to_string()))
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Transaction {
        Transaction {
            id: vec![],
            vin,
            vout,
        }
    }
}
