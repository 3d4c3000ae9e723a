//! Ownership proofs decide who may spend an output.
//!
//! Two implementations exist. [`AddressOwnership`] is the plain string-equality check:
//! an input's unlock proof is the spender's address. It authenticates nothing and
//! anyone who knows an address can spend from it. [`EcdsaOwnership`] replaces the
//! address with a P-256 public key and a signature over the transaction's signing
//! digest. It changes what an unlock proof contains, so the two cannot be mixed on
//! one chain. Pick one explicitly through configuration.

use crate::core::{TXInput, TXOutput, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign, ecdsa_p256_sha256_verify};
use crate::wallet::{convert_address, hash_pub_key, validate_address, Wallets};
use data_encoding::HEXLOWER;

pub trait OwnershipProof: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate_address(&self, address: &str) -> bool;

    /// Fills the unlock proof of every input of `tx`, spending on behalf of `address`.
    /// Must run before [`Transaction::set_id`].
    fn sign(&self, tx: &mut Transaction, address: &str) -> Result<()>;

    /// Whether `input` is a spend attributable to `address`.
    fn owns_input(&self, input: &TXInput, address: &str) -> bool;

    fn owns_output(&self, output: &TXOutput, address: &str) -> bool {
        output.can_be_unlocked(address)
    }

    /// Checks the proofs carried by `tx` against its own content.
    fn verify(&self, tx: &Transaction) -> Result<bool>;
}

/// String-equality ownership: unlock proof == lock proof == address.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressOwnership;

impl OwnershipProof for AddressOwnership {
    fn name(&self) -> &'static str {
        "address"
    }

    fn validate_address(&self, address: &str) -> bool {
        !address.trim().is_empty()
    }

    fn sign(&self, tx: &mut Transaction, address: &str) -> Result<()> {
        for input in tx.get_vin_mut() {
            input.set_unlock_proof(address.to_string());
        }
        Ok(())
    }

    fn owns_input(&self, input: &TXInput, address: &str) -> bool {
        input.can_unlock(address)
    }

    fn verify(&self, _tx: &Transaction) -> Result<bool> {
        Ok(true)
    }
}

/// ECDSA P-256 ownership: unlock proof is `hex(public_key):hex(signature)`.
pub struct EcdsaOwnership {
    wallets: Wallets,
}

impl EcdsaOwnership {
    pub fn new(wallets: Wallets) -> EcdsaOwnership {
        EcdsaOwnership { wallets }
    }

    fn parse_proof(proof: &str) -> Option<(Vec<u8>, Vec<u8>)> {
        let (public_key, signature) = proof.split_once(':')?;
        let public_key = HEXLOWER.decode(public_key.as_bytes()).ok()?;
        let signature = HEXLOWER.decode(signature.as_bytes()).ok()?;
        Some((public_key, signature))
    }
}

impl OwnershipProof for EcdsaOwnership {
    fn name(&self) -> &'static str {
        "ecdsa"
    }

    fn validate_address(&self, address: &str) -> bool {
        validate_address(address)
    }

    fn sign(&self, tx: &mut Transaction, address: &str) -> Result<()> {
        let wallet = self.wallets.get_wallet(address).ok_or_else(|| {
            BlockchainError::Wallet(format!("Wallet not found for address: {address}"))
        })?;

        let digest = tx.signing_digest()?;
        let signature = ecdsa_p256_sha256_sign(wallet.get_pkcs8(), &digest)?;
        let proof = format!(
            "{}:{}",
            HEXLOWER.encode(wallet.get_public_key()),
            HEXLOWER.encode(&signature)
        );
        for input in tx.get_vin_mut() {
            input.set_unlock_proof(proof.clone());
        }
        Ok(())
    }

    fn owns_input(&self, input: &TXInput, address: &str) -> bool {
        match Self::parse_proof(input.get_unlock_proof()) {
            Some((public_key, _)) => convert_address(&hash_pub_key(&public_key)) == address,
            None => false,
        }
    }

    fn verify(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }

        let digest = tx.signing_digest()?;
        for input in tx.get_vin() {
            let Some((public_key, signature)) = Self::parse_proof(input.get_unlock_proof()) else {
                return Ok(false);
            };
            if !ecdsa_p256_sha256_verify(&public_key, &signature, &digest) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WALLET_FILE;
    use tempfile::tempdir;

    fn unsigned_spend(to: &str) -> Transaction {
        Transaction::from_parts(
            vec![TXInput::new(&[7; 32], 0, ""), TXInput::new(&[8; 32], 1, "")],
            vec![TXOutput::new(40, to)],
        )
    }

    #[test]
    fn test_address_ownership_uses_equality() {
        let ownership = AddressOwnership;
        let mut tx = unsigned_spend("bob");
        ownership.sign(&mut tx, "alice").unwrap();

        for input in tx.get_vin() {
            assert_eq!(input.get_unlock_proof(), "alice");
            assert!(ownership.owns_input(input, "alice"));
            assert!(!ownership.owns_input(input, "bob"));
        }
        assert!(ownership.owns_output(&tx.get_vout()[0], "bob"));
        assert!(ownership.verify(&tx).unwrap());
        assert!(!ownership.validate_address("   "));
    }

    #[test]
    fn test_ecdsa_sign_and_verify() {
        let dir = tempdir().unwrap();
        let mut wallets = Wallets::load(&dir.path().join(WALLET_FILE)).unwrap();
        let alice = wallets.create_wallet().unwrap();
        let bob = wallets.create_wallet().unwrap();
        let ownership = EcdsaOwnership::new(wallets);

        let mut tx = unsigned_spend(&bob);
        ownership.sign(&mut tx, &alice).unwrap();
        tx.set_id().unwrap();

        assert!(ownership.verify(&tx).unwrap());
        assert!(ownership.owns_input(&tx.get_vin()[0], &alice));
        assert!(!ownership.owns_input(&tx.get_vin()[0], &bob));
    }

    #[test]
    fn test_ecdsa_rejects_tampered_outputs() {
        let dir = tempdir().unwrap();
        let mut wallets = Wallets::load(&dir.path().join(WALLET_FILE)).unwrap();
        let alice = wallets.create_wallet().unwrap();
        let ownership = EcdsaOwnership::new(wallets);

        let mut tx = unsigned_spend("someone");
        ownership.sign(&mut tx, &alice).unwrap();

        let proof = tx.get_vin()[0].get_unlock_proof().to_string();
        let mut forged = Transaction::from_parts(
            vec![TXInput::new(&[7; 32], 0, &proof), TXInput::new(&[8; 32], 1, &proof)],
            vec![TXOutput::new(4000, "mallory")],
        );
        forged.set_id().unwrap();
        assert!(!ownership.verify(&forged).unwrap());
    }

    #[test]
    fn test_ecdsa_plain_address_proof_is_not_ownership() {
        let dir = tempdir().unwrap();
        let wallets = Wallets::load(&dir.path().join(WALLET_FILE)).unwrap();
        let ownership = EcdsaOwnership::new(wallets);

        let input = TXInput::new(&[7; 32], 0, "alice");
        assert!(!ownership.owns_input(&input, "alice"));
        assert!(ownership.sign(&mut unsigned_spend("bob"), "alice").is_err());
    }
}
