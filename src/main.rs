// Entry point for the minichain CLI
use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, info, LevelFilter};
use minichain::{
    AddressOwnership, Block, Command, Config, EcdsaOwnership, Ledger, Opt, OwnershipMode,
    OwnershipProof, Transaction, UTXOSet, Wallets,
};
use serde_json::{json, Value};
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default; RUST_LOG still takes precedence
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// The ownership variant is chosen once in configuration and must match the chain
fn build_ownership(config: &Config) -> Result<Arc<dyn OwnershipProof>, Box<dyn std::error::Error>> {
    let ownership: Arc<dyn OwnershipProof> = match config.ownership {
        OwnershipMode::Address => Arc::new(AddressOwnership),
        OwnershipMode::Ecdsa => Arc::new(EcdsaOwnership::new(Wallets::load(
            &config.wallet_path(),
        )?)),
    };
    Ok(ownership)
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match command {
        Command::Createblockchain { address } => {
            let ledger = Ledger::create(&config, &address, build_ownership(&config)?)?;
            info!(
                "Blockchain created at {} with difficulty {}",
                config.blocks_path().display(),
                ledger.get_difficulty()
            );
            ledger.close()?;
            println!("Done!");
        }
        Command::GetBalance { address } => {
            let ownership = build_ownership(&config)?;
            if !ownership.validate_address(&address) {
                return Err(format!("Invalid address: {address}").into());
            }
            let utxo_set = UTXOSet::new(Ledger::open(&config, ownership)?);
            let balance = utxo_set.get_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Send {
            from,
            to,
            amount,
            reward,
        } => {
            let ledger = Ledger::open(&config, build_ownership(&config)?)?;
            let utxo_set = UTXOSet::new(ledger.clone());

            let transaction = Transaction::new_utxo_transaction(&from, &to, amount, &utxo_set)?;
            let block = match reward {
                Some(miner) => ledger.append_with_reward(&[transaction], &miner)?,
                None => ledger.append(&[transaction])?,
            };
            info!("Transaction mined in block {}", block.get_hash_hex());
            ledger.close()?;
            println!("Success!");
        }
        Command::Printchain => {
            let ledger = Ledger::open(&config, build_ownership(&config)?)?;
            for block in ledger.iterator() {
                let block = block?;
                println!("Pre block hash: {}", HEXLOWER.encode(block.get_pre_block_hash()));
                println!("Cur block hash: {}", block.get_hash_hex());
                println!("Nonce: {}", block.get_nonce());
                println!("PoW valid: {}", ledger.get_pow().validate(&block));
                println!("{}", serde_json::to_string_pretty(&transactions_view(&block))?);
                println!();
            }
        }
        Command::Verifychain => {
            let ledger = Ledger::open(&config, build_ownership(&config)?)?;
            let report = ledger.verify_chain()?;
            println!("Blocks: {}", report.length);
            println!("Orphaned blocks: {}", report.orphaned_blocks);
            for (hash, reason) in &report.invalid_blocks {
                println!("Invalid block {hash}: {reason}");
            }
            if !report.is_valid() {
                return Err(format!(
                    "{} invalid blocks in chain",
                    report.invalid_blocks.len()
                )
                .into());
            }
            println!("Chain is valid");
        }
        Command::Createwallet => {
            let mut wallets = Wallets::load(&config.wallet_path())?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}");
        }
        Command::ListAddresses => {
            let wallets = Wallets::load(&config.wallet_path())?;
            for address in wallets.get_addresses() {
                println!("{address}");
            }
        }
    }
    Ok(())
}

// Hex ids read better than the raw byte arrays serde would emit
fn transactions_view(block: &Block) -> Value {
    let transactions: Vec<Value> = block
        .get_transactions()
        .iter()
        .map(|tx| {
            let inputs: Vec<Value> = tx
                .get_vin()
                .iter()
                .map(|input| {
                    json!({
                        "txid": HEXLOWER.encode(input.get_txid()),
                        "vout": input.get_vout(),
                        "unlock_proof": input.get_unlock_proof(),
                    })
                })
                .collect();
            let outputs: Vec<Value> = tx
                .get_vout()
                .iter()
                .map(|output| {
                    json!({
                        "value": output.get_value(),
                        "lock_proof": output.get_lock_proof(),
                    })
                })
                .collect();
            json!({
                "id": HEXLOWER.encode(tx.get_id()),
                "coinbase": tx.is_coinbase(),
                "inputs": inputs,
                "outputs": outputs,
            })
        })
        .collect();
    Value::Array(transactions)
}
