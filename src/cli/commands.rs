use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "minichain", about = "Single-node proof-of-work ledger")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(name = "createblockchain", about = "Create a new blockchain")]
    Createblockchain {
        #[arg(long, help = "The address to send genesis block reward to")]
        address: String,
    },
    #[command(
        name = "getbalance",
        about = "Get the balance of the target address"
    )]
    GetBalance {
        #[arg(long, help = "The address to query")]
        address: String,
    },
    #[command(name = "send", about = "Send value between addresses and mine it")]
    Send {
        #[arg(long, help = "Source address")]
        from: String,
        #[arg(long, help = "Destination address")]
        to: String,
        #[arg(long, help = "Amount to send")]
        amount: u64,
        #[arg(long, help = "Also pay the block reward to this address")]
        reward: Option<String>,
    },
    #[command(name = "printchain", about = "Print all blocks, newest first")]
    Printchain,
    #[command(
        name = "verifychain",
        about = "Re-check proof-of-work and linkage of every block"
    )]
    Verifychain,
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
}
