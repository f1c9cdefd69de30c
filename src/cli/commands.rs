//! CLI command definitions

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "blindprice")]
#[command(about = "blindprice - blind price negotiation between two parties", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a buyer range against a seller range
    Evaluate {
        /// Lowest price the buyer would pay
        #[arg(long)]
        buyer_min: Decimal,

        /// Highest price the buyer would pay
        #[arg(long)]
        buyer_max: Decimal,

        /// Lowest price the seller would accept
        #[arg(long)]
        seller_min: Decimal,

        /// Highest price the seller asks for
        #[arg(long)]
        seller_max: Decimal,

        /// Past negotiations initiated by the requester (selects the fee tier)
        #[arg(short = 'n', long, default_value = "0")]
        prior_count: u64,
    },

    /// Show the platform fee schedule
    Fees {
        /// Only show the rate for this many prior negotiations
        #[arg(short = 'n', long)]
        prior_count: Option<u64>,
    },

    /// Run a full two-party negotiation against the in-memory backend
    Demo {
        /// Seller's floor
        #[arg(long, default_value = "900")]
        seller_min: Decimal,

        /// Seller's asking ceiling
        #[arg(long, default_value = "1200")]
        seller_max: Decimal,

        /// Buyer's floor
        #[arg(long, default_value = "700")]
        buyer_min: Decimal,

        /// Buyer's ceiling
        #[arg(long, default_value = "1000")]
        buyer_max: Decimal,

        /// Negotiations the buyer opened before this one
        #[arg(long, default_value = "0")]
        history: u64,

        /// File to attach to the negotiation
        #[arg(short, long)]
        attachment: Option<std::path::PathBuf>,
    },
}
