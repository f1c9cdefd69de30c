//! blindprice CLI binary

use anyhow::Context;
use blindprice::cli::{BlindPriceApp, Cli, Commands, DemoParams};
use blindprice::negotiation::Attachment;
use blindprice::AppConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A local .env is optional
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;

    // Initialize logging. RUST_LOG wins over LOG_LEVEL.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = BlindPriceApp::new(config);

    match cli.command {
        Commands::Evaluate {
            buyer_min,
            buyer_max,
            seller_min,
            seller_max,
            prior_count,
        } => {
            let outcome = app.evaluate(
                (buyer_min, buyer_max),
                (seller_min, seller_max),
                prior_count,
            )?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::Fees { prior_count } => match prior_count {
            Some(count) => {
                println!("{}", app.fee_schedule().rate_for(count));
            }
            None => {
                for tier in app.fee_schedule().tiers() {
                    println!("{:>6}+  {}", tier.min_count, tier.rate);
                }
            }
        },

        Commands::Demo {
            seller_min,
            seller_max,
            buyer_min,
            buyer_max,
            history,
            attachment,
        } => {
            let attachment = match attachment {
                Some(path) => Some(
                    Attachment::read(&path)
                        .await
                        .with_context(|| format!("reading attachment {}", path.display()))?,
                ),
                None => None,
            };

            tracing::info!("Running demo negotiation");
            let report = app
                .run_demo(DemoParams {
                    seller_min,
                    seller_max,
                    buyer_min,
                    buyer_max,
                    buyer_history: history,
                    attachment,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
