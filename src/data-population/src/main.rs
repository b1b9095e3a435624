use anyhow::Result;
use clap::Parser;

use pyxis_data_population::cli::{init_logging, Cli, CliRunner};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    init_logging(args.verbose);

    let runner = CliRunner::new(&args)?;
    runner.run().await?;
    Ok(())
}
