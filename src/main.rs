use anyhow::Result;
use clap::Parser;
use localagent::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    localagent::run(args).await
}
