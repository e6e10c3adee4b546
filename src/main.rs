use clap::Parser;
use mgdm2oereb::cli::{self, Args};

#[tokio::main]
async fn main() -> mgdm2oereb::Result<()> {
    let args = Args::parse();
    cli::run(args).await
}
