use anyhow::Result;
use clap::Parser;
use log::info;

use respkv::cli::Cli;
use respkv::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    info!("starting respkv");
    server::run(&args.host, args.port).await
}
