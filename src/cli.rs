use clap::Parser;

/// Command line options: just where to listen.
#[derive(Parser, Debug)]
#[command(version, about = "A small RESP-speaking key-value server")]
pub struct Cli {
    /// Address to bind
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[clap(short, long, default_value_t = 6379)]
    pub port: u16,
}
