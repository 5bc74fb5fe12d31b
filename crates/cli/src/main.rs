mod commands;
mod config;
mod progress;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stagehand",
    version,
    about = "Move artifacts between a local sandbox and remote blob stores"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        commands::Command::Init(args) => commands::init::run(args).await,
        commands::Command::Put(args) => commands::transfer::put(args).await,
        commands::Command::Get(args) => commands::transfer::get(args).await,
        commands::Command::Exists(args) => commands::transfer::exists(args).await,
        commands::Command::Drivers(args) => commands::drivers::run(args).await,
        commands::Command::Pack(args) => commands::literal::pack(args).await,
        commands::Command::Unpack(args) => commands::literal::unpack(args).await,
    }
}
