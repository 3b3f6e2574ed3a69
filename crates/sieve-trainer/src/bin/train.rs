use clap::Parser;
use sieve_trainer::{TrainArgs, run_training};
use tracing::Level;

fn main() {
    let args = TrainArgs::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_training(&args) {
        eprintln!("Training failed: {e:#}");
        std::process::exit(1);
    }
}
