use clap::Parser;
use log::warn;
use tugboat::{cancel::Cancellation, cli::Cli};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let cancellation = Cancellation::new();
    let handler = cancellation.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        warn!("Interrupted, stopping the running command");
        handler.cancel();
    }) {
        warn!("failed to install the interrupt handler: {error}");
    }

    if let Err(error) = cli.run(cancellation) {
        const BOLD_RED: &str = "\x1b[1;31m";
        const BOLD: &str = "\x1b[1m";
        const RESET: &str = "\x1b[0m";
        eprintln!("{BOLD_RED}error{RESET}{BOLD}:{RESET} {error}");
        std::process::exit(1);
    }
}
