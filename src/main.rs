use clap::Parser;
use notekeeper::cli::commands::Cli;
use notekeeper::cli::handlers;
use notekeeper::logging::{self, Verbosity};

fn main() {
    let cli = Cli::parse();
    logging::init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
