mod cli;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli::init_logging(&cli.logging()) {
        eprintln!("Error: failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = cli::execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
