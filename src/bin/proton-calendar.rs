use clap::Parser;

use proton_cli::{cli::CalendarCli, commands, logging, output};

#[tokio::main]
async fn main() {
    let cli = CalendarCli::parse();
    logging::init_logging(cli.verbose);

    let outcome = commands::run_calendar(&cli).await;
    std::process::exit(output::report(&outcome));
}
