use clap::Parser;

use proton_cli::{cli::MailCli, commands, logging, output};

#[tokio::main]
async fn main() {
    let cli = MailCli::parse();
    logging::init_logging(cli.verbose);

    let outcome = commands::run_mail(&cli).await;
    std::process::exit(output::report(&outcome));
}
