use anyhow::{bail, Result};
use bambu_status::{
    config::loading::load_config,
    watch::watch,
    PrinterEndpoint, SessionOutcome, StatusSession,
};
use clap::Parser;
use chrono::Local;
use cli::{render_title, Cli, Commands};
use log::error;

mod cli;

fn main() -> Result<()> {
    colog::init();

    let cli = Cli::parse();
    let settings = load_config(cli.config.as_deref())?;
    let endpoint = PrinterEndpoint::from(&settings.printer);
    let session = StatusSession::from_settings(&settings.session);
    let timeout = cli.timeout.unwrap_or(settings.session.timeout);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            let status = session.fetch(&endpoint, timeout)?;
            println!("{}", render_title(&status));
        }
        Commands::Dump => match session.fetch_outcome(&endpoint, timeout)? {
            SessionOutcome::Classified { report, .. } => println!("{}", serde_json::to_string_pretty(report.document())?),
            outcome => {
                error!("No report received: {outcome:?}");
                bail!("printer {} did not report", endpoint.serial);
            }
        },
        Commands::Watch => watch(&session, &endpoint, timeout, &settings.watch, |status| {
            println!("[{}] {}", Local::now().format("%H:%M:%S"), render_title(&status));
        })?,
    }

    Ok(())
}
