use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use novelsearch::cli::{Cli, Command};
use novelsearch::commands;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelsearch::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");
    let config = commands::load_config(&cli.global).context("load config")?;

    match cli.command {
        Command::Search(args) => commands::search(&config, args).await.context("search")?,
        Command::Open(args) => commands::open(&config, args).await.context("open")?,
        Command::Url(args) => commands::url(&config, args).context("url")?,
        Command::Browse(args) => commands::browse(&config, args).await.context("browse")?,
        Command::Prefs { command } => commands::prefs(&config, command).context("prefs")?,
        Command::Serve(args) => commands::serve(&config, args).await.context("serve")?,
    }

    Ok(())
}
