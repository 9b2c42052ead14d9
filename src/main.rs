use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    paperdigest::logging::init().context("init logging")?;

    let cli = paperdigest::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        paperdigest::cli::Command::Resolve(args) => {
            paperdigest::resolve::run(args).await.context("resolve")?;
        }
        paperdigest::cli::Command::Fetch(args) => {
            paperdigest::fetch::run(args).await.context("fetch")?;
        }
        paperdigest::cli::Command::Summarize(args) => {
            paperdigest::pipeline::run(args).await.context("summarize")?;
        }
        paperdigest::cli::Command::Run(args) => {
            paperdigest::digest::run(args).await.context("run")?;
        }
        paperdigest::cli::Command::Check(args) => {
            paperdigest::summarize::check(args).await.context("check")?;
        }
    }

    Ok(())
}
