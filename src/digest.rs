use anyhow::Context as _;

use crate::cli::{FetchArgs, RunArgs, SummarizeArgs};

/// Daily flow for one family: resolve and fetch the alert links, then
/// summarize everything pending.
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let RunArgs {
        fetch,
        processed,
        output_dir,
        output_name,
        summarize_concurrency,
        patience,
        summary,
    } = args;
    let family = fetch.family;
    let pending = fetch
        .dir
        .clone()
        .unwrap_or_else(|| family.default_pending_dir());
    let network = fetch.network.clone();

    tracing::info!(%family, "run: fetch");
    crate::fetch::run(FetchArgs {
        dir: Some(pending.clone()),
        ..fetch
    })
    .await
    .context("fetch")?;

    tracing::info!(%family, "run: summarize");
    let report = crate::pipeline::run(SummarizeArgs {
        family,
        pending: Some(pending),
        processed,
        output_dir,
        output_name,
        concurrency: summarize_concurrency,
        patience,
        summary,
        network,
    })
    .await
    .context("summarize")?;

    if report.remaining > 0 {
        tracing::warn!(
            %family,
            remaining = report.remaining,
            "run finished with unsummarized documents"
        );
    }
    Ok(())
}
