use std::collections::HashSet;
use std::io::Write as _;

use anyhow::Context as _;
use url::Url;

use crate::cli::ResolveArgs;
use crate::family::SourceFamily;

const ACS_PDF_BASE: &str = "https://pubs.acs.org/doi/pdf/";

/// ACS landing pages put a view selector between `doi/` and the DOI itself.
const ACS_VIEW_SEGMENTS: &[&str] = &["abs/", "full/", "pdf/", "epdf/"];

pub async fn run(args: ResolveArgs) -> anyhow::Result<()> {
    let links_path = args
        .links
        .clone()
        .unwrap_or_else(|| args.family.default_links_file());
    let links = crate::links::read_alert_links(&links_path)?;

    let client = crate::net::build_client(&args.network.to_config()).context("resolver client")?;
    let resolved = resolve_all(&client, &links, args.family, args.concurrency).await;

    let mut out: Box<dyn std::io::Write> = match args.out.as_deref() {
        Some(path) => {
            Box::new(
                std::fs::File::create(path)
                    .with_context(|| format!("create resolved urls file: {}", path.display()))?,
            )
        }
        None => Box::new(std::io::stdout().lock()),
    };
    for url in &resolved {
        writeln!(out, "{url}").context("write resolved url")?;
    }
    out.flush().context("flush resolved urls")?;

    Ok(())
}

/// Follows redirects for `link` and rewrites the landing URL into a direct
/// document URL.
pub async fn resolve_link(
    client: &reqwest::Client,
    link: &str,
    family: SourceFamily,
) -> anyhow::Result<Url> {
    let response = client
        .get(link)
        .send()
        .await
        .with_context(|| format!("GET {link}"))?;
    let landing = response.url().clone();
    tracing::debug!(%link, %landing, status = %response.status(), "followed alert link");
    Ok(rewrite_landing_url(family, &landing))
}

pub fn rewrite_landing_url(family: SourceFamily, landing: &Url) -> Url {
    match family {
        SourceFamily::Acs => rewrite_acs(landing),
        SourceFamily::Aps => rewrite_aps(landing),
    }
}

fn rewrite_acs(landing: &Url) -> Url {
    let raw = landing.as_str();
    let Some((_, after)) = raw.split_once("doi/") else {
        return landing.clone();
    };
    let mut doi = after.split(['?', '#']).next().unwrap_or_default();
    for view in ACS_VIEW_SEGMENTS {
        if let Some(stripped) = doi.strip_prefix(view) {
            doi = stripped;
            break;
        }
    }
    if doi.is_empty() {
        return landing.clone();
    }

    match Url::parse(&format!("{ACS_PDF_BASE}{doi}?download=true")) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(%landing, ?err, "acs rewrite produced invalid url; keeping landing url");
            landing.clone()
        }
    }
}

fn rewrite_aps(landing: &Url) -> Url {
    let mut url = landing.clone();
    let path = url.path().replace("/abstract/", "/pdf/");
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Resolves every link with at most `concurrency` requests in flight.
/// Failed links are logged and dropped; the result keeps input order and
/// holds each URL once.
pub async fn resolve_all(
    client: &reqwest::Client,
    links: &[String],
    family: SourceFamily,
    concurrency: usize,
) -> Vec<Url> {
    let concurrency = concurrency.max(1);
    let mut join_set = tokio::task::JoinSet::new();
    let mut next_idx = 0usize;
    let mut results: Vec<Option<Url>> = vec![None; links.len()];
    let mut failed = 0usize;

    while next_idx < links.len() || !join_set.is_empty() {
        while next_idx < links.len() && join_set.len() < concurrency {
            let idx = next_idx;
            let link = links[idx].clone();
            let client = client.clone();
            join_set.spawn(async move {
                let outcome = resolve_link(&client, &link, family).await;
                (idx, link, outcome)
            });
            next_idx += 1;
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok((idx, _, Ok(url))) => results[idx] = Some(url),
            Ok((_, link, Err(err))) => {
                failed += 1;
                tracing::warn!(%link, error = %format!("{err:#}"), "resolve failed; skipping link");
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(?err, "resolve task panicked; skipping link");
            }
        }
    }

    let mut seen = HashSet::new();
    let resolved = results
        .into_iter()
        .flatten()
        .filter(|url| seen.insert(url.clone()))
        .collect::<Vec<_>>();

    tracing::info!(
        %family,
        links = links.len(),
        resolved = resolved.len(),
        failed,
        "resolve complete"
    );
    resolved
}
