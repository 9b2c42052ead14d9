use std::time::Duration;

use anyhow::Context as _;

const USER_AGENT: &str = concat!("paperdigest/", env!("CARGO_PKG_VERSION"));

/// Network settings passed explicitly to every HTTP client. Nothing here is
/// read from process-wide proxy variables.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub proxy: Option<String>,
    pub timeout: Option<Duration>,
}

pub fn build_client(config: &NetworkConfig) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10));

    builder = match config.proxy.as_deref() {
        Some(proxy) => builder.proxy(
            reqwest::Proxy::all(proxy).with_context(|| format!("parse proxy url: {proxy}"))?,
        ),
        None => builder.no_proxy(),
    };

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().context("build http client")
}
