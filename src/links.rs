use std::path::Path;

use anyhow::Context as _;

/// Reads alert links from a line-oriented file. Lines that do not mention
/// `http` are skipped; the rest are trimmed and returned in file order.
pub fn read_alert_links(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read links file: {}", path.display()))?;
    Ok(parse_alert_links(&contents))
}

pub fn parse_alert_links(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| line.contains("http"))
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_alert_links;

    #[test]
    fn keeps_only_url_lines() {
        let contents = "Alert for Mar 3\n  https://a.example/1  \n\nnot a link\nhttp://b.example/2\n";
        assert_eq!(
            parse_alert_links(contents),
            vec!["https://a.example/1", "http://b.example/2"]
        );
    }

    #[test]
    fn empty_file_yields_no_links() {
        assert!(parse_alert_links("").is_empty());
    }
}
