//! Link header pagination (RFC 8288)
//!
//! Shopify delivers the next-page cursor as an opaque URL in the `Link`
//! response header:
//! `Link: <https://shop.myshopify.com/admin/api/2023-07/orders.json?page_info=abc&limit=250>; rel="next"`

use reqwest::header::{HeaderMap, LINK};

/// Extracts the cursor URL for a given relation from the `Link` header
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    pub rel: String,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderPaginator {
    /// Create a new link header paginator
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }

    /// Next-page URL, or `None` on the last page.
    ///
    /// Fails only when a `Link` header is present but not valid text.
    pub fn next_cursor(&self, headers: &HeaderMap) -> Result<Option<String>, String> {
        for value in headers.get_all(LINK) {
            let text = value
                .to_str()
                .map_err(|e| format!("unreadable Link header: {e}"))?;
            if let Some(url) = parse_link_header(text, &self.rel) {
                return Ok(Some(url));
            }
        }
        Ok(None)
    }
}

/// Parse a Link header and extract the URL for the given rel.
///
/// URLs are delimited by `<` `>` rather than split on commas, since cursor
/// URLs may carry comma-joined field lists.
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    let mut rest = header;

    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let close = after_open.find('>')?;
        let url = after_open[..close].trim();
        let after_url = &after_open[close + 1..];

        // Parameters run until the next link value.
        let params_end = after_url.find('<').unwrap_or(after_url.len());
        let params = &after_url[..params_end];

        if !url.is_empty() && has_rel(params, target_rel) {
            return Some(url.to_string());
        }

        rest = &after_url[params_end..];
    }

    None
}

fn has_rel(params: &str, target_rel: &str) -> bool {
    params
        .split(';')
        .map(str::trim)
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("rel")
                .then(|| value.trim().trim_end_matches(',').trim().trim_matches('"').trim_matches('\''))
        })
        .any(|rels| {
            rels.split_ascii_whitespace()
                .any(|rel| rel.eq_ignore_ascii_case(target_rel))
        })
}
