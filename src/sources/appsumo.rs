use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use super::{Field, Harvest, ListingEntry, Schema, Source};
use crate::assemble::assemble;
use crate::config::Settings;
use crate::error::ListingError;
use crate::extract::{markup, Detail};
use crate::fetcher::{Fetch, FetchMode};

pub const SOFTWARE_URL: &str = "https://appsumo.com/software/";
const LISTING_DOMAIN: &str = "appsumo.com";

static PRODUCT_ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="/products/"]"#).unwrap());

pub const SCHEMA: Schema = Schema {
    columns: &[
        ("product_name", Field::Name),
        ("product_website", Field::Website),
        ("year", Field::Year),
        ("founders_names", Field::FoundersNames),
        ("founders_linkedin", Field::FoundersLinks),
        ("product_url", Field::DetailUrl),
    ],
    key: Field::DetailUrl,
};

/// AppSumo's software catalog: paginated HTML, every page rendered by the
/// proxy.
pub struct AppSumo {
    base: Url,
}

impl AppSumo {
    pub fn new() -> Result<Self> {
        Self::with_base(SOFTWARE_URL)
    }

    pub fn with_base(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid catalog URL {base:?}"))?;
        Ok(Self { base })
    }

    /// Page 0 is the bare catalog URL, page n is `?page=n+1`.
    pub fn page_url(&self, page: usize) -> Url {
        let mut url = self.base.clone();
        if page > 0 {
            url.query_pairs_mut()
                .append_pair("page", &(page + 1).to_string());
        }
        url
    }
}

/// Product entries of one catalog page, in document order. Several anchors
/// to the same product collapse into one entry named by the first anchor
/// with text, or by the product slug.
pub fn parse_listing(html: &str, base: &Url) -> Vec<ListingEntry> {
    struct Product {
        url: String,
        slug: String,
        name: String,
    }

    let document = Html::parse_document(html);
    let mut products: Vec<Product> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for anchor in document.select(&PRODUCT_ANCHORS) {
        let Some(mut url) = anchor.value().attr("href").and_then(|h| base.join(h).ok()) else {
            continue;
        };
        url.set_query(None);
        url.set_fragment(None);
        let Some(slug) = product_slug(&url) else {
            continue;
        };

        let text = anchor
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        match index.get(url.as_str()).copied() {
            Some(i) if products[i].name.is_empty() => products[i].name = text,
            Some(_) => {}
            None => {
                index.insert(url.to_string(), products.len());
                products.push(Product {
                    url: url.to_string(),
                    slug,
                    name: text,
                });
            }
        }
    }

    products
        .into_iter()
        .map(|p| ListingEntry {
            name: if p.name.is_empty() { p.slug } else { p.name },
            detail_url: p.url,
            ..Default::default()
        })
        .collect()
}

fn product_slug(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.skip_while(|s| *s != "products");
    segments.next()?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Source for AppSumo {
    fn name(&self) -> &'static str {
        "appsumo"
    }

    fn schema(&self) -> Schema {
        SCHEMA
    }

    fn needs_rendering(&self, _settings: &Settings) -> bool {
        true
    }

    async fn listing(
        &self,
        fetcher: &dyn Fetch,
        page: usize,
    ) -> Result<Option<Vec<ListingEntry>>, ListingError> {
        let url = self.page_url(page);
        info!("Fetching catalog page {}: {}", page + 1, url);
        let payload = fetcher.fetch(url.as_str(), FetchMode::Rendered).await?;
        let entries = parse_listing(&payload.body, &url);
        info!("Products on page {}: {}", page + 1, entries.len());
        Ok(Some(entries))
    }

    fn key<'a>(&self, entry: &'a ListingEntry) -> &'a str {
        &entry.detail_url
    }

    async fn harvest(&self, fetcher: &dyn Fetch, entry: &ListingEntry) -> Harvest {
        let mut details = Vec::new();
        let mut people = Vec::new();
        let mut failures = 0;

        match fetcher.fetch(&entry.detail_url, FetchMode::Rendered).await {
            Ok(payload) => {
                people = markup::extract(&payload.body);
                details.push(Detail::Markup(payload.body));
            }
            Err(e) => {
                warn!("{}", e);
                failures += 1;
            }
        }

        Harvest {
            record: assemble(entry, &details, &people, LISTING_DOMAIN),
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::stub::StubFetcher;

    #[test]
    fn page_urls() {
        let source = AppSumo::new().unwrap();
        assert_eq!(source.page_url(0).as_str(), "https://appsumo.com/software/");
        assert_eq!(source.page_url(2).as_str(), "https://appsumo.com/software/?page=3");
    }

    #[test]
    fn listing_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/appsumo_listing.html").unwrap();
        let base = Url::parse(SOFTWARE_URL).unwrap();
        let entries = parse_listing(&html, &base);
        let got: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.detail_url.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("TidyCal", "https://appsumo.com/products/tidycal/"),
                ("Pabbly Connect", "https://appsumo.com/products/pabbly-connect/"),
                ("mystery-tool", "https://appsumo.com/products/mystery-tool/"),
            ]
        );
    }

    #[test]
    fn empty_page_has_no_entries() {
        let base = Url::parse(SOFTWARE_URL).unwrap();
        assert!(parse_listing("<html><body>No results</body></html>", &base).is_empty());
    }

    #[tokio::test]
    async fn product_page_harvest() {
        let url = "https://appsumo.com/products/tidycal/";
        let html = std::fs::read_to_string("tests/fixtures/appsumo_product.html").unwrap();
        let fetcher = StubFetcher::new().ok(url, FetchMode::Rendered, &html);
        let entry = ListingEntry {
            name: "TidyCal".into(),
            detail_url: url.into(),
            ..Default::default()
        };

        let harvest = AppSumo::new().unwrap().harvest(&fetcher, &entry).await;
        let rec = harvest.record;
        assert_eq!(harvest.failures, 0);
        assert_eq!(rec.website, "https://tidycal.com");
        assert_eq!(rec.year, 2021);
        assert_eq!(rec.founders_names, "Ayush Jangid");
        assert_eq!(rec.founders_links, "https://www.linkedin.com/in/ayushjangid");
        assert_eq!(
            SCHEMA.row(&rec),
            vec![
                "TidyCal",
                "https://tidycal.com",
                "2021",
                "Ayush Jangid",
                "https://www.linkedin.com/in/ayushjangid",
                url,
            ]
        );
    }
}
