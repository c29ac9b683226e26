use std::cmp::Reverse;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{Field, Harvest, ListingEntry, Schema, Source};
use crate::assemble::{assemble, year_from_label};
use crate::config::Settings;
use crate::error::ListingError;
use crate::extract::{markup, structured, Detail, PersonRecord};
use crate::fetcher::{Fetch, FetchMode};

pub const COMPANIES_FEED_URL: &str = "https://yc-oss.github.io/api/companies/all.json";
const LISTING_DOMAIN: &str = "ycombinator.com";

pub const SCHEMA: Schema = Schema {
    columns: &[
        ("name", Field::Name),
        ("address", Field::Location),
        ("website", Field::Website),
        ("founders_names", Field::FoundersNames),
        ("founders_linkedin", Field::FoundersLinks),
        ("batch", Field::Batch),
        ("year", Field::Year),
        ("yc_url", Field::DetailUrl),
        ("per_company_api", Field::ApiUrl),
    ],
    key: Field::Name,
};

/// One company of the feed. Missing or null fields read as empty.
#[derive(Debug, Deserialize)]
struct FeedCompany {
    name: Option<String>,
    batch: Option<String>,
    website: Option<String>,
    all_locations: Option<String>,
    url: Option<String>,
    api: Option<String>,
}

impl From<FeedCompany> for ListingEntry {
    fn from(c: FeedCompany) -> Self {
        ListingEntry {
            name: c.name.unwrap_or_default().trim().to_string(),
            detail_url: c.url.unwrap_or_default(),
            batch: c.batch.unwrap_or_default(),
            location: c.all_locations.unwrap_or_default(),
            website: c.website.unwrap_or_default(),
            api_url: c.api.unwrap_or_default(),
        }
    }
}

/// The YC company directory: a single JSON feed, then per-company JSON with a
/// rendered-page fallback for founders.
pub struct YcDirectory {
    feed_url: String,
    fallback_html: bool,
}

impl YcDirectory {
    pub fn new(settings: &Settings) -> Self {
        Self::with_feed(COMPANIES_FEED_URL, settings.fallback_html)
    }

    pub fn with_feed(feed_url: &str, fallback_html: bool) -> Self {
        Self {
            feed_url: feed_url.to_string(),
            fallback_html,
        }
    }
}

/// Feed entries, newest batch first. Entries that do not deserialize are
/// skipped. The sort is stable, so feed order breaks ties.
pub fn parse_feed(url: &str, body: &str) -> Result<Vec<ListingEntry>, ListingError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| ListingError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let Value::Array(items) = parsed else {
        return Err(ListingError::Parse {
            url: url.to_string(),
            reason: "expected a JSON array of companies".to_string(),
        });
    };

    let mut entries: Vec<ListingEntry> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FeedCompany>(item) {
            Ok(company) => Some(ListingEntry::from(company)),
            Err(e) => {
                warn!("Skipping malformed feed entry: {}", e);
                None
            }
        })
        .collect();

    entries.sort_by_key(|e| Reverse(year_from_label(&e.batch)));
    Ok(entries)
}

#[async_trait]
impl Source for YcDirectory {
    fn name(&self) -> &'static str {
        "yc"
    }

    fn schema(&self) -> Schema {
        SCHEMA
    }

    fn needs_rendering(&self, _settings: &Settings) -> bool {
        self.fallback_html
    }

    async fn listing(
        &self,
        fetcher: &dyn Fetch,
        page: usize,
    ) -> Result<Option<Vec<ListingEntry>>, ListingError> {
        if page > 0 {
            return Ok(None);
        }
        info!("Fetching companies feed: {}", self.feed_url);
        let payload = fetcher.fetch(&self.feed_url, FetchMode::Direct).await?;
        let entries = parse_feed(&self.feed_url, &payload.body)?;
        info!("Total companies in feed: {}", entries.len());
        Ok(Some(entries))
    }

    fn key<'a>(&self, entry: &'a ListingEntry) -> &'a str {
        &entry.name
    }

    async fn harvest(&self, fetcher: &dyn Fetch, entry: &ListingEntry) -> Harvest {
        let mut details = Vec::new();
        let mut people: Vec<PersonRecord> = Vec::new();
        let mut failures = 0;

        if !entry.api_url.is_empty() {
            match fetcher.fetch(&entry.api_url, FetchMode::Direct).await {
                Ok(payload) => match payload.json() {
                    Some(company @ Value::Object(_)) => {
                        people = structured::extract(&company).into_people();
                        details.push(Detail::Structured(company));
                    }
                    _ => {
                        warn!("Unparseable company JSON from {}", entry.api_url);
                        failures += 1;
                    }
                },
                Err(e) => {
                    warn!("{}", e);
                    failures += 1;
                }
            }
        }

        if people.is_empty() && self.fallback_html && !entry.detail_url.is_empty() {
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
        }

        Harvest {
            record: assemble(entry, &details, &people, LISTING_DOMAIN),
            failures,
        }
    }
}
