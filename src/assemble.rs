use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::extract::links::is_external_website;
use crate::extract::{Detail, PersonRecord};
use crate::sources::ListingEntry;

static YEAR_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{2})$").unwrap());
static LAUNCHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)launched\D{0,40}?((?:19|20)\d{2})\b").unwrap());
static ABSOLUTE_ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href^="http"]"#).unwrap());

const JOIN_SEP: &str = "; ";

/// One persisted row. Every field is present; unknown text is empty, unknown
/// year is 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRecord {
    pub primary_name: String,
    pub location: String,
    pub website: String,
    pub year: u16,
    pub founders_names: String,
    pub founders_links: String,
    pub batch: String,
    pub detail_url: String,
    pub api_url: String,
}

/// Year from a batch or date label by its two-digit suffix: `S21` is 2021,
/// `Summer 2012` is 2012. Anything else is 0.
pub fn year_from_label(label: &str) -> u16 {
    YEAR_SUFFIX_RE
        .captures(label.trim())
        .and_then(|c| c[1].parse::<u16>().ok())
        .map(|yy| 2000 + yy)
        .unwrap_or(0)
}

/// Year of the "Launched ... 2019" label of a product page.
pub fn launch_year(details: &[Detail]) -> Option<u16> {
    details.iter().find_map(|d| match d {
        Detail::Markup(html) => {
            let text = Html::parse_document(html)
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ");
            LAUNCHED_RE
                .captures(&text)
                .and_then(|c| c[1].parse::<u16>().ok())
        }
        Detail::Structured(_) => None,
    })
}

/// First absolute link in the detail payloads that points off the listing
/// site and is not a social profile.
pub fn first_external_link(details: &[Detail], listing_domain: &str) -> Option<String> {
    details.iter().find_map(|d| match d {
        Detail::Structured(v) => v
            .get("website")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| is_external_website(url, listing_domain))
            .map(str::to_string),
        Detail::Markup(html) => Html::parse_document(html)
            .select(&ABSOLUTE_ANCHORS)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|url| is_external_website(url, listing_domain))
            .map(str::to_string),
    })
}

pub fn join_founders(people: &[PersonRecord]) -> (String, String) {
    (
        join_non_empty(people.iter().map(|p| p.name.as_str())),
        join_non_empty(people.iter().map(|p| p.profile_link.as_str())),
    )
}

fn join_non_empty<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(JOIN_SEP)
}

/// Merge a listing entry with whatever the detail fetches produced.
pub fn assemble(
    entry: &ListingEntry,
    details: &[Detail],
    people: &[PersonRecord],
    listing_domain: &str,
) -> OutputRecord {
    let website = Some(entry.website.trim())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .or_else(|| first_external_link(details, listing_domain))
        .unwrap_or_default();

    let year = match entry.batch.trim() {
        "" => launch_year(details).unwrap_or(0),
        batch => year_from_label(batch),
    };

    let (founders_names, founders_links) = join_founders(people);

    OutputRecord {
        primary_name: entry.name.trim().to_string(),
        location: entry.location.clone(),
        website,
        year,
        founders_names,
        founders_links,
        batch: entry.batch.clone(),
        detail_url: entry.detail_url.clone(),
        api_url: entry.api_url.clone(),
    }
}
