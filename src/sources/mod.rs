pub mod appsumo;
pub mod yc;

use async_trait::async_trait;

use crate::assemble::OutputRecord;
use crate::config::Settings;
use crate::error::ListingError;
use crate::fetcher::Fetch;

pub use appsumo::AppSumo;
pub use yc::YcDirectory;

/// One candidate from a listing page, before any detail fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub detail_url: String,
    pub batch: String,
    pub location: String,
    pub website: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Location,
    Website,
    Year,
    FoundersNames,
    FoundersLinks,
    Batch,
    DetailUrl,
    ApiUrl,
}

impl Field {
    pub fn value(self, record: &OutputRecord) -> String {
        match self {
            Field::Name => record.primary_name.clone(),
            Field::Location => record.location.clone(),
            Field::Website => record.website.clone(),
            Field::Year => record.year.to_string(),
            Field::FoundersNames => record.founders_names.clone(),
            Field::FoundersLinks => record.founders_links.clone(),
            Field::Batch => record.batch.clone(),
            Field::DetailUrl => record.detail_url.clone(),
            Field::ApiUrl => record.api_url.clone(),
        }
    }
}

/// Column layout of a source's store. The key column holds the dedup key.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub columns: &'static [(&'static str, Field)],
    pub key: Field,
}

impl Schema {
    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(h, _)| *h).collect()
    }

    pub fn row(&self, record: &OutputRecord) -> Vec<String> {
        self.columns.iter().map(|(_, f)| f.value(record)).collect()
    }

    pub fn header_of(&self, field: Field) -> Option<&'static str> {
        self.columns.iter().find(|(_, f)| *f == field).map(|(h, _)| *h)
    }

    pub fn key_header(&self) -> &'static str {
        self.header_of(self.key).unwrap_or("name")
    }

    pub fn name_header(&self) -> &'static str {
        self.header_of(Field::Name).unwrap_or("name")
    }
}

/// A harvestable site: where its listing lives and how to read it.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Whether a crawl of this source will ever need the rendering proxy.
    fn needs_rendering(&self, settings: &Settings) -> bool;

    /// Listing page `page` (0-based). `None` once the listing is exhausted.
    async fn listing(
        &self,
        fetcher: &dyn Fetch,
        page: usize,
    ) -> Result<Option<Vec<ListingEntry>>, ListingError>;

    /// Dedup key of an entry, matching the schema's key column.
    fn key<'a>(&self, entry: &'a ListingEntry) -> &'a str;

    /// Fetch and extract the entry's details. Never fails: failures degrade to
    /// empty fields.
    async fn harvest(&self, fetcher: &dyn Fetch, entry: &ListingEntry) -> Harvest;
}

/// An assembled record plus whether any detail fetch failed on the way.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub record: OutputRecord,
    pub failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rows_follow_column_order() {
        let schema = yc::SCHEMA;
        let record = OutputRecord {
            primary_name: "Stripe".into(),
            year: 2009,
            website: "https://stripe.com".into(),
            ..Default::default()
        };
        let row = schema.row(&record);
        assert_eq!(row.len(), schema.headers().len());
        assert_eq!(row[0], "Stripe");
        assert_eq!(row[2], "https://stripe.com");
        assert_eq!(row[6], "2009");
        assert_eq!(schema.key_header(), "name");
        assert_eq!(appsumo::SCHEMA.key_header(), "product_url");
        assert_eq!(appsumo::SCHEMA.name_header(), "product_name");
    }
}
