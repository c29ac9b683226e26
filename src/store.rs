use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;

use crate::sources::{Field, Schema};

const BOM: &str = "\u{feff}";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rows: usize,
    pub with_website: usize,
    pub with_founders: usize,
    /// (year, rows), newest first; year 0 means unknown.
    pub by_year: Vec<(u16, usize)>,
}

struct Store {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Store {
    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.trim_start_matches(BOM).as_bytes());
        let headers = reader.headers()?.clone();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Malformed row in {}", path.display()))?;
        Ok(Self { headers, rows })
    }

    fn column(&self, schema: &Schema, field: Field) -> Option<usize> {
        let header = schema.header_of(field)?;
        self.headers.iter().position(|h| h.trim() == header)
    }
}

fn year_of(row: &StringRecord, col: Option<usize>) -> u16 {
    col.and_then(|c| row.get(c))
        .and_then(|y| y.trim().parse().ok())
        .unwrap_or(0)
}

fn filled(row: &StringRecord, col: Option<usize>) -> bool {
    col.and_then(|c| row.get(c))
        .is_some_and(|v| !v.trim().is_empty())
}

pub fn stats(path: &Path, schema: &Schema) -> Result<StoreStats> {
    let store = Store::read(path)?;
    let year_col = store.column(schema, Field::Year);
    let website_col = store.column(schema, Field::Website);
    let founders_col = store.column(schema, Field::FoundersNames);

    let mut by_year: BTreeMap<u16, usize> = BTreeMap::new();
    for row in &store.rows {
        *by_year.entry(year_of(row, year_col)).or_default() += 1;
    }

    Ok(StoreStats {
        rows: store.rows.len(),
        with_website: store.rows.iter().filter(|r| filled(r, website_col)).count(),
        with_founders: store.rows.iter().filter(|r| filled(r, founders_col)).count(),
        by_year: by_year.into_iter().rev().collect(),
    })
}

/// Rewrite the store ordered by year, newest first. Rows of the same year keep
/// their order. Goes through a temp file so a crash leaves the old store.
pub fn sort_by_year(path: &Path, schema: &Schema) -> Result<usize> {
    let store = Store::read(path)?;
    let year_col = store.column(schema, Field::Year);
    let Store { headers, mut rows } = store;
    rows.sort_by_key(|row| std::cmp::Reverse(year_of(row, year_col)));

    let tmp = path.with_extension("csv.tmp");
    {
        let mut file =
            File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(BOM.as_bytes())?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::OutputRecord;
    use crate::persist::append;
    use crate::sources::yc::SCHEMA;

    fn rec(name: &str, year: u16, website: &str, founders: &str) -> OutputRecord {
        OutputRecord {
            primary_name: name.into(),
            year,
            website: website.into(),
            founders_names: founders.into(),
            ..Default::default()
        }
    }

    fn seed(path: &Path) {
        append(
            path,
            &SCHEMA,
            &[
                rec("Old", 2009, "https://old.com", ""),
                rec("Unknown", 0, "", ""),
                rec("New", 2024, "", "Ada"),
                rec("Mid", 2015, "https://mid.io", "Grace; Linus"),
                rec("Also New", 2024, "https://new.dev", ""),
            ],
        )
        .unwrap();
    }

    #[test]
    fn summarizes_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yc.csv");
        seed(&path);

        let s = stats(&path, &SCHEMA).unwrap();
        assert_eq!(s.rows, 5);
        assert_eq!(s.with_website, 3);
        assert_eq!(s.with_founders, 2);
        assert_eq!(s.by_year, vec![(2024, 2), (2015, 1), (2009, 1), (0, 1)]);
    }

    #[test]
    fn sorts_newest_first_keeping_ties_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yc.csv");
        seed(&path);

        assert_eq!(sort_by_year(&path, &SCHEMA).unwrap(), 5);
        let store = Store::read(&path).unwrap();
        let names: Vec<&str> = store.rows.iter().map(|r| &r[0]).collect();
        assert_eq!(names, vec!["New", "Also New", "Mid", "Old", "Unknown"]);
        assert_eq!(store.headers.len(), SCHEMA.columns.len());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches('\u{feff}').count(), 1);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn missing_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(stats(&dir.path().join("nope.csv"), &SCHEMA).is_err());
    }
}
