use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

const BOM: char = '\u{feff}';

/// Keys and names already present in the persisted store. Loaded once per run
/// and never written to: the store on disk is the source of truth.
#[derive(Debug, Default)]
pub struct DedupLedger {
    keys: HashSet<String>,
    names: HashSet<String>,
}

impl DedupLedger {
    /// Read `key_column` and `name_column` of the store at `path`. A missing
    /// store is an empty ledger.
    pub fn load(path: &Path, key_column: &str, name_column: &str) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No existing store at {}, starting fresh", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        let text = text.trim_start_matches(BOM);
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?;
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let (Some(key_col), Some(name_col)) = (column(key_column), column(name_column)) else {
            bail!(
                "{} lacks the {:?} or {:?} column; is it the output of another source?",
                path.display(),
                key_column,
                name_column
            );
        };

        let mut ledger = Self::default();
        for (i, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Malformed row {} in {}", i + 2, path.display()))?;
            if let Some(key) = non_blank(&record, key_col) {
                ledger.keys.insert(key);
            }
            if let Some(name) = non_blank(&record, name_col) {
                ledger.names.insert(name);
            }
        }

        info!("Loaded {} existing keys from {}", ledger.len(), path.display());
        Ok(ledger)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key.trim())
    }

    /// Whether a stored row already carries this primary name.
    pub fn has_name(&self, name: &str) -> bool {
        self.names.contains(name.trim())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn non_blank(record: &csv::StringRecord, col: usize) -> Option<String> {
    record
        .get(col)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DedupLedger::load(&dir.path().join("none.csv"), "name", "name").unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains("Stripe"));
    }

    #[test]
    fn reads_key_column_through_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yc.csv");
        fs::write(
            &path,
            "\u{feff}name,website\nStripe,https://stripe.com\n\"Acme, Inc.\",\n,https://nameless.dev\n",
        )
        .unwrap();

        let ledger = DedupLedger::load(&path, "name", "name").unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.has_name(" Stripe "));
        assert!(ledger.contains("Stripe"));
        assert!(ledger.contains("Acme, Inc."));
        assert!(!ledger.contains("https://stripe.com"));
    }

    #[test]
    fn other_column_as_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsumo.csv");
        fs::write(
            &path,
            "product_name,product_url\nTidyCal,https://appsumo.com/products/tidycal/\n",
        )
        .unwrap();

        let ledger = DedupLedger::load(&path, "product_url", "product_name").unwrap();
        assert!(ledger.contains("https://appsumo.com/products/tidycal/"));
        assert!(!ledger.contains("TidyCal"));
        assert!(ledger.has_name("TidyCal"));
        assert!(!ledger.has_name("https://appsumo.com/products/tidycal/"));
    }

    #[test]
    fn wrong_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "product_name,product_url\n").unwrap();
        assert!(DedupLedger::load(&path, "name", "name").is_err());
        assert!(DedupLedger::load(&path, "product_url", "name").is_err());
    }

    #[test]
    fn empty_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        assert!(DedupLedger::load(&path, "name", "name").unwrap().is_empty());
    }
}
