use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::assemble::OutputRecord;
use crate::sources::Schema;

const BOM: &str = "\u{feff}";

/// Append `records` to the store at `path`. A new (or empty) store gets a BOM
/// and the header row first; existing rows are never touched.
pub fn append(path: &Path, schema: &Schema, records: &[OutputRecord]) -> Result<()> {
    let fresh = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if fresh {
        file.write_all(BOM.as_bytes())?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if fresh {
        writer.write_record(schema.headers())?;
    }
    for record in records {
        writer.write_record(schema.row(record))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Buffers assembled records and appends them in batches of `batch_size`.
/// Whatever is still pending at exit is lost unless `finish` ran.
pub struct BatchPersister {
    path: PathBuf,
    schema: Schema,
    batch_size: usize,
    pending: Vec<OutputRecord>,
    flushes: usize,
    written: usize,
}

impl BatchPersister {
    pub fn new(path: &Path, schema: Schema, batch_size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            schema,
            batch_size: batch_size.max(1),
            pending: Vec::with_capacity(batch_size.max(1)),
            flushes: 0,
            written: 0,
        }
    }

    /// Buffer one record, flushing if the batch is full. Returns whether a
    /// flush happened.
    pub fn push(&mut self, record: OutputRecord) -> Result<bool> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Final flush of any remainder.
    pub fn finish(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        append(&self.path, &self.schema, &self.pending)?;
        self.written += self.pending.len();
        self.flushes += 1;
        info!(
            "Saved {} records to {} ({} this run)",
            self.pending.len(),
            self.path.display(),
            self.written
        );
        self.pending.clear();
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::yc::SCHEMA;

    fn record(name: &str) -> OutputRecord {
        OutputRecord {
            primary_name: name.to_string(),
            ..Default::default()
        }
    }

    fn data_rows(path: &Path) -> Vec<String> {
        let text = fs::read_to_string(path).unwrap();
        text.lines().skip(1).map(str::to_string).collect()
    }

    #[test]
    fn flush_count_matches_batching() {
        for (n, b) in [(0, 20), (2, 20), (20, 20), (21, 20), (45, 20), (7, 1), (9, 3)] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("out.csv");
            let mut persister = BatchPersister::new(&path, SCHEMA, b);

            let mut mid_run = 0;
            for i in 0..n {
                if persister.push(record(&format!("c{i}"))).unwrap() {
                    mid_run += 1;
                }
            }
            assert_eq!(mid_run, n / b, "n={n} b={b}");
            assert_eq!(persister.pending(), n % b);

            persister.finish().unwrap();
            let expected = n / b + usize::from(n % b != 0);
            assert_eq!(persister.flushes(), expected, "n={n} b={b}");
            assert_eq!(persister.written(), n);
            assert_eq!(persister.pending(), 0);
            if n > 0 {
                assert_eq!(data_rows(&path).len(), n);
            } else {
                assert!(!path.exists());
            }
        }
    }

    #[test]
    fn header_and_bom_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("yc.csv");

        append(&path, &SCHEMA, &[record("Stripe")]).unwrap();
        append(&path, &SCHEMA, &[record("Airbnb"), record("Acme, Inc.")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('\u{feff}'));
        assert_eq!(text.matches('\u{feff}').count(), 1);
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(
            lines[0],
            "name,address,website,founders_names,founders_linkedin,batch,year,yc_url,per_company_api"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Stripe,"));
        assert!(lines[3].starts_with("\"Acme, Inc.\","));
    }

    #[test]
    fn appends_after_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yc.csv");
        append(&path, &SCHEMA, &[record("Old")]).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let mut persister = BatchPersister::new(&path, SCHEMA, 20);
        persister.push(record("New")).unwrap();
        persister.finish().unwrap();

        let after = fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(data_rows(&path).len(), 2);
    }
}
