use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::fetcher::Fetch;
use crate::ledger::DedupLedger;
use crate::persist::BatchPersister;
use crate::sources::{ListingEntry, Source};

/// Counters returned after a crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages: usize,
    pub seen: usize,
    pub skipped_existing: usize,
    /// Entries dropped because their name is already taken.
    pub duplicate_names: usize,
    pub harvested: usize,
    pub detail_failures: usize,
    pub flushes: usize,
    pub written: usize,
}

pub struct CrawlOptions {
    pub output: PathBuf,
    pub limit: usize,
    pub delay: Duration,
    pub batch_size: usize,
    pub max_pages: usize,
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings, output: PathBuf) -> Self {
        Self {
            output,
            limit: settings.limit,
            delay: settings.delay,
            batch_size: settings.batch_size,
            max_pages: settings.max_pages,
        }
    }
}

/// Driver-local progress. Never persisted: a restarted run rebuilds
/// everything it needs from the ledger.
#[derive(Default)]
struct CrawlState {
    page: usize,
    harvested: usize,
    /// Every key listed so far this run, stored or not.
    seen: HashSet<String>,
    /// Names harvested this run.
    names: HashSet<String>,
}

/// Crawl `source` sequentially: listing page, then each new entry's details,
/// appending in batches, sleeping after every entry.
pub async fn run(
    source: &dyn Source,
    fetcher: &dyn Fetch,
    settings: &Settings,
    opts: &CrawlOptions,
) -> Result<CrawlReport> {
    if source.needs_rendering(settings) && !fetcher.can_render() {
        bail!(
            "source '{}' needs the rendering proxy but SCRAPERAPI_KEY is not set",
            source.name()
        );
    }

    let schema = source.schema();
    let ledger = DedupLedger::load(&opts.output, schema.key_header(), schema.name_header())?;
    if !ledger.is_empty() {
        info!("Resuming: {} entries already stored", ledger.len());
    }
    let mut persister = BatchPersister::new(&opts.output, schema, opts.batch_size);
    let mut state = CrawlState::default();
    let mut report = CrawlReport::default();

    let pb = ProgressBar::new(opts.limit as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")?
            .progress_chars("=> "),
    );

    'pages: while state.harvested < opts.limit && state.page < opts.max_pages.max(1) {
        let entries = match source.listing(fetcher, state.page).await {
            Ok(Some(entries)) if !entries.is_empty() => entries,
            Ok(_) => {
                info!("Listing exhausted after {} page(s)", state.page);
                break;
            }
            Err(e) if state.page == 0 => {
                pb.finish_and_clear();
                return Err(e).context(format!("Failed to fetch {} listing", source.name()));
            }
            Err(e) => {
                warn!("Stopping at page {}: {}", state.page + 1, e);
                break;
            }
        };
        state.page += 1;
        report.pages += 1;
        report.seen += entries.len();

        let Some(fresh) = select_fresh(source, &ledger, &mut state, entries, &mut report) else {
            info!("Page {} lists nothing new, stopping", state.page);
            break;
        };

        for entry in fresh {
            pb.set_message(entry.name.clone());
            let harvest = source.harvest(fetcher, &entry).await;
            report.detail_failures += harvest.failures;

            if !persister.push(harvest.record)? {
                debug!("{} record(s) pending", persister.pending());
            }
            state.harvested += 1;
            pb.inc(1);

            tokio::time::sleep(opts.delay).await;

            if state.harvested >= opts.limit {
                info!("Reached limit of {} new records", opts.limit);
                break 'pages;
            }
        }
    }

    persister.finish()?;
    pb.finish_and_clear();

    report.harvested = state.harvested;
    report.flushes = persister.flushes();
    report.written = persister.written();
    Ok(report)
}

/// Entries whose key is neither stored nor listed earlier this run, and whose
/// name is not taken yet. `None` when the page lists no key that was not
/// already listed this run, meaning the source is repeating itself.
fn select_fresh(
    source: &dyn Source,
    ledger: &DedupLedger,
    state: &mut CrawlState,
    entries: Vec<ListingEntry>,
    report: &mut CrawlReport,
) -> Option<Vec<ListingEntry>> {
    let mut keyed = 0;
    let mut new_keys = 0;
    let mut fresh = Vec::new();

    for entry in entries {
        let name = entry.name.trim().to_string();
        let key = source.key(&entry).trim().to_string();
        if name.is_empty() || key.is_empty() {
            warn!("Skipping listing entry without a name: {:?}", entry.detail_url);
            continue;
        }
        keyed += 1;
        if !state.seen.insert(key.clone()) {
            debug!("Already listed this run: {}", name);
            continue;
        }
        new_keys += 1;
        if ledger.contains(&key) {
            report.skipped_existing += 1;
            continue;
        }
        if ledger.has_name(&name) || !state.names.insert(name) {
            warn!("Skipping {:?}: another entry already has its name", key);
            report.duplicate_names += 1;
            continue;
        }
        fresh.push(entry);
    }

    if keyed > 0 && new_keys == 0 {
        None
    } else {
        Some(fresh)
    }
}
