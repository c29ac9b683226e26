mod assemble;
mod config;
mod crawl;
mod error;
mod extract;
mod fetcher;
mod ledger;
mod persist;
mod sources;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use config::Settings;
use crawl::CrawlOptions;
use fetcher::HttpFetcher;
use sources::{AppSumo, Schema, Source, YcDirectory};

#[derive(Parser)]
#[command(name = "harvester", about = "Resumable founder harvester for startup listings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest the YC company directory (JSON feed, HTML fallback for founders)
    Yc(CrawlArgs),
    /// Harvest the AppSumo software catalog (needs SCRAPERAPI_KEY)
    Appsumo(CrawlArgs),
    /// Summarize an existing output file
    Stats {
        source: SourceKind,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rewrite an output file sorted by year, newest first
    Sort {
        source: SourceKind,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CrawlArgs {
    /// Max new records this run (default: COMPANY_LIMIT or 500)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Output CSV (default depends on the source)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Yc,
    Appsumo,
}

impl SourceKind {
    fn default_output(self) -> PathBuf {
        match self {
            SourceKind::Yc => "yc_companies.csv".into(),
            SourceKind::Appsumo => "appsumo_software.csv".into(),
        }
    }

    fn schema(self) -> Schema {
        match self {
            SourceKind::Yc => sources::yc::SCHEMA,
            SourceKind::Appsumo => sources::appsumo::SCHEMA,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Yc(args) => {
            let settings = Settings::from_env()?;
            let source = YcDirectory::new(&settings);
            harvest(&source, &settings, args, SourceKind::Yc).await
        }
        Commands::Appsumo(args) => {
            let settings = Settings::from_env()?;
            let source = AppSumo::new()?;
            harvest(&source, &settings, args, SourceKind::Appsumo).await
        }
        Commands::Stats { source, output } => {
            let path = output.unwrap_or_else(|| source.default_output());
            let s = store::stats(&path, &source.schema())?;
            println!("File:      {}", path.display());
            println!("Rows:      {}", s.rows);
            println!("Website:   {}", s.with_website);
            println!("Founders:  {}", s.with_founders);
            if !s.by_year.is_empty() {
                println!("\n{:>6} | {:>6}", "Year", "Rows");
                println!("{}", "-".repeat(15));
                for (year, rows) in s.by_year.iter().take(15) {
                    let label = if *year == 0 { "?".to_string() } else { year.to_string() };
                    println!("{:>6} | {:>6}", label, rows);
                }
            }
            Ok(())
        }
        Commands::Sort { source, output } => {
            let path = output.unwrap_or_else(|| source.default_output());
            let n = store::sort_by_year(&path, &source.schema())?;
            println!("Sorted {} rows in {} by year (newest first).", n, path.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn harvest(
    source: &dyn Source,
    settings: &Settings,
    args: CrawlArgs,
    kind: SourceKind,
) -> Result<()> {
    let output = args.output.unwrap_or_else(|| kind.default_output());
    let mut opts = CrawlOptions::from_settings(settings, output);
    if let Some(limit) = args.limit {
        opts.limit = limit;
    }

    let fetcher = HttpFetcher::new(settings)?;
    println!(
        "Harvesting {} into {} (up to {} new records)...",
        source.name(),
        opts.output.display(),
        opts.limit
    );

    let report = crawl::run(source, &fetcher, settings, &opts).await?;
    println!(
        "Scanned {} listing entries on {} page(s).",
        report.seen, report.pages
    );
    println!(
        "Done: {} new records written in {} flush(es).",
        report.written, report.flushes
    );
    println!(
        "Skipped {} already stored, {} with a taken name; {} detail fetch failures.",
        report.skipped_existing, report.duplicate_names, report.detail_failures
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
