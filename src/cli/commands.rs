use crate::analyzers::StationSeriesLoader;
use crate::cli::args::{Cli, Commands};
use crate::config::BackfillSettings;
use crate::error::{BackfillError, Result};
use crate::models::StationTable;
use crate::processors::{BackfillDriver, YearCollector, YearStatus};
use crate::readers::{HttpPageFetcher, PageFetcher, StationReader};
use crate::utils::progress::ProgressReporter;
use crate::writers::DatasetWriter;
use chrono::Datelike;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let settings = BackfillSettings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Backfill {
            output_dir,
            stations_file,
            stations,
            current_year,
            cutoff_year,
            max_workers,
            allow_incomplete,
            refresh_current,
            clear_locks,
            report_json,
            quiet,
        } => {
            let mut settings = settings;
            if let Some(dir) = output_dir {
                settings.output_dir = dir;
            }
            if let Some(year) = cutoff_year {
                settings.cutoff_year = year;
            }
            if let Some(workers) = max_workers {
                settings.max_workers = workers;
            }
            settings.validate()?;

            let table = station_table(&settings, stations_file.as_deref(), &stations)?;
            let current_year = current_year.unwrap_or_else(|| chrono::Local::now().year());

            backfill(
                &settings,
                &table,
                current_year,
                BackfillFlags {
                    allow_incomplete,
                    refresh_current,
                    clear_locks,
                    quiet,
                },
                report_json,
            )
            .await
        }

        Commands::Stations { stations_file } => {
            let table = station_table(&settings, stations_file.as_deref(), &[])?;
            println!("{:<16} {:>6} {:>8}", "station", "prec", "block");
            for station in &table {
                println!(
                    "{:<16} {:>6} {:>8}",
                    station.name, station.region_code, station.station_code
                );
            }
            Ok(())
        }

        Commands::Series {
            station,
            output_dir,
        } => {
            let dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
            let loader = StationSeriesLoader::new(DatasetWriter::new(dir));
            let series = loader.load(&station)?;

            if series.files == 0 {
                println!("No datasets found for {}", station);
                return Ok(());
            }
            println!("{}", series.summary());
            Ok(())
        }
    }
}

struct BackfillFlags {
    allow_incomplete: bool,
    refresh_current: bool,
    clear_locks: bool,
    quiet: bool,
}

async fn backfill(
    settings: &BackfillSettings,
    table: &StationTable,
    current_year: i32,
    flags: BackfillFlags,
    report_json: Option<PathBuf>,
) -> Result<()> {
    let writer = Arc::new(DatasetWriter::new(&settings.output_dir));
    if flags.clear_locks {
        let removed = writer.clear_locks()?;
        info!(removed, dir = %settings.output_dir.display(), "Cleared lock files");
    }

    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        HttpPageFetcher::new(settings.base_url.clone(), settings.request_timeout())?
            .with_retry_policy(settings.retry_policy()),
    );
    let collector = Arc::new(YearCollector::new(fetcher)?);
    let driver = BackfillDriver::new(collector, Arc::clone(&writer))
        .with_max_workers(settings.max_workers)
        .with_allow_incomplete(flags.allow_incomplete)
        .with_refresh_current_year(flags.refresh_current);

    info!(
        output_dir = %settings.output_dir.display(),
        base_url = %settings.base_url,
        current_year,
        cutoff_year = settings.cutoff_year,
        workers = driver.max_workers(),
        "Backfill configured"
    );

    let years = (current_year - settings.cutoff_year + 1).max(0) as u64;
    let progress = ProgressReporter::new(
        years * table.len() as u64,
        "Backfilling station-years",
        flags.quiet,
    );

    let report = tokio::select! {
        report = driver.run(table, current_year, settings.cutoff_year, Some(&progress)) => report?,
        _ = tokio::signal::ctrl_c() => {
            progress.finish_with_message("Cancelled");
            warn!("Interrupted; unfinished years will be fetched on the next run");
            return Err(BackfillError::Cancelled);
        }
    };

    progress.finish_with_message("Backfill complete");
    println!("\n{}", report.summary());

    if let Some(path) = report_json {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        serde_json::to_writer_pretty(File::create(&path)?, &report)?;
        info!(path = %path.display(), "Wrote run report");
    }

    if report.has_failures() {
        warn!(
            failed = report.total(YearStatus::Failed),
            "Some years failed and were not persisted; rerun to retry them"
        );
    }
    Ok(())
}

/// Station table from `--stations-file` if given, else from settings,
/// narrowed to `names` when any are given.
fn station_table(
    settings: &BackfillSettings,
    stations_file: Option<&Path>,
    names: &[String],
) -> Result<StationTable> {
    let table = match stations_file {
        Some(path) => {
            debug!(path = %path.display(), "Reading station table");
            StationReader::new().read_stations(path)?
        }
        None => settings.station_table()?,
    };

    if names.is_empty() {
        Ok(table)
    } else {
        table.select(names)
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jma_backfill={}", level)));

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_level(true)
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .init();
        }
    }

    debug!(level, "Logging initialized");
    Ok(())
}
