use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use jma_backfill::analyzers::StationSeriesLoader;
use jma_backfill::error::{BackfillError, Result};
use jma_backfill::models::StationTable;
use jma_backfill::processors::{BackfillDriver, YearCollector, YearStatus};
use jma_backfill::readers::{PageFetcher, PageRequest};
use jma_backfill::utils::{lock_path_for, ProgressReporter};
use jma_backfill::writers::{read_dataset, DatasetWriter};
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const HEADER: &str = "date,mean_temp,max_temp,min_temp\n";

/// Stand-in for the remote site: serves canned month pages keyed by
/// (station_code, year, month), a page without a table for anything else,
/// and HTTP 500 for months marked as failing.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<(u32, i32, u32), String>,
    failing: Mutex<HashSet<(u32, i32, u32)>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeSite {
    fn with_page(mut self, station_code: u32, year: i32, month: u32, page: String) -> Self {
        self.pages.insert((station_code, year, month), page);
        self
    }

    fn fail(&self, station_code: u32, year: i32, month: u32) {
        self.failing.lock().unwrap().insert((station_code, year, month));
    }

    fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requested_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = Vec::new();
        for request in self.requests.lock().unwrap().iter() {
            if years.last() != Some(&request.year) {
                years.push(request.year);
            }
        }
        years
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, request: &PageRequest) -> Result<String> {
        self.requests.lock().unwrap().push(*request);
        let key = (request.station_code, request.year, request.month);

        if self.failing.lock().unwrap().contains(&key) {
            return Err(BackfillError::HttpStatus {
                url: format!("fake://{}/{}/{}", key.0, key.1, key.2),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(self
            .pages
            .get(&key)
            .cloned()
            .unwrap_or_else(|| "<html><body><p>No data</p></body></html>".to_string()))
    }
}

/// A month page in the site's layout: four header rows, then one row per
/// day with mean/max/min in columns 6..=8. `blank_mean` days get an empty
/// mean cell.
fn month_page(days: u32, blank_mean: &[u32]) -> String {
    let mut html = String::from(
        r#"<html><body><table id="tablefix1" class="data2_s">
<tr><th rowspan="4">day</th><th colspan="5">pressure / precipitation</th><th colspan="3">temperature</th></tr>
<tr><th>a</th><th>b</th><th>c</th><th>d</th><th>e</th><th>mean</th><th>max</th><th>min</th></tr>
<tr><th></th><th></th><th></th><th></th><th></th><th></th><th></th><th></th></tr>
<tr><th></th><th></th><th></th><th></th><th></th><th></th><th></th><th></th></tr>
"#,
    );
    for day in 1..=days {
        let mean = if blank_mean.contains(&day) {
            String::new()
        } else {
            format!("{}.5", day)
        };
        html.push_str(&format!(
            "<tr class=\"mtx\"><td><a href=\"#\">{}</a></td><td>1012.3</td><td>1015.0</td><td>0.0</td><td>--</td><td>--</td><td>{}</td><td>{}.9</td><td>{}.1</td></tr>\n",
            day,
            mean,
            day + 5,
            day
        ));
    }
    html.push_str("</table></body></html>");
    html
}

fn tokyo_only() -> StationTable {
    StationTable::builtin()
        .select(&["Tokyo".to_string()])
        .unwrap()
}

fn driver(site: &Arc<FakeSite>, dir: &TempDir) -> BackfillDriver {
    let fetcher: Arc<dyn PageFetcher> = site.clone();
    let collector = Arc::new(YearCollector::new(fetcher).unwrap());
    BackfillDriver::new(collector, Arc::new(DatasetWriter::new(dir.path())))
}

#[tokio::test]
async fn test_tokyo_january_with_missing_mean() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default().with_page(47662, 2024, 1, month_page(31, &[15])));

    let report = driver(&site, &dir)
        .run(&tokyo_only(), 2024, 2024, None)
        .await
        .unwrap();

    assert_eq!(report.station("Tokyo").unwrap().fetched, 1);
    assert_eq!(report.station("Tokyo").unwrap().observations, 31);

    let requests = site.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 12);
    assert!(requests
        .iter()
        .all(|r| r.region_code == 44 && r.station_code == 47662 && r.year == 2024));

    let content = fs::read_to_string(dir.path().join("Tokyo_2024.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 32);
    assert_eq!(lines[0], "date,mean_temp,max_temp,min_temp");
    assert_eq!(lines[1], "2024-01-01,1.5,6.9,1.1");
    assert_eq!(lines[15], "2024-01-15,,20.9,15.1");
    assert_eq!(lines[31], "2024-01-31,31.5,36.9,31.1");
}

#[tokio::test]
async fn test_dates_advance_one_day_from_new_year() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::default()
            .with_page(47662, 2023, 1, month_page(31, &[]))
            .with_page(47662, 2023, 2, month_page(28, &[3, 4]))
            .with_page(47662, 2023, 3, month_page(31, &[])),
    );

    driver(&site, &dir)
        .run(&tokyo_only(), 2023, 2023, None)
        .await
        .unwrap();

    let observations = read_dataset(&dir.path().join("Tokyo_2023.csv")).unwrap();
    assert_eq!(observations.len(), 90);
    let new_year = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    for (offset, observation) in observations.iter().enumerate() {
        assert_eq!(observation.date, new_year + Duration::days(offset as i64));
    }
    assert!(observations[33].mean_temp.is_missing());
    assert!(!observations[33].max_temp.is_missing());
}

#[tokio::test]
async fn test_future_year_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default());

    let report = driver(&site, &dir)
        .run(&tokyo_only(), 2030, 2030, None)
        .await
        .unwrap();

    assert_eq!(report.total(YearStatus::Fetched), 1);
    let content = fs::read_to_string(dir.path().join("Tokyo_2030.csv")).unwrap();
    assert_eq!(content, HEADER);
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default().with_page(47662, 2022, 7, month_page(31, &[])));
    let stations = tokyo_only();

    let first = driver(&site, &dir).run(&stations, 2022, 2020, None).await.unwrap();
    assert_eq!(first.total(YearStatus::Fetched), 3);
    assert_eq!(site.request_count(), 36);

    let second = driver(&site, &dir).run(&stations, 2022, 2020, None).await.unwrap();
    assert_eq!(second.total(YearStatus::Skipped), 3);
    assert_eq!(second.total(YearStatus::Fetched), 0);
    assert_eq!(site.request_count(), 36);
}

#[tokio::test]
async fn test_failed_month_is_not_persisted_and_retried() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default().with_page(47662, 2021, 1, month_page(31, &[])));
    site.fail(47662, 2021, 3);
    let stations = tokyo_only();

    let progress = ProgressReporter::new(1, "Backfilling", false);
    let first = driver(&site, &dir)
        .run(&stations, 2021, 2021, Some(&progress))
        .await
        .unwrap();
    assert_eq!(progress.position(), 1);

    let tokyo = first.station("Tokyo").unwrap();
    assert_eq!(tokyo.failed, 1);
    assert_eq!(tokyo.failed_years, vec![2021]);
    assert!(first.has_failures());
    assert!(!dir.path().join("Tokyo_2021.csv").exists());
    assert!(!lock_path_for(&dir.path().join("Tokyo_2021.csv")).exists());

    site.recover();
    let second = driver(&site, &dir).run(&stations, 2021, 2021, None).await.unwrap();

    assert_eq!(second.total(YearStatus::Fetched), 1);
    assert_eq!(site.request_count(), 24);
    assert_eq!(read_dataset(&dir.path().join("Tokyo_2021.csv")).unwrap().len(), 31);
}

#[tokio::test]
async fn test_allow_incomplete_persists_partial_year() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default().with_page(47662, 2021, 1, month_page(31, &[])));
    site.fail(47662, 2021, 2);

    let report = driver(&site, &dir)
        .with_allow_incomplete(true)
        .run(&tokyo_only(), 2021, 2021, None)
        .await
        .unwrap();

    assert_eq!(report.total(YearStatus::Fetched), 1);
    assert_eq!(read_dataset(&dir.path().join("Tokyo_2021.csv")).unwrap().len(), 31);
}

#[tokio::test]
async fn test_stale_lock_blocks_pair_until_cleared() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default());
    let writer = DatasetWriter::new(dir.path());
    fs::write(lock_path_for(&writer.dataset_path("Tokyo", 2024)), "4242\n").unwrap();

    let report = driver(&site, &dir).run(&tokyo_only(), 2024, 2024, None).await.unwrap();
    assert_eq!(report.total(YearStatus::Locked), 1);
    assert_eq!(site.request_count(), 0);
    assert!(!writer.exists("Tokyo", 2024));

    assert_eq!(writer.clear_locks().unwrap(), 1);
    let report = driver(&site, &dir).run(&tokyo_only(), 2024, 2024, None).await.unwrap();
    assert_eq!(report.total(YearStatus::Fetched), 1);
    assert!(writer.exists("Tokyo", 2024));
}

#[tokio::test]
async fn test_years_walk_backwards_from_current() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default());

    driver(&site, &dir)
        .with_max_workers(1)
        .run(&tokyo_only(), 2024, 2020, None)
        .await
        .unwrap();

    assert_eq!(site.requested_years(), vec![2024, 2023, 2022, 2021, 2020]);
}

#[tokio::test]
async fn test_refresh_rewrites_current_year_only() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default().with_page(47662, 2024, 1, month_page(10, &[])));
    let stations = tokyo_only();

    driver(&site, &dir).run(&stations, 2024, 2023, None).await.unwrap();
    assert_eq!(site.request_count(), 24);

    let report = driver(&site, &dir)
        .with_refresh_current_year(true)
        .run(&stations, 2024, 2023, None)
        .await
        .unwrap();

    let tokyo = report.station("Tokyo").unwrap();
    assert_eq!(tokyo.fetched, 1);
    assert_eq!(tokyo.skipped, 1);
    assert_eq!(site.request_count(), 36);
}

#[tokio::test]
async fn test_concurrent_stations_feed_series_loader() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::default()
            .with_page(47662, 2023, 12, month_page(31, &[31]))
            .with_page(47662, 2024, 1, month_page(31, &[]))
            .with_page(47772, 2024, 1, month_page(31, &[])),
    );
    let stations = StationTable::builtin()
        .select(&["Tokyo".to_string(), "Osaka".to_string()])
        .unwrap();

    let report = driver(&site, &dir)
        .with_max_workers(4)
        .run(&stations, 2024, 2022, None)
        .await
        .unwrap();

    assert_eq!(report.total(YearStatus::Fetched), 6);
    assert_eq!(site.request_count(), 72);
    assert_eq!(
        report.stations.iter().map(|s| s.station.as_str()).collect::<Vec<_>>(),
        vec!["Tokyo", "Osaka"]
    );

    let series = StationSeriesLoader::new(DatasetWriter::new(dir.path()))
        .load("Tokyo")
        .unwrap();
    assert_eq!(series.files, 3);
    assert_eq!(series.observations.len(), 61);
    assert_eq!(series.dropped_rows, 1);
    assert_eq!(
        series.date_range(),
        Some((
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        ))
    );
}
