use std::path::PathBuf;

use gtfs_model::GtfsFile;
use serde::Serialize;
use tracing::info;

use crate::column_filter::{distinct_non_null, value_set};
use crate::output::{GtfsOutputError, OutputTarget};
use crate::progress::ProgressHandler;
use crate::subset::{subset, FilterType, InFile, SubsetError};
use crate::{GtfsFeed, GtfsInput, GtfsInputError, TableStatus};

#[derive(Debug, thiserror::Error)]
pub enum FilterRunError {
    #[error(transparent)]
    Input(#[from] GtfsInputError),
    #[error(transparent)]
    Output(#[from] GtfsOutputError),
    #[error(transparent)]
    Subset(#[from] SubsetError),
}

/// One subsetting job: read `input`, keep what `values` reach, write `output`.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub filter_type: FilterType,
    pub values: Vec<String>,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub summary: FilterSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub filter_type: FilterType,
    pub values: Vec<String>,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub file: &'static str,
    pub status: TableStatus,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl FilterSummary {
    pub fn table(&self, file: GtfsFile) -> Option<&TableSummary> {
        let name = file.file_name();
        self.tables.iter().find(|table| table.file == name)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

pub fn run_filter(
    request: &FilterRequest,
    progress: Option<&dyn ProgressHandler>,
) -> Result<FilterOutcome, FilterRunError> {
    let target = OutputTarget::resolve(&request.output, request.overwrite)?;
    let input = GtfsInput::from_path(&request.input)?;

    info!("loading feed from {}", input.path().display());
    let loaded = GtfsFeed::from_input_with_progress(&input, progress)?;

    let values = value_set(request.values.iter().map(String::as_str));
    info!(
        "filtering by {} with {} value(s)",
        request.filter_type,
        values.len()
    );
    let filtered = subset(&loaded.feed, request.filter_type, &values)?;

    info!("saving feed to {}", target.path().display());
    target.save(&filtered, progress)?;

    let before = loaded.feed.row_counts();
    let after = filtered.row_counts();
    let tables = GtfsFile::ALL
        .into_iter()
        .map(|file| TableSummary {
            file: file.file_name(),
            status: loaded.status(file),
            rows_before: before.get(&file).copied().unwrap_or(0),
            rows_after: after.get(&file).copied().unwrap_or(0),
        })
        .collect();

    Ok(FilterOutcome {
        summary: FilterSummary {
            filter_type: request.filter_type,
            values: request.values.clone(),
            tables,
        },
    })
}

/// Sorted distinct route or trip ids of the feed at `input`.
pub fn list_ids(
    input: impl AsRef<std::path::Path>,
    filter_type: FilterType,
) -> Result<Vec<String>, FilterRunError> {
    let input = GtfsInput::from_path(input)?;
    let loaded = GtfsFeed::from_input(&input)?;
    let table = match filter_type {
        FilterType::RouteId => &loaded.feed.routes,
        FilterType::TripId => &loaded.feed.trips,
    };
    let ids = distinct_non_null(table, filter_type.as_str()).in_file(filter_type.seed_file())?;
    let mut ids: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), nanos))
    }

    fn write_feed(dir: &Path) {
        fs::create_dir_all(dir).expect("create dir");
        let files = [
            ("agency.txt", "agency_id,agency_name\nA,Agency\n"),
            ("stops.txt", "stop_id,stop_name\nS1,One\nS2,Two\n"),
            ("routes.txt", "route_id,agency_id\nR2,A\nR1,A\n"),
            ("trips.txt", "route_id,service_id,trip_id\nR1,W,T1\nR2,W,T2\n"),
            ("stop_times.txt", "trip_id,stop_id,stop_sequence\nT1,S1,1\nT2,S2,1\n"),
            ("calendar.txt", "service_id,monday\nW,1\n"),
        ];
        for (name, contents) in files {
            fs::write(dir.join(name), contents).expect("write file");
        }
    }

    fn request(input: &Path, output: &Path, overwrite: bool) -> FilterRequest {
        FilterRequest {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            filter_type: FilterType::RouteId,
            values: vec!["R1".to_string()],
            overwrite,
        }
    }

    #[test]
    fn summarizes_rows_before_and_after() {
        let root = temp_dir("gtfs_engine_summary");
        let input = root.join("in");
        let output = root.join("out");
        write_feed(&input);

        let outcome = run_filter(&request(&input, &output, false), None).expect("run");
        let summary = outcome.summary;

        let stops = summary.table(GtfsFile::Stops).expect("stops");
        assert_eq!((stops.rows_before, stops.rows_after), (2, 1));
        let shapes = summary.table(GtfsFile::Shapes).expect("shapes");
        assert_eq!(shapes.status, TableStatus::Missing);
        assert_eq!((shapes.rows_before, shapes.rows_after), (0, 0));
        assert_eq!(summary.tables.len(), GtfsFile::ALL.len());
        assert!(output.join("calendar.txt").is_file());
        assert!(!output.join("shapes.txt").exists());

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn existing_output_is_rejected_before_loading() {
        let root = temp_dir("gtfs_engine_exists");
        fs::create_dir_all(&root).expect("create dir");
        let output = root.join("out.zip");
        fs::write(&output, "old").expect("write file");

        // The input does not exist; the output check must fail first.
        let err = run_filter(&request(&root.join("missing"), &output, false), None).unwrap_err();

        assert!(matches!(
            err,
            FilterRunError::Output(GtfsOutputError::OutputExists(_))
        ));
        assert_eq!(fs::read_to_string(&output).expect("read"), "old");

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = FilterSummary {
            filter_type: FilterType::TripId,
            values: vec!["T1".to_string()],
            tables: vec![TableSummary {
                file: "trips.txt",
                status: TableStatus::Loaded,
                rows_before: 2,
                rows_after: 1,
            }],
        };

        let json: serde_json::Value =
            serde_json::from_str(&summary.to_json(false).expect("json")).expect("parse");
        assert_eq!(
            json,
            serde_json::json!({
                "filter_type": "trip_id",
                "values": ["T1"],
                "tables": [{
                    "file": "trips.txt",
                    "status": "loaded",
                    "rows_before": 2,
                    "rows_after": 1
                }]
            })
        );
        assert!(summary.to_json(true).expect("json").contains("\n  \"values\""));
    }

    #[test]
    fn lists_sorted_ids() {
        let root = temp_dir("gtfs_engine_ids");
        write_feed(&root);

        assert_eq!(
            list_ids(&root, FilterType::RouteId).expect("routes"),
            vec!["R1", "R2"]
        );
        assert_eq!(
            list_ids(&root, FilterType::TripId).expect("trips"),
            vec!["T1", "T2"]
        );

        fs::remove_dir_all(&root).ok();
    }
}
