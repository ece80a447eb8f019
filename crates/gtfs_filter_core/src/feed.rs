use std::collections::BTreeMap;

use gtfs_model::{GtfsFile, Table};
use tracing::{debug, warn};

use crate::csv_reader::{parse_table, CsvParseError};
use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::{GtfsInput, GtfsInputError, TableStatus};

/// An in-memory feed.
///
/// The four required tables always exist. Optional tables are keyed by file: a missing
/// key means the file is absent, a zero-row table means it was present but empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtfsFeed {
    pub agency: Table,
    pub stops: Table,
    pub routes: Table,
    pub trips: Table,
    optional: BTreeMap<GtfsFile, Table>,
}

impl GtfsFeed {
    pub fn new(agency: Table, stops: Table, routes: Table, trips: Table) -> Self {
        Self {
            agency,
            stops,
            routes,
            trips,
            optional: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, file: GtfsFile, table: Table) -> Self {
        self.set_table(file, table);
        self
    }

    pub fn set_table(&mut self, file: GtfsFile, table: Table) {
        match file {
            GtfsFile::Agency => self.agency = table,
            GtfsFile::Stops => self.stops = table,
            GtfsFile::Routes => self.routes = table,
            GtfsFile::Trips => self.trips = table,
            _ => {
                self.optional.insert(file, table);
            }
        }
    }

    /// Present table for `file`, required or optional.
    pub fn table(&self, file: GtfsFile) -> Option<&Table> {
        match file {
            GtfsFile::Agency => Some(&self.agency),
            GtfsFile::Stops => Some(&self.stops),
            GtfsFile::Routes => Some(&self.routes),
            GtfsFile::Trips => Some(&self.trips),
            _ => self.optional.get(&file),
        }
    }

    /// Removes an optional table. Required tables cannot be taken out of a feed.
    pub fn take_table(&mut self, file: GtfsFile) -> Option<Table> {
        if file.is_required() {
            return None;
        }
        self.optional.remove(&file)
    }

    pub fn contains(&self, file: GtfsFile) -> bool {
        self.table(file).is_some()
    }

    /// Present tables in canonical file order.
    pub fn tables(&self) -> impl Iterator<Item = (GtfsFile, &Table)> {
        GtfsFile::ALL
            .into_iter()
            .filter_map(move |file| self.table(file).map(|table| (file, table)))
    }

    pub fn row_counts(&self) -> BTreeMap<GtfsFile, usize> {
        self.tables()
            .map(|(file, table)| (file, table.len()))
            .collect()
    }

    pub fn from_input(input: &GtfsInput) -> Result<LoadedFeed, GtfsInputError> {
        Self::from_input_with_progress(input, None)
    }

    pub fn from_input_with_progress(
        input: &GtfsInput,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<LoadedFeed, GtfsInputError> {
        let progress = progress.unwrap_or(&NoOpProgressHandler);
        progress.set_total_files(GtfsFile::ALL.len());
        let mut statuses = BTreeMap::new();

        let agency = load_required(input, GtfsFile::Agency, progress)?;
        let stops = load_required(input, GtfsFile::Stops, progress)?;
        let routes = load_required(input, GtfsFile::Routes, progress)?;
        let trips = load_required(input, GtfsFile::Trips, progress)?;
        for file in GtfsFile::REQUIRED {
            statuses.insert(file, TableStatus::Loaded);
        }
        let mut feed = GtfsFeed::new(agency, stops, routes, trips);

        for (file, loaded) in load_optional_files(input, progress)? {
            let status = match loaded {
                OptionalTable::Loaded(table) => {
                    feed.set_table(file, table);
                    TableStatus::Loaded
                }
                OptionalTable::Missing => TableStatus::Missing,
                OptionalTable::Empty => {
                    warn!("File {} is present but empty, ignores it", file.file_name());
                    TableStatus::Empty
                }
            };
            statuses.insert(file, status);
        }

        Ok(LoadedFeed { feed, statuses })
    }
}

/// A feed together with how each known file was found in the input.
#[derive(Debug, Clone)]
pub struct LoadedFeed {
    pub feed: GtfsFeed,
    pub statuses: BTreeMap<GtfsFile, TableStatus>,
}

impl LoadedFeed {
    pub fn status(&self, file: GtfsFile) -> TableStatus {
        self.statuses
            .get(&file)
            .copied()
            .unwrap_or(TableStatus::Missing)
    }
}

enum OptionalTable {
    Loaded(Table),
    Missing,
    Empty,
}

fn load_required(
    input: &GtfsInput,
    file: GtfsFile,
    progress: &dyn ProgressHandler,
) -> Result<Table, GtfsInputError> {
    match load_file(input, file, progress)? {
        OptionalTable::Loaded(table) => Ok(table),
        OptionalTable::Missing => Err(GtfsInputError::MissingRequiredFile(file.file_name())),
        OptionalTable::Empty => Err(GtfsInputError::EmptyFile(file.file_name())),
    }
}

fn load_file(
    input: &GtfsInput,
    file: GtfsFile,
    progress: &dyn ProgressHandler,
) -> Result<OptionalTable, GtfsInputError> {
    let name = file.file_name();
    progress.on_start_file_load(name);
    let loaded = match input.read_file(name)? {
        None => OptionalTable::Missing,
        Some(data) => match parse_table(name, &data) {
            Ok(table) => {
                debug!("loaded {} rows from {}", table.len(), name);
                OptionalTable::Loaded(table)
            }
            Err(CsvParseError::NoColumns { .. }) => OptionalTable::Empty,
            Err(err) => return Err(err.into()),
        },
    };
    progress.on_finish_file_load(name);
    Ok(loaded)
}

#[cfg(feature = "parallel")]
fn load_optional_files(
    input: &GtfsInput,
    progress: &dyn ProgressHandler,
) -> Result<Vec<(GtfsFile, OptionalTable)>, GtfsInputError> {
    use rayon::prelude::*;

    GtfsFile::OPTIONAL
        .par_iter()
        .map(|&file| load_file(input, file, progress).map(|loaded| (file, loaded)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn load_optional_files(
    input: &GtfsInput,
    progress: &dyn ProgressHandler,
) -> Result<Vec<(GtfsFile, OptionalTable)>, GtfsInputError> {
    GtfsFile::OPTIONAL
        .iter()
        .map(|&file| load_file(input, file, progress).map(|loaded| (file, loaded)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), nanos))
    }

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write file");
    }

    fn write_required(dir: &std::path::Path) {
        write_file(
            dir,
            "agency.txt",
            "agency_id,agency_name,agency_url,agency_timezone\n\
             A,Test Agency,https://example.com,UTC\n",
        );
        write_file(dir, "stops.txt", "stop_id,stop_name\nSTOP1,Stop 1\n");
        write_file(dir, "routes.txt", "route_id,agency_id,route_type\nR1,A,3\n");
        write_file(dir, "trips.txt", "route_id,service_id,trip_id\nR1,SVC1,T1\n");
    }

    #[test]
    fn loads_required_tables_from_directory() {
        let dir = temp_dir("gtfs_feed");
        fs::create_dir_all(&dir).expect("create dir");
        write_required(&dir);
        write_file(
            &dir,
            "stop_times.txt",
            "trip_id,stop_id,stop_sequence\nT1,STOP1,1\n",
        );

        let input = GtfsInput::from_path(&dir).expect("input");
        let loaded = GtfsFeed::from_input(&input).expect("load feed");

        assert_eq!(loaded.feed.agency.len(), 1);
        assert_eq!(loaded.feed.stops.len(), 1);
        assert_eq!(loaded.feed.routes.len(), 1);
        assert_eq!(loaded.feed.trips.len(), 1);
        assert_eq!(
            loaded.feed.table(GtfsFile::StopTimes).map(Table::len),
            Some(1)
        );
        assert!(!loaded.feed.contains(GtfsFile::Calendar));
        assert_eq!(loaded.status(GtfsFile::StopTimes), TableStatus::Loaded);
        assert_eq!(loaded.status(GtfsFile::Calendar), TableStatus::Missing);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_required_file_is_an_error() {
        for missing in GtfsFile::REQUIRED {
            let dir = temp_dir("gtfs_feed_missing");
            fs::create_dir_all(&dir).expect("create dir");
            write_required(&dir);
            fs::remove_file(dir.join(missing.file_name())).expect("remove file");

            let input = GtfsInput::from_path(&dir).expect("input");
            let err = GtfsFeed::from_input(&input).unwrap_err();

            assert_eq!(
                err.to_string(),
                format!("GTFS is invalid: file '{}' is missing.", missing.file_name())
            );

            fs::remove_dir_all(&dir).ok();
        }
    }

    #[test]
    fn empty_required_file_is_an_error() {
        let dir = temp_dir("gtfs_feed_empty_required");
        fs::create_dir_all(&dir).expect("create dir");
        write_required(&dir);
        write_file(&dir, "routes.txt", "");

        let input = GtfsInput::from_path(&dir).expect("input");
        let err = GtfsFeed::from_input(&input).unwrap_err();

        assert!(matches!(err, GtfsInputError::EmptyFile("routes.txt")));
        assert_eq!(err.to_string(), "No columns to parse from file 'routes.txt'.");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_optional_file_is_treated_as_absent() {
        let dir = temp_dir("gtfs_feed_empty_optional");
        fs::create_dir_all(&dir).expect("create dir");
        write_required(&dir);
        write_file(&dir, "shapes.txt", "");
        write_file(&dir, "calendar_dates.txt", "service_id,date,exception_type\n");

        let input = GtfsInput::from_path(&dir).expect("input");
        let loaded = GtfsFeed::from_input(&input).expect("load feed");

        assert!(!loaded.feed.contains(GtfsFile::Shapes));
        assert_eq!(loaded.status(GtfsFile::Shapes), TableStatus::Empty);
        let calendar_dates = loaded
            .feed
            .table(GtfsFile::CalendarDates)
            .expect("calendar_dates present");
        assert!(calendar_dates.is_empty());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn required_tables_cannot_be_taken() {
        let table = Table::new(["id"]).expect("table");
        let mut feed = GtfsFeed::new(table.clone(), table.clone(), table.clone(), table.clone())
            .with_table(GtfsFile::Levels, table.clone());

        assert_eq!(feed.take_table(GtfsFile::Routes), None);
        assert_eq!(feed.take_table(GtfsFile::Levels), Some(table));
        assert!(feed.contains(GtfsFile::Routes));
        assert!(!feed.contains(GtfsFile::Levels));
    }

    #[test]
    fn tables_iterate_in_canonical_order() {
        let table = Table::new(["id"]).expect("table");
        let feed = GtfsFeed::new(table.clone(), table.clone(), table.clone(), table.clone())
            .with_table(GtfsFile::Attributions, table.clone())
            .with_table(GtfsFile::StopTimes, table);

        let files: Vec<GtfsFile> = feed.tables().map(|(file, _)| file).collect();

        assert_eq!(
            files,
            vec![
                GtfsFile::Agency,
                GtfsFile::Stops,
                GtfsFile::Routes,
                GtfsFile::Trips,
                GtfsFile::StopTimes,
                GtfsFile::Attributions,
            ]
        );
    }
}
