use std::fmt;
use std::str::FromStr;

use compact_str::CompactString;
use gtfs_model::{GtfsFile, Table};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column_filter::{
    distinct_non_null, filter_by_values, filter_by_values_optional, ColumnError, ValueSet,
};
use crate::GtfsFeed;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubsetError {
    #[error("{file} has no column '{column}'")]
    MissingColumn { file: &'static str, column: String },
}

pub(crate) trait InFile<T> {
    fn in_file(self, file: GtfsFile) -> Result<T, SubsetError>;
}

impl<T> InFile<T> for Result<T, ColumnError> {
    fn in_file(self, file: GtfsFile) -> Result<T, SubsetError> {
        self.map_err(|ColumnError::MissingColumn(column)| SubsetError::MissingColumn {
            file: file.file_name(),
            column: column.to_string(),
        })
    }
}

/// Which table the seed identifiers belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    RouteId,
    TripId,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::RouteId => "route_id",
            FilterType::TripId => "trip_id",
        }
    }

    /// The file that holds the seed identifiers.
    pub fn seed_file(self) -> GtfsFile {
        match self {
            FilterType::RouteId => GtfsFile::Routes,
            FilterType::TripId => GtfsFile::Trips,
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "route_id" => Ok(FilterType::RouteId),
            "trip_id" => Ok(FilterType::TripId),
            other => Err(format!("Invalid filter type {}.", other)),
        }
    }
}

pub fn subset(
    feed: &GtfsFeed,
    filter_type: FilterType,
    values: &ValueSet,
) -> Result<GtfsFeed, SubsetError> {
    match filter_type {
        FilterType::RouteId => filter_by_route_id(feed, values),
        FilterType::TripId => filter_by_trip_id(feed, values),
    }
}

fn log_step(file: GtfsFile, table: &Table) {
    debug!("{} rows kept in {}", table.len(), file.file_name());
}

/// Keeps the given routes and everything that depends on them.
///
/// The steps run in a fixed order; each one reads only identifier sets derived by the
/// steps before it. Fare tables, `translations` and `feed_info` pass through unchanged.
pub fn filter_by_route_id(feed: &GtfsFeed, route_ids: &ValueSet) -> Result<GtfsFeed, SubsetError> {
    let mut out = feed.clone();

    out.routes = filter_by_values(&feed.routes, "route_id", route_ids).in_file(GtfsFile::Routes)?;
    log_step(GtfsFile::Routes, &out.routes);

    // agency_id is optional in routes.txt; with no value at all every agency stays
    let agency_ids = distinct_or_empty(&out.routes, "agency_id");
    if !agency_ids.is_empty() {
        out.agency =
            filter_by_values(&feed.agency, "agency_id", &agency_ids).in_file(GtfsFile::Agency)?;
        log_step(GtfsFile::Agency, &out.agency);
    }

    out.trips = filter_by_values(&feed.trips, "route_id", route_ids).in_file(GtfsFile::Trips)?;
    log_step(GtfsFile::Trips, &out.trips);
    let trip_ids = distinct_non_null(&out.trips, "trip_id").in_file(GtfsFile::Trips)?;

    let stop_ids_from_stop_times = match feed.table(GtfsFile::StopTimes) {
        Some(stop_times) => {
            let stop_times = filter_by_values(stop_times, "trip_id", &trip_ids)
                .in_file(GtfsFile::StopTimes)?;
            log_step(GtfsFile::StopTimes, &stop_times);
            let stop_ids =
                distinct_non_null(&stop_times, "stop_id").in_file(GtfsFile::StopTimes)?;
            out.set_table(GtfsFile::StopTimes, stop_times);
            stop_ids
        }
        None => ValueSet::default(),
    };

    let stop_ids = with_parent_stations(&feed.stops, stop_ids_from_stop_times)?;
    out.stops = filter_by_values(&feed.stops, "stop_id", &stop_ids).in_file(GtfsFile::Stops)?;
    log_step(GtfsFile::Stops, &out.stops);

    let service_ids = distinct_non_null(&out.trips, "service_id").in_file(GtfsFile::Trips)?;
    for file in [GtfsFile::Calendar, GtfsFile::CalendarDates] {
        if let Some(table) = feed.table(file) {
            let filtered = filter_by_values(table, "service_id", &service_ids).in_file(file)?;
            log_step(file, &filtered);
            out.set_table(file, filtered);
        }
    }

    if let (Some(areas), Some(stop_areas)) =
        (feed.table(GtfsFile::Areas), feed.table(GtfsFile::StopAreas))
    {
        let stop_areas = filter_by_values(stop_areas, "stop_id", &stop_ids)
            .in_file(GtfsFile::StopAreas)?;
        let area_ids = distinct_non_null(&stop_areas, "area_id").in_file(GtfsFile::StopAreas)?;
        let areas = filter_by_values(areas, "area_id", &area_ids).in_file(GtfsFile::Areas)?;
        log_step(GtfsFile::StopAreas, &stop_areas);
        log_step(GtfsFile::Areas, &areas);
        out.set_table(GtfsFile::StopAreas, stop_areas);
        out.set_table(GtfsFile::Areas, areas);
    }

    if let Some(shapes) = feed.table(GtfsFile::Shapes) {
        let shape_ids = distinct_or_empty(&out.trips, "shape_id");
        // trips without shape references must not wipe out shapes.txt
        if !shape_ids.is_empty() {
            let shapes =
                filter_by_values(shapes, "shape_id", &shape_ids).in_file(GtfsFile::Shapes)?;
            log_step(GtfsFile::Shapes, &shapes);
            out.set_table(GtfsFile::Shapes, shapes);
        }
    }

    if let Some(frequencies) = feed.table(GtfsFile::Frequencies) {
        let frequencies = filter_by_values(frequencies, "trip_id", &trip_ids)
            .in_file(GtfsFile::Frequencies)?;
        log_step(GtfsFile::Frequencies, &frequencies);
        out.set_table(GtfsFile::Frequencies, frequencies);
    }

    if let Some(transfers) = feed.table(GtfsFile::Transfers) {
        let transfers = filter_by_values(transfers, "from_stop_id", &stop_ids)
            .and_then(|table| filter_by_values(&table, "to_stop_id", &stop_ids))
            .in_file(GtfsFile::Transfers)?;
        let transfers = filter_by_values_optional(&transfers, "from_route_id", route_ids);
        let transfers = filter_by_values_optional(&transfers, "to_route_id", route_ids);
        let transfers = filter_by_values_optional(&transfers, "from_trip_id", &trip_ids);
        let transfers = filter_by_values_optional(&transfers, "to_trip_id", &trip_ids);
        log_step(GtfsFile::Transfers, &transfers);
        out.set_table(GtfsFile::Transfers, transfers);
    }

    if let Some(pathways) = feed.table(GtfsFile::Pathways) {
        let pathways = filter_by_values(pathways, "from_stop_id", &stop_ids)
            .and_then(|table| filter_by_values(&table, "to_stop_id", &stop_ids))
            .in_file(GtfsFile::Pathways)?;
        log_step(GtfsFile::Pathways, &pathways);
        out.set_table(GtfsFile::Pathways, pathways);
    }

    if let Some(levels) = feed.table(GtfsFile::Levels) {
        let level_ids = distinct_or_empty(&out.stops, "level_id");
        if !level_ids.is_empty() {
            let levels =
                filter_by_values(levels, "level_id", &level_ids).in_file(GtfsFile::Levels)?;
            log_step(GtfsFile::Levels, &levels);
            out.set_table(GtfsFile::Levels, levels);
        }
    }

    if let Some(attributions) = feed.table(GtfsFile::Attributions) {
        let attributions = filter_by_values_optional(attributions, "agency_id", &agency_ids);
        let attributions = filter_by_values_optional(&attributions, "route_id", route_ids);
        let attributions = filter_by_values_optional(&attributions, "trip_id", &trip_ids);
        log_step(GtfsFile::Attributions, &attributions);
        out.set_table(GtfsFile::Attributions, attributions);
    }

    Ok(out)
}

/// Adds the parent station of every directly used stop. One level only.
fn with_parent_stations(stops: &Table, mut stop_ids: ValueSet) -> Result<ValueSet, SubsetError> {
    let used = filter_by_values(stops, "stop_id", &stop_ids).in_file(GtfsFile::Stops)?;
    if let Some(parents) = used.column_values("parent_station") {
        stop_ids.extend(
            parents
                .flatten()
                .filter(|parent| !parent.is_empty())
                .map(CompactString::from),
        );
    }
    Ok(stop_ids)
}

/// Distinct values of a column the feed may leave out; empty when it is missing.
fn distinct_or_empty(table: &Table, column: &str) -> ValueSet {
    distinct_non_null(table, column).unwrap_or_default()
}

/// Keeps the given trips, then cascades from the routes they belong to.
///
/// The route cascade filters `trips` again by route, which is a no-op here because
/// every kept trip references one of the derived routes.
pub fn filter_by_trip_id(feed: &GtfsFeed, trip_ids: &ValueSet) -> Result<GtfsFeed, SubsetError> {
    let trips = filter_by_values(&feed.trips, "trip_id", trip_ids).in_file(GtfsFile::Trips)?;
    let route_ids = distinct_non_null(&trips, "route_id").in_file(GtfsFile::Trips)?;
    let mut narrowed = feed.clone();
    narrowed.trips = trips;
    filter_by_route_id(&narrowed, &route_ids)
}
