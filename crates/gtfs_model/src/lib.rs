use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("row has {found} values but the table has {expected} columns")]
    RowLengthMismatch { expected: usize, found: usize },
    #[error("duplicate column name: {0}")]
    DuplicateColumn(CompactString),
}

/// Every file the filter knows how to read and write, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GtfsFile {
    Agency,
    Stops,
    Routes,
    Trips,
    StopTimes,
    Calendar,
    CalendarDates,
    FareAttributes,
    FareRules,
    FareMedia,
    FareProducts,
    FareLegRules,
    FareTransferRules,
    Areas,
    StopAreas,
    Shapes,
    Frequencies,
    Transfers,
    Pathways,
    Levels,
    Translations,
    FeedInfo,
    Attributions,
}

impl GtfsFile {
    pub const ALL: [GtfsFile; 23] = [
        GtfsFile::Agency,
        GtfsFile::Stops,
        GtfsFile::Routes,
        GtfsFile::Trips,
        GtfsFile::StopTimes,
        GtfsFile::Calendar,
        GtfsFile::CalendarDates,
        GtfsFile::FareAttributes,
        GtfsFile::FareRules,
        GtfsFile::FareMedia,
        GtfsFile::FareProducts,
        GtfsFile::FareLegRules,
        GtfsFile::FareTransferRules,
        GtfsFile::Areas,
        GtfsFile::StopAreas,
        GtfsFile::Shapes,
        GtfsFile::Frequencies,
        GtfsFile::Transfers,
        GtfsFile::Pathways,
        GtfsFile::Levels,
        GtfsFile::Translations,
        GtfsFile::FeedInfo,
        GtfsFile::Attributions,
    ];

    pub const REQUIRED: [GtfsFile; 4] = [
        GtfsFile::Agency,
        GtfsFile::Stops,
        GtfsFile::Routes,
        GtfsFile::Trips,
    ];

    pub const OPTIONAL: [GtfsFile; 19] = [
        GtfsFile::StopTimes,
        GtfsFile::Calendar,
        GtfsFile::CalendarDates,
        GtfsFile::FareAttributes,
        GtfsFile::FareRules,
        GtfsFile::FareMedia,
        GtfsFile::FareProducts,
        GtfsFile::FareLegRules,
        GtfsFile::FareTransferRules,
        GtfsFile::Areas,
        GtfsFile::StopAreas,
        GtfsFile::Shapes,
        GtfsFile::Frequencies,
        GtfsFile::Transfers,
        GtfsFile::Pathways,
        GtfsFile::Levels,
        GtfsFile::Translations,
        GtfsFile::FeedInfo,
        GtfsFile::Attributions,
    ];

    /// Table name without extension, e.g. `stop_times`.
    pub fn table_name(self) -> &'static str {
        match self {
            GtfsFile::Agency => "agency",
            GtfsFile::Stops => "stops",
            GtfsFile::Routes => "routes",
            GtfsFile::Trips => "trips",
            GtfsFile::StopTimes => "stop_times",
            GtfsFile::Calendar => "calendar",
            GtfsFile::CalendarDates => "calendar_dates",
            GtfsFile::FareAttributes => "fare_attributes",
            GtfsFile::FareRules => "fare_rules",
            GtfsFile::FareMedia => "fare_media",
            GtfsFile::FareProducts => "fare_products",
            GtfsFile::FareLegRules => "fare_leg_rules",
            GtfsFile::FareTransferRules => "fare_transfer_rules",
            GtfsFile::Areas => "areas",
            GtfsFile::StopAreas => "stop_areas",
            GtfsFile::Shapes => "shapes",
            GtfsFile::Frequencies => "frequencies",
            GtfsFile::Transfers => "transfers",
            GtfsFile::Pathways => "pathways",
            GtfsFile::Levels => "levels",
            GtfsFile::Translations => "translations",
            GtfsFile::FeedInfo => "feed_info",
            GtfsFile::Attributions => "attributions",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            GtfsFile::Agency => "agency.txt",
            GtfsFile::Stops => "stops.txt",
            GtfsFile::Routes => "routes.txt",
            GtfsFile::Trips => "trips.txt",
            GtfsFile::StopTimes => "stop_times.txt",
            GtfsFile::Calendar => "calendar.txt",
            GtfsFile::CalendarDates => "calendar_dates.txt",
            GtfsFile::FareAttributes => "fare_attributes.txt",
            GtfsFile::FareRules => "fare_rules.txt",
            GtfsFile::FareMedia => "fare_media.txt",
            GtfsFile::FareProducts => "fare_products.txt",
            GtfsFile::FareLegRules => "fare_leg_rules.txt",
            GtfsFile::FareTransferRules => "fare_transfer_rules.txt",
            GtfsFile::Areas => "areas.txt",
            GtfsFile::StopAreas => "stop_areas.txt",
            GtfsFile::Shapes => "shapes.txt",
            GtfsFile::Frequencies => "frequencies.txt",
            GtfsFile::Transfers => "transfers.txt",
            GtfsFile::Pathways => "pathways.txt",
            GtfsFile::Levels => "levels.txt",
            GtfsFile::Translations => "translations.txt",
            GtfsFile::FeedInfo => "feed_info.txt",
            GtfsFile::Attributions => "attributions.txt",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|file| file.file_name() == name)
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for GtfsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A single cell. `None` is an absent value (an empty CSV field).
pub type Value = Option<CompactString>;

/// A string-typed table: ordered headers and ordered rows, one value per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<CompactString>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        let mut names: Vec<CompactString> = Vec::new();
        for header in headers {
            let header = header.into();
            if names.contains(&header) {
                return Err(TableError::DuplicateColumn(header));
            }
            names.push(header);
        }
        Ok(Self {
            headers: names,
            rows: Vec::new(),
        })
    }

    /// Builds a table from borrowed literals; mostly useful for fixtures.
    pub fn from_rows(headers: &[&str], rows: &[Vec<Option<&str>>]) -> Result<Self, TableError> {
        let mut table = Self::new(headers.iter().copied())?;
        for row in rows {
            table.push_row(row.iter().map(|value| value.map(CompactString::from)).collect())?;
        }
        Ok(table)
    }

    /// Appends a row. Short rows are padded with absent values.
    pub fn push_row(&mut self, mut row: Vec<Value>) -> Result<(), TableError> {
        let expected = self.headers.len();
        if row.len() > expected {
            return Err(TableError::RowLengthMismatch {
                expected,
                found: row.len(),
            });
        }
        row.resize(expected, None);
        self.rows.push(row);
        Ok(())
    }

    pub fn headers(&self) -> &[CompactString] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.as_str() == column)
    }

    /// Values of one column in row order, or `None` when the column is missing.
    pub fn column_values(&self, column: &str) -> Option<impl Iterator<Item = Option<&str>>> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| row[index].as_deref()))
    }

    /// New table with the same headers holding the rows accepted by `keep`, in input order.
    pub fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row.as_slice()))
                .cloned()
                .collect(),
        }
    }
}
