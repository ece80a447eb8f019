pub mod column_filter;
pub mod csv_reader;
pub mod csv_writer;
pub mod engine;
pub mod feed;
pub mod input;
pub mod output;
pub mod progress;
pub mod subset;
pub mod table_status;

pub use column_filter::{
    distinct_non_null, filter_by_values, filter_by_values_optional, value_set, ColumnError,
    ValueSet,
};
pub use csv_reader::{parse_table, CsvParseError};
pub use csv_writer::write_table;
pub use engine::{
    list_ids, run_filter, FilterOutcome, FilterRequest, FilterRunError, FilterSummary,
    TableSummary,
};
pub use feed::{GtfsFeed, LoadedFeed};
pub use input::{GtfsInput, GtfsInputError, GtfsInputSource};
pub use output::{save_feed, save_feed_zip, GtfsOutputError, OutputTarget};
pub use progress::{NoOpProgressHandler, ProgressHandler};
pub use subset::{filter_by_route_id, filter_by_trip_id, subset, FilterType, SubsetError};
pub use table_status::TableStatus;

pub use gtfs_model;
