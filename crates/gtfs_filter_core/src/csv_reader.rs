use compact_str::CompactString;
use csv::{ReaderBuilder, Trim};
use gtfs_model::{Table, TableError};

#[derive(Debug, thiserror::Error)]
pub enum CsvParseError {
    #[error("No columns to parse from file '{file}'.")]
    NoColumns { file: String },
    #[error("csv error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
    #[error("{file} line {line}: {source}")]
    Row {
        file: String,
        line: u64,
        #[source]
        source: TableError,
    },
}

pub(crate) fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// Parses one GTFS file into a string table.
///
/// Empty fields become absent values. A file without a header line is reported as
/// [`CsvParseError::NoColumns`]; a header with no rows is a valid empty table.
pub fn parse_table(file_name: &str, data: &[u8]) -> Result<Table, CsvParseError> {
    let data = strip_utf8_bom(data);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|source| CsvParseError::Csv {
            file: file_name.to_string(),
            source,
        })?
        .clone();
    if headers.iter().all(|header| header.trim().is_empty()) {
        return Err(CsvParseError::NoColumns {
            file: file_name.to_string(),
        });
    }

    let mut table =
        Table::new(headers.iter().map(str::trim)).map_err(|source| CsvParseError::Row {
            file: file_name.to_string(),
            line: 1,
            source,
        })?;

    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|source| CsvParseError::Csv {
            file: file_name.to_string(),
            source,
        })?;
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(index as u64 + 2);
        let row = record
            .iter()
            .map(|value| (!value.is_empty()).then(|| CompactString::from(value)))
            .collect();
        table.push_row(row).map_err(|source| CsvParseError::Row {
            file: file_name.to_string(),
            line,
            source,
        })?;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column<'a>(table: &'a Table, name: &str) -> Vec<Option<&'a str>> {
        table.column_values(name).expect("column").collect()
    }

    #[test]
    fn parses_header_and_rows_with_absent_values() {
        let data = b"stop_id,stop_name,parent_station\nS1,Stop 1,\nS2,,S9\n";

        let table = parse_table("stops.txt", data).expect("parse");

        let headers: Vec<&str> = table.headers().iter().map(|h| h.as_str()).collect();
        assert_eq!(headers, vec!["stop_id", "stop_name", "parent_station"]);
        assert_eq!(column(&table, "stop_name"), vec![Some("Stop 1"), None]);
        assert_eq!(column(&table, "parent_station"), vec![None, Some("S9")]);
    }

    #[test]
    fn strips_bom_and_trims_header_names() {
        let data = b"\xEF\xBB\xBFroute_id , agency_id\nR1,A\n";

        let table = parse_table("routes.txt", data).expect("parse");

        assert_eq!(column(&table, "route_id"), vec![Some("R1")]);
        assert_eq!(column(&table, "agency_id"), vec![Some("A")]);
    }

    #[test]
    fn header_only_file_is_an_empty_table() {
        let table = parse_table("calendar.txt", b"service_id,monday\n").expect("parse");

        assert!(table.is_empty());
        assert_eq!(table.column_index("service_id"), Some(0));
    }

    #[test]
    fn empty_file_has_no_columns() {
        let err = parse_table("routes.txt", b"").unwrap_err();

        assert!(matches!(err, CsvParseError::NoColumns { .. }));
        assert_eq!(err.to_string(), "No columns to parse from file 'routes.txt'.");
    }

    #[test]
    fn quoted_values_keep_commas() {
        let data = b"agency_id,agency_name\nA,\"Transit, Inc.\"\n";

        let table = parse_table("agency.txt", data).expect("parse");

        assert_eq!(column(&table, "agency_name"), vec![Some("Transit, Inc.")]);
    }

    #[test]
    fn rows_longer_than_header_are_rejected_with_line() {
        let data = b"trip_id,route_id\nT1,R1\nT2,R2,extra\n";

        let err = parse_table("trips.txt", data).unwrap_err();

        match err {
            CsvParseError::Row { file, line, .. } => {
                assert_eq!(file, "trips.txt");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
