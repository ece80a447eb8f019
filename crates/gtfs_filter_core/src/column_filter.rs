use compact_str::CompactString;
use gtfs_model::Table;
use rustc_hash::FxHashSet;

/// Set of accepted identifiers for one cascade step.
pub type ValueSet = FxHashSet<CompactString>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnError {
    #[error("column '{0}' is missing")]
    MissingColumn(CompactString),
}

pub fn value_set<I, S>(values: I) -> ValueSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| CompactString::from(value.as_ref()))
        .collect()
}

fn require_column(table: &Table, column: &str) -> Result<usize, ColumnError> {
    table
        .column_index(column)
        .ok_or_else(|| ColumnError::MissingColumn(column.into()))
}

/// Keeps rows whose `column` value is in `accepted`, like a SQL `IN`.
///
/// Absent values never match. An empty `accepted` set yields an empty table.
pub fn filter_by_values(
    table: &Table,
    column: &str,
    accepted: &ValueSet,
) -> Result<Table, ColumnError> {
    let index = require_column(table, column)?;
    Ok(table.retain_rows(|row| {
        row[index]
            .as_ref()
            .is_some_and(|value| accepted.contains(value))
    }))
}

/// Filters on a column that may not exist in this feed.
///
/// Without the column the table is returned unchanged. With it, rows whose value is
/// in `accepted` or absent are kept; only rows pointing at something else are dropped.
pub fn filter_by_values_optional(table: &Table, column: &str, accepted: &ValueSet) -> Table {
    let Some(index) = table.column_index(column) else {
        return table.clone();
    };
    table.retain_rows(|row| match &row[index] {
        Some(value) => accepted.contains(value),
        None => true,
    })
}

/// Distinct non-absent values of `column`.
pub fn distinct_non_null(table: &Table, column: &str) -> Result<ValueSet, ColumnError> {
    let index = require_column(table, column)?;
    Ok(table
        .rows()
        .filter_map(|row| row[index].clone())
        .collect())
}
