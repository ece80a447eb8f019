use std::io::Write;

use csv::{Terminator, WriterBuilder};
use gtfs_model::Table;

/// Writes the header line and then every row in order. Absent values become empty fields.
pub fn write_table<W: Write>(table: &Table, writer: W) -> csv::Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);
    writer.write_record(table.headers().iter().map(|header| header.as_str()))?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|value| value.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}
