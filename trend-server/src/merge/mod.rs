//! Merge engine: aligns additional series onto the original timestamp grid
//!
//! The original table's timestamps define the output rows. Each additional
//! table contributes its numeric columns, sampled at the nearest timestamp
//! within the tolerance window.

pub mod align;
pub mod detect;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};
use trend_common::naming::file_stem;
use trend_common::table::parse_number;
use trend_common::time::format_timestamp;
use trend_common::{CsvTable, Error, Result};

use self::align::align_to_grid;
use self::detect::{detect_time_column, is_sequence_column, is_time_like, timestamped_rows};

/// Default alignment tolerance in seconds
pub const DEFAULT_TOLERANCE_SECS: u32 = 5;

/// An uploaded table with the name it was uploaded under
#[derive(Debug, Clone)]
pub struct NamedTable {
    pub name: String,
    pub table: CsvTable,
}

impl NamedTable {
    pub fn new(name: impl Into<String>, table: CsvTable) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    /// Parse uploaded bytes, tagging CSV errors with the file name.
    pub fn parse(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let name = name.into();
        let table = CsvTable::from_bytes(data).map_err(|e| match e {
            Error::Csv(err) => Error::InvalidInput(format!("{}: malformed CSV: {}", name, err)),
            Error::InvalidInput(msg) => Error::InvalidInput(format!("{}: {}", name, msg)),
            other => other,
        })?;
        Ok(Self { name, table })
    }
}

/// Merge parameters
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub tolerance_secs: u32,
    /// Original rows before this instant are dropped
    pub cutoff: Option<NaiveDateTime>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            cutoff: None,
        }
    }
}

/// Output of [`merge_align`]: the original time axis plus value columns
#[derive(Debug, Clone)]
pub struct MergedTable {
    /// Header of the original time column
    pub time_column: String,
    pub timestamps: Vec<NaiveDateTime>,
    /// Non-time column headers, original columns first
    pub columns: Vec<String>,
    /// Row-major cells, one row per timestamp, one cell per column
    pub cells: Vec<Vec<String>>,
    /// Additional files that contributed no columns
    pub skipped: Vec<String>,
}

impl MergedTable {
    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Numeric view of one column; blank or non-numeric cells are `None`.
    pub fn numeric_column(&self, idx: usize) -> Vec<Option<f64>> {
        self.cells.iter().map(|row| parse_number(&row[idx])).collect()
    }

    /// True if at least one cell in the column is numeric
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        self.cells.iter().any(|row| parse_number(&row[idx]).is_some())
    }

    /// Flatten into a text table with the time column first
    pub fn to_csv_table(&self) -> CsvTable {
        let mut headers = Vec::with_capacity(self.columns.len() + 1);
        headers.push(self.time_column.clone());
        headers.extend(self.columns.iter().cloned());

        let rows = self
            .timestamps
            .iter()
            .zip(&self.cells)
            .map(|(ts, cells)| {
                let mut row = Vec::with_capacity(cells.len() + 1);
                row.push(format_timestamp(*ts));
                row.extend(cells.iter().cloned());
                row
            })
            .collect();

        CsvTable::new(headers, rows)
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        self.to_csv_table().to_csv_bytes()
    }

    fn drop_columns_where<F: Fn(&str) -> bool>(&mut self, pred: F) -> Vec<String> {
        let keep: Vec<bool> = self.columns.iter().map(|c| !pred(c)).collect();
        let dropped: Vec<String> = self
            .columns
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(c, _)| c.clone())
            .collect();
        if dropped.is_empty() {
            return dropped;
        }

        let mask = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .zip(&keep)
                .filter_map(|(v, k)| k.then_some(v))
                .collect()
        };
        self.columns = mask(std::mem::take(&mut self.columns));
        for row in &mut self.cells {
            *row = mask(std::mem::take(row));
        }
        dropped
    }
}

/// Align every additional table onto the original's timestamp grid.
///
/// Fails with [`Error::NoTimestamps`] when the original, or any additional
/// table, has no parseable timestamp in its detected time column.
pub fn merge_align(
    original: &NamedTable,
    additional: &[NamedTable],
    options: &MergeOptions,
) -> Result<MergedTable> {
    let tolerance = Duration::seconds(i64::from(options.tolerance_secs));

    let mut base = original.table.clone();
    let dropped = base.drop_columns(is_sequence_column);
    if !dropped.is_empty() {
        debug!(file = %original.name, ?dropped, "Dropped sequence columns");
    }
    let time_idx = detect_time_column(&base)
        .ok_or_else(|| Error::InvalidInput(format!("{}: no usable columns", original.name)))?;

    let mut rows = timestamped_rows(&base, time_idx);
    if rows.is_empty() {
        return Err(Error::NoTimestamps(original.name.clone()));
    }
    if let Some(cutoff) = options.cutoff {
        let before = rows.len();
        rows.retain(|(ts, _)| *ts >= cutoff);
        debug!(removed = before - rows.len(), %cutoff, "Applied cutoff");
    }

    let value_idx: Vec<usize> = (0..base.width()).filter(|&i| i != time_idx).collect();
    let mut merged = MergedTable {
        time_column: base.headers[time_idx].clone(),
        timestamps: rows.iter().map(|(ts, _)| *ts).collect(),
        columns: value_idx.iter().map(|&i| base.headers[i].clone()).collect(),
        cells: rows
            .iter()
            .map(|(_, r)| value_idx.iter().map(|&i| base.rows[*r][i].clone()).collect())
            .collect(),
        skipped: Vec::new(),
    };

    for extra in additional {
        let added = append_aligned(&mut merged, extra, tolerance)?;
        if added == 0 {
            merged.skipped.push(extra.name.clone());
        }
    }

    let dropped = merged.drop_columns_where(is_time_like);
    if !dropped.is_empty() {
        debug!(?dropped, "Dropped time-like value columns");
    }

    info!(
        rows = merged.row_count(),
        columns = merged.columns.len(),
        additional = additional.len(),
        tolerance_secs = options.tolerance_secs,
        "Merged series"
    );
    Ok(merged)
}

/// Align one additional table and append its numeric columns.
/// Returns the number of columns added.
fn append_aligned(merged: &mut MergedTable, extra: &NamedTable, tolerance: Duration) -> Result<usize> {
    let mut table = extra.table.clone();
    table.drop_columns(is_sequence_column);

    let Some(time_idx) = detect_time_column(&table) else {
        warn!(file = %extra.name, "Skipping file with no usable columns");
        return Ok(0);
    };
    let rows = timestamped_rows(&table, time_idx);
    if rows.is_empty() {
        return Err(Error::NoTimestamps(extra.name.clone()));
    }

    let value_idx: Vec<usize> = (0..table.width())
        .filter(|&i| i != time_idx)
        .filter(|&i| rows.iter().any(|(_, r)| parse_number(&table.rows[*r][i]).is_some()))
        .collect();
    if value_idx.is_empty() {
        warn!(file = %extra.name, "Skipping file with no numeric columns");
        return Ok(0);
    }

    let sample_times: Vec<NaiveDateTime> = rows.iter().map(|(ts, _)| *ts).collect();
    let matches = align_to_grid(&merged.timestamps, &sample_times, tolerance);
    let matched = matches.iter().filter(|m| m.is_some()).count();

    for &col in &value_idx {
        let name = unique_column_name(merged, &table.headers[col], file_stem(&extra.name));
        merged.columns.push(name);
        for (row, hit) in merged.cells.iter_mut().zip(&matches) {
            let cell = hit
                .map(|j| {
                    let raw = &table.rows[rows[j].1][col];
                    if parse_number(raw).is_some() {
                        raw.trim().to_string()
                    } else {
                        String::new()
                    }
                })
                .unwrap_or_default();
            row.push(cell);
        }
    }

    debug!(
        file = %extra.name,
        columns = value_idx.len(),
        matched,
        grid = merged.timestamps.len(),
        "Aligned additional series"
    );
    Ok(value_idx.len())
}

/// Resolve a header collision by suffixing the source file stem, then a counter.
fn unique_column_name(merged: &MergedTable, wanted: &str, stem: &str) -> String {
    let taken = |name: &str| name == merged.time_column || merged.columns.iter().any(|c| c == name);
    if !taken(wanted) {
        return wanted.to_string();
    }
    let base = format!("{} ({})", wanted, stem);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{} {}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, csv: &str) -> NamedTable {
        NamedTable::parse(name, csv.as_bytes()).unwrap()
    }

    fn original() -> NamedTable {
        named(
            "original.csv",
            "Sequence,Time,Valve A\n\
             1,2024-01-01 00:00:10,40\n\
             2,2024-01-01 00:00:00,35\n\
             3,2024-01-01 00:00:20,45\n\
             4,,99\n",
        )
    }

    #[test]
    fn test_original_only_sorted_and_filtered() {
        let merged = merge_align(&original(), &[], &MergeOptions::default()).unwrap();
        assert_eq!(merged.time_column, "Time");
        assert_eq!(merged.columns, vec!["Valve A"]);
        assert_eq!(merged.row_count(), 3);
        assert_eq!(merged.cells, vec![vec!["35"], vec!["40"], vec!["45"]]);
    }

    #[test]
    fn test_additional_aligned_within_tolerance() {
        let extra = named(
            "pumps.csv",
            "Timestamp,Flow,Status\n\
             2024-01-01 00:00:02,100,Run\n\
             2024-01-01 00:00:19,120,Run\n",
        );
        let merged = merge_align(&original(), &[extra], &MergeOptions::default()).unwrap();
        // Status has no numeric cells and is not carried over
        assert_eq!(merged.columns, vec!["Valve A", "Flow"]);
        let flow: Vec<&str> = merged.cells.iter().map(|r| r[1].as_str()).collect();
        // 00:00:00 <- 00:00:02 (2s), 00:00:10 -> nothing within 5s, 00:00:20 <- 00:00:19
        assert_eq!(flow, vec!["100", "", "120"]);
    }

    #[test]
    fn test_zero_tolerance_requires_exact_match() {
        let extra = named("b.csv", "Time,Flow\n2024-01-01 00:00:10,7\n2024-01-01 00:00:21,8\n");
        let options = MergeOptions {
            tolerance_secs: 0,
            cutoff: None,
        };
        let merged = merge_align(&original(), &[extra], &options).unwrap();
        let flow: Vec<&str> = merged.cells.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(flow, vec!["", "7", ""]);
    }

    #[test]
    fn test_cutoff_removes_earlier_rows() {
        let options = MergeOptions {
            tolerance_secs: 5,
            cutoff: Some(trend_common::time::parse_timestamp("2024-01-01 00:00:10").unwrap()),
        };
        let merged = merge_align(&original(), &[], &options).unwrap();
        assert_eq!(merged.row_count(), 2);
        assert_eq!(merged.cells[0], vec!["40"]);
    }

    #[test]
    fn test_original_without_timestamps_is_error() {
        let bad = named("bad.csv", "Time,Flow\nsoon,1\nlater,2\n");
        let err = merge_align(&bad, &[], &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NoTimestamps(ref f) if f == "bad.csv"));
    }

    #[test]
    fn test_additional_without_timestamps_is_error() {
        let extra = named("extra.csv", "Time,Flow\nsoon,1\n");
        let err = merge_align(&original(), &[extra], &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NoTimestamps(ref f) if f == "extra.csv"));
    }

    #[test]
    fn test_additional_without_numeric_columns_is_skipped() {
        let extra = named("notes.csv", "Time,Note\n2024-01-01 00:00:00,hello\n");
        let merged = merge_align(&original(), &[extra], &MergeOptions::default()).unwrap();
        assert_eq!(merged.columns, vec!["Valve A"]);
        assert_eq!(merged.skipped, vec!["notes.csv"]);
    }

    #[test]
    fn test_column_collision_gets_file_suffix() {
        let a = named("north.csv", "Time,Valve A\n2024-01-01 00:00:00,1\n");
        let b = named("north.csv", "Time,Valve A\n2024-01-01 00:00:00,2\n");
        let merged = merge_align(&original(), &[a, b], &MergeOptions::default()).unwrap();
        assert_eq!(
            merged.columns,
            vec!["Valve A", "Valve A (north)", "Valve A (north) 2"]
        );
        assert_eq!(merged.cells[0], vec!["35", "1", "2"]);
    }

    #[test]
    fn test_time_like_value_columns_dropped() {
        let base = named(
            "o.csv",
            "Time,Run Time,Flow\n2024-01-01 00:00:00,5,1\n",
        );
        let merged = merge_align(&base, &[], &MergeOptions::default()).unwrap();
        assert_eq!(merged.columns, vec!["Flow"]);
    }

    #[test]
    fn test_non_numeric_cells_in_value_column_blanked() {
        let extra = named(
            "x.csv",
            "Time,Flow\n2024-01-01 00:00:00,Bad\n2024-01-01 00:00:10, 12.5 \n",
        );
        let merged = merge_align(&original(), &[extra], &MergeOptions::default()).unwrap();
        let flow: Vec<&str> = merged.cells.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(flow, vec!["", "12.5", ""]);
    }

    #[test]
    fn test_to_csv_bytes() {
        let merged = merge_align(&original(), &[], &MergeOptions::default()).unwrap();
        let csv = String::from_utf8(merged.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            csv,
            "Time,Valve A\n\
             2024-01-01 00:00:00,35\n\
             2024-01-01 00:00:10,40\n\
             2024-01-01 00:00:20,45\n"
        );
    }

    #[test]
    fn test_parse_tags_errors_with_file_name() {
        let err = NamedTable::parse("empty.csv", b"").unwrap_err();
        assert!(err.to_string().contains("empty.csv"));
    }
}
