//! Column classification: sequence counters, time columns

use chrono::NaiveDateTime;
use trend_common::time::parse_timestamp;
use trend_common::CsvTable;

/// Minimum share of rows that must parse for a column to count as the time axis
pub const TIME_PARSE_RATIO: f64 = 0.8;

const SEQUENCE_MARKERS: &[&str] = &["sequence", "seq #", "seq#", "seq ", "index"];
const TIME_MARKERS: &[&str] = &["time", "date", "timestamp", "datetime"];

/// Historian row counters carry no signal and are dropped from every input.
pub fn is_sequence_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    SEQUENCE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Header looks like it names a time or date column
pub fn is_time_like(name: &str) -> bool {
    let lower = name.to_lowercase();
    TIME_MARKERS.iter().any(|m| lower.contains(m))
}

/// Share of all rows whose cell in `idx` parses as a timestamp
pub fn timestamp_ratio(table: &CsvTable, idx: usize) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    let parsed = table
        .column(idx)
        .filter(|cell| parse_timestamp(cell).is_some())
        .count();
    parsed as f64 / table.len() as f64
}

/// Pick the time axis of a table.
///
/// Time-like headers are tried first, then every other column, in header
/// order. The first column reaching [`TIME_PARSE_RATIO`] wins; otherwise
/// the first column is used. Returns `None` only for a table with no
/// columns.
pub fn detect_time_column(table: &CsvTable) -> Option<usize> {
    if table.width() == 0 {
        return None;
    }
    let (named, rest): (Vec<usize>, Vec<usize>) =
        (0..table.width()).partition(|&i| is_time_like(&table.headers[i]));

    named
        .into_iter()
        .chain(rest)
        .find(|&i| timestamp_ratio(table, i) >= TIME_PARSE_RATIO)
        .or(Some(0))
}

/// Rows whose time cell parses, as `(timestamp, row index)`, stably sorted
/// by timestamp.
pub fn timestamped_rows(table: &CsvTable, time_idx: usize) -> Vec<(NaiveDateTime, usize)> {
    let mut rows: Vec<(NaiveDateTime, usize)> = table
        .column(time_idx)
        .enumerate()
        .filter_map(|(row, cell)| parse_timestamp(cell).map(|ts| (ts, row)))
        .collect();
    rows.sort_by_key(|(ts, _)| *ts);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> CsvTable {
        CsvTable::from_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_sequence_markers() {
        assert!(is_sequence_column("Sequence"));
        assert!(is_sequence_column("Seq #"));
        assert!(is_sequence_column("SEQ#"));
        assert!(is_sequence_column("seq no"));
        assert!(is_sequence_column("Row Index"));
        assert!(!is_sequence_column("Seq"));
        assert!(!is_sequence_column("Flow"));
    }

    #[test]
    fn test_time_markers() {
        assert!(is_time_like("Time"));
        assert!(is_time_like("Sample Date"));
        assert!(is_time_like("TIMESTAMP"));
        assert!(is_time_like("Update Rate")); // substring match, like the historian export names
        assert!(!is_time_like("Flow"));
    }

    #[test]
    fn test_detect_prefers_named_column() {
        let t = table(
            "Logged,Time,Flow\n\
             2024-01-01 00:00:00,2024-01-01 00:00:05,1\n\
             2024-01-01 00:00:10,2024-01-01 00:00:15,2\n",
        );
        assert_eq!(detect_time_column(&t), Some(1));
    }

    #[test]
    fn test_detect_falls_back_to_unnamed_column() {
        let t = table("Flow,When\n1,2024-01-01 00:00:00\n2,2024-01-01 00:00:10\n");
        assert_eq!(detect_time_column(&t), Some(1));
    }

    #[test]
    fn test_detect_ratio_threshold() {
        // 4 of 5 rows parse: exactly at the threshold
        let t = table(
            "Time,Flow\n\
             2024-01-01 00:00:00,1\n\
             2024-01-01 00:00:01,1\n\
             2024-01-01 00:00:02,1\n\
             2024-01-01 00:00:03,1\n\
             bad,1\n",
        );
        assert_eq!(timestamp_ratio(&t, 0), 0.8);
        assert_eq!(detect_time_column(&t), Some(0));

        // 1 of 2 rows: below threshold, still falls back to first column
        let t = table("Flow,Time\n1,2024-01-01 00:00:00\n2,garbage\n");
        assert_eq!(detect_time_column(&t), Some(0));
    }

    #[test]
    fn test_detect_empty_table() {
        let t = table("Time,Flow\n");
        assert_eq!(timestamp_ratio(&t, 0), 0.0);
        assert_eq!(detect_time_column(&t), Some(0));
        assert_eq!(detect_time_column(&CsvTable::new(vec![], vec![])), None);
    }

    #[test]
    fn test_timestamped_rows_sorted_and_filtered() {
        let t = table(
            "Time,Flow\n\
             2024-01-01 00:00:20,c\n\
             not a time,x\n\
             2024-01-01 00:00:00,a\n\
             2024-01-01 00:00:20,d\n\
             2024-01-01 00:00:10,b\n",
        );
        let rows = timestamped_rows(&t, 0);
        let order: Vec<usize> = rows.iter().map(|(_, r)| *r).collect();
        // stable for the duplicated 00:00:20
        assert_eq!(order, vec![2, 4, 0, 3]);
    }
}
