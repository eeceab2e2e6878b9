//! Finalized track tables: `frame, track_id, x, y, w, h, ...` rows
//!
//! Tables cross the boundary to external exporters either as
//! comma-separated text (one row per line, MOT style) or as an
//! `Array2<f64>` with the same column order.

use ndarray::{Array2, ArrayView2};

/// One observation of one track; `fields` holds every column after `track_id`
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub frame: i64,
    pub track_id: i64,
    pub fields: Vec<f64>,
}

impl TrackRow {
    pub fn new(frame: i64, track_id: i64, fields: Vec<f64>) -> Self {
        Self {
            frame,
            track_id,
            fields,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.fields.iter().all(|v| v.is_finite())
    }
}

/// Parse a comma-separated table, skipping blank lines
///
/// Lines with a non-numeric field, a non-integral frame/track id, or fewer
/// than two columns are dropped. Returns the rows and the number dropped.
pub fn parse_track_table(text: &str) -> (Vec<TrackRow>, usize) {
    let mut rows = Vec::new();
    let mut dropped = 0;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(row) => rows.push(row),
            None => {
                log::warn!("Dropping malformed table line {}: {:?}", line_no + 1, line);
                dropped += 1;
            }
        }
    }

    (rows, dropped)
}

fn parse_line(line: &str) -> Option<TrackRow> {
    let values: Vec<f64> = line
        .split(',')
        .map(|field| field.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<_>>>()?;
    if values.len() < 2 {
        return None;
    }
    let frame = as_index(values[0])?;
    let track_id = as_index(values[1])?;
    Some(TrackRow::new(frame, track_id, values[2..].to_vec()))
}

fn as_index(value: f64) -> Option<i64> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Format rows back to comma-separated text, integers without a decimal point
pub fn format_track_table(rows: &[TrackRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.frame.to_string());
        out.push(',');
        out.push_str(&row.track_id.to_string());
        for value in &row.fields {
            out.push(',');
            if value.fract() == 0.0 && value.abs() < 1e15 {
                out.push_str(&format!("{}", *value as i64));
            } else {
                out.push_str(&format!("{:.3}", value));
            }
        }
        out.push('\n');
    }
    out
}

/// Split an `(N, C)` table into rows; rows with a non-finite or non-integral frame/id are dropped
pub fn rows_from_array(table: ArrayView2<f64>) -> (Vec<TrackRow>, usize) {
    if table.ncols() < 2 {
        return (Vec::new(), table.nrows());
    }
    let mut dropped = 0;
    let rows = table
        .outer_iter()
        .filter_map(|r| {
            match (as_index(r[0]), as_index(r[1])) {
                (Some(frame), Some(track_id)) => {
                    Some(TrackRow::new(frame, track_id, r.iter().skip(2).copied().collect()))
                }
                _ => {
                    dropped += 1;
                    None
                }
            }
        })
        .collect();
    (rows, dropped)
}

/// Stack rows into an `(N, ncols)` table; short rows are padded with zeros
pub fn rows_to_array(rows: &[TrackRow], ncols: usize) -> Array2<f64> {
    let ncols = ncols.max(2);
    let mut table = Array2::zeros((rows.len(), ncols));
    for (i, row) in rows.iter().enumerate() {
        table[(i, 0)] = row.frame as f64;
        table[(i, 1)] = row.track_id as f64;
        for (j, value) in row.fields.iter().take(ncols - 2).enumerate() {
            table[(i, j + 2)] = *value;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_drops_malformed_lines() {
        let text = "1,7,0,0,10,20\n\n2,7,abc,0,10,20\n3,7.5,0,0,10,20\n4,7,5,0,10,20\n";
        let (rows, dropped) = parse_track_table(text);
        assert_eq!(dropped, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], TrackRow::new(4, 7, vec![5.0, 0.0, 10.0, 20.0]));
    }

    #[test]
    fn test_format_keeps_integers_compact() {
        let rows = vec![TrackRow::new(3, 1, vec![10.0, 2.5])];
        assert_eq!(format_track_table(&rows), "3,1,10,2.500\n");
    }

    #[test]
    fn test_array_conversion_preserves_columns() {
        let table = array![[1.0, 2.0, 3.0, 4.0, 5.0], [2.0, 2.0, f64::NAN, 4.0, 5.0], [f64::NAN, 2.0, 0.0, 0.0, 0.0]];
        let (rows, dropped) = rows_from_array(table.view());
        assert_eq!(dropped, 1);
        assert_eq!(rows.len(), 2);
        assert!(!rows[1].is_finite());

        let back = rows_to_array(&rows[..1], table.ncols());
        assert_eq!(back.shape(), &[1, 5]);
        assert_eq!(back.row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
