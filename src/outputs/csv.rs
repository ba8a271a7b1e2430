//! CSV formatting and parsing.
//!
//! Writing follows RFC 4180 quoting: a cell is quoted only when it contains
//! a comma, a double quote, CR or LF, and embedded quotes are doubled. Rows
//! end with `\n`. Parsing accepts the same dialect plus CRLF line endings.

use crate::models::{Record, Table};

fn needs_quotes(cell: &str) -> bool {
    cell.contains([',', '"', '\n', '\r'])
}

fn push_cell(out: &mut String, cell: &str) {
    if needs_quotes(cell) {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}

fn push_row<I, S>(out: &mut String, cells: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut count = 0;
    let mut last_empty = false;
    for (i, cell) in cells.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let cell = cell.as_ref();
        push_cell(out, cell);
        count = i + 1;
        last_empty = cell.is_empty();
    }
    // A lone empty cell would otherwise read back as a blank line.
    if count == 1 && last_empty {
        out.push_str("\"\"");
    }
    out.push('\n');
}

/// Header + one row per record, columns in `fields` order.
///
/// A record without one of the fields gets an empty cell; fields not listed
/// are ignored.
pub fn records_to_csv(records: &[Record], fields: &[&str]) -> String {
    let mut out = String::new();
    push_row(&mut out, fields.iter());
    for record in records {
        let cells: Vec<String> = fields
            .iter()
            .map(|field| record.get(field).map(ToString::to_string).unwrap_or_default())
            .collect();
        push_row(&mut out, &cells);
    }
    out
}

/// Serialize a table, padding short rows with empty cells.
pub fn table_to_csv(table: &Table) -> String {
    let mut out = String::new();
    push_row(&mut out, &table.headers);
    let width = table.headers.len();
    for row in &table.rows {
        let padded = row
            .iter()
            .map(String::as_str)
            .chain(std::iter::repeat("").take(width.saturating_sub(row.len())));
        push_row(&mut out, padded);
    }
    out
}

/// Split CSV text into rows of cells. Blank lines are skipped, but a line
/// holding only `""` is a row with one empty cell. An unterminated quote
/// runs to the end of the input.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => {
                in_quotes = true;
                quoted = true;
            }
            ',' if !in_quotes => row.push(std::mem::take(&mut field)),
            '\r' | '\n' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                if row.len() == 1 && row[0].is_empty() && !quoted {
                    row.clear();
                } else {
                    rows.push(std::mem::take(&mut row));
                }
                quoted = false;
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() || quoted {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Parse CSV text whose first row is the header.
pub fn parse_table(text: &str) -> Table {
    let mut rows = parse_rows(text.trim_start_matches('\u{feff}'));
    if rows.is_empty() {
        return Table::default();
    }
    let headers = rows.remove(0);
    Table { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Division;

    #[test]
    fn test_header_follows_declared_order() {
        let records = vec![
            Record::new()
                .with("count", 12)
                .with("country", "Spain")
                .with("date", "2022-07-01"),
        ];
        let csv = records_to_csv(&records, Division::OnsetByCountry.fields());
        assert_eq!(csv, "date,country,count\n2022-07-01,Spain,12\n");
    }

    #[test]
    fn test_header_written_for_empty_records() {
        let csv = records_to_csv(&[], Division::Notification.fields());
        assert_eq!(csv, "date,count\n");
    }

    #[test]
    fn test_missing_field_leaves_empty_cell() {
        let records = vec![Record::new().with("date", "2022-07-01").with("count", 3)];
        let csv = records_to_csv(&records, &["date", "country", "count"]);
        assert_eq!(csv, "date,country,count\n2022-07-01,,3\n");
    }

    #[test]
    fn test_quoting() {
        let records = vec![
            Record::new()
                .with("date", "2022-07-01")
                .with("country", "Korea, Republic of")
                .with("count", 1),
            Record::new()
                .with("date", "2022-07-02")
                .with("country", "Say \"hi\"")
                .with("count", 2),
        ];
        let csv = records_to_csv(&records, Division::OnsetByCountry.fields());
        assert!(csv.contains("\"Korea, Republic of\""));
        assert!(csv.contains("\"Say \"\"hi\"\"\""));
    }

    #[test]
    fn test_round_trip_preserves_rows() {
        let records: Vec<Record> = [("Spain", 12), ("Korea, Republic of", 4), ("Côte d'Ivoire", 0)]
            .iter()
            .enumerate()
            .map(|(i, (country, count))| {
                Record::new()
                    .with("date", format!("2022-07-0{}", i + 1).as_str())
                    .with("country", *country)
                    .with("count", *count)
            })
            .collect();
        let fields = Division::OnsetByCountry.fields();
        let table = parse_table(&records_to_csv(&records, fields));

        assert_eq!(table.headers, fields);
        assert_eq!(table.rows.len(), records.len());
        for (row, record) in table.rows.iter().zip(&records) {
            for (cell, field) in row.iter().zip(fields) {
                assert_eq!(cell, &record.get(field).unwrap().to_string());
            }
        }
    }

    #[test]
    fn test_parse_crlf_and_blank_lines() {
        let rows = parse_rows("a,b\r\n\r\n1,2\r\n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_single_empty_column_survives_round_trip() {
        let records = vec![Record::new(), Record::new().with("date", "2022-07-01")];
        let csv = records_to_csv(&records, &["date"]);
        assert_eq!(csv, "date\n\"\"\n2022-07-01\n");

        let table = parse_table(&csv);
        assert_eq!(table.headers, vec!["date"]);
        assert_eq!(table.rows, vec![vec![""], vec!["2022-07-01"]]);
        assert_eq!(parse_rows("a\n\"\""), vec![vec!["a"], vec![""]]);
    }

    #[test]
    fn test_parse_quoted_newline() {
        let rows = parse_rows("name,note\nx,\"line1\nline2\"\n");
        assert_eq!(rows[1], vec!["x", "line1\nline2"]);
    }

    #[test]
    fn test_parse_last_line_without_newline() {
        let table = parse_table("\u{feff}State,Cases\nTexas,10");
        assert_eq!(table.headers, vec!["State", "Cases"]);
        assert_eq!(table.rows, vec![vec!["Texas", "10"]]);
    }

    #[test]
    fn test_table_to_csv_pads_short_rows() {
        let table = Table {
            headers: vec!["a".into(), "b".into(), "c".into()],
            rows: vec![vec!["1".into()]],
        };
        assert_eq!(table_to_csv(&table), "a,b,c\n1,,\n");
    }
}
