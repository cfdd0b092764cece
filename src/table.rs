//! Parses object bodies as comma-separated tables, and writes them
//! back with the same layout.

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::iter::once;
use thiserror::Error;

const BOM: char = '\u{feff}';

/// Failure to read or write a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("object body is not valid UTF-8")]
    Decode(#[from] std::str::Utf8Error),

    #[error("object body holds no header row")]
    Empty,

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("couldn't flush CSV output")]
    Io(#[from] std::io::Error),
}

/// Line layout of the parsed text, used to reproduce it on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    bom: bool,
    crlf: bool,
    leading_blank_lines: usize,
    trailing_terminator: bool,
}

impl Layout {
    fn terminator(&self) -> &'static [u8] {
        if self.crlf {
            b"\r\n"
        } else {
            b"\n"
        }
    }
}

fn is_break(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Number of line breaks in a run made only of `\r` and `\n`.
fn count_breaks(run: &str) -> usize {
    run.replace("\r\n", "\n").len()
}

/// Split the text into the break runs found between records, given
/// the byte offset at which the reader started each record. Entry `i`
/// precedes record `i`; the last entry follows the last record.
/// Record contents never start or end with a line break, so these
/// runs are exactly the terminators plus any blank lines.
fn break_runs(text: &str, starts: &[usize]) -> Vec<String> {
    let mut runs = Vec::with_capacity(starts.len() + 1);
    let mut pending = String::new();
    let ends = starts.iter().skip(1).copied().chain(once(text.len()));
    for (&start, end) in starts.iter().zip(ends) {
        let segment = text.get(start..end).unwrap_or_default();
        let rest = segment.trim_start_matches(is_break);
        pending.push_str(&segment[..segment.len() - rest.len()]);
        runs.push(std::mem::take(&mut pending));
        let content = rest.trim_end_matches(is_break);
        pending.push_str(&rest[content.len()..]);
    }
    runs.push(pending);
    runs
}

/// A header row followed by data rows. Blank lines are kept as rows
/// without fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    layout: Layout,
}

/// Parse an object body. The first record is taken as the header;
/// rows may have any number of fields.
pub fn parse(body: &[u8]) -> Result<Table, TableError> {
    let text = std::str::from_utf8(body)?;
    let (bom, text) = match text.strip_prefix(BOM) {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut starts = Vec::new();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let start = record.position().map_or(0, |p| p.byte() as usize);
        starts.push(start);
        records.push(record.iter().map(String::from).collect::<Vec<String>>());
    }
    if records.is_empty() {
        return Err(TableError::Empty);
    }

    let runs = break_runs(text, &starts);
    let last = runs.last().map_or(0, |run| count_breaks(run));
    let mut records = records.into_iter();
    let header = records.next().unwrap_or_default();
    let mut rows = Vec::new();
    for (row, run) in records.zip(&runs[1..]) {
        rows.extend((1..count_breaks(run)).map(|_| Vec::new()));
        rows.push(row);
    }
    rows.extend((1..last).map(|_| Vec::new()));

    Ok(Table {
        header,
        rows,
        layout: Layout {
            bom,
            crlf: runs[1].starts_with("\r\n"),
            leading_blank_lines: count_breaks(&runs[0]),
            trailing_terminator: last > 0,
        },
    })
}

impl Table {
    /// Serialize the table, quoting fields only where needed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TableError> {
        let terminator = self.layout.terminator();
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .terminator(if self.layout.crlf {
                Terminator::CRLF
            } else {
                Terminator::Any(b'\n')
            })
            .from_writer(Vec::new());
        // Offsets of each encoded record within the writer's output
        let mut ends = Vec::with_capacity(self.rows.len() + 1);
        for row in once(&self.header).chain(&self.rows) {
            if !row.is_empty() {
                writer.write_record(row)?;
                writer.flush()?;
            }
            ends.push(writer.get_ref().len());
        }
        let encoded = writer.into_inner().map_err(|e| e.into_error())?;

        let mut out = Vec::with_capacity(encoded.len() + 3);
        if self.layout.bom {
            out.extend_from_slice(BOM.to_string().as_bytes());
        }
        for _ in 0..self.layout.leading_blank_lines {
            out.extend_from_slice(terminator);
        }
        let mut start = 0;
        for (row, end) in once(&self.header).chain(&self.rows).zip(ends) {
            if row.is_empty() {
                out.extend_from_slice(terminator);
            } else {
                out.extend_from_slice(&encoded[start..end]);
            }
            start = end;
        }
        if !self.layout.trailing_terminator && out.ends_with(terminator) {
            out.truncate(out.len() - terminator.len());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(input: &str) -> String {
        let table = parse(input.as_bytes()).unwrap();
        String::from_utf8(table.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn header_and_rows_are_split() {
        let table = parse(b"a,b\n1,2\n3,4\n").unwrap();
        assert_eq!(table.header, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn simple_table_is_rewritten_unchanged() {
        assert_eq!(rewrite("a,b\n1,2\n"), "a,b\n1,2\n");
    }

    #[test]
    fn crlf_terminators_are_kept() {
        assert_eq!(rewrite("a,b\r\n1,2\r\n"), "a,b\r\n1,2\r\n");
    }

    #[test]
    fn missing_final_newline_is_kept() {
        assert_eq!(rewrite("a,b\n1,2"), "a,b\n1,2");
    }

    #[test]
    fn quoted_fields_survive() {
        let input = "name,notes\n\"Doe, Jane\",\"said \"\"hi\"\"\nand left\"\n";
        let table = parse(input.as_bytes()).unwrap();
        assert_eq!(table.rows[0][0], "Doe, Jane");
        assert_eq!(table.rows[0][1], "said \"hi\"\nand left");
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn ragged_rows_are_accepted() {
        assert_eq!(rewrite("a,b,c\n1\n1,2,3,4\n"), "a,b,c\n1\n1,2,3,4\n");
    }

    #[test]
    fn header_only_table_has_no_rows() {
        let table = parse(b"a,b\n").unwrap();
        assert!(table.rows.is_empty());
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(matches!(parse(b""), Err(TableError::Empty)));
    }

    #[test]
    fn byte_order_mark_is_kept_outside_the_header() {
        let input = b"\xef\xbb\xbfa,b\n1,2\n";
        let table = parse(input).unwrap();
        assert_eq!(table.header, vec!["a", "b"]);
        assert_eq!(table.to_bytes().unwrap(), input.to_vec());
    }

    #[test]
    fn blank_lines_are_kept_as_empty_rows() {
        let input = "a,b\n1,2\n\n3,4\n";
        let table = parse(input.as_bytes()).unwrap();
        assert_eq!(
            table.rows,
            vec![vec!["1", "2"], Vec::<&str>::new(), vec!["3", "4"]]
        );
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn leading_and_trailing_blank_lines_are_kept() {
        assert_eq!(rewrite("\n\na,b\n1,2\n\n\n"), "\n\na,b\n1,2\n\n\n");
        assert_eq!(rewrite("a,b\r\n\r\n1,2\r\n\r\n"), "a,b\r\n\r\n1,2\r\n\r\n");
    }

    #[test]
    fn quoted_crlf_does_not_change_the_terminator() {
        let input = "a,b\n\"x\r\ny\",2\n3,4\n";
        let table = parse(input.as_bytes()).unwrap();
        assert_eq!(table.rows[0][0], "x\r\ny");
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn terminator_comes_from_the_first_record_break() {
        let input = "a,\"b\nc\"\r\n1,2\r\n";
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert!(matches!(parse(b"a,b\n\xff,2\n"), Err(TableError::Decode(_))));
    }
}
