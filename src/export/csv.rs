//! Minimal CSV reading and writing.
//!
//! Every field is written double-quoted with embedded quotes doubled; the
//! parser accepts quoted or bare fields and CRLF or LF line endings.

use std::io::{self, Write};
use std::mem::take;

/// Parses CSV text into rows of fields. Blank lines are skipped.
#[must_use]
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.strip_prefix('\u{feff}').unwrap_or(text).chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    // Flush a trailing row without a final newline.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Writes one row with every field quoted.
///
/// # Errors
///
/// Propagates errors from the underlying writer.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if first {
            first = false;
        } else {
            w.write_all(b",")?;
        }
        write!(w, "\"{}\"", cell.as_ref().replace('"', "\"\""))?;
    }
    w.write_all(b"\n")
}

/// Renders a header plus rows into a CSV document.
#[must_use]
pub fn to_csv_string<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
    let mut buf: Vec<u8> = Vec::new();
    // Writing into a Vec<u8> cannot fail.
    let _ = write_row(&mut buf, headers);
    for row in rows {
        let _ = write_row(&mut buf, row);
    }
    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_write_quotes_every_field() {
        let text = to_csv_string(&["a", "b"], &[vec!["x".to_string(), "say \"hi\"".to_string()]]);
        assert_eq!(text, "\"a\",\"b\"\n\"x\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_csv_parse_quoted_and_bare_fields() {
        let rows = parse_rows("\"a\",b\r\n\"1,5\",\"line\nbreak\"\n\n\"q\"\"uote\",\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ["a", "b"]);
        assert_eq!(rows[1], ["1,5", "line\nbreak"]);
        assert_eq!(rows[2], ["q\"uote", ""]);
    }

    #[test]
    fn test_csv_parse_reads_back_written_rows() {
        let rows = vec![vec!["15.11.2025".to_string(), String::new(), "EAS code list".to_string()]];
        let text = to_csv_string(&["effective_date", "publishing_date", "category"], &rows);
        let parsed = parse_rows(&text);
        assert_eq!(parsed[1], rows[0]);
    }

    #[test]
    fn test_csv_parse_without_trailing_newline() {
        assert_eq!(parse_rows("a,b"), vec![vec!["a".to_string(), "b".to_string()]]);
    }
}
