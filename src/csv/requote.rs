//! Re-quoting of CSV published by upstream sources
//!
//! Some sources already publish CSV. Their rows still need the trailing
//! classification column and uniform quoting, so the text is split into
//! fields by a small two-state scanner and written back out.

use crate::csv::writer::{sanitize_text, CsvWriter, CLASSIFICATION_COLUMN, CLASSIFICATION_DEFAULT};
use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Unquoted,
    Quoted,
}

/// Split CSV text into rows of raw field values.
///
/// Inside quotes `""` is a literal quote and separators or line breaks are
/// part of the field. A backslash-escaped quote never opens a quoted section
/// and is kept as is, except that it still closes one when a separator, a
/// line break or the end of input follows. Blank lines are skipped.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut state = ScanState::Unquoted;
    let mut previous: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            ScanState::Unquoted => match c {
                '"' if previous != Some('\\') => state = ScanState::Quoted,
                ',' => row.push(std::mem::take(&mut field)),
                '\r' | '\n' => {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    finish_row(&mut rows, &mut row, &mut field);
                }
                _ => field.push(c),
            },
            ScanState::Quoted => match c {
                // An escaped quote stays literal unless it ends the field
                '"' if previous == Some('\\') => {
                    if matches!(chars.peek(), None | Some(',') | Some('\r') | Some('\n')) {
                        state = ScanState::Unquoted;
                    } else {
                        field.push(c);
                    }
                }
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        state = ScanState::Unquoted;
                    }
                }
                _ => field.push(c),
            },
        }
        previous = Some(c);
    }
    finish_row(&mut rows, &mut row, &mut field);

    rows
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    row.push(std::mem::take(field));
    let cells = std::mem::take(row);
    let blank = cells.len() == 1 && cells[0].trim().is_empty();
    if !blank {
        rows.push(cells);
    }
}

/// Re-emit CSV text fully quoted, with the classification column appended.
///
/// The first row is treated as the header.
pub fn requote(text: &str) -> Result<String> {
    let mut writer = CsvWriter::new(Vec::new());
    for (index, row) in parse_rows(text).into_iter().enumerate() {
        let classification = if index == 0 {
            CLASSIFICATION_COLUMN
        } else {
            CLASSIFICATION_DEFAULT
        };
        writer.write_row(row.iter().map(|cell| sanitize_text(cell)), classification)?;
    }
    String::from_utf8(writer.into_inner()).context("CSV output is not valid UTF-8")
}
