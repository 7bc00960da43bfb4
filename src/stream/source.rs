//! Source readers: CSV, JSONL, and JSON-array files as [`Row`] streams
//! (spec §6).

use super::{AroValue, Row, Stream};
use crate::error::StreamError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// CSV parsing options.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// The field delimiter byte.
    pub delimiter: char,
    /// The quote character; doubled inside a quoted field is a literal
    /// quote (RFC 4180).
    pub quote_char: char,
    /// Whether the first line names the columns.
    pub has_header: bool,
    /// Whether to trim leading/trailing whitespace from unquoted fields.
    pub trim_whitespace: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            has_header: true,
            trim_whitespace: true,
        }
    }
}

/// Normalizes a CSV header cell to lower-case kebab-case: dots and spaces
/// become hyphens, everything else is lower-cased as-is.
fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '.' || c == ' ' { '-' } else { c })
        .collect()
}

/// Splits one CSV line into raw (still-quoted) fields per RFC 4180: a
/// quoted field may contain the delimiter and embedded newlines (joined by
/// the caller before this is invoked), and a doubled quote inside a quoted
/// field is an escaped literal quote.
fn split_csv_line(line: &str, delimiter: char, quote: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == quote {
                if chars.peek() == Some(&quote) {
                    current.push(quote);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == quote {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

/// True while `s` contains an even number of `quote` characters — i.e. no
/// quoted field currently spans the end of `s` looking for its closing
/// quote on a later physical line.
fn quote_parity_is_even(s: &str, quote: char) -> bool {
    s.chars().filter(|&c| c == quote).count() % 2 == 0
}

/// A lazily-read CSV source: pulls one physical line at a time from the
/// underlying file, joining consecutive lines into one logical record only
/// when a quoted field's embedded newline leaves the quote count unbalanced
/// (RFC 4180). Unlike reading the whole file up front, memory use here is
/// bounded by the longest single record rather than the file size.
pub struct CsvStream {
    reader: BufReader<File>,
    options: CsvOptions,
    headers: Vec<String>,
}

impl CsvStream {
    fn next_logical_line(&mut self) -> Result<Option<String>, StreamError> {
        let mut buf = String::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(if buf.is_empty() { None } else { Some(buf) });
            }
            let line = line.trim_end_matches(['\n', '\r']);
            if !buf.is_empty() {
                buf.push('\n');
            }
            buf.push_str(line);
            if quote_parity_is_even(&buf, self.options.quote_char) {
                return Ok(Some(buf));
            }
        }
    }
}

impl Stream for CsvStream {
    type Item = Row;

    fn next(&mut self) -> Result<Option<Row>, StreamError> {
        loop {
            let Some(line) = self.next_logical_line()? else {
                return Ok(None);
            };
            if line.is_empty() {
                continue;
            }
            let cells = split_csv_line(&line, self.options.delimiter, self.options.quote_char);
            let mut row = Row::new();
            for (i, cell) in cells.into_iter().enumerate() {
                let cell = if self.options.trim_whitespace { cell.trim().to_string() } else { cell };
                let key = self
                    .headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column-{}", i));
                row.insert(key, AroValue::coerce_from_str(&cell));
            }
            return Ok(Some(row));
        }
    }
}

/// Opens a delimited file as a lazy [`Stream`] of [`Row`]s, applying
/// [`AroValue::coerce_from_str`] to every cell. `chunk_size` sizes the
/// underlying buffered reader (clamped to a sane minimum); rows are
/// produced one logical record at a time as the stream is pulled, not all
/// at once at open time.
pub fn stream_from_csv(
    path: impl AsRef<Path>,
    options: &CsvOptions,
    chunk_size: usize,
) -> Result<CsvStream, StreamError> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(chunk_size.max(256), file);
    let mut stream = CsvStream {
        reader,
        options: options.clone(),
        headers: Vec::new(),
    };
    if options.has_header {
        if let Some(header_line) = stream.next_logical_line()? {
            stream.headers = split_csv_line(&header_line, options.delimiter, options.quote_char)
                .into_iter()
                .map(|h| normalize_header(&h))
                .collect();
        }
    }
    Ok(stream)
}

/// JSONL parsing options.
#[derive(Debug, Clone)]
pub struct JsonlOptions {
    /// If true, lines that fail to parse as a JSON object are skipped
    /// rather than failing the whole stream.
    pub skip_malformed: bool,
    /// Maximum accepted line length in bytes; longer lines produce
    /// [`StreamError::LineTooLong`] (or are skipped, if `skip_malformed`).
    pub max_line_length: usize,
}

impl Default for JsonlOptions {
    fn default() -> Self {
        Self {
            skip_malformed: false,
            max_line_length: 1_048_576,
        }
    }
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//")
}

/// A lazy JSON-Lines source: each `next()` call reads and parses exactly
/// one more physical line, skipping comment/blank lines in the process.
pub struct JsonlStream {
    lines: std::io::Lines<BufReader<File>>,
    options: JsonlOptions,
    index: usize,
}

impl Stream for JsonlStream {
    type Item = Row;

    fn next(&mut self) -> Result<Option<Row>, StreamError> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line?;
            let index = self.index;
            self.index += 1;
            if is_comment_or_blank(&line) {
                continue;
            }
            if line.len() > self.options.max_line_length {
                if self.options.skip_malformed {
                    continue;
                }
                return Err(StreamError::LineTooLong {
                    length: line.len(),
                    limit: self.options.max_line_length,
                });
            }
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(serde_json::Value::Object(map)) => return Ok(Some(json_object_to_row(map))),
                Ok(_) => {
                    if self.options.skip_malformed {
                        continue;
                    }
                    return Err(StreamError::ElementNotObject { index });
                }
                Err(e) => {
                    if self.options.skip_malformed {
                        continue;
                    }
                    return Err(StreamError::MalformedJson {
                        line: index + 1,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Opens a JSON-Lines file as a lazy [`Stream`] of [`Row`]s, one object per
/// non-comment, non-blank line, read and parsed one line at a time as the
/// stream is pulled.
pub fn stream_from_jsonl(path: impl AsRef<Path>, options: &JsonlOptions) -> Result<JsonlStream, StreamError> {
    let file = File::open(path)?;
    Ok(JsonlStream {
        lines: BufReader::new(file).lines(),
        options: options.clone(),
        index: 0,
    })
}

/// A lazy JSON-array source. `serde_json` has no public incremental parser
/// for a single bracketed array's elements (only for whitespace-separated
/// top-level values), so opening still parses the whole array up front;
/// what's lazy is the conversion of each [`serde_json::Value`] into a
/// [`Row`], which `next()` does one element at a time rather than
/// allocating every `Row` before the first one is available.
pub struct JsonArrayStream {
    elements: std::vec::IntoIter<serde_json::Value>,
    index: usize,
}

impl Stream for JsonArrayStream {
    type Item = Row;

    fn next(&mut self) -> Result<Option<Row>, StreamError> {
        let Some(element) = self.elements.next() else {
            return Ok(None);
        };
        let index = self.index;
        self.index += 1;
        match element {
            serde_json::Value::Object(map) => Ok(Some(json_object_to_row(map))),
            _ => Err(StreamError::ElementNotObject { index }),
        }
    }
}

/// Opens a single top-level JSON array of objects as a lazy [`Stream`] of
/// [`Row`]s.
pub fn stream_from_json_array(path: impl AsRef<Path>) -> Result<JsonArrayStream, StreamError> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let serde_json::Value::Array(elements) = value else {
        return Err(StreamError::NotAnArray);
    };
    Ok(JsonArrayStream {
        elements: elements.into_iter(),
        index: 0,
    })
}

fn json_object_to_row(map: serde_json::Map<String, serde_json::Value>) -> Row {
    let mut row = Row::new();
    for (key, value) in map {
        row.insert(key, json_value_to_aro(value));
    }
    row
}

fn json_value_to_aro(value: serde_json::Value) -> AroValue {
    match value {
        serde_json::Value::Null => AroValue::Null,
        serde_json::Value::Bool(b) => AroValue::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AroValue::Int(i)
            } else {
                AroValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => AroValue::String(s),
        serde_json::Value::Array(items) => AroValue::List(items.into_iter().map(json_value_to_aro).collect()),
        serde_json::Value::Object(map) => AroValue::Row(json_object_to_row(map)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{contents}").unwrap();
        f
    }

    #[test]
    fn csv_header_normalizes_to_kebab_case() {
        let f = write_temp("Order ID,Total.Amount\n1,9.5\n");
        let rows = stream_from_csv(f.path(), &CsvOptions::default(), 100).unwrap().collect().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("order-id"), Some(&AroValue::Int(1)));
        assert_eq!(rows[0].get("total-amount"), Some(&AroValue::Float(9.5)));
    }

    #[test]
    fn csv_quoted_field_may_contain_the_delimiter() {
        let f = write_temp("name,note\n\"Smith, John\",\"he said \"\"hi\"\"\"\n");
        let rows = stream_from_csv(f.path(), &CsvOptions::default(), 100).unwrap().collect().unwrap();
        assert_eq!(rows[0].get("name"), Some(&AroValue::String("Smith, John".into())));
        assert_eq!(rows[0].get("note"), Some(&AroValue::String("he said \"hi\"".into())));
    }

    #[test]
    fn csv_quoted_field_may_contain_an_embedded_newline() {
        let f = write_temp("name,note\n\"Smith, John\",\"line one\nline two\"\n");
        let rows = stream_from_csv(f.path(), &CsvOptions::default(), 100).unwrap().collect().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("note"), Some(&AroValue::String("line one\nline two".into())));
    }

    #[test]
    fn jsonl_skips_comments_and_blank_lines() {
        let f = write_temp("# a comment\n\n{\"a\": 1}\n// another comment\n{\"a\": 2}\n");
        let rows = stream_from_jsonl(f.path(), &JsonlOptions::default()).unwrap().collect().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("a"), Some(&AroValue::Int(1)));
    }

    #[test]
    fn jsonl_malformed_line_fails_unless_skip_malformed() {
        let f = write_temp("{\"a\": 1}\nnot json\n");
        let err = stream_from_jsonl(f.path(), &JsonlOptions::default())
            .unwrap()
            .collect()
            .unwrap_err();
        assert!(matches!(err, StreamError::MalformedJson { .. }));

        let f2 = write_temp("{\"a\": 1}\nnot json\n");
        let opts = JsonlOptions { skip_malformed: true, ..JsonlOptions::default() };
        let rows = stream_from_jsonl(f2.path(), &opts).unwrap().collect().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn jsonl_is_read_one_line_at_a_time_not_all_at_once() {
        let f = write_temp("{\"a\": 1}\n{\"a\": 2}\n{\"a\": 3}\n");
        let mut stream = stream_from_jsonl(f.path(), &JsonlOptions::default()).unwrap();
        assert_eq!(stream.next().unwrap().unwrap().get("a"), Some(&AroValue::Int(1)));
        assert_eq!(stream.next().unwrap().unwrap().get("a"), Some(&AroValue::Int(2)));
        assert_eq!(stream.next().unwrap().unwrap().get("a"), Some(&AroValue::Int(3)));
        assert!(stream.next().unwrap().is_none());
    }

    #[test]
    fn json_array_requires_a_top_level_array() {
        let f = write_temp("{\"a\": 1}");
        let err = stream_from_json_array(f.path()).unwrap_err();
        assert!(matches!(err, StreamError::NotAnArray));
    }

    #[test]
    fn json_array_reads_every_object() {
        let f = write_temp("[{\"a\": 1}, {\"a\": 2}]");
        let rows = stream_from_json_array(f.path()).unwrap().collect().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("a"), Some(&AroValue::Int(2)));
    }
}
