//! The response reader: a line-pull state machine over the raw stream.
//!
//! Classification happens before any cell is coerced: blank lines bound
//! result blocks, `#` rows feed the schema builder, the first plain line of
//! a block is its header, and everything after is data routed to the table
//! registry.

use std::io::BufRead;

use flux_repr::coerce;
use tracing::debug;

use crate::decoder::tokenize_line;
use crate::dialect::ParseOptions;
use crate::errors::{ResponseError, Result};
use crate::schema::{BlockLayout, RESERVED_COLUMNS, SchemaBuilder, is_error_header};
use crate::table::{Table, TableRegistry, parse_table_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    AwaitingAnnotations,
    AwaitingHeader,
    AwaitingData,
}

/// Pull-based decoder for one annotated-CSV response stream.
///
/// Owns no state across calls: every [`ResponseReader`] decodes exactly one
/// stream and is consumed by [`ResponseReader::read_all`]. Returned tables
/// share an immutable schema handle per block and are safe to read from any
/// thread afterwards.
#[derive(Debug)]
pub struct ResponseReader<R: BufRead> {
    input: R,
    options: ParseOptions,
    line_number: usize,
}

impl<R: BufRead> ResponseReader<R> {
    pub fn new(input: R, options: ParseOptions) -> Self {
        ResponseReader {
            input,
            options,
            line_number: 0,
        }
    }

    /// Decodes the whole stream into tables, in block order and first-seen
    /// table order within each block.
    ///
    /// Any failure discards everything decoded so far; a partially decoded
    /// block is never returned.
    pub fn read_all(mut self) -> Result<Vec<Table>> {
        let mut output = Vec::new();
        let mut state = ParseState::AwaitingAnnotations;
        let mut builder = SchemaBuilder::default();
        let mut layout: Option<BlockLayout> = None;
        let mut registry = TableRegistry::default();

        while let Some(line) = self.next_line()? {
            let line_number = self.line_number;

            if line.is_empty() {
                // A blank line closes the block, but only once the block has
                // produced data.
                if state == ParseState::AwaitingData && !registry.is_empty() {
                    let tables = registry.finish();
                    debug!(tables = tables.len(), "finalized result block");
                    output.extend(tables);
                    layout = None;
                    builder = SchemaBuilder::default();
                    state = ParseState::AwaitingAnnotations;
                }
                continue;
            }

            match state {
                ParseState::AwaitingAnnotations | ParseState::AwaitingHeader
                    if line.starts_with('#') =>
                {
                    let cells = tokenize_line(&line, &self.options.dialect, line_number)?;
                    builder.annotate(&cells[0], &cells[1..], line_number)?;
                    state = ParseState::AwaitingHeader;
                }
                ParseState::AwaitingAnnotations => {
                    return Err(ResponseError::MissingAnnotation {
                        line: line_number,
                        reason: "row reached before any annotation rows".to_string(),
                    });
                }
                ParseState::AwaitingHeader => {
                    let cells = tokenize_line(&line, &self.options.dialect, line_number)?;

                    if self.options.has_header && is_error_header(&cells) {
                        builder = SchemaBuilder::default();
                        layout = Some(BlockLayout::error());
                        state = ParseState::AwaitingData;
                        continue;
                    }

                    let finished = if self.options.has_header {
                        std::mem::take(&mut builder).finish(
                            Some(&cells[1..]),
                            &self.options,
                            line_number,
                        )?
                    } else {
                        std::mem::take(&mut builder).finish(None, &self.options, line_number)?
                    };
                    state = ParseState::AwaitingData;

                    if !self.options.has_header {
                        // No header row: this line is already data.
                        process_data_row(cells, &finished, &mut registry, line_number, &line)?;
                    }
                    layout = Some(finished);
                }
                ParseState::AwaitingData => {
                    let cells = tokenize_line(&line, &self.options.dialect, line_number)?;
                    // Layout is always set once we are in the data state.
                    let block = layout.as_ref().ok_or_else(|| ResponseError::MalformedRow {
                        line: line_number,
                        row: line.clone(),
                        reason: "data row outside of a result block".to_string(),
                    })?;
                    process_data_row(cells, block, &mut registry, line_number, &line)?;
                }
            }
        }

        match state {
            ParseState::AwaitingHeader if builder.has_annotations() => {
                Err(ResponseError::StreamTerminated {
                    line: self.line_number,
                    reason: "stream ended after annotations but before a header row".to_string(),
                    source: None,
                })
            }
            ParseState::AwaitingData if layout.as_ref().is_some_and(|l| l.error_form) => {
                Err(ResponseError::StreamTerminated {
                    line: self.line_number,
                    reason: "stream ended before the server's error payload".to_string(),
                    source: None,
                })
            }
            _ => {
                if !registry.is_empty() {
                    let tables = registry.finish();
                    debug!(tables = tables.len(), "finalized trailing result block");
                    output.extend(tables);
                }
                Ok(output)
            }
        }
    }

    /// Pulls the next physical line, stripping the terminator and, on the
    /// first line only, a UTF-8 byte-order mark.
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let read = self
            .input
            .read_until(b'\n', &mut buf)
            .map_err(|source| ResponseError::StreamTerminated {
                line: self.line_number,
                reason: "read from response stream failed".to_string(),
                source: Some(source),
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let mut line = if self.options.lossy_utf8 {
            String::from_utf8_lossy(&buf).into_owned()
        } else {
            String::from_utf8(buf).map_err(|err| ResponseError::MalformedRow {
                line: self.line_number,
                row: String::from_utf8_lossy(err.as_bytes()).into_owned(),
                reason: "line contains invalid UTF-8 data".to_string(),
            })?
        };

        if self.line_number == 1 {
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string();
            }
        }

        Ok(Some(line))
    }
}

/// Decodes a complete in-memory response.
pub fn parse_response(input: &str, options: ParseOptions) -> Result<Vec<Table>> {
    ResponseReader::new(input.as_bytes(), options).read_all()
}

fn process_data_row(
    cells: Vec<String>,
    block: &BlockLayout,
    registry: &mut TableRegistry,
    line: usize,
    row: &str,
) -> Result<()> {
    if block.error_form {
        // The error payload replaces the result entirely. Its leading
        // alignment cell is optional, like the header's.
        let payload = match cells.first().map(String::as_str) {
            Some("") => &cells[1..],
            _ => &cells[..],
        };
        let message = payload.first().cloned().unwrap_or_default();
        let reference = payload.get(1).cloned().unwrap_or_default();
        return Err(ResponseError::QueryExecution { message, reference });
    }

    // Data rows carry one extra leading cell aligned under the sentinel.
    if cells.len() != block.width + 1 {
        return Err(ResponseError::MalformedRow {
            line,
            row: row.to_string(),
            reason: format!(
                "expected {} cells, got {}",
                block.width + 1,
                cells.len()
            ),
        });
    }
    let aligned = &cells[1..];

    let table_cell = if aligned[1].is_empty() {
        block.table_default.as_str()
    } else {
        aligned[1].as_str()
    };
    let table_index = parse_table_index(table_cell).ok_or_else(|| ResponseError::MalformedRow {
        line,
        row: row.to_string(),
        reason: format!("table index '{table_cell}' is not a non-negative integer"),
    })?;

    let mut values = Vec::with_capacity(block.schema.len());
    for column in block.schema.columns() {
        let raw = &aligned[column.index + RESERVED_COLUMNS];
        let value =
            coerce(raw, column.datatype, &column.default_value).map_err(|source| {
                ResponseError::TypeCoercion {
                    line,
                    column: column.index + RESERVED_COLUMNS + 1,
                    source,
                }
            })?;
        values.push(value);
    }

    registry.append(&block.schema, table_index, values);
    Ok(())
}
