//! Line tokenization.
//!
//! The driver hands the tokenizer one physical line at a time; quoting never
//! spans lines in this format, so a quote still open at end of line is a
//! malformed row rather than a continuation.

use csv_core::ReadRecordResult;

use crate::dialect::DialectOptions;
use crate::errors::{ResponseError, Result};

/// Splits one physical line into its raw cells.
///
/// Fields may be wrapped in the dialect's quote character; a doubled quote
/// inside a quoted field is one literal quote. Whitespace around unquoted
/// fields is preserved verbatim.
pub fn tokenize_line(
    line: &str,
    dialect: &DialectOptions,
    line_number: usize,
) -> Result<Vec<String>> {
    let malformed = |reason: &str| ResponseError::MalformedRow {
        line: line_number,
        row: line.to_string(),
        reason: reason.to_string(),
    };

    // Terminate the record so a single read_record call completes it.
    let mut input = Vec::with_capacity(line.len() + 1);
    input.extend_from_slice(line.as_bytes());
    input.push(b'\n');

    // Unquoting only shrinks data, and a record has at most one field per
    // input byte, so these are large enough for any single call.
    let mut output = vec![0u8; input.len()];
    let mut ends = vec![0usize; input.len()];

    let mut reader = dialect.csv_core_reader();
    let (result, _, _, ends_written) = reader.read_record(&input, &mut output, &mut ends);

    match result {
        ReadRecordResult::Record => {}
        // The quote swallowed our terminator.
        ReadRecordResult::InputEmpty => return Err(malformed("unterminated quoted field")),
        ReadRecordResult::OutputFull | ReadRecordResult::OutputEndsFull => {
            return Err(malformed("row exceeds tokenizer buffer"));
        }
        ReadRecordResult::End => return Ok(Vec::new()),
    }

    let mut cells = Vec::with_capacity(ends_written);
    let mut start = 0;
    for &end in &ends[..ends_written] {
        let cell = std::str::from_utf8(&output[start..end])
            .map_err(|_| malformed("field contains invalid UTF-8 data"))?;
        cells.push(cell.to_string());
        start = end;
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(line: &str) -> Result<Vec<String>> {
        tokenize_line(line, &DialectOptions::default(), 1)
    }

    #[test]
    fn plain_fields() {
        assert_eq!(vec!["a", "bb", "ccc"], tokenize("a,bb,ccc").unwrap());
    }

    #[test]
    fn empty_fields_kept() {
        assert_eq!(vec!["", "", "0", ""], tokenize(",,0,").unwrap());
    }

    #[test]
    fn quoted_delimiter() {
        assert_eq!(
            vec!["Smith, John", "A, B"],
            tokenize("\"Smith, John\",\"A, B\"").unwrap()
        );
    }

    #[test]
    fn doubled_quote_is_literal() {
        assert_eq!(
            vec!["She said \"hi\""],
            tokenize("\"She said \"\"hi\"\"\"").unwrap()
        );
    }

    #[test]
    fn whitespace_preserved() {
        assert_eq!(vec![" a ", "\tb"], tokenize(" a ,\tb").unwrap());
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = tokenize("a,\"unclosed").unwrap_err();
        assert!(matches!(
            err,
            ResponseError::MalformedRow { line: 1, .. }
        ));
    }

    #[test]
    fn alternate_delimiter() {
        let dialect = DialectOptions {
            delimiter: b'|',
            quote: b'"',
        };
        assert_eq!(
            vec!["a", "b,c", "d"],
            tokenize_line("a|b,c|d", &dialect, 1).unwrap()
        );
    }
}
