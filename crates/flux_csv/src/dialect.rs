use std::fmt;

/// Low-level CSV dialect used by the response stream.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DialectOptions {
    /// Delimiter character.
    pub delimiter: u8,
    /// Quote character.
    pub quote: u8,
}

impl Default for DialectOptions {
    fn default() -> Self {
        DialectOptions {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl fmt::Debug for DialectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectOptions")
            .field("delimiter", &(self.delimiter as char))
            .field("quote", &(self.quote as char))
            .finish()
    }
}

impl DialectOptions {
    pub(crate) fn csv_core_reader(&self) -> csv_core::Reader {
        csv_core::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .build()
    }
}

/// Options consumed by the response reader.
///
/// Inert configuration only; nothing here changes how cells are coerced.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub dialect: DialectOptions,

    /// Whether a header row follows the annotations. Without one, columns
    /// keep empty labels and lookups by label miss.
    pub has_header: bool,

    /// Additional header labels exposed through the value-column view,
    /// alongside the reserved `_value` label.
    pub value_columns: Vec<String>,

    /// Replace invalid UTF-8 with U+FFFD instead of failing the parse.
    pub lossy_utf8: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            dialect: DialectOptions::default(),
            has_header: true,
            value_columns: Vec::new(),
            lossy_utf8: false,
        }
    }
}
