//! Decoder for annotated CSV query responses.
//!
//! A response stream is a sequence of result blocks separated by blank
//! lines. Each block opens with annotation rows describing the columns,
//! optionally a header row naming them, and then data rows partitioned into
//! logical tables by their table-index cell.
//!
//! ```
//! use flux_csv::{parse_response, ParseOptions, Value};
//!
//! let response = "\
//! #datatype,string,long,dateTime:RFC3339,double
//! #group,false,false,false,false
//! #default,_result,,,
//! ,result,table,_time,_value
//! ,,0,2020-02-27T22:18:33.602625Z,1.25
//! ";
//!
//! let tables = parse_response(response, ParseOptions::default())?;
//! assert_eq!(1, tables.len());
//! assert_eq!(Some(&Value::Double(1.25)), tables[0].records()[0].value());
//! # Ok::<_, flux_csv::ResponseError>(())
//! ```

pub mod decoder;
pub mod dialect;
pub mod errors;
pub mod reader;
pub mod schema;
pub mod table;

pub use dialect::{DialectOptions, ParseOptions};
pub use errors::{ResponseError, Result};
pub use reader::{ResponseReader, parse_response};
pub use schema::{Column, TableSchema};
pub use table::{Record, Table};

pub use flux_repr::{DataType, ReprError, Value};
