//! Typed value representation for annotated-CSV query responses.
//!
//! A response stream declares a data kind per column through `#datatype`
//! annotation rows. This crate holds the closed [`DataType`] set, the
//! [`Value`] union produced by decoding, and the text-to-value coercion
//! logic shared by the decoders in `flux_csv`.

pub mod datatype;
pub mod error;
pub mod parse;
pub mod value;

pub use datatype::DataType;
pub use error::{ReprError, Result};
pub use parse::coerce;
pub use value::Value;
