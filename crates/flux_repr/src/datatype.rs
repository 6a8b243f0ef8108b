use std::fmt;

use crate::error::{ReprError, Result};

/// Data kind declared by a single `#datatype` annotation cell.
///
/// This is the closed set of kinds the response format can declare. Every
/// decoded cell is coerced against exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Long,
    UnsignedLong,
    Double,
    Bool,
    /// RFC 3339 timestamp with nanosecond precision.
    Time,
    /// Signed duration, decoded to a nanosecond magnitude.
    Duration,
    Base64Binary,
}

impl DataType {
    /// Parses an annotation token into a data type.
    ///
    /// Both timestamp spellings used by the server map to [`DataType::Time`].
    pub fn from_annotation(token: &str) -> Result<Self> {
        Ok(match token {
            "string" => DataType::String,
            "long" => DataType::Long,
            "unsignedLong" => DataType::UnsignedLong,
            "double" => DataType::Double,
            "boolean" => DataType::Bool,
            "dateTime:RFC3339" | "dateTime:RFC3339Nano" => DataType::Time,
            "duration" => DataType::Duration,
            "base64Binary" => DataType::Base64Binary,
            other => return Err(ReprError::UnknownDataType(other.to_string())),
        })
    }

    /// The canonical annotation token for this type.
    pub const fn annotation_token(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Long => "long",
            DataType::UnsignedLong => "unsignedLong",
            DataType::Double => "double",
            DataType::Bool => "boolean",
            DataType::Time => "dateTime:RFC3339",
            DataType::Duration => "duration",
            DataType::Base64Binary => "base64Binary",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.annotation_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_tokens() {
        assert_eq!(
            DataType::Long,
            DataType::from_annotation("long").unwrap()
        );
        assert_eq!(
            DataType::Time,
            DataType::from_annotation("dateTime:RFC3339").unwrap()
        );
        assert_eq!(
            DataType::Time,
            DataType::from_annotation("dateTime:RFC3339Nano").unwrap()
        );
        assert_eq!(
            DataType::Base64Binary,
            DataType::from_annotation("base64Binary").unwrap()
        );
    }

    #[test]
    fn unknown_token_errors() {
        let err = DataType::from_annotation("weird").unwrap_err();
        assert!(matches!(err, ReprError::UnknownDataType(ref t) if t == "weird"));
    }

    #[test]
    fn tokens_round_trip() {
        for datatype in [
            DataType::String,
            DataType::Long,
            DataType::UnsignedLong,
            DataType::Double,
            DataType::Bool,
            DataType::Time,
            DataType::Duration,
            DataType::Base64Binary,
        ] {
            assert_eq!(
                datatype,
                DataType::from_annotation(datatype.annotation_token()).unwrap()
            );
        }
    }
}
