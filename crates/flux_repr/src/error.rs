use crate::datatype::DataType;

#[derive(Debug, thiserror::Error)]
pub enum ReprError {
    #[error("unknown data type token '{0}'")]
    UnknownDataType(String),

    #[error("cannot coerce '{value}' to {datatype}: {reason}")]
    TypeCoercion {
        value: String,
        datatype: DataType,
        reason: String,
    },
}

pub type Result<T, E = ReprError> = std::result::Result<T, E>;
