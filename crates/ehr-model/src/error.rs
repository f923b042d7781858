use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid date '{raw}': {reason}")]
    InvalidDate { raw: String, reason: String },
    #[error("date '{0}' outside the legal calendar range")]
    DateOutOfBounds(String),
    #[error("missing {column} column at index {index}")]
    MissingColumn { column: &'static str, index: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("no date format established for {0} input")]
    MissingDateFormat(&'static str),
    #[error("malformed encoded row: {0}")]
    MalformedRow(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
