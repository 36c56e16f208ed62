use thiserror::Error;

/// A mandatory column is absent from the input header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("mandatory column `{column}` is absent from the input")]
pub struct SchemaError {
    pub column: String,
}

impl SchemaError {
    pub fn missing(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

/// Errors that abort a load. Nothing after a successful load returns an error.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to read tabular input: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open input: {0}")]
    Io(#[from] std::io::Error),
}
