use std::path::PathBuf;

use cphd_types::CphdError;
use thiserror::Error;

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Файл схемы, переданный через --schema, не существует
    #[error("Schema file not found: {0:?}")]
    SchemaNotFound(PathBuf),

    /// Ошибка чтения CPHD
    #[error(transparent)]
    Cphd(#[from] CphdError),

    /// Ошибка сериализации отчёта
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
