use std::path::PathBuf;

use crate::{ExtractError, ExtractResult};

/// Параметры одного запуска извлечения.
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    /// Входной .cphd файл
    pub input: PathBuf,
    /// Схемы XML. Передаются внешнему валидатору без изменений
    pub schemas: Vec<PathBuf>,
    /// Потоков на чтение канала (None = по числу ядер)
    pub workers: Option<usize>,
    /// Читать только этот канал (None = все)
    pub channel: Option<usize>,
}

impl ExtractConfig {
    pub fn new<P: Into<PathBuf>>(input: P) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Проверяет то, что можно проверить до открытия файла.
    pub fn validate(&self) -> ExtractResult<()> {
        if let Some(missing) = self.schemas.iter().find(|p| !p.exists()) {
            return Err(ExtractError::SchemaNotFound(missing.clone()));
        }

        Ok(())
    }
}
