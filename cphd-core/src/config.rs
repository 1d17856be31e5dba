use std::{num::NonZeroUsize, thread};

use cphd_types::{CphdError, CphdResult};

/// Максимальный размер ASCII-заголовка по умолчанию (64 КБ).
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

/// Настройки открытия CPHD файла.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Количество потоков для чтения wideband (None = по числу ядер)
    pub workers: Option<usize>,
    /// Предел поиска терминатора заголовка `\f\n`
    pub max_header_bytes: usize,
}

impl ReaderConfig {
    /// Конфигурация с явным числом потоков.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..Self::default()
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            workers: None,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

/// Число аппаратных потоков, но не меньше 1.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Приводит запрошенное число потоков к рабочему значению.
///
/// `None` даёт значение по умолчанию (`fallback`), `Some(0)` является ошибкой.
pub fn resolve_workers(
    requested: Option<usize>,
    fallback: usize,
) -> CphdResult<usize> {
    match requested {
        Some(0) => Err(CphdError::InvalidWorkerCount),
        Some(n) => Ok(n),
        None => Ok(fallback.max(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_count_positive() {
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn test_resolve_workers() {
        assert_eq!(resolve_workers(Some(3), 8).unwrap(), 3);
        assert_eq!(resolve_workers(None, 8).unwrap(), 8);
        assert_eq!(resolve_workers(None, 0).unwrap(), 1);
        assert!(matches!(
            resolve_workers(Some(0), 8),
            Err(CphdError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn test_config_default() {
        let cfg = ReaderConfig::default();

        assert_eq!(cfg.workers, None);
        assert_eq!(cfg.max_header_bytes, DEFAULT_MAX_HEADER_BYTES);
        assert_eq!(ReaderConfig::with_workers(2).workers, Some(2));
    }
}
