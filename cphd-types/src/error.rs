use std::{ops::RangeInclusive, path::PathBuf};

use thiserror::Error;

use crate::SampleType;

/// Результат для операций CPHD
pub type CphdResult<T> = std::result::Result<T, CphdError>;

/// Типы ошибок чтения CPHD.
#[derive(Debug, Error)]
pub enum CphdError {
    /// Файл не найден или не открывается
    #[error("Cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Некорректный ASCII-заголовок файла
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Некорректные или противоречивые XML-метаданные
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// Неизвестный формат выборок (SignalArrayFormat)
    #[error("Unsupported sample type: {0}")]
    UnsupportedSampleType(String),

    /// Индекс канала вне диапазона `0..num_channels`
    #[error("Channel index {index} out of range (file has {num_channels} channels)")]
    ChannelIndexOutOfRange { index: usize, num_channels: usize },

    /// Некорректный диапазон векторов или выборок
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Индекс ячейки за пределами блока
    #[error("Cell index {index} out of range (block has {len} cells)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Запрошенный формат ячеек не совпадает с форматом блока
    #[error("Sample type mismatch: block holds {block}, requested {requested}")]
    SampleTypeMismatch {
        requested: SampleType,
        block: SampleType,
    },

    /// Длина буфера не кратна размеру ячейки
    #[error("{len} bytes is not a whole number of {cell_size}-byte cells")]
    PartialCell { len: usize, cell_size: usize },

    /// Неизвестный PVP-параметр или формат, который нельзя декодировать
    #[error("PVP parameter error: {0}")]
    PvpParameter(String),

    /// Явно заданное нулевое количество потоков
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    /// Ошибка позиционного чтения в одном из потоков: весь запрос отклонён
    #[error("Incomplete read of channel {channel}, vectors {vectors:?}: {source}")]
    IncompleteRead {
        channel: usize,
        vectors: RangeInclusive<usize>,
        #[source]
        source: std::io::Error,
    },

    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CphdError {
    /// Удобные конструкторы
    pub fn malformed_header<S: Into<String>>(s: S) -> Self {
        Self::MalformedHeader(s.into())
    }

    pub fn malformed_metadata<S: Into<String>>(s: S) -> Self {
        Self::MalformedMetadata(s.into())
    }

    pub fn invalid_range<S: Into<String>>(s: S) -> Self {
        Self::InvalidRange(s.into())
    }

    /// Ошибка относится к открытию файла (нет файла, битый заголовок,
    /// битые метаданные, неподдерживаемый формат выборок).
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            Self::Open { .. }
                | Self::MalformedHeader(_)
                | Self::MalformedMetadata(_)
                | Self::UnsupportedSampleType(_)
        )
    }
}
