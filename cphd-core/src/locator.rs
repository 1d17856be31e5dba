//! Перевод запроса на подпрямоугольник канала в набор байтовых экстентов.
//!
//! Единица ввода-вывода: строка (один вектор). Строки делятся между
//! потоками непрерывными группами, байты строки никогда не разрезаются.

use std::ops::{Range, RangeInclusive};

use cphd_types::{CphdError, CphdResult, SampleType};
use log::trace;

use crate::metadata::MetadataIndex;

/// Запрос на чтение подпрямоугольника канала.
///
/// `None` в `last_vector` / `last_sample` означает «до конца канала».
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub channel: usize,
    pub first_vector: usize,
    pub last_vector: Option<usize>,
    pub first_sample: usize,
    pub last_sample: Option<usize>,
    /// Количество потоков (None = значение читателя по умолчанию)
    pub workers: Option<usize>,
}

/// Одна строка запроса: вектор и его байтовое смещение в файле.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowExtent {
    pub vector: usize,
    /// Абсолютное смещение первой запрошенной выборки строки
    pub file_offset: u64,
    /// Смещение строки в буфере назначения
    pub dest_offset: usize,
}

/// Проверенный и нормализованный план чтения.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    pub channel: usize,
    pub sample_type: SampleType,
    pub vectors: RangeInclusive<usize>,
    pub samples: RangeInclusive<usize>,
    /// Байт в одной строке запроса
    pub row_bytes: usize,
    /// Строки идут в файле подряд (запрошена полная ширина)
    pub contiguous: bool,
    rows: Vec<RowExtent>,
}

/// Вычисляет планы чтения для каналов одного файла.
#[derive(Debug, Clone, Copy)]
pub struct ChannelLocator<'a> {
    index: &'a MetadataIndex,
    signal_block_offset: u64,
}

impl ReadRequest {
    /// Весь канал целиком.
    pub fn channel(channel: usize) -> Self {
        Self {
            channel,
            first_vector: 0,
            last_vector: None,
            first_sample: 0,
            last_sample: None,
            workers: None,
        }
    }

    pub fn vectors(
        mut self,
        first: usize,
        last: Option<usize>,
    ) -> Self {
        self.first_vector = first;
        self.last_vector = last;
        self
    }

    pub fn samples(
        mut self,
        first: usize,
        last: Option<usize>,
    ) -> Self {
        self.first_sample = first;
        self.last_sample = last;
        self
    }

    pub fn workers(
        mut self,
        workers: usize,
    ) -> Self {
        self.workers = Some(workers);
        self
    }
}

impl<'a> ChannelLocator<'a> {
    /// `signal_block_offset`: абсолютное смещение сигнального блока в файле.
    pub fn new(
        index: &'a MetadataIndex,
        signal_block_offset: u64,
    ) -> Self {
        Self {
            index,
            signal_block_offset,
        }
    }

    /// Проверяет запрос и строит план. Ввод-вывод не выполняется.
    pub fn locate(
        &self,
        request: &ReadRequest,
    ) -> CphdResult<ReadPlan> {
        let shape = self.index.channel_shape(request.channel)?;
        let sample_type = self.index.sample_type();
        let cell_size = sample_type.cell_size();

        let vectors = resolve(
            "vector",
            request.first_vector,
            request.last_vector,
            shape.num_vectors,
        )?;
        let samples = resolve(
            "sample",
            request.first_sample,
            request.last_sample,
            shape.num_samples,
        )?;

        let row_stride = (shape.num_samples * cell_size) as u64;
        let row_bytes = (samples.end() - samples.start() + 1) * cell_size;
        let base = self.signal_block_offset
            + self.index.signal_array_offset(request.channel)?
            + (*samples.start() * cell_size) as u64;

        let rows = vectors
            .clone()
            .enumerate()
            .map(|(i, vector)| RowExtent {
                vector,
                file_offset: base + vector as u64 * row_stride,
                dest_offset: i * row_bytes,
            })
            .collect();

        let plan = ReadPlan {
            channel: request.channel,
            sample_type,
            contiguous: row_bytes as u64 == row_stride,
            vectors,
            samples,
            row_bytes,
            rows,
        };

        trace!(
            "channel {}: vectors {:?} samples {:?} -> {} rows x {} B (contiguous={})",
            plan.channel,
            plan.vectors,
            plan.samples,
            plan.rows.len(),
            plan.row_bytes,
            plan.contiguous
        );

        Ok(plan)
    }
}

impl ReadPlan {
    pub fn rows(&self) -> &[RowExtent] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Выборок в строке запроса.
    pub fn row_cells(&self) -> usize {
        self.row_bytes / self.sample_type.cell_size()
    }

    /// Количество ячеек в запросе.
    pub fn num_cells(&self) -> usize {
        self.num_rows() * self.row_cells()
    }

    /// Размер буфера назначения в байтах.
    pub fn total_bytes(&self) -> usize {
        self.num_rows() * self.row_bytes
    }

    /// Делит строки между `workers` потоками. См. [`partition_rows`].
    pub fn partition(
        &self,
        workers: usize,
    ) -> Vec<Range<usize>> {
        partition_rows(self.num_rows(), workers)
    }
}

/// Делит `num_rows` строк на не более чем `workers` непрерывных групп почти
/// равного размера. Остаток достаётся первым группам.
///
/// ```
/// use cphd_core::locator::partition_rows;
/// assert_eq!(partition_rows(10, 4), vec![0..3, 3..6, 6..8, 8..10]);
/// assert_eq!(partition_rows(2, 8), vec![0..1, 1..2]);
/// ```
pub fn partition_rows(
    num_rows: usize,
    workers: usize,
) -> Vec<Range<usize>> {
    let groups = workers.clamp(1, num_rows.max(1));
    let base = num_rows / groups;
    let remainder = num_rows % groups;

    let mut start = 0;
    (0..groups)
        .map(|i| {
            let len = base + usize::from(i < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .filter(|r| !r.is_empty())
        .collect()
}

/// Раскрывает «до конца» и проверяет `first <= last < len`.
fn resolve(
    axis: &str,
    first: usize,
    last: Option<usize>,
    len: usize,
) -> CphdResult<RangeInclusive<usize>> {
    let last = last.unwrap_or(len.saturating_sub(1));

    if last >= len {
        return Err(CphdError::invalid_range(format!(
            "{axis} {last} is beyond channel size {len}"
        )));
    }

    if first > last {
        return Err(CphdError::invalid_range(format!(
            "first {axis} {first} > last {axis} {last}"
        )));
    }

    Ok(first..=last)
}
