use cphd_types::{ChannelShape, CphdError, CphdResult, SampleType};

use crate::cells::{CellView, SampleCell, TypedCells};

/// Буфер прочитанного подпрямоугольника канала.
///
/// Строки (векторы) идут подряд, внутри строки идут выборки. Байты в порядке
/// файла. Блок принадлежит вызывающему и ни с кем не разделяется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    data: Vec<u8>,
    sample_type: SampleType,
    shape: ChannelShape,
}

impl RawBlock {
    pub(crate) fn new(
        data: Vec<u8>,
        sample_type: SampleType,
        shape: ChannelShape,
    ) -> Self {
        debug_assert_eq!(data.len(), shape.area() * sample_type.cell_size());

        Self {
            data,
            sample_type,
            shape,
        }
    }

    /// Формат, в котором блок был прочитан.
    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// Размер запрошенного подпрямоугольника: векторы × выборки.
    pub fn shape(&self) -> ChannelShape {
        self.shape
    }

    pub fn num_cells(&self) -> usize {
        self.shape.area()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Представление блока как ячеек формата `sample_type`. Формат должен
    /// совпадать с тем, в котором блок был прочитан: каждый байт входит ровно
    /// в одну ячейку, и их число равно [`RawBlock::num_cells`].
    pub fn as_typed_cells(
        &self,
        sample_type: SampleType,
    ) -> CphdResult<TypedCells<'_>> {
        if sample_type != self.sample_type {
            return Err(CphdError::SampleTypeMismatch {
                requested: sample_type,
                block: self.sample_type,
            });
        }

        TypedCells::new(&self.data, sample_type)
    }

    /// Статически типизированное представление. `None`, если `T` не
    /// соответствует формату блока.
    pub fn cells<T: SampleCell>(&self) -> Option<CellView<'_, T>> {
        (T::SAMPLE_TYPE == self.sample_type).then(|| CellView::from_cells(&self.data))
    }

    /// Байты одной строки (вектора) блока.
    pub fn row(
        &self,
        row: usize,
    ) -> Option<&[u8]> {
        let row_bytes = self.shape.num_samples * self.sample_type.cell_size();
        let start = row.checked_mul(row_bytes)?;
        let end = start.checked_add(row_bytes)?;

        self.data.get(start..end)
    }
}
