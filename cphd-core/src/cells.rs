//! Типизированный доступ к ячейкам прочитанного блока.
//!
//! Байты остаются в буфере [`crate::RawBlock`] в порядке файла (big-endian);
//! ячейка декодируется в момент обращения, копия буфера не создаётся.

use std::{iter::FusedIterator, marker::PhantomData, slice::ChunksExact};

use byteorder::{BigEndian, ByteOrder};
use cphd_types::{CphdError, CphdResult, SampleType};
use num_complex::{Complex, Complex64};

/// Комплексная ячейка одного из форматов [`SampleType`].
pub trait SampleCell: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Формат, которому соответствует тип
    const SAMPLE_TYPE: SampleType;

    /// Размер ячейки в байтах
    const SIZE: usize;

    /// Декодирует ячейку из `SIZE` байт big-endian.
    fn decode(bytes: &[u8]) -> Self;

    /// Значение в `Complex<f64>`, без масштабирования.
    fn to_c64(self) -> Complex64;
}

impl SampleCell for Complex<i8> {
    const SAMPLE_TYPE: SampleType = SampleType::ComplexInt8;
    const SIZE: usize = 2;

    fn decode(bytes: &[u8]) -> Self {
        Complex::new(bytes[0] as i8, bytes[1] as i8)
    }

    fn to_c64(self) -> Complex64 {
        Complex64::new(self.re.into(), self.im.into())
    }
}

impl SampleCell for Complex<i16> {
    const SAMPLE_TYPE: SampleType = SampleType::ComplexInt16;
    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        Complex::new(
            BigEndian::read_i16(&bytes[0..2]),
            BigEndian::read_i16(&bytes[2..4]),
        )
    }

    fn to_c64(self) -> Complex64 {
        Complex64::new(self.re.into(), self.im.into())
    }
}

impl SampleCell for Complex<f32> {
    const SAMPLE_TYPE: SampleType = SampleType::ComplexFloat32;
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        Complex::new(
            BigEndian::read_f32(&bytes[0..4]),
            BigEndian::read_f32(&bytes[4..8]),
        )
    }

    fn to_c64(self) -> Complex64 {
        Complex64::new(self.re.into(), self.im.into())
    }
}

/// Неизменяемое представление байтов как последовательности ячеек `T`.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a, T> {
    bytes: &'a [u8],
    _cell: PhantomData<T>,
}

/// Проход по ячейкам [`CellView`]. Каждый вызов [`CellView::iter`] начинает
/// новый проход.
#[derive(Debug, Clone)]
pub struct Cells<'a, T> {
    chunks: ChunksExact<'a, u8>,
    _cell: PhantomData<T>,
}

/// Представление блока в формате файла, выбранном во время выполнения.
#[derive(Debug, Clone, Copy)]
pub enum TypedCells<'a> {
    Int8(CellView<'a, Complex<i8>>),
    Int16(CellView<'a, Complex<i16>>),
    Float32(CellView<'a, Complex<f32>>),
}

/// Обобщённая обработка представления без дублирования кода по форматам.
pub trait CellVisitor {
    type Output;

    fn visit<T: SampleCell>(
        self,
        view: CellView<'_, T>,
    ) -> Self::Output;
}

impl<'a, T: SampleCell> CellView<'a, T> {
    /// Длина `bytes` должна быть кратна размеру ячейки, иначе
    /// [`CphdError::PartialCell`].
    pub fn new(bytes: &'a [u8]) -> CphdResult<Self> {
        if bytes.len() % T::SIZE != 0 {
            return Err(CphdError::PartialCell {
                len: bytes.len(),
                cell_size: T::SIZE,
            });
        }

        Ok(Self::from_cells(bytes))
    }

    /// Для буферов, длина которых уже согласована с форматом.
    pub(crate) fn from_cells(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len() % T::SIZE, 0);

        Self {
            bytes,
            _cell: PhantomData,
        }
    }

    /// Количество ячеек.
    pub fn len(&self) -> usize {
        self.bytes.len() / T::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Ячейка с индексом `index`.
    pub fn get(
        &self,
        index: usize,
    ) -> CphdResult<T> {
        let start = index
            .checked_mul(T::SIZE)
            .filter(|&s| s < self.bytes.len())
            .ok_or(CphdError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;

        Ok(T::decode(&self.bytes[start..start + T::SIZE]))
    }

    pub fn iter(&self) -> Cells<'a, T> {
        Cells {
            chunks: self.bytes.chunks_exact(T::SIZE),
            _cell: PhantomData,
        }
    }

    /// Исходные байты в порядке файла.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl<'a, T: SampleCell> IntoIterator for &CellView<'a, T> {
    type Item = T;
    type IntoIter = Cells<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: SampleCell> IntoIterator for CellView<'a, T> {
    type Item = T;
    type IntoIter = Cells<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: SampleCell> Iterator for Cells<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(T::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }

    fn nth(
        &mut self,
        n: usize,
    ) -> Option<T> {
        self.chunks.nth(n).map(T::decode)
    }
}

impl<T: SampleCell> DoubleEndedIterator for Cells<'_, T> {
    fn next_back(&mut self) -> Option<T> {
        self.chunks.next_back().map(T::decode)
    }
}

impl<T: SampleCell> ExactSizeIterator for Cells<'_, T> {}

impl<T: SampleCell> FusedIterator for Cells<'_, T> {}

impl<'a> TypedCells<'a> {
    /// Представление `bytes` в формате `sample_type`.
    pub fn new(
        bytes: &'a [u8],
        sample_type: SampleType,
    ) -> CphdResult<Self> {
        Ok(match sample_type {
            SampleType::ComplexInt8 => TypedCells::Int8(CellView::new(bytes)?),
            SampleType::ComplexInt16 => TypedCells::Int16(CellView::new(bytes)?),
            SampleType::ComplexFloat32 => TypedCells::Float32(CellView::new(bytes)?),
        })
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            TypedCells::Int8(_) => SampleType::ComplexInt8,
            TypedCells::Int16(_) => SampleType::ComplexInt16,
            TypedCells::Float32(_) => SampleType::ComplexFloat32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedCells::Int8(v) => v.len(),
            TypedCells::Int16(v) => v.len(),
            TypedCells::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ячейка `index`, приведённая к `Complex<f64>`.
    pub fn get_c64(
        &self,
        index: usize,
    ) -> CphdResult<Complex64> {
        match self {
            TypedCells::Int8(v) => v.get(index).map(SampleCell::to_c64),
            TypedCells::Int16(v) => v.get(index).map(SampleCell::to_c64),
            TypedCells::Float32(v) => v.get(index).map(SampleCell::to_c64),
        }
    }

    /// Вызывает обобщённый обработчик с конкретным типом ячейки.
    pub fn visit<V: CellVisitor>(
        self,
        visitor: V,
    ) -> V::Output {
        match self {
            TypedCells::Int8(v) => visitor.visit(v),
            TypedCells::Int16(v) => visitor.visit(v),
            TypedCells::Float32(v) => visitor.visit(v),
        }
    }
}
