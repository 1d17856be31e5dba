use serde::Serialize;

/// Размер сетки одного канала: векторы × выборки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelShape {
    /// Количество векторов (строк)
    pub num_vectors: usize,
    /// Количество выборок в векторе (столбцов)
    pub num_samples: usize,
}

impl ChannelShape {
    pub fn new(
        num_vectors: usize,
        num_samples: usize,
    ) -> Self {
        Self {
            num_vectors,
            num_samples,
        }
    }

    /// Количество ячеек в канале.
    pub fn area(&self) -> usize {
        self.num_vectors * self.num_samples
    }

    /// То же, что [`ChannelShape::area`], но `None` при переполнении.
    /// Для форм, пришедших из файла.
    pub fn checked_area(&self) -> Option<usize> {
        self.num_vectors.checked_mul(self.num_samples)
    }
}
