use serde::Serialize;

use crate::{CphdError, CphdResult};

/// Формат комплексных выборок wideband-данных.
///
/// Один на весь файл: задаётся в `Data/SignalArrayFormat` и не меняется
/// после открытия.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SampleType {
    /// 8-битные целые (Re8, Im8), код `CI2`
    ComplexInt8,
    /// 16-битные целые (Re16, Im16), код `CI4`
    ComplexInt16,
    /// 32-битные float (Re32F, Im32F), код `CF8`
    ComplexFloat32,
}

impl SampleType {
    /// Разбирает код формата из метаданных.
    ///
    /// Поддерживаются коды CPHD 1.x (`CI2`, `CI4`, `CF8`) и старые
    /// имена вида `RE16I_IM16I`.
    pub fn from_code(code: &str) -> CphdResult<Self> {
        match code.trim() {
            "CI2" | "RE08I_IM08I" => Ok(SampleType::ComplexInt8),
            "CI4" | "RE16I_IM16I" => Ok(SampleType::ComplexInt16),
            "CF8" | "RE32F_IM32F" => Ok(SampleType::ComplexFloat32),
            other => Err(CphdError::UnsupportedSampleType(other.to_string())),
        }
    }

    /// Код формата в записи CPHD 1.x.
    pub fn code(&self) -> &'static str {
        match self {
            SampleType::ComplexInt8 => "CI2",
            SampleType::ComplexInt16 => "CI4",
            SampleType::ComplexFloat32 => "CF8",
        }
    }

    /// Размер одной комплексной ячейки в байтах
    pub fn cell_size(&self) -> usize {
        match self {
            SampleType::ComplexInt8 => 2,    // 1 байт Re + 1 байт Im
            SampleType::ComplexInt16 => 4,   // 2 байта Re + 2 байта Im
            SampleType::ComplexFloat32 => 8, // 4 байта Re + 4 байта Im
        }
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_sizes() {
        assert_eq!(SampleType::ComplexInt8.cell_size(), 2);
        assert_eq!(SampleType::ComplexInt16.cell_size(), 4);
        assert_eq!(SampleType::ComplexFloat32.cell_size(), 8);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(SampleType::from_code("CI2").unwrap(), SampleType::ComplexInt8);
        assert_eq!(SampleType::from_code(" CI4 ").unwrap(), SampleType::ComplexInt16);
        assert_eq!(SampleType::from_code("RE32F_IM32F").unwrap(), SampleType::ComplexFloat32);
    }

    #[test]
    fn test_unknown_code_fails_fast() {
        let err = SampleType::from_code("CI8").unwrap_err();

        assert!(matches!(err, CphdError::UnsupportedSampleType(ref c) if c == "CI8"));
    }

    #[test]
    fn test_code_round_trip() {
        for t in [
            SampleType::ComplexInt8,
            SampleType::ComplexInt16,
            SampleType::ComplexFloat32,
        ] {
            assert_eq!(SampleType::from_code(t.code()).unwrap(), t);
        }
    }
}
