//! Библиотека чтения CPHD файлов
//!
//! Compensated Phase History Data: XML-метаданные, блок PVP и один или
//! несколько каналов wideband-выборок. Основная задача крейта: быстрое и
//! типобезопасное извлечение произвольного подпрямоугольника канала
//! (векторы × выборки) с параллельным позиционным чтением.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use cphd_core::CphdReader;
//! use num_complex::Complex;
//!
//! let reader = CphdReader::open("phase_history.cphd", None)?;
//!
//! for channel in 0..reader.num_channels() {
//!     let block = reader.read_wideband(channel, 0, None, 0, None, Some(4))?;
//!     let cells = block.as_typed_cells(reader.sample_type())?;
//!     println!("channel {channel}: {} cells", cells.len());
//!
//!     if let Some(view) = block.cells::<Complex<i16>>() {
//!         let peak = view.iter().map(|c| c.re.unsigned_abs()).max();
//!         println!("  peak |re| = {peak:?}");
//!     }
//! }
//! # Ok::<(), cphd_types::CphdError>(())
//! ```

pub mod block;
pub mod cells;
pub mod config;
pub mod header;
pub mod locator;
pub mod metadata;
pub mod pvp;
pub mod reader;
pub mod source;
pub mod wideband;
pub mod xml;

pub use block::RawBlock;
pub use cells::{CellView, CellVisitor, Cells, SampleCell, TypedCells};
pub use config::{default_worker_count, ReaderConfig, DEFAULT_MAX_HEADER_BYTES};
pub use header::{BlockRange, FileHeader};
pub use locator::{ChannelLocator, ReadPlan, ReadRequest};
pub use metadata::{ChannelParameters, CphdMetadata, MetadataIndex, PvpParameter};
pub use pvp::PvpBlock;
pub use reader::CphdReader;
pub use source::PositionedRead;
pub use wideband::{StatsSnapshot, Wideband, WidebandStats};

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use cphd_testkit::{expected_cell, CphdBuilder, NUM_BYTES_PVP};
    use cphd_types::{ChannelShape, SampleType};
    use num_complex::Complex64;

    use super::*;

    #[test]
    fn test_reader_over_memory() {
        let bytes = CphdBuilder::new(SampleType::ComplexInt8)
            .channel(4, 3)
            .build();
        let reader = CphdReader::from_source(bytes, &ReaderConfig::default()).unwrap();

        let block: RawBlock = reader.read_wideband(0, 1, Some(2), 0, None, Some(2)).unwrap();
        assert_eq!(block.shape(), ChannelShape::new(2, 3));

        let cells: TypedCells<'_> = block.as_typed_cells(SampleType::ComplexInt8).unwrap();
        let (re, im) = expected_cell(0, 1, 0);
        assert_eq!(cells.len(), 6);
        assert_eq!(cells.get_c64(0).unwrap(), Complex64::new(re.into(), im.into()));

        let stats: StatsSnapshot = reader.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.bytes_read, 12);
        assert_eq!(reader.pvp().bytes_per_vector(), NUM_BYTES_PVP);
    }
}
