//! Блок PVP (Per-Vector Parameters).
//!
//! Для каждого канала в блоке лежит массив наборов PVP, по одному набору
//! длиной `NumBytesPVP` на вектор. Параметры адресуются в 8-байтовых словах.

use byteorder::{BigEndian, ByteOrder};
use cphd_types::{CphdError, CphdResult};
use log::debug;

use crate::{
    header::BlockRange,
    metadata::{ChannelParameters, CphdMetadata, PvpParameter},
    source::PositionedRead,
};

/// Размер PVP-слова в байтах
pub const PVP_WORD_SIZE: usize = 8;

/// Доступ к PVP-блоку открытого файла.
pub struct PvpBlock<'r, S: ?Sized> {
    source: &'r S,
    block: BlockRange,
    metadata: &'r CphdMetadata,
}

impl<'r, S: PositionedRead + ?Sized> PvpBlock<'r, S> {
    pub fn new(
        source: &'r S,
        block: BlockRange,
        metadata: &'r CphdMetadata,
    ) -> Self {
        Self {
            source,
            block,
            metadata,
        }
    }

    /// Байт PVP на один вектор (`NumBytesPVP`).
    pub fn bytes_per_vector(&self) -> usize {
        self.metadata.num_bytes_pvp
    }

    /// Размер PVP-массива канала в байтах.
    pub fn pvp_size(
        &self,
        channel: usize,
    ) -> CphdResult<u64> {
        let ch = self.channel(channel)?;

        ch.num_vectors
            .checked_mul(self.metadata.num_bytes_pvp)
            .map(|size| size as u64)
            .ok_or_else(|| {
                CphdError::malformed_metadata(format!(
                    "PVP array of channel '{}' overflows addressable size",
                    ch.identifier
                ))
            })
    }

    /// Абсолютное смещение PVP-массива канала в файле.
    pub fn array_offset(
        &self,
        channel: usize,
    ) -> CphdResult<u64> {
        let ch = self.channel(channel)?;

        Ok(self.block.offset + ch.pvp_array_byte_offset)
    }

    /// Читает PVP-массив канала целиком, байты в порядке файла.
    pub fn read_channel(
        &self,
        channel: usize,
    ) -> CphdResult<Vec<u8>> {
        let offset = self.array_offset(channel)?;
        let size = usize::try_from(self.pvp_size(channel)?)
            .map_err(|_| CphdError::malformed_metadata("PVP array does not fit in memory"))?;
        let mut buf = vec![0u8; size];

        self.source.read_exact_at(&mut buf, offset)?;
        debug!("channel {channel}: read {size} B of PVP at {offset}");

        Ok(buf)
    }

    /// Описание параметра по имени.
    pub fn parameter(
        &self,
        name: &str,
    ) -> CphdResult<&'r PvpParameter> {
        self.metadata
            .pvp_parameter(name)
            .ok_or_else(|| CphdError::PvpParameter(format!("unknown parameter '{name}'")))
    }

    /// Значения параметра формата `F8` для каждого вектора канала.
    pub fn parameter_values(
        &self,
        channel: usize,
        name: &str,
    ) -> CphdResult<Vec<f64>> {
        let param = self.parameter(name)?;

        if param.format != "F8" || param.size != 1 {
            return Err(CphdError::PvpParameter(format!(
                "'{name}' has format {} x{}, only scalar F8 is decoded",
                param.format, param.size
            )));
        }

        let stride = self.metadata.num_bytes_pvp;
        let start = param.offset.checked_mul(PVP_WORD_SIZE);

        let Some(start) = start.filter(|&s| s < stride && stride - s >= PVP_WORD_SIZE) else {
            return Err(CphdError::PvpParameter(format!(
                "'{name}' at word {} does not fit in {stride} B per vector",
                param.offset
            )));
        };

        let raw = self.read_channel(channel)?;

        Ok(raw
            .chunks_exact(stride)
            .map(|set| BigEndian::read_f64(&set[start..start + PVP_WORD_SIZE]))
            .collect())
    }

    fn channel(
        &self,
        channel: usize,
    ) -> CphdResult<&'r ChannelParameters> {
        self.metadata
            .channels
            .get(channel)
            .ok_or(CphdError::ChannelIndexOutOfRange {
                index: channel,
                num_channels: self.metadata.channels.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CphdMetadata {
        let channel = |id: &str, nv, pvp_off| ChannelParameters {
            identifier: id.into(),
            num_vectors: nv,
            num_samples: 4,
            signal_array_byte_offset: 0,
            pvp_array_byte_offset: pvp_off,
            compressed_signal_size: None,
        };
        let param = |name: &str, offset, format: &str| PvpParameter {
            name: name.into(),
            offset,
            size: 1,
            format: format.into(),
        };

        CphdMetadata {
            signal_array_format: "CI2".into(),
            num_bytes_pvp: 16,
            channels: vec![channel("A", 3, 0), channel("B", 2, 48)],
            pvp: vec![param("TxTime", 0, "F8"), param("Flag", 1, "I8")],
        }
    }

    /// 5 наборов по 16 байт: TxTime = индекс вектора * 0.5, Flag = 7.
    fn pvp_bytes() -> Vec<u8> {
        let mut out = vec![0u8; 10];
        for v in 0..5 {
            out.extend_from_slice(&(v as f64 * 0.5).to_be_bytes());
            out.extend_from_slice(&7i64.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_sizes_and_raw_read() {
        let md = metadata();
        let data = pvp_bytes();
        let block = BlockRange { offset: 10, size: 80 };
        let pvp = PvpBlock::new(&data, block, &md);

        assert_eq!(pvp.bytes_per_vector(), 16);
        assert_eq!(pvp.pvp_size(0).unwrap(), 48);
        assert_eq!(pvp.pvp_size(1).unwrap(), 32);
        assert_eq!(pvp.read_channel(1).unwrap(), data[58..90].to_vec());
        assert!(matches!(
            pvp.read_channel(2),
            Err(CphdError::ChannelIndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_parameter_values() {
        let md = metadata();
        let data = pvp_bytes();
        let pvp = PvpBlock::new(&data, BlockRange { offset: 10, size: 80 }, &md);

        assert_eq!(
            pvp.parameter_values(0, "TxTime").unwrap(),
            vec![0.0, 0.5, 1.0]
        );
        assert_eq!(pvp.parameter_values(1, "TxTime").unwrap(), vec![1.5, 2.0]);
    }

    #[test]
    fn test_parameter_errors() {
        let md = metadata();
        let data = pvp_bytes();
        let pvp = PvpBlock::new(&data, BlockRange { offset: 10, size: 80 }, &md);

        assert!(matches!(
            pvp.parameter_values(0, "Missing"),
            Err(CphdError::PvpParameter(_))
        ));
        assert!(matches!(
            pvp.parameter_values(0, "Flag"),
            Err(CphdError::PvpParameter(_))
        ));
    }

    #[test]
    fn test_oversized_array_is_error() {
        let mut md = metadata();
        md.channels[0].num_vectors = usize::MAX;
        md.pvp[0].offset = usize::MAX;
        let data = pvp_bytes();
        let pvp = PvpBlock::new(&data, BlockRange { offset: 10, size: 80 }, &md);

        assert!(matches!(
            pvp.pvp_size(0),
            Err(CphdError::MalformedMetadata(_))
        ));
        assert!(matches!(
            pvp.parameter_values(1, "TxTime"),
            Err(CphdError::PvpParameter(_))
        ));
    }
}
