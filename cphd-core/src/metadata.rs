//! Метаданные CPHD: ветви `Data` и `PVP` XML-блока и индекс каналов.

use cphd_types::{ChannelShape, CphdError, CphdResult, SampleType};

use crate::{pvp::PVP_WORD_SIZE, xml};

/// Параметры канала из `Data/Channel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParameters {
    pub identifier: String,
    pub num_vectors: usize,
    pub num_samples: usize,
    /// Смещение массива выборок от начала сигнального блока
    pub signal_array_byte_offset: u64,
    /// Смещение массива PVP от начала PVP-блока
    pub pvp_array_byte_offset: u64,
    /// Задан только для сжатых сигнальных массивов
    pub compressed_signal_size: Option<u64>,
}

/// Описание одного PVP-параметра. Смещение и размер в 8-байтовых словах.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvpParameter {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub format: String,
}

/// Часть метаданных, нужная для доступа к данным.
#[derive(Debug, Clone)]
pub struct CphdMetadata {
    /// Код формата выборок (`CI2`, `CI4`, `CF8`)
    pub signal_array_format: String,
    /// Размер набора PVP одного вектора в байтах
    pub num_bytes_pvp: usize,
    pub channels: Vec<ChannelParameters>,
    pub pvp: Vec<PvpParameter>,
}

/// Индекс каналов: формы, смещения и общий формат выборок.
///
/// Строится один раз при открытии файла и дальше только читается.
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    sample_type: SampleType,
    channels: Vec<ChannelEntry>,
}

#[derive(Debug, Clone, Copy)]
struct ChannelEntry {
    shape: ChannelShape,
    signal_array_byte_offset: u64,
    signal_array_size: u64,
}

impl CphdMetadata {
    /// Извлекает метаданные из XML-блока.
    pub fn from_xml(xml_block: &str) -> CphdResult<Self> {
        let data = xml::element(xml_block, "Data")
            .ok_or_else(|| CphdError::malformed_metadata("missing Data branch"))?;

        let signal_array_format = required_text(data, "Data", "SignalArrayFormat")?;
        let num_bytes_pvp = required_number(data, "Data", "NumBytesPVP")?;
        let num_channels: usize = required_number(data, "Data", "NumCPHDChannels")?;

        let channels = xml::elements(data, "Channel")
            .into_iter()
            .map(ChannelParameters::from_xml)
            .collect::<CphdResult<Vec<_>>>()?;

        if channels.len() != num_channels {
            return Err(CphdError::malformed_metadata(format!(
                "NumCPHDChannels = {num_channels}, but {} Data/Channel entries found",
                channels.len()
            )));
        }

        let pvp_branch =
            xml::element(xml_block, "PVP").or_else(|| xml::element(xml_block, "Pvp"));
        let pvp = match pvp_branch {
            Some(branch) => parse_pvp_branch(branch)?,
            None => Vec::new(),
        };

        Ok(Self {
            signal_array_format,
            num_bytes_pvp,
            channels,
            pvp,
        })
    }

    /// Поиск PVP-параметра по имени.
    pub fn pvp_parameter(
        &self,
        name: &str,
    ) -> Option<&PvpParameter> {
        self.pvp.iter().find(|p| p.name == name)
    }
}

impl ChannelParameters {
    fn from_xml(src: &str) -> CphdResult<Self> {
        let ctx = "Data/Channel";
        let compressed_signal_size = match xml::text(src, "CompressedSignalSize") {
            Some(raw) => Some(parse_number(ctx, "CompressedSignalSize", &raw)?),
            None => None,
        };

        Ok(Self {
            identifier: required_text(src, ctx, "Identifier")?,
            num_vectors: required_number(src, ctx, "NumVectors")?,
            num_samples: required_number(src, ctx, "NumSamples")?,
            signal_array_byte_offset: required_number(src, ctx, "SignalArrayByteOffset")?,
            pvp_array_byte_offset: required_number(src, ctx, "PVPArrayByteOffset")?,
            compressed_signal_size,
        })
    }
}

impl MetadataIndex {
    /// Строит индекс. Неизвестный формат выборок, формы, размер которых не
    /// помещается в адресное пространство, и PVP-параметры за пределами
    /// `NumBytesPVP` отклоняются здесь же.
    pub fn new(metadata: &CphdMetadata) -> CphdResult<Self> {
        let sample_type = SampleType::from_code(&metadata.signal_array_format)?;
        check_pvp_parameters(metadata)?;

        let mut channels = Vec::with_capacity(metadata.channels.len());

        for ch in &metadata.channels {
            if ch.compressed_signal_size.is_some() {
                return Err(CphdError::UnsupportedSampleType(format!(
                    "compressed signal array in channel '{}'",
                    ch.identifier
                )));
            }

            if ch.num_vectors == 0 || ch.num_samples == 0 {
                return Err(CphdError::malformed_metadata(format!(
                    "channel '{}' has empty shape {}x{}",
                    ch.identifier, ch.num_vectors, ch.num_samples
                )));
            }

            let shape = ChannelShape::new(ch.num_vectors, ch.num_samples);
            let size = shape
                .checked_area()
                .and_then(|area| area.checked_mul(sample_type.cell_size()))
                .ok_or_else(|| {
                    CphdError::malformed_metadata(format!(
                        "channel '{}' shape {}x{} of {sample_type} overflows addressable size",
                        ch.identifier, ch.num_vectors, ch.num_samples
                    ))
                })?;

            channels.push(ChannelEntry {
                shape,
                signal_array_byte_offset: ch.signal_array_byte_offset,
                signal_array_size: size as u64,
            });
        }

        Ok(Self {
            sample_type,
            channels,
        })
    }

    /// Индекс для каналов, уложенных в сигнальном блоке подряд. Формы
    /// задаёт вызывающий, переполнение размера считается ошибкой программы.
    pub fn packed(
        sample_type: SampleType,
        shapes: &[ChannelShape],
    ) -> Self {
        let mut offset = 0u64;
        let channels = shapes
            .iter()
            .map(|&shape| {
                let size = (shape.area() * sample_type.cell_size()) as u64;
                let entry = ChannelEntry {
                    shape,
                    signal_array_byte_offset: offset,
                    signal_array_size: size,
                };
                offset += size;
                entry
            })
            .collect();

        Self {
            sample_type,
            channels,
        }
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_shape(
        &self,
        channel: usize,
    ) -> CphdResult<ChannelShape> {
        self.entry(channel).map(|e| e.shape)
    }

    /// Смещение массива выборок канала внутри сигнального блока.
    pub fn signal_array_offset(
        &self,
        channel: usize,
    ) -> CphdResult<u64> {
        self.entry(channel).map(|e| e.signal_array_byte_offset)
    }

    /// Размер массива выборок канала в байтах.
    pub fn signal_array_size(
        &self,
        channel: usize,
    ) -> CphdResult<u64> {
        self.entry(channel).map(|e| e.signal_array_size)
    }

    pub fn shapes(&self) -> impl Iterator<Item = ChannelShape> + '_ {
        self.channels.iter().map(|e| e.shape)
    }

    /// Суммарное количество ячеек во всех каналах.
    pub fn total_cells(&self) -> usize {
        self.shapes()
            .fold(0usize, |total, s| total.saturating_add(s.area()))
    }

    fn entry(
        &self,
        channel: usize,
    ) -> CphdResult<&ChannelEntry> {
        self.channels
            .get(channel)
            .ok_or(CphdError::ChannelIndexOutOfRange {
                index: channel,
                num_channels: self.channels.len(),
            })
    }
}

/// Каждый PVP-параметр должен лежать внутри набора одного вектора.
fn check_pvp_parameters(metadata: &CphdMetadata) -> CphdResult<()> {
    for param in &metadata.pvp {
        let end = param
            .offset
            .checked_add(param.size)
            .and_then(|words| words.checked_mul(PVP_WORD_SIZE));

        if end.map_or(true, |end| end > metadata.num_bytes_pvp) {
            return Err(CphdError::malformed_metadata(format!(
                "PVP parameter {} (words {}+{}) exceeds NumBytesPVP = {}",
                param.name, param.offset, param.size, metadata.num_bytes_pvp
            )));
        }
    }

    Ok(())
}

fn parse_pvp_branch(branch: &str) -> CphdResult<Vec<PvpParameter>> {
    xml::children(branch)
        .into_iter()
        .map(|(tag, inner)| -> CphdResult<PvpParameter> {
            let name = if tag == "AddedPVP" {
                required_text(inner, "PVP/AddedPVP", "Name")?
            } else {
                tag.to_string()
            };
            let ctx = format!("PVP/{name}");

            Ok(PvpParameter {
                offset: required_number(inner, &ctx, "Offset")?,
                size: required_number(inner, &ctx, "Size")?,
                format: required_text(inner, &ctx, "Format")?,
                name,
            })
        })
        .collect()
}

fn required_text(
    src: &str,
    ctx: &str,
    name: &str,
) -> CphdResult<String> {
    xml::text(src, name)
        .ok_or_else(|| CphdError::malformed_metadata(format!("missing {ctx}/{name}")))
}

fn required_number<T: std::str::FromStr>(
    src: &str,
    ctx: &str,
    name: &str,
) -> CphdResult<T>
where
    T::Err: std::fmt::Display,
{
    let raw = required_text(src, ctx, name)?;
    parse_number(ctx, name, &raw)
}

fn parse_number<T: std::str::FromStr>(
    ctx: &str,
    name: &str,
    raw: &str,
) -> CphdResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| CphdError::malformed_metadata(format!("{ctx}/{name} = '{raw}': {e}")))
}
