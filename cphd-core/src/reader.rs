use std::{fs::File, path::Path};

use cphd_types::{ChannelShape, CphdError, CphdResult, SampleType};
use log::debug;

use crate::{
    block::RawBlock,
    config::{default_worker_count, resolve_workers, ReaderConfig},
    header::FileHeader,
    locator::{ChannelLocator, ReadRequest},
    metadata::{CphdMetadata, MetadataIndex},
    pvp::PvpBlock,
    source::PositionedRead,
    wideband::{StatsSnapshot, Wideband, WidebandStats},
};

/// Читатель CPHD файла.
///
/// При открытии разбирает заголовок и метаданные и проверяет, что все
/// массивы лежат внутри своих блоков. Дальше состояние читателя не
/// меняется (кроме счётчиков), и `&CphdReader` можно использовать из
/// нескольких потоков одновременно.
#[derive(Debug)]
pub struct CphdReader<S = File> {
    source: S,
    header: FileHeader,
    xml: String,
    metadata: CphdMetadata,
    index: MetadataIndex,
    workers: usize,
    stats: WidebandStats,
}

impl CphdReader<File> {
    /// Открывает файл. `workers = None`: по числу аппаратных потоков.
    pub fn open<P: AsRef<Path>>(
        path: P,
        workers: Option<usize>,
    ) -> CphdResult<Self> {
        let config = ReaderConfig {
            workers,
            ..ReaderConfig::default()
        };

        Self::open_with_config(path, &config)
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: &ReaderConfig,
    ) -> CphdResult<Self> {
        let path = path.as_ref();
        let open_error = |source| CphdError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_error)?;

        // Ошибки ввода-вывода при разборе тоже относятся к открытию
        let reader = Self::from_source(file, config).map_err(|e| match e {
            CphdError::Io(source) => open_error(source),
            other => other,
        })?;

        debug!(
            "opened {path:?}: CPHD/{}, {} channel(s), {}",
            reader.header.version,
            reader.num_channels(),
            reader.sample_type()
        );

        Ok(reader)
    }
}

impl<S: PositionedRead> CphdReader<S> {
    /// Читатель поверх произвольного источника с позиционным чтением.
    pub fn from_source(
        source: S,
        config: &ReaderConfig,
    ) -> CphdResult<Self> {
        let workers = resolve_workers(config.workers, default_worker_count())?;
        let file_len = source.len()?;

        let header = FileHeader::read_from(&source, config.max_header_bytes)?;
        header.validate_extents(file_len)?;

        let xml_len = usize::try_from(header.xml_block.size)
            .map_err(|_| CphdError::malformed_header("XML block does not fit in memory"))?;
        let mut xml = vec![0u8; xml_len];
        source.read_exact_at(&mut xml, header.xml_block.offset)?;

        let xml = String::from_utf8(xml)
            .map_err(|e| CphdError::malformed_metadata(format!("XML block is not UTF-8: {e}")))?;

        let metadata = CphdMetadata::from_xml(&xml)?;
        let index = MetadataIndex::new(&metadata)?;

        check_layout(&header, &metadata, &index)?;

        Ok(Self {
            source,
            header,
            xml,
            metadata,
            index,
            workers,
            stats: WidebandStats::default(),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// XML-блок без изменений.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn metadata(&self) -> &CphdMetadata {
        &self.metadata
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn num_channels(&self) -> usize {
        self.index.num_channels()
    }

    pub fn channel_shape(
        &self,
        channel: usize,
    ) -> CphdResult<ChannelShape> {
        self.index.channel_shape(channel)
    }

    pub fn sample_type(&self) -> SampleType {
        self.index.sample_type()
    }

    /// Число потоков, используемое, когда запрос его не задаёт.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn wideband(&self) -> Wideband<'_, S> {
        let locator = ChannelLocator::new(&self.index, self.header.signal_block.offset);

        Wideband::new(&self.source, locator, &self.stats, self.workers)
    }

    pub fn pvp(&self) -> PvpBlock<'_, S> {
        PvpBlock::new(&self.source, self.header.pvp_block, &self.metadata)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Читает векторы `first_vector..=last_vector` и выборки
    /// `first_sample..=last_sample` канала. `None` в `last_*` означает «до конца
    /// канала», `None` в `workers` берёт значение читателя.
    pub fn read_wideband(
        &self,
        channel: usize,
        first_vector: usize,
        last_vector: Option<usize>,
        first_sample: usize,
        last_sample: Option<usize>,
        workers: Option<usize>,
    ) -> CphdResult<RawBlock> {
        let request = ReadRequest {
            channel,
            first_vector,
            last_vector,
            first_sample,
            last_sample,
            workers,
        };

        self.wideband().read(&request)
    }

    /// Канал целиком.
    pub fn read_channel(
        &self,
        channel: usize,
    ) -> CphdResult<RawBlock> {
        self.wideband().read(&ReadRequest::channel(channel))
    }
}

/// Каждый массив канала должен лежать внутри своего блока.
fn check_layout(
    header: &FileHeader,
    metadata: &CphdMetadata,
    index: &MetadataIndex,
) -> CphdResult<()> {
    let pvp_set = metadata.num_bytes_pvp as u64;

    for (i, ch) in metadata.channels.iter().enumerate() {
        let signal_end = index
            .signal_array_offset(i)?
            .checked_add(index.signal_array_size(i)?);

        if signal_end.map_or(true, |end| end > header.signal_block.size) {
            return Err(CphdError::malformed_metadata(format!(
                "signal array of channel '{}' exceeds SIGNAL block ({} B)",
                ch.identifier, header.signal_block.size
            )));
        }

        let pvp_end = (ch.num_vectors as u64)
            .checked_mul(pvp_set)
            .and_then(|size| size.checked_add(ch.pvp_array_byte_offset));

        if pvp_end.map_or(true, |end| end > header.pvp_block.size) {
            return Err(CphdError::malformed_metadata(format!(
                "PVP array of channel '{}' exceeds PVP block ({} B)",
                ch.identifier, header.pvp_block.size
            )));
        }
    }

    Ok(())
}
