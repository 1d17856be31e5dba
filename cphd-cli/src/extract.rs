use std::{fmt, path::PathBuf};

use cphd_core::{CellView, CellVisitor, CphdReader, SampleCell};
use cphd_types::{ChannelShape, CphdError, SampleType};
use log::{debug, info};
use serde::Serialize;

use crate::{ExtractConfig, ExtractResult};

/// Итог по одному прочитанному каналу.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub index: usize,
    pub identifier: String,
    pub shape: ChannelShape,
    /// Ячеек, пройденных при обходе блока
    pub cell_count: usize,
    /// Максимальный модуль ячейки (в единицах формата файла)
    pub peak_magnitude: f64,
}

/// Отчёт извлечения: выводится текстом или в JSON (--json).
#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub input: PathBuf,
    pub version: String,
    pub classification: String,
    pub sample_type: SampleType,
    pub num_channels: usize,
    pub pvp_bytes_per_vector: usize,
    /// Канал, для которого прочитан PVP-массив
    pub pvp_channel: usize,
    pub pvp_data_size: usize,
    /// Диапазон TxTime, если параметр есть и имеет формат F8
    pub tx_time_range: Option<(f64, f64)>,
    pub channels: Vec<ChannelReport>,
    /// Сумма ячеек по прочитанным каналам
    pub cell_count: usize,
    pub schemas: Vec<PathBuf>,
    pub bytes_read: u64,
    pub positioned_reads: u64,
    pub xml: String,
}

/// Проходит все ячейки блока: количество и пиковый модуль.
struct CellWalker;

impl CellVisitor for CellWalker {
    type Output = (usize, f64);

    fn visit<T: SampleCell>(
        self,
        view: CellView<'_, T>,
    ) -> Self::Output {
        view.iter().fold((0, 0.0), |(count, peak), cell| {
            (count + 1, f64::max(peak, cell.to_c64().norm()))
        })
    }
}

/// Открывает файл, читает PVP и wideband каждого выбранного канала.
pub fn run(config: &ExtractConfig) -> ExtractResult<ExtractReport> {
    config.validate()?;

    let reader = CphdReader::open(&config.input, config.workers)?;

    if !config.schemas.is_empty() {
        info!(
            "{} schema file(s) passed through for external XML validation",
            config.schemas.len()
        );
    }

    let selected: Vec<usize> = match config.channel {
        Some(channel) => {
            reader.channel_shape(channel)?;
            vec![channel]
        }
        None => (0..reader.num_channels()).collect(),
    };

    // PVP-сводка
    let pvp_channel = config.channel.unwrap_or(0);
    let pvp = reader.pvp();
    let pvp_data = pvp.read_channel(pvp_channel)?;

    let tx_time_range = match pvp.parameter_values(pvp_channel, "TxTime") {
        Ok(values) => min_max(&values),
        Err(CphdError::PvpParameter(msg)) => {
            debug!("TxTime not decoded: {msg}");
            None
        }
        Err(e) => return Err(e.into()),
    };

    // Wideband
    let mut channels = Vec::with_capacity(selected.len());

    for index in selected {
        let shape = reader.channel_shape(index)?;
        let block = reader.read_wideband(index, 0, None, 0, None, None)?;
        let (cell_count, peak_magnitude) = block
            .as_typed_cells(reader.sample_type())?
            .visit(CellWalker);

        debug!("channel {index}: {cell_count} cells, peak {peak_magnitude:.3}");

        channels.push(ChannelReport {
            index,
            identifier: reader.metadata().channels[index].identifier.clone(),
            shape,
            cell_count,
            peak_magnitude,
        });
    }

    let stats = reader.stats();
    let header = reader.header();

    Ok(ExtractReport {
        input: config.input.clone(),
        version: header.version.clone(),
        classification: header.classification.clone(),
        sample_type: reader.sample_type(),
        num_channels: reader.num_channels(),
        pvp_bytes_per_vector: pvp.bytes_per_vector(),
        pvp_channel,
        pvp_data_size: pvp_data.len(),
        tx_time_range,
        cell_count: channels.iter().map(|c| c.cell_count).sum(),
        channels,
        schemas: config.schemas.clone(),
        bytes_read: stats.bytes_read,
        positioned_reads: stats.positioned_reads,
        xml: reader.xml().to_string(),
    })
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
    })
}

impl fmt::Display for ExtractReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "Number of channels: {}", self.num_channels)?;
        writeln!(f, "PVP bytes per vector: {}", self.pvp_bytes_per_vector)?;
        writeln!(
            f,
            "PvpData size: {} (channel {})",
            self.pvp_data_size, self.pvp_channel
        )?;

        if let Some((lo, hi)) = self.tx_time_range {
            writeln!(f, "TxTime range: [{lo}, {hi}]")?;
        }

        for ch in &self.channels {
            writeln!(
                f,
                "  Channel {} ({}): {} x {} {}, peak |cell| {:.3}",
                ch.index,
                ch.identifier,
                ch.shape.num_vectors,
                ch.shape.num_samples,
                self.sample_type,
                ch.peak_magnitude
            )?;
        }

        write!(f, "Wideband data cell count: {}", self.cell_count)
    }
}

#[cfg(test)]
mod tests {
    use cphd_testkit::{tx_time, CphdBuilder};

    use super::*;
    use crate::ExtractError;

    fn fixture() -> tempfile::NamedTempFile {
        CphdBuilder::new(SampleType::ComplexInt8)
            .channel(10, 5)
            .channel(3, 7)
            .write_temp()
            .unwrap()
    }

    #[test]
    fn test_run_all_channels() {
        let tmp = fixture();
        let mut config = ExtractConfig::new(tmp.path());
        config.workers = Some(4);

        let report = run(&config).unwrap();

        assert_eq!(report.num_channels, 2);
        assert_eq!(report.channels.len(), 2);
        assert_eq!(report.cell_count, 50 + 21);
        assert_eq!(report.pvp_bytes_per_vector, 24);
        assert_eq!(report.pvp_data_size, 240);
        assert_eq!(report.tx_time_range, Some((tx_time(0, 0), tx_time(0, 9))));
        assert_eq!(report.bytes_read, (71 * 2) as u64);
        assert!(report.channels.iter().all(|c| c.peak_magnitude > 0.0));

        let text = report.to_string();
        assert!(text.contains("Number of channels: 2"));
        assert!(text.ends_with("Wideband data cell count: 71"));
    }

    #[test]
    fn test_run_single_channel() {
        let tmp = fixture();
        let mut config = ExtractConfig::new(tmp.path());
        config.channel = Some(1);

        let report = run(&config).unwrap();

        assert_eq!(report.channels.len(), 1);
        assert_eq!(report.channels[0].identifier, "CH1");
        assert_eq!(report.cell_count, 21);
        assert_eq!(report.pvp_channel, 1);
        assert_eq!(report.pvp_data_size, 72);
    }

    #[test]
    fn test_run_bad_channel() {
        let tmp = fixture();
        let mut config = ExtractConfig::new(tmp.path());
        config.channel = Some(5);

        assert!(matches!(
            run(&config),
            Err(ExtractError::Cphd(CphdError::ChannelIndexOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_json_report() {
        let tmp = fixture();
        let report = run(&ExtractConfig::new(tmp.path())).unwrap();
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert_eq!(json["sample_type"], "ComplexInt8");
        assert_eq!(json["cell_count"], 71);
        assert_eq!(json["channels"][0]["shape"]["num_vectors"], 10);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[]), None);
        assert_eq!(min_max(&[2.0, -1.0, 5.5]), Some((-1.0, 5.5)));
    }
}
