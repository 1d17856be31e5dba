//! Синтетические CPHD файлы для тестов и бенчмарков.
//!
//! Значения выборок и PVP детерминированы: ожидаемое содержимое любой
//! ячейки можно получить через [`expected_cell`], PVP через [`tx_time`].
//! Файл раскладывается как заголовок, XML, PVP, сигнальный блок.

use std::io::{self, Write};

use cphd_types::{ChannelShape, SampleType};
use tempfile::NamedTempFile;

/// Байт PVP на вектор: TxTime, RcvTime (F8) и VectorIndex (I8)
pub const NUM_BYTES_PVP: usize = 24;

/// Разница RcvTime - TxTime для каждого вектора
pub const RCV_DELAY: f64 = 0.5;

/// Версия формата в первой строке заголовка
pub const CPHD_VERSION: &str = "1.0.1";

/// Построитель CPHD файла.
#[derive(Debug, Clone)]
pub struct CphdBuilder {
    sample_type: SampleType,
    format_code: Option<String>,
    shapes: Vec<ChannelShape>,
    compressed: bool,
    truncate: usize,
}

impl CphdBuilder {
    pub fn new(sample_type: SampleType) -> Self {
        Self {
            sample_type,
            format_code: None,
            shapes: Vec::new(),
            compressed: false,
            truncate: 0,
        }
    }

    /// Добавляет канал `num_vectors × num_samples`.
    pub fn channel(
        mut self,
        num_vectors: usize,
        num_samples: usize,
    ) -> Self {
        self.shapes.push(ChannelShape::new(num_vectors, num_samples));
        self
    }

    /// Записать в `SignalArrayFormat` произвольный код (данные остаются в
    /// формате `sample_type`).
    pub fn format_code(
        mut self,
        code: &str,
    ) -> Self {
        self.format_code = Some(code.to_string());
        self
    }

    /// Пометить каналы как сжатые (`CompressedSignalSize`).
    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Обрезать готовый файл на `bytes` байт с конца.
    pub fn truncate(
        mut self,
        bytes: usize,
    ) -> Self {
        self.truncate = bytes;
        self
    }

    pub fn shapes(&self) -> &[ChannelShape] {
        &self.shapes
    }

    pub fn build(&self) -> Vec<u8> {
        let mut signal = Vec::new();
        let mut signal_offsets = Vec::with_capacity(self.shapes.len());

        for (channel, &shape) in self.shapes.iter().enumerate() {
            signal_offsets.push(signal.len());
            signal.extend_from_slice(&channel_bytes(self.sample_type, channel, shape));
        }

        let mut pvp = Vec::new();
        let mut pvp_offsets = Vec::with_capacity(self.shapes.len());

        for (channel, shape) in self.shapes.iter().enumerate() {
            pvp_offsets.push(pvp.len());

            for vector in 0..shape.num_vectors {
                let tx = tx_time(channel, vector);
                pvp.extend_from_slice(&tx.to_be_bytes());
                pvp.extend_from_slice(&(tx + RCV_DELAY).to_be_bytes());
                pvp.extend_from_slice(&(vector as i64).to_be_bytes());
            }
        }

        let xml = self.xml(&signal_offsets, &pvp_offsets);

        // Смещения зависят от длины заголовка: подбираем неподвижную точку
        let mut header_len = 0;
        let header = loop {
            let xml_offset = header_len;
            let pvp_offset = xml_offset + xml.len();
            let signal_offset = pvp_offset + pvp.len();

            let text = format!(
                "CPHD/{CPHD_VERSION}\n\
                 XML_BLOCK_SIZE := {}\n\
                 XML_BLOCK_BYTE_OFFSET := {xml_offset}\n\
                 PVP_BLOCK_SIZE := {}\n\
                 PVP_BLOCK_BYTE_OFFSET := {pvp_offset}\n\
                 SIGNAL_BLOCK_SIZE := {}\n\
                 SIGNAL_BLOCK_BYTE_OFFSET := {signal_offset}\n\
                 CLASSIFICATION := UNCLASSIFIED\n\
                 RELEASE_INFO := UNRESTRICTED\n\
                 \x0c\n",
                xml.len(),
                pvp.len(),
                signal.len(),
            );

            if text.len() == header_len {
                break text;
            }
            header_len = text.len();
        };

        let mut out = Vec::with_capacity(header.len() + xml.len() + pvp.len() + signal.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(xml.as_bytes());
        out.extend_from_slice(&pvp);
        out.extend_from_slice(&signal);
        out.truncate(out.len().saturating_sub(self.truncate));
        out
    }

    /// Пишет файл во временный каталог. Файл удаляется вместе с хэндлом.
    pub fn write_temp(&self) -> io::Result<NamedTempFile> {
        let mut tmp = tempfile::Builder::new().suffix(".cphd").tempfile()?;
        tmp.write_all(&self.build())?;
        tmp.flush()?;
        Ok(tmp)
    }

    fn xml(
        &self,
        signal_offsets: &[usize],
        pvp_offsets: &[usize],
    ) -> String {
        let code = self
            .format_code
            .as_deref()
            .unwrap_or(self.sample_type.code());

        let mut channels = String::new();

        for (i, shape) in self.shapes.iter().enumerate() {
            let compressed = if self.compressed {
                format!(
                    "\n      <CompressedSignalSize>{}</CompressedSignalSize>",
                    shape.area()
                )
            } else {
                String::new()
            };

            channels.push_str(&format!(
                "    <Channel>
      <Identifier>CH{i}</Identifier>
      <NumVectors>{}</NumVectors>
      <NumSamples>{}</NumSamples>
      <SignalArrayByteOffset>{}</SignalArrayByteOffset>
      <PVPArrayByteOffset>{}</PVPArrayByteOffset>{compressed}
    </Channel>
",
                shape.num_vectors, shape.num_samples, signal_offsets[i], pvp_offsets[i],
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<CPHD xmlns="http://api.nsgreg.nga.mil/schema/cphd/{CPHD_VERSION}">
  <CollectionID>
    <CollectorName>TESTKIT</CollectorName>
    <CoreName>SYNTHETIC</CoreName>
  </CollectionID>
  <Data>
    <SignalArrayFormat>{code}</SignalArrayFormat>
    <NumBytesPVP>{NUM_BYTES_PVP}</NumBytesPVP>
    <NumCPHDChannels>{}</NumCPHDChannels>
{channels}    <NumSupportArrays>0</NumSupportArrays>
  </Data>
  <!-- <PVP> ниже описывает наборы по {NUM_BYTES_PVP} байт -->
  <PVP>
    <TxTime><Offset>0</Offset><Size>1</Size><Format>F8</Format></TxTime>
    <RcvTime><Offset>1</Offset><Size>1</Size><Format>F8</Format></RcvTime>
    <AddedPVP>
      <Name>VectorIndex</Name>
      <Offset>2</Offset>
      <Size>1</Size>
      <Format>I8</Format>
    </AddedPVP>
  </PVP>
</CPHD>
"#,
            self.shapes.len(),
        )
    }
}

/// Значение ячейки (re, im) канала. Обе части в `-127..=127`, поэтому
/// представимы во всех трёх форматах без потерь.
pub fn expected_cell(
    channel: usize,
    vector: usize,
    sample: usize,
) -> (i16, i16) {
    let re = ((channel * 37 + vector * 11 + sample * 3) % 255) as i16 - 127;
    let im = 127 - ((channel + vector * 5 + sample * 13) % 255) as i16;
    (re, im)
}

/// Кодирует ячейку в формате `sample_type`, big-endian.
pub fn encode_cell(
    sample_type: SampleType,
    (re, im): (i16, i16),
) -> Vec<u8> {
    match sample_type {
        SampleType::ComplexInt8 => vec![re as i8 as u8, im as i8 as u8],
        SampleType::ComplexInt16 => [re.to_be_bytes(), im.to_be_bytes()].concat(),
        SampleType::ComplexFloat32 => {
            [(re as f32).to_be_bytes(), (im as f32).to_be_bytes()].concat()
        }
    }
}

/// Байты всего канала в порядке файла.
pub fn channel_bytes(
    sample_type: SampleType,
    channel: usize,
    shape: ChannelShape,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(shape.area() * sample_type.cell_size());

    for vector in 0..shape.num_vectors {
        for sample in 0..shape.num_samples {
            out.extend_from_slice(&encode_cell(
                sample_type,
                expected_cell(channel, vector, sample),
            ));
        }
    }

    out
}

/// Значение PVP TxTime вектора.
pub fn tx_time(
    channel: usize,
    vector: usize,
) -> f64 {
    channel as f64 * 100.0 + vector as f64 * 0.25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_offsets_consistent() {
        let bytes = CphdBuilder::new(SampleType::ComplexInt16)
            .channel(10, 5)
            .channel(3, 7)
            .build();

        let text = String::from_utf8_lossy(&bytes);
        let header_end = text.find("\x0c\n").unwrap() + 2;
        let xml_offset: usize = text
            .lines()
            .find_map(|l| l.strip_prefix("XML_BLOCK_BYTE_OFFSET := "))
            .unwrap()
            .parse()
            .unwrap();

        assert_eq!(xml_offset, header_end);
        assert!(bytes[xml_offset..].starts_with(b"<?xml"));

        let xml_len = text[header_end..].find("</CPHD>\n").unwrap() + "</CPHD>\n".len();
        let pvp_len = 13 * NUM_BYTES_PVP;
        let signal_len = (50 + 21) * 4;
        assert_eq!(bytes.len(), header_end + xml_len + pvp_len + signal_len);
    }

    #[test]
    fn test_cells_fit_all_formats() {
        for c in 0..4 {
            for v in 0..300 {
                let (re, im) = expected_cell(c, v, v * 7);
                assert!((-127..=127).contains(&re));
                assert!((-127..=127).contains(&im));
            }
        }
        assert_eq!(encode_cell(SampleType::ComplexInt8, (-1, 2)), vec![0xff, 0x02]);
    }

    #[test]
    fn test_truncate() {
        let builder = CphdBuilder::new(SampleType::ComplexInt8).channel(2, 2);
        let full = builder.build();

        assert_eq!(builder.clone().truncate(3).build().len(), full.len() - 3);
    }
}
